use outlier_core::NumericMatrix;

use super::stats::{percentile_sorted, quartiles};

/// Per-column robust scaling: `(x - median) / IQR`.
///
/// A column whose IQR is zero is centred but left unscaled (scale 1), so
/// constant columns never divide by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

impl RobustScaler {
    /// Learn medians and IQRs from `fit`. An empty matrix yields the
    /// identity transform.
    pub fn fit(fit: &NumericMatrix) -> Self {
        let n_features = fit.n_features();
        let mut center = Vec::with_capacity(n_features);
        let mut scale = Vec::with_capacity(n_features);

        for j in 0..n_features {
            let mut column: Vec<f64> = fit.values.iter().map(|row| row[j]).collect();
            column.sort_by(|a, b| a.total_cmp(b));

            let median = percentile_sorted(&column, 50.0);
            let (q1, q3) = quartiles(&column);
            let iqr = q3 - q1;

            center.push(median);
            scale.push(if iqr > 0.0 { iqr } else { 1.0 });
        }

        Self { center, scale }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.center.iter().zip(self.scale.iter()))
            .map(|(&x, (&c, &s))| (x - c) / s)
            .collect()
    }

    /// Scale every row of `m`; ids and column names are kept.
    pub fn transform(&self, m: &NumericMatrix) -> NumericMatrix {
        let values = m.values.iter().map(|row| self.transform_row(row)).collect();
        m.with_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: Vec<Vec<f64>>) -> NumericMatrix {
        let n_features = values.first().map_or(0, Vec::len);
        let columns = (0..n_features).map(|j| format!("c{}", j)).collect();
        let ids = (0..values.len()).map(|i| i.to_string()).collect();
        NumericMatrix::new(columns, ids, values)
    }

    #[test]
    fn centres_on_median_and_divides_by_iqr() {
        // Column 1..=5: median 3, Q1 2, Q3 4.
        let m = matrix((1..=5).map(|v| vec![v as f64]).collect());
        let scaler = RobustScaler::fit(&m);
        assert_eq!(scaler.center, vec![3.0]);
        assert_eq!(scaler.scale, vec![2.0]);

        let scaled = scaler.transform(&m);
        assert_eq!(scaled.column(0), Some(vec![-1.0, -0.5, 0.0, 0.5, 1.0]));
        assert_eq!(scaled.row_ids, m.row_ids);
    }

    #[test]
    fn constant_column_is_centred_only() {
        let m = matrix(vec![vec![4.0, 1.0], vec![4.0, 2.0], vec![4.0, 3.0]]);
        let scaler = RobustScaler::fit(&m);
        assert_eq!(scaler.scale[0], 1.0);
        let scaled = scaler.transform(&m);
        assert!(scaled.values.iter().all(|row| row[0] == 0.0));
    }

    #[test]
    fn parameters_come_from_fit_rows_only() {
        let fit = matrix(vec![vec![0.0], vec![2.0], vec![4.0]]);
        let eval = matrix(vec![vec![100.0]]);
        let scaler = RobustScaler::fit(&fit);
        // median 2, IQR 3 - 1 = 2
        assert_eq!(scaler.transform(&eval).values, vec![vec![49.0]]);
    }

    #[test]
    fn empty_fit_is_identity() {
        let empty = NumericMatrix::new(vec!["a".into()], Vec::new(), Vec::new());
        let scaler = RobustScaler::fit(&empty);
        assert_eq!(scaler.transform_row(&[5.0]), vec![5.0]);
    }
}
