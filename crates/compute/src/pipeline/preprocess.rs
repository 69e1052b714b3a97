use outlier_core::{CellValue, DetectError, NumericMatrix, SplitConfig, Table};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Disjoint fit and evaluation views of the numeric input.
///
/// `eval` keeps the shuffled order; every score and label a detector
/// produces is aligned with it.
#[derive(Debug, Clone)]
pub struct Partition {
    pub fit: NumericMatrix,
    pub eval: NumericMatrix,
}

/// Validate `table`, keep its numeric columns and split the rows.
///
/// A column is numeric only if every cell in it is a number; text columns
/// are dropped, never coerced. Any missing cell (including NaN/inf) in any
/// column fails the whole call.
pub fn prepare<R: Rng + ?Sized>(
    table: &Table,
    split: &SplitConfig,
    rng: &mut R,
) -> Result<Partition, DetectError> {
    if table.rows.is_empty() {
        return Err(DetectError::EmptyNumericData(
            "dataset has no rows".to_string(),
        ));
    }

    // A short row counts as missing its trailing cells.
    for row in &table.rows {
        let missing = (0..table.n_columns())
            .find(|&j| row.cells.get(j).map_or(true, CellValue::is_missing));
        if let Some(j) = missing {
            return Err(DetectError::MissingValues {
                row: row.id.clone(),
                column: table.columns[j].clone(),
            });
        }
    }

    let numeric: Vec<usize> = (0..table.n_columns())
        .filter(|&j| {
            table
                .rows
                .iter()
                .all(|r| r.cells.get(j).and_then(CellValue::as_f64).is_some())
        })
        .collect();

    if numeric.is_empty() {
        return Err(DetectError::EmptyNumericData(format!(
            "none of {} columns is numeric",
            table.n_columns()
        )));
    }

    let columns = numeric.iter().map(|&j| table.columns[j].clone()).collect();
    let row_ids = table.rows.iter().map(|r| r.id.clone()).collect();
    let values = table
        .rows
        .iter()
        .map(|r| {
            numeric
                .iter()
                .map(|&j| r.cells.get(j).and_then(CellValue::as_f64).unwrap_or_default())
                .collect()
        })
        .collect();
    let matrix = NumericMatrix::new(columns, row_ids, values);

    let (fit_idx, eval_idx) = split_indices(matrix.n_rows(), split.eval_fraction, rng);

    debug!(
        numeric_columns = numeric.len(),
        dropped_columns = table.n_columns() - numeric.len(),
        fit_rows = fit_idx.len(),
        eval_rows = eval_idx.len(),
        "Prepared input"
    );

    Ok(Partition {
        fit: matrix.select_rows(&fit_idx),
        eval: matrix.select_rows(&eval_idx),
    })
}

/// Shuffle `0..n` and cut it: the first `ceil(eval_fraction · n)` indices
/// go to evaluation, the rest to fitting. Returns `(fit, eval)`.
pub fn split_indices<R: Rng + ?Sized>(
    n: usize,
    eval_fraction: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    // The epsilon keeps 0.7 * 10 from rounding up to 8.
    let n_eval = ((eval_fraction.clamp(0.0, 1.0) * n as f64) - 1e-9)
        .ceil()
        .max(0.0) as usize;
    let n_eval = n_eval.min(n);

    let fit = order.split_off(n_eval);
    (fit, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn mixed_table() -> Table {
        let mut table = Table::new(vec!["amount".into(), "name".into(), "score".into()]);
        for i in 0..10 {
            table.push_row(
                format!("row{}", i),
                vec![
                    CellValue::Number(i as f64),
                    CellValue::Text(format!("n{}", i)),
                    CellValue::Number(i as f64 * 2.0),
                ],
            );
        }
        table
    }

    #[test]
    fn keeps_numeric_columns_only() {
        let part = prepare(&mixed_table(), &SplitConfig::default(), &mut rng()).unwrap();
        assert_eq!(part.eval.columns, vec!["amount".to_string(), "score".to_string()]);
        assert_eq!(part.fit.n_features(), 2);
    }

    #[test]
    fn split_sizes_follow_eval_fraction() {
        let part = prepare(&mixed_table(), &SplitConfig::default(), &mut rng()).unwrap();
        assert_eq!(part.eval.n_rows(), 7);
        assert_eq!(part.fit.n_rows(), 3);

        let (fit, eval) = split_indices(100, 0.7, &mut rng());
        assert_eq!((fit.len(), eval.len()), (30, 70));
        let (fit, eval) = split_indices(3, 0.7, &mut rng());
        assert_eq!((fit.len(), eval.len()), (0, 3));
    }

    #[test]
    fn values_stay_with_their_ids() {
        let part = prepare(&mixed_table(), &SplitConfig::default(), &mut rng()).unwrap();
        for (id, row) in part.eval.row_ids.iter().zip(part.eval.values.iter()) {
            let i: f64 = id.trim_start_matches("row").parse().unwrap();
            assert_eq!(row, &vec![i, i * 2.0]);
        }
    }

    #[test]
    fn mixed_column_is_not_numeric() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row("0", vec![CellValue::Number(1.0), CellValue::Number(1.0)]);
        table.push_row("1", vec![CellValue::Number(2.0), CellValue::Text("x".into())]);
        let part = prepare(&table, &SplitConfig::default(), &mut rng()).unwrap();
        assert_eq!(part.eval.columns, vec!["a".to_string()]);
    }

    #[test]
    fn missing_cell_names_row_and_column() {
        let mut table = mixed_table();
        table.rows[4].cells[2] = CellValue::Number(f64::NAN);
        let err = prepare(&table, &SplitConfig::default(), &mut rng()).unwrap_err();
        assert_eq!(
            err,
            DetectError::MissingValues {
                row: "row4".into(),
                column: "score".into()
            }
        );
    }

    #[test]
    fn short_row_is_missing_its_trailing_cells() {
        let mut table = mixed_table();
        table.rows[6].cells.truncate(1);
        let err = prepare(&table, &SplitConfig::default(), &mut rng()).unwrap_err();
        assert_eq!(
            err,
            DetectError::MissingValues {
                row: "row6".into(),
                column: "name".into()
            }
        );
    }

    #[test]
    fn missing_in_text_column_still_fails() {
        let mut table = mixed_table();
        table.rows[0].cells[1] = CellValue::Missing;
        assert!(matches!(
            prepare(&table, &SplitConfig::default(), &mut rng()),
            Err(DetectError::MissingValues { .. })
        ));
    }

    #[test]
    fn empty_inputs() {
        let empty = Table::new(vec!["a".into()]);
        assert!(matches!(
            prepare(&empty, &SplitConfig::default(), &mut rng()),
            Err(DetectError::EmptyNumericData(_))
        ));

        let mut text_only = Table::new(vec!["name".into()]);
        text_only.push_row("0", vec![CellValue::Text("a".into())]);
        assert!(matches!(
            prepare(&text_only, &SplitConfig::default(), &mut rng()),
            Err(DetectError::EmptyNumericData(_))
        ));
    }

    #[test]
    fn split_is_deterministic_per_seed() {
        let a = prepare(&mixed_table(), &SplitConfig::default(), &mut rng()).unwrap();
        let b = prepare(&mixed_table(), &SplitConfig::default(), &mut rng()).unwrap();
        assert_eq!(a.eval.row_ids, b.eval.row_ids);
        assert_eq!(a.fit.row_ids, b.fit.row_ids);
    }

    proptest! {
        #[test]
        fn split_is_disjoint_and_exhaustive(n in 0usize..300, frac in 0.0f64..=1.0, seed in any::<u64>()) {
            let (fit, eval) = split_indices(n, frac, &mut StdRng::seed_from_u64(seed));
            prop_assert_eq!(fit.len() + eval.len(), n);

            let mut all: Vec<usize> = fit.iter().chain(eval.iter()).copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());

            let expected_eval = ((frac * n as f64) - 1e-9).ceil().max(0.0) as usize;
            prop_assert_eq!(eval.len(), expected_eval.min(n));
        }
    }
}
