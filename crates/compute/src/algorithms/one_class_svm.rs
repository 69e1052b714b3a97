//! One-class support vector machine with an RBF kernel.
//!
//! Solves the ν-formulation dual
//!
//! ```text
//! min ½ αᵀQα   s.t.  0 ≤ αᵢ ≤ 1,  Σαᵢ = ν·l,   Qᵢⱼ = K(xᵢ, xⱼ)
//! ```
//!
//! with SMO: each step picks the maximal violating pair using second-order
//! information and solves the two-variable sub-problem analytically. The
//! decision function is `f(x) = Σ αᵢ K(xᵢ, x) − ρ`; positive inside the
//! boundary, negative outside.

use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use rayon::prelude::*;

use crate::algorithms::kmeans::squared_euclidean;
use crate::pipeline::stats::matrix_variance;

/// Floor for non-positive curvature in the two-variable sub-problem.
const TAU: f64 = 1e-12;

/// Solver parameters.
#[derive(Debug, Clone)]
pub struct SvmParams {
    /// Upper bound on the fraction of training rows outside the boundary.
    pub nu: f64,
    /// RBF bandwidth.
    pub gamma: f64,
    /// Stop when the maximal KKT violation drops below this.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Kernel row cache budget in megabytes.
    pub cache_mb: usize,
}

/// RBF kernel `exp(-γ‖a − b‖²)`.
#[inline]
pub fn rbf_kernel(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    (-gamma * squared_euclidean(a, b)).exp()
}

/// The "scale" bandwidth: `1 / (n_features · Var(X))`, or 1.0 when the data
/// has no variance.
pub fn scale_gamma(data: &[Vec<f64>]) -> f64 {
    let n_features = data.first().map_or(0, Vec::len);
    let var = matrix_variance(data);
    if n_features == 0 || var <= 0.0 {
        1.0
    } else {
        1.0 / (n_features as f64 * var)
    }
}

/// Lazily computed rows of the training kernel matrix.
struct KernelRows<'a> {
    data: &'a [Vec<f64>],
    gamma: f64,
    cache: LruCache<usize, Rc<Vec<f64>>>,
}

impl<'a> KernelRows<'a> {
    fn new(data: &'a [Vec<f64>], gamma: f64, cache_mb: usize) -> Self {
        let row_bytes = (data.len() * std::mem::size_of::<f64>()).max(1);
        let rows = (cache_mb * 1024 * 1024 / row_bytes).max(2);
        Self {
            data,
            gamma,
            cache: LruCache::new(NonZeroUsize::new(rows).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    fn row(&mut self, i: usize) -> Rc<Vec<f64>> {
        if let Some(row) = self.cache.get(&i) {
            return Rc::clone(row);
        }
        let xi = &self.data[i];
        let gamma = self.gamma;
        let row: Vec<f64> = self
            .data
            .par_iter()
            .map(|xj| rbf_kernel(xi, xj, gamma))
            .collect();
        let row = Rc::new(row);
        self.cache.put(i, Rc::clone(&row));
        row
    }
}

/// A fitted one-class SVM.
#[derive(Debug, Clone)]
pub struct OneClassSvm {
    support_vectors: Vec<Vec<f64>>,
    coefficients: Vec<f64>,
    rho: f64,
    gamma: f64,
    nu: f64,
    iterations: usize,
}

impl OneClassSvm {
    /// Fit on `data`. Deterministic: SMO has no random steps.
    ///
    /// # Panics
    /// Panics if `data` is empty or `nu` is outside `(0, 1]`.
    pub fn fit(data: &[Vec<f64>], params: &SvmParams) -> Self {
        assert!(!data.is_empty(), "one-class svm: data must not be empty");
        assert!(
            params.nu > 0.0 && params.nu <= 1.0,
            "one-class svm: nu must be in (0, 1]"
        );

        let l = data.len();
        let upper = 1.0;
        let mut kernel = KernelRows::new(data, params.gamma, params.cache_mb);

        // Feasible start: the first ⌊νl⌋ multipliers at the bound, one
        // fractional, the rest zero.
        let total = params.nu * l as f64;
        let full = (total.floor() as usize).min(l);
        let mut alpha = vec![0.0; l];
        for a in alpha.iter_mut().take(full) {
            *a = upper;
        }
        if full < l {
            alpha[full] = total - full as f64;
        }

        // Gradient of ½αᵀQα is Qα.
        let mut grad = vec![0.0; l];
        for (i, &a) in alpha.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            let row = kernel.row(i);
            for (g, &q) in grad.iter_mut().zip(row.iter()) {
                *g += a * q;
            }
        }

        let mut iterations = 0;
        while iterations < params.max_iterations {
            let Some((i, j)) = select_working_set(&alpha, &grad, upper, params.tolerance, &mut kernel)
            else {
                break;
            };
            iterations += 1;

            let row_i = kernel.row(i);
            let row_j = kernel.row(j);

            let old_i = alpha[i];
            let old_j = alpha[j];

            let mut quad = row_i[i] + row_j[j] - 2.0 * row_i[j];
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = old_i + old_j;
            alpha[i] -= delta;
            alpha[j] += delta;

            // Clip back into the box while keeping αᵢ + αⱼ fixed.
            if sum > upper {
                if alpha[i] > upper {
                    alpha[i] = upper;
                    alpha[j] = sum - upper;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > upper {
                if alpha[j] > upper {
                    alpha[j] = upper;
                    alpha[i] = sum - upper;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }

            let d_i = alpha[i] - old_i;
            let d_j = alpha[j] - old_j;
            for (k, g) in grad.iter_mut().enumerate() {
                *g += row_i[k] * d_i + row_j[k] * d_j;
            }
        }

        let rho = compute_rho(&alpha, &grad, upper);

        let (support_vectors, coefficients): (Vec<Vec<f64>>, Vec<f64>) = alpha
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 0.0)
            .map(|(i, &a)| (data[i].clone(), a))
            .unzip();

        Self {
            support_vectors,
            coefficients,
            rho,
            gamma: params.gamma,
            nu: params.nu,
            iterations,
        }
    }

    /// Signed distance-like value: positive inside the boundary.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(self.coefficients.iter())
            .map(|(sv, &a)| a * rbf_kernel(sv, x, self.gamma))
            .sum::<f64>()
            - self.rho
    }

    /// Decision values for many rows, in parallel, preserving order.
    pub fn decision_all(&self, xs: &[Vec<f64>]) -> Vec<f64> {
        xs.par_iter().map(|x| self.decision_function(x)).collect()
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Maximal violating pair with second-order selection of `j`.
///
/// Returns None once the KKT violation is within `tolerance`.
fn select_working_set(
    alpha: &[f64],
    grad: &[f64],
    upper: f64,
    tolerance: f64,
    kernel: &mut KernelRows<'_>,
) -> Option<(usize, usize)> {
    let mut gmax = f64::NEG_INFINITY;
    let mut i = None;
    for (t, (&a, &g)) in alpha.iter().zip(grad.iter()).enumerate() {
        if a < upper && -g >= gmax {
            gmax = -g;
            i = Some(t);
        }
    }
    let i = i?;
    let row_i = kernel.row(i);

    let mut gmax2 = f64::NEG_INFINITY;
    let mut j = None;
    let mut obj_min = f64::INFINITY;
    for (t, (&a, &g)) in alpha.iter().zip(grad.iter()).enumerate() {
        if a <= 0.0 {
            continue;
        }
        if g >= gmax2 {
            gmax2 = g;
        }
        let grad_diff = gmax + g;
        if grad_diff > 0.0 {
            // K(x_t, x_t) = 1 for the RBF kernel.
            let mut quad = row_i[i] + 1.0 - 2.0 * row_i[t];
            if quad <= 0.0 {
                quad = TAU;
            }
            let obj = -(grad_diff * grad_diff) / quad;
            if obj <= obj_min {
                obj_min = obj;
                j = Some(t);
            }
        }
    }

    if gmax + gmax2 < tolerance {
        return None;
    }
    j.map(|j| (i, j))
}

/// Offset from the KKT conditions: mean gradient over free multipliers, or
/// the midpoint of the feasible interval when none are free.
fn compute_rho(alpha: &[f64], grad: &[f64], upper: f64) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut n_free = 0usize;
    let mut sum_free = 0.0;

    for (&a, &g) in alpha.iter().zip(grad.iter()) {
        if a >= upper {
            lb = lb.max(g);
        } else if a <= 0.0 {
            ub = ub.min(g);
        } else {
            n_free += 1;
            sum_free += g;
        }
    }

    if n_free > 0 {
        sum_free / n_free as f64
    } else {
        match (ub.is_finite(), lb.is_finite()) {
            (true, true) => (ub + lb) / 2.0,
            (true, false) => ub,
            (false, true) => lb,
            (false, false) => 0.0,
        }
    }
}
