//! Cross-validation driver (spec.md §4.5): grid or auto search over the
//! hyperprior variance, with SUBJECT- or ENTRY-level fold assignment.
//! Grounded on `examples/original_source/src/ccd/CcdInterface.cpp`'s
//! `GridSearchCrossValidationDriver`/`AutoSearchCrossValidationDriver`
//! naming; fold dispatch follows the rayon worker-pool pattern of
//! `examples/pkalivas-radiate`'s `Executor`.

use crate::ccd::Ccd;
use crate::config::{FitConfig, FoldLevel, PriorKind};
use crate::convergence::ConvergenceType;
use crate::error::{GlmError, Result};
use crate::matrix::DesignMatrix;
use crate::model::ModelKernel;
use crate::priors::homogeneous;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CvGridPoint {
    pub variance: f64,
    pub mean_log_likelihood: f64,
    pub sd_log_likelihood: f64,
}

#[derive(Debug, Clone)]
pub struct CvResult {
    pub chosen_variance: f64,
    pub grid: Vec<CvGridPoint>,
}

pub struct CvDriver<'a, K: ModelKernel> {
    matrix: &'a DesignMatrix,
    y: Vec<f64>,
    pid: Vec<i64>,
    offs: Option<Vec<f64>>,
    time: Option<Vec<f64>>,
    _kernel: std::marker::PhantomData<K>,
}

impl<'a, K: ModelKernel + Default> CvDriver<'a, K> {
    pub fn new(matrix: &'a DesignMatrix, y: Vec<f64>, pid: Vec<i64>, offs: Option<Vec<f64>>) -> Self {
        CvDriver { matrix, y, pid, offs, time: None, _kernel: std::marker::PhantomData }
    }

    /// Supplies the outcome-time vector used by `orderedWithTies` models
    /// (Breslow tie grouping) for every fold's `Ccd` instance.
    pub fn with_time(mut self, time: Vec<f64>) -> Self {
        self.time = Some(time);
        self
    }

    fn build_ccd(&self) -> Result<Ccd<'a, K>> {
        let ccd = Ccd::<K>::with_strata(self.matrix, self.y.clone(), self.pid.clone(), self.offs.clone())?;
        match &self.time {
            Some(t) => ccd.with_time(t.clone()),
            None => Ok(ccd),
        }
    }

    fn assign_folds(&self, fold: usize, level: FoldLevel, seed: u64) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        match level {
            FoldLevel::Entry => (0..self.matrix.n_rows()).map(|_| rand::Rng::gen_range(&mut rng, 0..fold)).collect(),
            FoldLevel::Subject => {
                let mut unique: Vec<i64> = self.pid.clone();
                unique.sort_unstable();
                unique.dedup();
                let mut pid_fold: HashMap<i64, usize> = HashMap::new();
                for p in unique {
                    pid_fold.insert(p, rand::Rng::gen_range(&mut rng, 0..fold));
                }
                self.pid.iter().map(|p| pid_fold[p]).collect()
            }
        }
    }

    /// Mean and SD of held-out log-likelihood across `fold` folds at one
    /// candidate hyperprior variance (spec.md §4.5 grid operation, inner
    /// loop over k = 1..K). Each fold owns its own `Ccd` instance.
    fn evaluate(&self, variance: f64, fold_ids: &[usize], cfg: &FitConfig) -> Result<(f64, f64)> {
        let fold = cfg.fold;
        let scores: Vec<f64> = (0..fold)
            .into_par_iter()
            .map(|k| -> Result<f64> {
                let mut ccd = self.build_ccd()?;
                ccd.set_prior(homogeneous(cfg.prior_kind, variance));
                let train_w: Vec<f64> = fold_ids.iter().map(|&f| if f == k { 0.0 } else { 1.0 }).collect();
                let test_w: Vec<f64> = fold_ids.iter().map(|&f| if f == k { 1.0 } else { 0.0 }).collect();
                ccd.set_weights(Some(&train_w), true)?;
                ccd.update(cfg.max_iterations, cfg.convergence_type, cfg.tolerance)?;
                Ok(ccd.get_predictive_log_likelihood(&test_w))
            })
            .collect::<Result<Vec<f64>>>()?;

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance_of_scores = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Ok((mean, variance_of_scores.sqrt()))
    }

    pub fn grid_search(&self, cfg: &FitConfig) -> Result<CvResult> {
        let fold_ids = self.assign_folds(cfg.fold, cfg.fold_level, cfg.seed);
        let candidates = log_spaced(cfg.lower, cfg.upper, cfg.grid_size);

        let mut grid = Vec::with_capacity(candidates.len());
        for xi in candidates {
            let (mean, sd) = self.evaluate(xi, &fold_ids, cfg)?;
            info!(variance = xi, mean_log_likelihood = mean, "cv grid point");
            grid.push(CvGridPoint { variance: xi, mean_log_likelihood: mean, sd_log_likelihood: sd });
        }

        let best = grid
            .iter()
            .max_by(|a, b| a.mean_log_likelihood.partial_cmp(&b.mean_log_likelihood).unwrap())
            .ok_or_else(|| GlmError::Configuration("empty cv grid".into()))?;

        Ok(CvResult { chosen_variance: best.variance, grid })
    }

    /// One-dimensional golden-section search over `[lower, upper]`,
    /// refined by a quadratic fit through the three best sampled points
    /// (spec.md §4.5's "quadratic/golden-section variant").
    pub fn auto_search(&self, cfg: &FitConfig) -> Result<CvResult> {
        let fold_ids = self.assign_folds(cfg.fold, cfg.fold_level, cfg.seed);
        let golden_ratio = (5f64.sqrt() - 1.0) / 2.0;

        let mut a = cfg.lower;
        let mut b = cfg.upper;
        let mut c = b - golden_ratio * (b - a);
        let mut d = a + golden_ratio * (b - a);

        let mut trace: Vec<CvGridPoint> = Vec::new();
        let mut eval_at = |xi: f64, trace: &mut Vec<CvGridPoint>| -> Result<f64> {
            let (mean, sd) = self.evaluate(xi, &fold_ids, cfg)?;
            trace.push(CvGridPoint { variance: xi, mean_log_likelihood: mean, sd_log_likelihood: sd });
            Ok(mean)
        };

        let mut fc = eval_at(c, &mut trace)?;
        let mut fd = eval_at(d, &mut trace)?;

        for _ in 0..cfg.grid_size.max(4) {
            if (b - a).abs() < 1e-4 * cfg.lower.max(1.0) {
                break;
            }
            if fc > fd {
                b = d;
                d = c;
                fd = fc;
                c = b - golden_ratio * (b - a);
                fc = eval_at(c, &mut trace)?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + golden_ratio * (b - a);
                fd = eval_at(d, &mut trace)?;
            }
        }

        let mut best3 = trace.clone();
        best3.sort_by(|x, y| y.mean_log_likelihood.partial_cmp(&x.mean_log_likelihood).unwrap());
        best3.truncate(3);

        let chosen = if best3.len() == 3 {
            quadratic_vertex(&best3[0], &best3[1], &best3[2]).unwrap_or(best3[0].variance).clamp(cfg.lower, cfg.upper)
        } else {
            best3[0].variance
        };

        Ok(CvResult { chosen_variance: chosen, grid: trace })
    }

    /// `resetForOptimal`: restores full weights, sets the prior variance
    /// to `result.chosen_variance`, and refits. If `cfg.fit_mle_at_mode`,
    /// fixes all-zero coefficients and switches to `NoPrior` for a final
    /// unpenalized refit at the chosen support.
    pub fn reset_for_optimal(&self, result: &CvResult, cfg: &FitConfig) -> Result<Ccd<'a, K>> {
        let mut ccd = self.build_ccd()?;
        ccd.set_weights(None, false)?;
        ccd.set_prior(homogeneous(cfg.prior_kind, result.chosen_variance));
        ccd.update(cfg.max_iterations, cfg.convergence_type, cfg.tolerance)?;

        if cfg.fit_mle_at_mode {
            for j in 0..ccd.get_beta_size() {
                if ccd.get_beta(j) == 0.0 {
                    ccd.set_fixed_beta(j, true)?;
                }
            }
            ccd.set_prior(homogeneous(PriorKind::None, 0.0));
            ccd.update(cfg.max_iterations, cfg.convergence_type, cfg.tolerance)?;
        }
        Ok(ccd)
    }
}

fn log_spaced(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![lo];
    }
    let log_lo = lo.ln();
    let log_hi = hi.ln();
    (0..n)
        .map(|i| (log_lo + (log_hi - log_lo) * i as f64 / (n - 1) as f64).exp())
        .collect()
}

fn quadratic_vertex(p1: &CvGridPoint, p2: &CvGridPoint, p3: &CvGridPoint) -> Option<f64> {
    let (x1, y1) = (p1.variance, p1.mean_log_likelihood);
    let (x2, y2) = (p2.variance, p2.mean_log_likelihood);
    let (x3, y3) = (p3.variance, p3.mean_log_likelihood);

    let denom = (x1 - x2) * y3 + (x2 - x3) * y1 + (x3 - x1) * y2;
    if denom.abs() < 1e-12 {
        return None;
    }
    let numer = (x1 * x1 - x2 * x2) * y3 + (x2 * x2 - x3 * x3) * y1 + (x3 * x3 - x1 * x1) * y2;
    Some(0.5 * numer / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_vertex_of_symmetric_parabola_is_its_center() {
        let p1 = CvGridPoint { variance: 0.0, mean_log_likelihood: 0.0, sd_log_likelihood: 0.0 };
        let p2 = CvGridPoint { variance: 1.0, mean_log_likelihood: 1.0, sd_log_likelihood: 0.0 };
        let p3 = CvGridPoint { variance: 2.0, mean_log_likelihood: 0.0, sd_log_likelihood: 0.0 };
        let v = quadratic_vertex(&p1, &p2, &p3).unwrap();
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn log_spaced_endpoints_match_bounds() {
        let pts = log_spaced(0.01, 20.0, 10);
        assert!((pts[0] - 0.01).abs() < 1e-9);
        assert!((pts[9] - 20.0).abs() < 1e-6);
        assert_eq!(pts.len(), 10);
    }
}
