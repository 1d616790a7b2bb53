//! Cyclic coordinate descent optimizer (spec.md §4.3): owns the fitting
//! state of spec.md §3 and runs the per-coefficient quadratic-approximation
//! update until convergence. Grounded on `examples/original_source/src/
//! ccd/Types.h` for `UpdateReturnFlags` naming and on
//! `examples/sheep-farm-Greeners/src/discrete.rs`'s Newton-loop shape for
//! the overall iterate-until-converged structure.

use crate::convergence::{statistic, ConvergenceType, PassStats};
use crate::error::{GlmError, Result};
use crate::matrix::{ColumnFormat, DesignMatrix};
use crate::model::{Grouping, ModelKernel};
use crate::priors::{JointPrior, NoPrior};
use std::collections::HashMap;

use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFlag {
    Success,
    MaxIterations,
    Illconditioned,
    MissingCovariates,
}

pub struct Ccd<'a, K: ModelKernel> {
    matrix: &'a DesignMatrix,
    kernel: K,
    prior: Box<dyn JointPrior>,

    y: Vec<f64>,
    offs: Vec<f64>,
    pid: Vec<i64>,
    time: Vec<f64>,
    n: usize,
    j: usize,

    group_of_row: Vec<usize>,
    sort_order: Vec<usize>,
    stratum_boundary: Vec<bool>,
    n_groups: usize,

    beta: Vec<f64>,
    fixed: Vec<bool>,
    x_beta: Vec<f64>,
    e: Vec<f64>,
    denom: Vec<f64>,
    numer: Vec<f64>,
    numer2: Vec<f64>,
    acc_denom: Vec<f64>,

    h_k_weight: Vec<f64>,
    h_n_weight: Vec<f64>,
    n_events: Vec<f64>,
    weighted: bool,

    xj_y: Option<Vec<f64>>,
    xj_x: Option<Vec<f64>>,

    log_likelihood: Option<f64>,
}

impl<'a, K: ModelKernel + Default> Ccd<'a, K> {
    /// Builds a new optimizer for independent-row models (`grouping ==
    /// Independent`); for `Grouped`/`Ordered` models use
    /// [`Ccd::with_strata`].
    pub fn new(matrix: &'a DesignMatrix, y: Vec<f64>, offs: Option<Vec<f64>>) -> Result<Self> {
        Self::with_strata(matrix, y, vec![0i64; matrix.n_rows()], offs)
    }

    /// `pid` partitions rows into strata/risk sets for `Grouped` and
    /// `Ordered` models; ignored for `Independent` models.
    pub fn with_strata(matrix: &'a DesignMatrix, y: Vec<f64>, pid: Vec<i64>, offs: Option<Vec<f64>>) -> Result<Self> {
        let n = matrix.n_rows();
        if y.len() != n {
            return Err(GlmError::ShapeMismatch(format!("y has {} rows, matrix has {}", y.len(), n)));
        }
        if pid.len() != n {
            return Err(GlmError::ShapeMismatch(format!("pid has {} rows, matrix has {}", pid.len(), n)));
        }
        let offs = match offs {
            Some(v) => {
                if v.len() != n {
                    return Err(GlmError::ShapeMismatch(format!("offs has {} rows, matrix has {}", v.len(), n)));
                }
                v
            }
            None => vec![1.0; n],
        };

        let kernel = K::default();
        let time = vec![0.0; n];
        let (sort_order, group_of_row, stratum_boundary, n_groups) = build_grouping::<K>(&pid, &y, &time, n);

        let j = matrix.n_cols();
        let mut ccd = Ccd {
            matrix,
            kernel,
            prior: Box::new(crate::priors::FullyExchangeable::new(Box::new(NoPrior))),
            y,
            offs,
            pid,
            time,
            n,
            j,
            group_of_row,
            sort_order,
            stratum_boundary,
            n_groups,
            beta: vec![0.0; j],
            fixed: vec![false; j],
            x_beta: vec![0.0; n],
            e: vec![0.0; n],
            denom: vec![0.0; n_groups],
            numer: vec![0.0; n_groups],
            numer2: vec![0.0; n_groups],
            acc_denom: vec![0.0; n_groups],
            h_k_weight: vec![1.0; n],
            h_n_weight: vec![1.0; n_groups],
            n_events: vec![0.0; n_groups],
            weighted: false,
            xj_y: None,
            xj_x: None,
            log_likelihood: None,
        };

        for (row, &g) in ccd.group_of_row.iter().enumerate() {
            ccd.n_events[g] += ccd.kernel.observation_count(ccd.y[row]);
        }

        ccd.reset_state();
        ccd.precompute();
        Ok(ccd)
    }

    /// Supplies the outcome-time vector `z` (spec.md §3) used by
    /// `orderedWithTies` models to merge rows with an identical time into
    /// one Breslow risk-set group, distinct from `pid`'s stratum role.
    /// Rebuilds the grouping and resets fitting state; call before
    /// `set_beta`/`update`.
    pub fn with_time(mut self, time: Vec<f64>) -> Result<Self> {
        if time.len() != self.n {
            return Err(GlmError::ShapeMismatch(format!("time has {} rows, matrix has {}", time.len(), self.n)));
        }
        self.time = time;
        self.rebuild_grouping();
        self.beta = vec![0.0; self.j];
        self.fixed = vec![false; self.j];
        self.reset_state();
        self.precompute();
        Ok(self)
    }

    fn rebuild_grouping(&mut self) {
        let (sort_order, group_of_row, stratum_boundary, n_groups) = build_grouping::<K>(&self.pid, &self.y, &self.time, self.n);
        self.sort_order = sort_order;
        self.group_of_row = group_of_row;
        self.stratum_boundary = stratum_boundary;
        self.n_groups = n_groups;
        self.denom = vec![0.0; n_groups];
        self.numer = vec![0.0; n_groups];
        self.numer2 = vec![0.0; n_groups];
        self.acc_denom = vec![0.0; n_groups];
        self.h_n_weight = vec![0.0; n_groups];
        self.n_events = vec![0.0; n_groups];
        for row in 0..self.n {
            let g = self.group_of_row[row];
            self.n_events[g] += self.kernel.observation_count(self.y[row]);
            self.h_n_weight[g] += self.h_k_weight[row];
        }
    }

    fn reset_state(&mut self) {
        for row in 0..self.n {
            self.x_beta[row] = 0.0;
            self.e[row] = self.kernel.offs_exp_x_beta(self.offs[row], 0.0, self.y[row]);
        }
        self.recompute_denominators();
        self.log_likelihood = None;
    }

    fn precompute(&mut self) {
        if K::PRECOMPUTE_GRADIENT {
            let mut xj_y = vec![0.0; self.j];
            for col in 0..self.j {
                let mut s = 0.0;
                for (row, x) in self.matrix.iterate(col) {
                    s += x * self.y[row];
                }
                xj_y[col] = s;
            }
            self.xj_y = Some(xj_y);
        }
        if K::PRECOMPUTE_HESSIAN {
            let mut xj_x = vec![0.0; self.j];
            for col in 0..self.j {
                let mut s = 0.0;
                for (row, x) in self.matrix.iterate(col) {
                    s += 2.0 * self.h_k_weight[row] * x * x;
                }
                xj_x[col] = s;
            }
            self.xj_x = Some(xj_x);
        }
    }

    fn recompute_denominators(&mut self) {
        if !K::LIKELIHOOD_HAS_DENOMINATOR {
            return;
        }
        for d in self.denom.iter_mut() {
            *d = self.kernel.denom_null_value();
        }
        for row in 0..self.n {
            self.denom[self.group_of_row[row]] += self.e[row];
        }
        if matches!(K::GROUPING, Grouping::Ordered | Grouping::OrderedWithTies) {
            self.recompute_acc_denom();
        }
    }

    fn recompute_acc_denom(&mut self) {
        let mut acc = 0.0;
        let mut last_pos: Option<usize> = None;
        for &row in self.sort_order.iter() {
            let pos = self.group_of_row[row];
            if last_pos != Some(pos) {
                if K::RESETTABLE_ACCUMULATORS && self.stratum_boundary[pos] {
                    acc = 0.0;
                }
                last_pos = Some(pos);
            }
            acc += self.e[row];
            self.acc_denom[pos] = acc;
        }
    }

    fn effective_denom(&self, g: usize) -> f64 {
        if matches!(K::GROUPING, Grouping::Ordered | Grouping::OrderedWithTies) {
            self.acc_denom[g]
        } else {
            self.denom[g]
        }
    }

    pub fn get_beta(&self, j: usize) -> f64 {
        self.beta[j]
    }

    pub fn get_beta_size(&self) -> usize {
        self.j
    }

    pub fn set_beta(&mut self, j: usize, v: f64) -> Result<()> {
        if j >= self.j {
            return Err(GlmError::Configuration(format!("coefficient index {} out of range", j)));
        }
        let delta = v - self.beta[j];
        self.apply_delta(j, delta);
        Ok(())
    }

    pub fn set_fixed_beta(&mut self, j: usize, fixed: bool) -> Result<()> {
        if j >= self.j {
            return Err(GlmError::Configuration(format!("coefficient index {} out of range", j)));
        }
        self.fixed[j] = fixed;
        Ok(())
    }

    pub fn set_prior(&mut self, prior: Box<dyn JointPrior>) {
        self.prior = prior;
    }

    /// `None` resets all weights to 1 (idempotent: calling it twice leaves
    /// state bit-identical). `cv = true` marks this as a training/resample
    /// weighting (CV fold masks, bootstrap replicate multiplicities): the
    /// per-group event count used by `compute_log_likelihood`'s
    /// denominator term is rebuilt from the new weights instead of keeping
    /// the full-data count.
    pub fn set_weights(&mut self, weights: Option<&[f64]>, cv: bool) -> Result<()> {
        match weights {
            None => {
                self.h_k_weight = vec![1.0; self.n];
                self.weighted = false;
            }
            Some(w) => {
                if w.len() != self.n {
                    return Err(GlmError::ShapeMismatch(format!("weights has {} rows, expected {}", w.len(), self.n)));
                }
                self.h_k_weight = w.to_vec();
                self.weighted = true;
            }
        }
        for hn in self.h_n_weight.iter_mut() {
            *hn = 0.0;
        }
        for row in 0..self.n {
            self.h_n_weight[self.group_of_row[row]] += self.h_k_weight[row];
        }
        if cv {
            for v in self.n_events.iter_mut() {
                *v = 0.0;
            }
            for row in 0..self.n {
                self.n_events[self.group_of_row[row]] += self.h_k_weight[row] * self.kernel.observation_count(self.y[row]);
            }
        }
        self.log_likelihood = None;
        Ok(())
    }

    fn apply_delta(&mut self, j: usize, delta: f64) {
        if delta == 0.0 {
            return;
        }
        self.beta[j] += delta;
        for (row, x) in self.matrix.iterate(j) {
            self.x_beta[row] += delta * x;
            if K::LIKELIHOOD_HAS_DENOMINATOR {
                let old_e = self.e[row];
                let new_e = self.kernel.offs_exp_x_beta(self.offs[row], self.x_beta[row], self.y[row]);
                self.e[row] = new_e;
                self.denom[self.group_of_row[row]] += new_e - old_e;
            }
        }
        if matches!(K::GROUPING, Grouping::Ordered | Grouping::OrderedWithTies) {
            self.recompute_acc_denom();
        }
        self.log_likelihood = None;
    }

    pub fn get_log_likelihood(&mut self) -> f64 {
        if let Some(ll) = self.log_likelihood {
            return ll;
        }
        let ll = self.compute_log_likelihood(&self.h_k_weight.clone());
        self.log_likelihood = Some(ll);
        ll
    }

    pub fn get_predictive_log_likelihood(&mut self, weights: &[f64]) -> f64 {
        self.compute_log_likelihood(weights)
    }

    fn compute_log_likelihood(&self, weights: &[f64]) -> f64 {
        let mut ll = 0.0;
        for row in 0..self.n {
            if weights[row] == 0.0 {
                continue;
            }
            ll += weights[row] * self.kernel.log_like_numerator_contrib(self.y[row], self.x_beta[row]);
            if K::LIKELIHOOD_HAS_FIXED_TERMS {
                ll += weights[row] * self.kernel.log_like_fixed_terms_contrib(self.y[row], self.offs[row]);
            }
        }
        if K::LIKELIHOOD_HAS_DENOMINATOR {
            for g in 0..self.n_groups {
                let denom_g = self.effective_denom(g);
                if denom_g <= 0.0 {
                    continue;
                }
                ll -= self.kernel.log_like_denominator_contrib(self.n_events[g], denom_g);
            }
        }
        ll
    }

    #[instrument(level = "debug", skip(self), fields(model = self.kernel.name()))]
    pub fn update(&mut self, max_iter: usize, convergence_type: ConvergenceType, tol: f64) -> Result<UpdateFlag> {
        info!(max_iter, ?convergence_type, tol, "starting ccd update");
        let mut most_severe = UpdateFlag::Success;
        let mut ll_prev = self.get_log_likelihood();

        for iter in 0..max_iter {
            let mut stats = PassStats::default();

            for col in 0..self.j {
                if self.fixed[col] {
                    continue;
                }
                let (gradient, hessian) = self.coordinate_gradient_hessian(col);

                if !hessian.is_finite() || hessian <= 0.0 {
                    most_severe = UpdateFlag::Illconditioned;
                    continue;
                }
                if !gradient.is_finite() {
                    most_severe = UpdateFlag::Illconditioned;
                    continue;
                }
                if self.matrix.max_abs(col) == 0.0 {
                    most_severe = UpdateFlag::MissingCovariates;
                    continue;
                }

                let delta = self.prior.next_point(col, &self.beta, gradient, hessian);
                self.apply_delta(col, delta);
                let penalized_gradient = gradient + self.prior.gradient(col, &self.beta);
                stats.observe(penalized_gradient, delta, self.beta[col]);
            }

            let ll_curr = self.get_log_likelihood();
            if !ll_curr.is_finite() {
                return Err(GlmError::Numeric("log-likelihood is not finite".into()));
            }
            let stat = statistic(convergence_type, &stats, ll_prev, ll_curr);
            debug!(iter, stat, ll = ll_curr, "pass complete");
            ll_prev = ll_curr;

            if stat < tol {
                return Ok(most_severe);
            }
        }
        info!("reached max iterations without converging");
        Ok(UpdateFlag::MaxIterations)
    }

    fn coordinate_gradient_hessian(&mut self, col: usize) -> (f64, f64) {
        let is_indicator = matches!(self.matrix.format(col), ColumnFormat::Indicator);

        for v in self.numer.iter_mut() {
            *v = 0.0;
        }
        for v in self.numer2.iter_mut() {
            *v = 0.0;
        }

        let mut touched: Vec<usize> = Vec::new();
        for (row, x) in self.matrix.iterate(col) {
            let g = self.group_of_row[row];
            self.numer[g] += self.kernel.gradient_numerator_contrib(x, self.e[row], self.x_beta[row], self.y[row]);
            if K::HAS_TWO_NUMERATOR_TERMS {
                self.numer2[g] += self.kernel.gradient_numerator2_contrib(x, self.e[row]);
            }
            touched.push(g);
        }

        if K::CUMULATIVE_GRADIENT_AND_HESSIAN {
            let mut acc = 0.0;
            let mut acc2 = 0.0;
            for pos in (0..self.n_groups).rev() {
                if K::RESETTABLE_ACCUMULATORS && self.stratum_boundary[pos] {
                    acc = 0.0;
                    acc2 = 0.0;
                }
                acc += self.numer[pos];
                acc2 += self.numer2[pos];
                self.numer[pos] = acc;
                self.numer2[pos] = acc2;
            }
        }

        let mut gradient = 0.0;
        let mut hessian = 0.0;
        if K::CUMULATIVE_GRADIENT_AND_HESSIAN {
            // The reverse cumulative pass above carries numer/numer2 from a
            // touched row forward into every earlier event-bearing risk
            // set, so the reduction must cover all of those, not just the
            // rows column `col` itself touches.
            for g in 0..self.n_groups {
                if self.n_events[g] == 0.0 {
                    continue;
                }
                let denom_g = self.effective_denom(g);
                let weight = self.h_n_weight[g];
                let (dg, dh) = self.kernel.increment_gradient_and_hessian(self.numer[g], self.numer2[g], denom_g, weight, is_indicator, self.weighted);
                gradient += dg;
                hessian += dh;
            }
        } else {
            touched.sort_unstable();
            touched.dedup();
            for g in touched {
                let denom_g = self.effective_denom(g);
                let weight = self.h_n_weight[g];
                let (dg, dh) = self.kernel.increment_gradient_and_hessian(self.numer[g], self.numer2[g], denom_g, weight, is_indicator, self.weighted);
                gradient += dg;
                hessian += dh;
            }
        }

        if let Some(xj_y) = &self.xj_y {
            gradient -= xj_y[col];
        }
        if let Some(xj_x) = &self.xj_x {
            hessian = xj_x[col];
        }

        (gradient, hessian)
    }

    pub fn get_condition_id(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn get_hyperprior(&self, j: usize) -> f64 {
        self.prior.get_single(j).variance()
    }
}

/// Builds the row->group map, the sort permutation, and stratum-boundary
/// flags for a model's declared grouping (spec.md §4.2 `grouping` trait).
fn build_grouping<K: ModelKernel>(pid: &[i64], y: &[f64], time: &[f64], n: usize) -> (Vec<usize>, Vec<usize>, Vec<bool>, usize) {
    match K::GROUPING {
        Grouping::Independent => {
            let order: Vec<usize> = (0..n).collect();
            let group_of_row: Vec<usize> = (0..n).collect();
            (order, group_of_row, vec![false; n], n)
        }
        Grouping::Grouped => {
            let mut group_ids: HashMap<i64, usize> = HashMap::new();
            let mut group_of_row = vec![0usize; n];
            for (row, &p) in pid.iter().enumerate() {
                let next = group_ids.len();
                let g = *group_ids.entry(p).or_insert(next);
                group_of_row[row] = g;
            }
            let order: Vec<usize> = (0..n).collect();
            let n_groups = group_ids.len();
            (order, group_of_row, vec![false; n_groups], n_groups)
        }
        Grouping::Ordered | Grouping::OrderedWithTies => {
            // sortPid: rows ordered by (-y, strata) so ties within a
            // stratum and events-before-censorings land contiguously.
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                y[b].partial_cmp(&y[a]).unwrap().then_with(|| pid[a].cmp(&pid[b]))
            });

            if !K::EXACT_TIES {
                let mut group_of_row = vec![0usize; n];
                for (pos, &row) in order.iter().enumerate() {
                    group_of_row[row] = pos;
                }
                let mut stratum_boundary = vec![false; n];
                for pos in 0..n {
                    let row = order[pos];
                    stratum_boundary[pos] = pos == 0 || pid[row] != pid[order[pos - 1]];
                }
                return (order, group_of_row, stratum_boundary, n);
            }

            // Breslow tie handling: rows sharing (pid, y, time) collapse
            // into one risk-set position, so their relative input order
            // cannot change the fit.
            let mut group_of_row = vec![0usize; n];
            let mut n_groups = 0usize;
            let mut group_pid = Vec::new();
            for (pos, &row) in order.iter().enumerate() {
                let same_as_prev = pos > 0 && {
                    let prev = order[pos - 1];
                    pid[prev] == pid[row] && y[prev] == y[row] && time[prev] == time[row]
                };
                if !same_as_prev {
                    group_pid.push(pid[row]);
                    n_groups += 1;
                }
                group_of_row[row] = n_groups - 1;
            }
            let mut stratum_boundary = vec![false; n_groups];
            for g in 0..n_groups {
                stratum_boundary[g] = g == 0 || group_pid[g] != group_pid[g - 1];
            }
            (order, group_of_row, stratum_boundary, n_groups)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Column;
    use crate::model::LogisticRegression;
    use crate::priors::{FullyExchangeable, NoPrior, NormalPrior};

    fn xor_matrix() -> DesignMatrix {
        let mut m = DesignMatrix::new(4).with_intercept().unwrap();
        m.push_column("x1", Column::Dense(vec![0.0, 1.0, 0.0, 1.0])).unwrap();
        m
    }

    #[test]
    fn set_beta_keeps_x_beta_consistent() {
        let m = xor_matrix();
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let mut ccd = Ccd::<LogisticRegression>::new(&m, y, None).unwrap();
        ccd.set_beta(0, 0.5).unwrap();
        ccd.set_beta(1, -0.25).unwrap();
        let expected = [0.5, 0.25, 0.5, 0.25];
        for row in 0..4 {
            assert!((ccd.x_beta[row] - expected[row]).abs() < 1e-12);
        }
    }

    #[test]
    fn idempotent_weight_reset() {
        let m = xor_matrix();
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let mut ccd = Ccd::<LogisticRegression>::new(&m, y, None).unwrap();
        ccd.set_weights(None, false).unwrap();
        let snap1 = ccd.h_k_weight.clone();
        ccd.set_weights(None, false).unwrap();
        assert_eq!(snap1, ccd.h_k_weight);
    }

    #[test]
    fn fixed_beta_is_never_touched_by_update() {
        let m = xor_matrix();
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let mut ccd = Ccd::<LogisticRegression>::new(&m, y, None).unwrap();
        ccd.set_prior(Box::new(FullyExchangeable::new(Box::new(NormalPrior::new(1.0)))));
        ccd.set_beta(0, 0.3).unwrap();
        ccd.set_fixed_beta(0, true).unwrap();
        ccd.update(50, ConvergenceType::Gradient, 1e-8).unwrap();
        assert!((ccd.get_beta(0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn logistic_shrinkage_converges_toward_ridge_solution() {
        let m = xor_matrix();
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let mut ccd = Ccd::<LogisticRegression>::new(&m, y, None).unwrap();
        ccd.set_prior(Box::new(FullyExchangeable::new(Box::new(NormalPrior::new(1.0)))));
        let flag = ccd.update(200, ConvergenceType::Gradient, 1e-10).unwrap();
        assert_eq!(flag, UpdateFlag::Success);
        assert!((ccd.get_beta(0)).abs() < 1e-4);
        assert!(ccd.get_beta(1) > 0.0);
    }

    #[test]
    fn no_prior_vs_normal_prior_produce_different_fits() {
        let m = xor_matrix();
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let mut a = Ccd::<LogisticRegression>::new(&m, y.clone(), None).unwrap();
        a.set_prior(Box::new(FullyExchangeable::new(Box::new(NoPrior))));
        let mut b = Ccd::<LogisticRegression>::new(&m, y, None).unwrap();
        b.set_prior(Box::new(FullyExchangeable::new(Box::new(NormalPrior::new(1.0)))));
        a.update(50, ConvergenceType::Gradient, 1e-6).ok();
        b.update(50, ConvergenceType::Gradient, 1e-6).ok();
        assert!(a.get_beta(1) > b.get_beta(1));
    }
}
