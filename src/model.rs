//! Model kernels: one value type per supported likelihood, each a bundle of
//! pure functions (spec.md §4.2). Grounded in
//! `examples/original_source/src/cyclops/engine/ModelSpecifics.h`.

/// How rows are grouped into the denominator/accumulator index `g`
/// (spec.md §4.2's `grouping` trait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// G = N; one group per row (logistic, Poisson, least squares).
    Independent,
    /// G = number of strata; rows sharing a `pid` form a group (SCCS, CLR).
    Grouped,
    /// Rows sorted by time; denominator is a reverse cumulative sum (Cox).
    Ordered,
    /// As `Ordered`, but tied event times within a stratum share one
    /// Breslow-expanded denominator (tied CLR, tied Cox).
    OrderedWithTies,
}

/// One likelihood family's pure-function contract (spec.md §4.2 table).
/// Implementors are zero-sized, `Copy`, and carry no state.
pub trait ModelKernel: Copy + Send + Sync + 'static {
    const GROUPING: Grouping;
    const SORT_PID: bool;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool;
    const RESETTABLE_ACCUMULATORS: bool;
    const EXACT_TIES: bool;
    const HAS_TWO_NUMERATOR_TERMS: bool;
    const LIKELIHOOD_HAS_DENOMINATOR: bool;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool;
    const PRECOMPUTE_GRADIENT: bool;
    const PRECOMPUTE_HESSIAN: bool;

    fn name(&self) -> &'static str;

    fn denom_null_value(&self) -> f64;

    fn observation_count(&self, y: f64) -> f64;

    /// Per-row contribution to `denom`: `exp(xBeta)`, `offs * exp(xBeta)`,
    /// or unused (model has no denominator).
    fn offs_exp_x_beta(&self, offs: f64, x_beta: f64, y: f64) -> f64;

    /// Additive contribution to the numerator for the coefficient whose
    /// column touches this row.
    fn gradient_numerator_contrib(&self, x: f64, e: f64, x_beta: f64, y: f64) -> f64;

    /// Contribution to the second numerator term; only meaningful when
    /// `HAS_TWO_NUMERATOR_TERMS` is true.
    fn gradient_numerator2_contrib(&self, x: f64, e: f64) -> f64;

    /// Reduces per-group numerator/denominator into a `(gradient, hessian)`
    /// delta. `weight` is `hNWeight[g]` (or the event count for
    /// survival-style models, which always apply it regardless of
    /// `weighted`).
    fn increment_gradient_and_hessian(
        &self,
        numer: f64,
        numer2: f64,
        denom: f64,
        weight: f64,
        is_indicator: bool,
        weighted: bool,
    ) -> (f64, f64);

    fn log_like_numerator_contrib(&self, y: f64, x_beta: f64) -> f64;

    fn log_like_denominator_contrib(&self, n_g: f64, denom_g: f64) -> f64;

    fn log_like_fixed_terms_contrib(&self, y: f64, offs: f64) -> f64;

    fn predict_estimate(&self, x_beta: f64) -> f64;
}

/// Shared `(gradient, hessian)` reduction for the survival-style kernels
/// (SCCS, conditional logistic, Cox): weight is the group's event count and
/// is always applied, independent of the `weighted` flag.
fn survival_grad_hess(numer: f64, numer2: f64, denom: f64, n_events: f64, is_indicator: bool) -> (f64, f64) {
    let t = numer / denom;
    let g = n_events * t;
    let hessian = if is_indicator {
        g * (1.0 - t)
    } else {
        n_events * (numer2 / denom - t * t)
    };
    (g, hessian)
}

fn logistic_grad_hess(numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, weighted: bool) -> (f64, f64) {
    let g = numer / denom;
    let gradient = if weighted { weight * g } else { g };
    let hessian = if is_indicator {
        if weighted { weight * g * (1.0 - g) } else { g * (1.0 - g) }
    } else if weighted {
        weight * (numer2 / denom - g * g)
    } else {
        numer2 / denom - g * g
    };
    (gradient, hessian)
}

/// y·xβ numerator and model-specific denominator, shared by every kernel
/// whose systematic component is a linear predictor through `exp` (i.e.
/// everything but least squares): `GLMProjection` in the original.
fn glm_numerator_contrib(x: f64, e: f64) -> f64 {
    e * x
}

fn glm_numerator2_contrib(x: f64, e: f64) -> f64 {
    e * x * x
}

macro_rules! glm_projection_numerators {
    () => {
        fn gradient_numerator_contrib(&self, x: f64, e: f64, _x_beta: f64, _y: f64) -> f64 {
            glm_numerator_contrib(x, e)
        }

        fn gradient_numerator2_contrib(&self, x: f64, e: f64) -> f64 {
            glm_numerator2_contrib(x, e)
        }

        fn log_like_numerator_contrib(&self, y: f64, x_beta: f64) -> f64 {
            y * x_beta
        }
    };
}

// ---------------------------------------------------------------------
// Logistic regression (independent rows)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegression;

impl ModelKernel for LogisticRegression {
    const GROUPING: Grouping = Grouping::Independent;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "lr"
    }

    fn denom_null_value(&self) -> f64 {
        1.0
    }

    fn observation_count(&self, _y: f64) -> f64 {
        1.0
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, weighted: bool) -> (f64, f64) {
        logistic_grad_hess(numer, numer2, denom, weight, is_indicator, weighted)
    }

    fn log_like_denominator_contrib(&self, _n_g: f64, denom_g: f64) -> f64 {
        denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        let t = x_beta.exp();
        t / (t + 1.0)
    }
}

// ---------------------------------------------------------------------
// Self-controlled case series: stratified Poisson with offset
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct SelfControlledCaseSeries;

impl ModelKernel for SelfControlledCaseSeries {
    const GROUPING: Grouping = Grouping::Grouped;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = true;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "sccs"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, offs: f64, x_beta: f64, _y: f64) -> f64 {
        offs * x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, denom_g: f64) -> f64 {
        n_g * denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, y: f64, offs: f64) -> f64 {
        y * offs.ln()
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

// ---------------------------------------------------------------------
// Conditional (stratified) logistic regression
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalLogisticRegression;

impl ModelKernel for ConditionalLogisticRegression {
    const GROUPING: Grouping = Grouping::Grouped;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "clr"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, denom_g: f64) -> f64 {
        n_g * denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

/// Conditional logistic regression with exact Breslow handling of tied
/// event times within a stratum (`exact_ties = true`). Function bodies are
/// identical to the untied form; only the grouping/tie flags differ, as in
/// the reference `TiedConditionalLogisticRegression`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiedConditionalLogisticRegression;

impl ModelKernel for TiedConditionalLogisticRegression {
    const GROUPING: Grouping = Grouping::OrderedWithTies;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = true;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "clr-tied"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, denom_g: f64) -> f64 {
        n_g * denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

// ---------------------------------------------------------------------
// Cox proportional hazards
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct CoxProportionalHazards;

impl ModelKernel for CoxProportionalHazards {
    const GROUPING: Grouping = Grouping::Ordered;
    const SORT_PID: bool = true;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = true;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "cox"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, acc_denom_g: f64) -> f64 {
        n_g * acc_denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

/// Cox model stratified by `pid`: identical kernel functions to the plain
/// model, but the optimizer resets the cumulative accumulators at every
/// stratum boundary (`resettable_accumulators = true`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StratifiedCoxProportionalHazards;

impl ModelKernel for StratifiedCoxProportionalHazards {
    const GROUPING: Grouping = Grouping::Ordered;
    const SORT_PID: bool = true;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = true;
    const RESETTABLE_ACCUMULATORS: bool = true;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "cox-stratified"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, acc_denom_g: f64) -> f64 {
        n_g * acc_denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

/// Cox model with Breslow handling of tied event times.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreslowTiedCoxProportionalHazards;

impl ModelKernel for BreslowTiedCoxProportionalHazards {
    const GROUPING: Grouping = Grouping::OrderedWithTies;
    const SORT_PID: bool = true;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = true;
    const RESETTABLE_ACCUMULATORS: bool = true;
    const EXACT_TIES: bool = true;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "cox-breslow"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, y: f64) -> f64 {
        y
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, denom: f64, weight: f64, is_indicator: bool, _weighted: bool) -> (f64, f64) {
        survival_grad_hess(numer, numer2, denom, weight, is_indicator)
    }

    fn log_like_denominator_contrib(&self, n_g: f64, acc_denom_g: f64) -> f64 {
        n_g * acc_denom_g.ln()
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

// ---------------------------------------------------------------------
// Poisson regression (independent rows, no stratification)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonRegression;

impl ModelKernel for PoissonRegression {
    const GROUPING: Grouping = Grouping::Independent;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = true;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = true;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = true;
    const PRECOMPUTE_GRADIENT: bool = true;
    const PRECOMPUTE_HESSIAN: bool = false;

    fn name(&self) -> &'static str {
        "pr"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, _y: f64) -> f64 {
        1.0
    }

    fn offs_exp_x_beta(&self, _offs: f64, x_beta: f64, _y: f64) -> f64 {
        x_beta.exp()
    }

    glm_projection_numerators!();

    fn increment_gradient_and_hessian(&self, numer: f64, numer2: f64, _denom: f64, weight: f64, is_indicator: bool, weighted: bool) -> (f64, f64) {
        if is_indicator {
            let v = if weighted { weight * numer } else { numer };
            (v, v)
        } else {
            let g = if weighted { weight * numer } else { numer };
            let h = if weighted { weight * numer2 } else { numer2 };
            (g, h)
        }
    }

    fn log_like_denominator_contrib(&self, _n_g: f64, denom_g: f64) -> f64 {
        denom_g
    }

    fn log_like_fixed_terms_contrib(&self, y: f64, _offs: f64) -> f64 {
        neg_log_factorial(y)
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta.exp()
    }
}

fn neg_log_factorial(y: f64) -> f64 {
    let n = y as i64;
    let mut acc = 0.0;
    let mut i = 2;
    while i <= n {
        acc -= (i as f64).ln();
        i += 1;
    }
    acc
}

// ---------------------------------------------------------------------
// Least squares
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquares;

impl ModelKernel for LeastSquares {
    const GROUPING: Grouping = Grouping::Independent;
    const SORT_PID: bool = false;
    const CUMULATIVE_GRADIENT_AND_HESSIAN: bool = false;
    const RESETTABLE_ACCUMULATORS: bool = false;
    const EXACT_TIES: bool = false;
    const HAS_TWO_NUMERATOR_TERMS: bool = false;
    const LIKELIHOOD_HAS_DENOMINATOR: bool = false;
    const LIKELIHOOD_HAS_FIXED_TERMS: bool = false;
    const PRECOMPUTE_GRADIENT: bool = false;
    const PRECOMPUTE_HESSIAN: bool = true;

    fn name(&self) -> &'static str {
        "ls"
    }

    fn denom_null_value(&self) -> f64 {
        0.0
    }

    fn observation_count(&self, _y: f64) -> f64 {
        1.0
    }

    fn offs_exp_x_beta(&self, _offs: f64, _x_beta: f64, _y: f64) -> f64 {
        0.0
    }

    fn gradient_numerator_contrib(&self, x: f64, _e: f64, x_beta: f64, y: f64) -> f64 {
        2.0 * (x_beta - y) * x
    }

    fn gradient_numerator2_contrib(&self, _x: f64, _e: f64) -> f64 {
        0.0
    }

    fn increment_gradient_and_hessian(&self, numer: f64, _numer2: f64, _denom: f64, weight: f64, _is_indicator: bool, weighted: bool) -> (f64, f64) {
        let gradient = if weighted { weight * numer } else { numer };
        (gradient, 0.0)
    }

    fn log_like_numerator_contrib(&self, y: f64, x_beta: f64) -> f64 {
        let residual = y - x_beta;
        -(residual * residual)
    }

    fn log_like_denominator_contrib(&self, _n_g: f64, _denom_g: f64) -> f64 {
        0.0
    }

    fn log_like_fixed_terms_contrib(&self, _y: f64, _offs: f64) -> f64 {
        0.0
    }

    fn predict_estimate(&self, x_beta: f64) -> f64 {
        x_beta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistic_denom_null_is_one() {
        assert_eq!(LogisticRegression.denom_null_value(), 1.0);
        assert_eq!(PoissonRegression.denom_null_value(), 0.0);
    }

    #[test]
    fn sccs_offset_is_applied() {
        let k = SelfControlledCaseSeries;
        let e = k.offs_exp_x_beta(2.0, 0.0, 1.0);
        assert_eq!(e, 2.0);
    }

    #[test]
    fn poisson_fixed_terms_is_neg_log_factorial() {
        let k = PoissonRegression;
        // -log(3!) = -log(6)
        assert!((k.log_like_fixed_terms_contrib(3.0, 0.0) - (-(6.0_f64.ln()))).abs() < 1e-12);
        assert_eq!(k.log_like_fixed_terms_contrib(0.0, 0.0), 0.0);
        assert_eq!(k.log_like_fixed_terms_contrib(1.0, 0.0), 0.0);
    }

    #[test]
    fn logistic_predict_is_sigmoid() {
        let k = LogisticRegression;
        let p = k.predict_estimate(0.0);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn least_squares_gradient_numerator_matches_ols_normal_equations() {
        let k = LeastSquares;
        // x=1, xBeta=2, y=1 -> residual contributes 2*(2-1)*1 = 2
        assert_eq!(k.gradient_numerator_contrib(1.0, 0.0, 2.0, 1.0), 2.0);
    }

    #[test]
    fn survival_grad_hess_indicator_vs_dense() {
        let (g1, h1) = survival_grad_hess(2.0, 4.0, 4.0, 3.0, true);
        assert_eq!(g1, 1.5);
        assert!((h1 - 1.5 * (1.0 - 0.5)).abs() < 1e-12);

        let (g2, h2) = survival_grad_hess(2.0, 4.0, 4.0, 3.0, false);
        assert_eq!(g2, 1.5);
        assert!((h2 - 3.0 * (1.0 - 0.25)).abs() < 1e-12);
    }
}
