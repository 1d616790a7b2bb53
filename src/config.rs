//! Façade configuration record (spec.md §6). Every field documents the
//! default the façade applies when the caller omits it.

use crate::convergence::ConvergenceType;

/// Mirrors the CLI's `model` switch (spec.md §6). `facade::run` is generic
/// over the kernel type instead of dispatching on this at runtime (the
/// "generics/traits" option spec.md §9 allows); a CLI wrapper would use
/// this field to pick which `K` to monomorphize `run` with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelName {
    Sccs,
    Clr,
    Lr,
    Ls,
    Pr,
    Cox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorKind {
    None,
    Laplace,
    Normal,
}

/// Logger verbosity, mapped onto `tracing::Level` by the façade
/// (spec.md §6 `noiseLevel`, §4.9 ambient-stack logging requirement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseLevel {
    Silent,
    #[default]
    Quiet,
    Noisy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldLevel {
    Subject,
    Entry,
}

#[derive(Debug, Clone)]
pub struct FitConfig {
    pub model: ModelName,

    pub hyperprior: f64,
    pub prior_kind: PriorKind,
    pub compute_mle: bool,
    pub fit_mle_at_mode: bool,
    pub flat_prior: Vec<String>,
    pub profile_ci: Vec<String>,

    pub tolerance: f64,
    pub max_iterations: usize,
    pub convergence_type: ConvergenceType,

    pub seed: u64,

    pub do_cross_validation: bool,
    pub use_auto_search_cv: bool,
    pub lower: f64,
    pub upper: f64,
    pub fold: usize,
    pub fold_level: FoldLevel,
    pub grid_size: usize,

    pub do_bootstrap: bool,
    pub replicates: usize,
    pub report_raw_estimates: bool,

    pub use_hierarchy: bool,
    pub class_hierarchy_variance: f64,

    pub noise_level: NoiseLevel,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            model: ModelName::Lr,
            hyperprior: 1.0,
            prior_kind: PriorKind::Normal,
            compute_mle: false,
            fit_mle_at_mode: false,
            flat_prior: Vec::new(),
            profile_ci: Vec::new(),
            tolerance: 1e-6,
            max_iterations: 100,
            convergence_type: ConvergenceType::Gradient,
            seed: 0,
            do_cross_validation: false,
            use_auto_search_cv: false,
            lower: 0.01,
            upper: 20.0,
            fold: 10,
            fold_level: FoldLevel::Subject,
            grid_size: 10,
            do_bootstrap: false,
            replicates: 100,
            report_raw_estimates: false,
            use_hierarchy: false,
            class_hierarchy_variance: 10.0,
            noise_level: NoiseLevel::Quiet,
        }
    }
}
