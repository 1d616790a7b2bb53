//! Façade (spec.md §2 item 7, §4.8): assembles the matrix, kernel, priors,
//! and drivers from a `FitConfig` and orchestrates one run: fit → (cv) →
//! (bootstrap) → (profile) → report. Accepts already-built in-memory
//! inputs; it does not read files (spec.md §1's scope note).

use crate::bootstrap::{BootstrapDriver, BootstrapResult};
use crate::ccd::{Ccd, UpdateFlag};
use crate::config::FitConfig;
use crate::cv::{CvDriver, CvResult};
use crate::error::{GlmError, Result};
use crate::matrix::DesignMatrix;
use crate::model::ModelKernel;
use crate::priors::{make_single, Mixture, NoPrior};
use crate::profile::{profile_interval, ProfileInterval};

pub struct FitReport {
    pub coefficients: Vec<(String, f64)>,
    pub flag: UpdateFlag,
    pub log_likelihood: f64,
    pub cv: Option<CvResult>,
    pub bootstrap: Option<BootstrapResult>,
    pub profile: Vec<(String, ProfileInterval)>,
}

fn validate(cfg: &FitConfig) -> Result<()> {
    if cfg.lower > cfg.upper {
        return Err(GlmError::Configuration("lower bound exceeds upper bound".into()));
    }
    if cfg.fit_mle_at_mode && !cfg.compute_mle && !cfg.do_cross_validation {
        return Err(GlmError::Configuration(
            "fitMLEAtMode requires a prior-first fit: set computeMLE or doCrossValidation".into(),
        ));
    }
    if cfg.use_hierarchy {
        return Err(GlmError::Configuration(
            "hierarchical priors require externally supplied hierarchy data, which this crate does not load".into(),
        ));
    }
    Ok(())
}

/// Builds the per-covariate prior: homogeneous by default, with any
/// `flatPrior` column switched to `NoPrior` (spec.md §6 `flatPrior`).
fn build_prior(matrix: &DesignMatrix, cfg: &FitConfig) -> Result<Mixture> {
    let mut priors: Vec<Box<dyn crate::priors::SinglePrior>> =
        (0..matrix.n_cols()).map(|_| make_single(cfg.prior_kind, cfg.hyperprior)).collect();
    for name in &cfg.flat_prior {
        let j = matrix
            .lookup(name)
            .ok_or_else(|| GlmError::Data(format!("flatPrior column '{}' not found", name)))?;
        priors[j] = Box::new(NoPrior);
    }
    Ok(Mixture::new(priors))
}

pub fn run<'a, K: ModelKernel + Default>(
    matrix: &'a DesignMatrix,
    y: Vec<f64>,
    pid: Vec<i64>,
    offs: Option<Vec<f64>>,
    time: Option<Vec<f64>>,
    cfg: &FitConfig,
) -> Result<FitReport> {
    validate(cfg)?;

    let ccd = Ccd::<K>::with_strata(matrix, y.clone(), pid.clone(), offs.clone())?;
    let mut ccd = match &time {
        Some(t) => ccd.with_time(t.clone())?,
        None => ccd,
    };
    ccd.set_prior(Box::new(build_prior(matrix, cfg)?));
    let mut flag = ccd.update(cfg.max_iterations, cfg.convergence_type, cfg.tolerance)?;

    let cv_result = if cfg.do_cross_validation {
        let mut driver = CvDriver::<K>::new(matrix, y.clone(), pid.clone(), offs.clone());
        if let Some(t) = &time {
            driver = driver.with_time(t.clone());
        }
        let result = if cfg.use_auto_search_cv { driver.auto_search(cfg)? } else { driver.grid_search(cfg)? };
        ccd = driver.reset_for_optimal(&result, cfg)?;
        flag = UpdateFlag::Success;
        Some(result)
    } else {
        None
    };

    if cfg.fit_mle_at_mode && cv_result.is_none() {
        for j in 0..ccd.get_beta_size() {
            if ccd.get_beta(j) == 0.0 {
                ccd.set_fixed_beta(j, true)?;
            }
        }
        ccd.set_prior(Box::new(build_prior(matrix, &FitConfig { prior_kind: crate::config::PriorKind::None, ..cfg.clone() })?));
        flag = ccd.update(cfg.max_iterations, cfg.convergence_type, cfg.tolerance)?;
    }

    let bootstrap_result = if cfg.do_bootstrap {
        let mut driver = BootstrapDriver::<K>::new(matrix, y, pid, offs);
        if let Some(t) = time {
            driver = driver.with_time(t);
        }
        Some(driver.run(cfg)?)
    } else {
        None
    };

    let mut profile = Vec::with_capacity(cfg.profile_ci.len());
    for name in &cfg.profile_ci {
        let j = matrix
            .lookup(name)
            .ok_or_else(|| GlmError::Data(format!("profileCI column '{}' not found", name)))?;
        let interval = profile_interval(&mut ccd, j, cfg.tolerance)?;
        profile.push((name.clone(), interval));
    }

    let coefficients = (0..ccd.get_beta_size()).map(|j| (matrix.name(j).to_string(), ccd.get_beta(j))).collect();
    let log_likelihood = ccd.get_log_likelihood();

    Ok(FitReport { coefficients, flag, log_likelihood, cv: cv_result, bootstrap: bootstrap_result, profile })
}
