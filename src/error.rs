use thiserror::Error;

/// Error type for the CCD/GLM fitting core.
#[derive(Error, Debug)]
pub enum GlmError {
    /// Invalid configuration supplied to the façade or a driver: unknown
    /// model/convergence name, an inverted hyperprior range, MLE-at-mode
    /// requested without a prior-first fit, etc.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Problem with the supplied data: a column name that doesn't resolve,
    /// a required vector (stratum ids, offsets) missing for the selected
    /// model, or a shape mismatch between y/X/pid/weights.
    #[error("Data error: {0}")]
    Data(String),

    /// Numeric failure during fitting: non-finite log-likelihood, or a
    /// condition that the caller asked to treat as fatal rather than
    /// skip-and-continue.
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// Dimension mismatch between two array-like inputs.
    #[error("Dimension mismatch: {0}")]
    ShapeMismatch(String),

    /// Reserved for the loader/writer external contract (spec.md §1,
    /// §7 "I/O"); this crate implements neither, but callers that wrap
    /// this core with file I/O surface failures through this variant.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GlmError>;
