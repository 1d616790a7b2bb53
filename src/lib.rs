pub mod bootstrap;
pub mod ccd;
pub mod config;
pub mod convergence;
pub mod cv;
pub mod error;
pub mod facade;
pub mod matrix;
pub mod model;
pub mod priors;
pub mod profile;

pub use bootstrap::{BootstrapDriver, BootstrapResult, CoefficientSummary};
pub use ccd::{Ccd, UpdateFlag};
pub use config::{FitConfig, FoldLevel, ModelName, NoiseLevel, PriorKind};
pub use convergence::ConvergenceType;
pub use cv::{CvDriver, CvGridPoint, CvResult};
pub use error::{GlmError, Result};
pub use facade::{run, FitReport};
pub use matrix::{Column, ColumnFormat, DesignMatrix};
pub use model::{
    BreslowTiedCoxProportionalHazards, ConditionalLogisticRegression, CoxProportionalHazards,
    LeastSquares, LogisticRegression, ModelKernel, PoissonRegression, SelfControlledCaseSeries,
    StratifiedCoxProportionalHazards, TiedConditionalLogisticRegression,
};
pub use priors::{FullyExchangeable, Hierarchical, JointPrior, LaplacePrior, Mixture, NoPrior, NormalPrior, SinglePrior};
pub use profile::{profile_interval, zeroin, ProfileInterval};
