use num::complex::Complex64;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Everything else is recovered inside the engine and shows up
/// in the diagnostics of the returned root set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not decode configuration: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum IntegrationFailure {
    #[error("quadrature did not converge after {subdivisions} subdivisions (error {error:.2e})")]
    NotConverged { subdivisions: usize, error: f64 },

    #[error("singular integrand near {z}")]
    Singular { z: Complex64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RefinementFailure {
    #[error("iteration diverged at {z}")]
    Diverged { z: Complex64 },

    #[error("no convergence within {iterations} iterations (last step {step:.2e})")]
    IterationBudget { iterations: usize, step: f64 },

    #[error("iteration left the region at {z}")]
    LeftRegion { z: Complex64 },

    #[error("{z} is not a root of the function")]
    Validation { z: Complex64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnresolvedReason {
    #[error("maximum subdivision depth reached")]
    DepthExceeded,

    #[error("integration failed at maximum depth: {0}")]
    IntegrationFailure(IntegrationFailure),

    #[error("refinement failed after retry: {0}")]
    RefinementFailure(RefinementFailure),

    #[error("region cannot be subdivided")]
    CannotSubdivide,

    #[error("iteration or time budget exhausted")]
    BudgetExhausted,
}
