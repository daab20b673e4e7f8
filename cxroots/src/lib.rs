#![warn(clippy::all, rust_2018_idioms)]

//! Roots of analytic functions inside a region of the complex plane.
//!
//! The number of roots in a region is counted with the argument principle.
//! Regions holding too many roots, or whose count cannot be trusted, are
//! subdivided, and the roots of the remaining small regions are converged
//! from the moments of `f'/f` without any initial guesses.
//!
//! ```no_run
//! use cxroots::{find_roots, AnalyticFunction, Config, Contour};
//! use num::complex::Complex64;
//!
//! let f = AnalyticFunction::with_derivative(|z| z * z * z - 1.0, |z| z * z * 3.0);
//! let region = Contour::circle(Complex64::new(0.0, 0.0), 2.0)?;
//! let roots = find_roots(&region, &f, &Config::default())?;
//! assert_eq!(roots.diagnostics.total, 3);
//! # Ok::<(), cxroots::Error>(())
//! ```

mod aggregate;
mod config;
pub mod contour;
mod count;
mod error;
mod function;
mod integrate;
mod refine;
mod scheduler;
pub mod solve;

pub use aggregate::{Diagnostics, RootSet};
pub use config::Config;
pub use contour::{Contour, ParametricCurve, Segment, SPLIT_RATIOS};
pub use count::{count_roots, RootCount};
pub use error::{Error, IntegrationFailure, RefinementFailure, Result, UnresolvedReason};
pub use function::{central_difference, AnalyticFunction};
pub use integrate::{integrate, Integral};
pub use refine::{Refinement, Root};
pub use scheduler::UnresolvedRegion;

/// The root finding engine for one function and configuration.
#[derive(Debug, Clone)]
pub struct RootFinder {
    function: AnalyticFunction,
    config: Config,
}

impl RootFinder {
    pub fn new(function: AnalyticFunction, config: Config) -> Result<Self> {
        config.validate()?;
        function.check(&config)?;
        Ok(Self { function, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn function(&self) -> &AnalyticFunction {
        &self.function
    }

    pub fn count_roots(&self, contour: &Contour) -> RootCount {
        count::count_roots(contour, &self.function, &self.config)
    }

    /// Converges the `expected` roots inside `contour` directly, without
    /// subdividing it.
    pub fn refine(
        &self,
        contour: &Contour,
        expected: usize,
    ) -> std::result::Result<Refinement, RefinementFailure> {
        refine::refine(contour, expected, &self.function, &self.config)
    }

    pub fn find_roots(&self, region: &Contour) -> Result<RootSet> {
        region.validate()?;
        let outcome = scheduler::Scheduler::new(&self.function, &self.config).run(region)?;
        Ok(aggregate::aggregate(outcome, &self.config))
    }
}

/// Finds every root of `function` inside `region`.
pub fn find_roots(region: &Contour, function: &AnalyticFunction, config: &Config) -> Result<RootSet> {
    RootFinder::new(function.clone(), config.clone())?.find_roots(region)
}
