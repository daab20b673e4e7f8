use num::complex::Complex64;

use crate::config::Config;
use crate::contour::Contour;
use crate::error::IntegrationFailure;
use crate::function::AnalyticFunction;
use crate::integrate::integrate;

/// Outcome of the argument principle on one contour.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RootCount {
    /// Rounded count. Only meaningful when `trustworthy` is set.
    pub count: usize,
    pub integral: Complex64,
    pub error: f64,
    pub trustworthy: bool,
    pub failure: Option<IntegrationFailure>,
    pub evaluations: usize,
}

impl RootCount {
    /// The count, if it may be relied on.
    pub fn trusted(&self) -> Option<usize> {
        self.trustworthy.then_some(self.count)
    }

    fn failed(failure: IntegrationFailure) -> Self {
        Self {
            count: 0,
            integral: Complex64::new(f64::NAN, f64::NAN),
            error: f64::INFINITY,
            trustworthy: false,
            failure: Some(failure),
            evaluations: 0,
        }
    }

    pub fn is_singular(&self) -> bool {
        matches!(self.failure, Some(IntegrationFailure::Singular { .. }))
    }
}

/// Counts the zeros of `function` inside `contour` with the argument
/// principle. Integration failures give an untrustworthy count.
pub fn count_roots(contour: &Contour, function: &AnalyticFunction, config: &Config) -> RootCount {
    let integral = match integrate(contour, function, 0, config) {
        Ok(integral) => integral,
        Err(failure) => {
            log::debug!("Counting in {contour} failed: {failure}");
            return RootCount::failed(failure);
        }
    };

    let value = integral.values[0];
    let rounded = value.re.round();
    let trustworthy = (value.re - rounded).abs() < config.integer_tolerance
        && value.im.abs() < config.integer_tolerance
        && integral.error < config.integer_tolerance
        && rounded >= 0.0;

    if !trustworthy {
        log::debug!(
            "Untrustworthy count in {contour}: integral {value:.6}, error {:.2e}",
            integral.error
        );
    }

    RootCount {
        count: rounded.max(0.0) as usize,
        integral: value,
        error: integral.error,
        trustworthy,
        failure: None,
        evaluations: integral.evaluations,
    }
}
