use std::fmt;
use std::sync::Arc;

use num::complex::Complex64;

use crate::config::Config;
use crate::error::{Error, Result};

pub type ComplexFn = Arc<dyn Fn(Complex64) -> Complex64 + Send + Sync>;

/// The analytic function whose roots are sought.
///
/// Whether a derivative is known is part of the handle: counting always
/// needs `f'/f` (finite differences stand in when it is missing) and the
/// refiner picks Newton or Muller iterations from the variant.
#[derive(Clone)]
pub enum AnalyticFunction {
    WithDerivative { f: ComplexFn, df: ComplexFn },
    DerivativeFree { f: ComplexFn },
}

impl fmt::Debug for AnalyticFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithDerivative { .. } => write!(f, "AnalyticFunction::WithDerivative"),
            Self::DerivativeFree { .. } => write!(f, "AnalyticFunction::DerivativeFree"),
        }
    }
}

impl AnalyticFunction {
    pub fn new(f: impl Fn(Complex64) -> Complex64 + Send + Sync + 'static) -> Self {
        Self::DerivativeFree { f: Arc::new(f) }
    }

    pub fn with_derivative(
        f: impl Fn(Complex64) -> Complex64 + Send + Sync + 'static,
        df: impl Fn(Complex64) -> Complex64 + Send + Sync + 'static,
    ) -> Self {
        Self::WithDerivative {
            f: Arc::new(f),
            df: Arc::new(df),
        }
    }

    pub fn has_derivative(&self) -> bool {
        matches!(self, Self::WithDerivative { .. })
    }

    /// Fails when the derivative would be needed but may not be approximated.
    pub fn check(&self, config: &Config) -> Result<()> {
        if !self.has_derivative() && !config.numerical_derivative {
            return Err(Error::InvalidConfig(
                "no derivative given and numerical_derivative is disabled".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn eval(&self, z: Complex64) -> Complex64 {
        match self {
            Self::WithDerivative { f, .. } | Self::DerivativeFree { f } => f(z),
        }
    }

    pub fn derivative(&self, z: Complex64, config: &Config) -> Complex64 {
        match self {
            Self::WithDerivative { df, .. } => df(z),
            Self::DerivativeFree { f } => central_difference(f.as_ref(), z, config.derivative_step),
        }
    }

    /// `f(z)` and `f'(z)` together.
    pub fn eval_with_derivative(&self, z: Complex64, config: &Config) -> (Complex64, Complex64) {
        (self.eval(z), self.derivative(z, config))
    }
}

/// Fourth order five point stencil along the real direction, which is
/// enough for an analytic function.
pub fn central_difference(f: &dyn Fn(Complex64) -> Complex64, z: Complex64, step: f64) -> Complex64 {
    let h = step * z.norm().max(1.0);
    let f1 = f(z + h) - f(z - h);
    let f2 = f(z + 2.0 * h) - f(z - 2.0 * h);
    (8.0 * f1 - f2) / (12.0 * h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_difference_matches_exact_derivative() {
        let config = Config::default();
        let exact = AnalyticFunction::with_derivative(|z| z.exp() * z, |z| z.exp() * (z + 1.0));
        let approx = AnalyticFunction::new(|z| z.exp() * z);

        for z in [
            Complex64::new(0.3, -0.2),
            Complex64::new(-2.0, 1.5),
            Complex64::new(4.0, 0.0),
        ] {
            let d = exact.derivative(z, &config) - approx.derivative(z, &config);
            assert!(d.norm() < 1e-9 * exact.derivative(z, &config).norm().max(1.0));
        }
    }

    #[test]
    fn missing_derivative_needs_numerical_differentiation() {
        let f = AnalyticFunction::new(|z| z);
        let config = Config {
            numerical_derivative: false,
            ..Default::default()
        };
        assert!(f.check(&config).is_err());
        assert!(f.check(&Config::default()).is_ok());
        assert!(AnalyticFunction::with_derivative(|z| z, |_| Complex64::new(1.0, 0.0))
            .check(&config)
            .is_ok());
    }
}
