use std::time::Duration;

use crate::error::{Error, Result};

/// Tolerances and budgets shared by every stage of the root finder.
///
/// The configuration is immutable once handed to the engine and is passed
/// by reference to every component.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute and relative tolerance of the contour quadrature.
    pub integration_tolerance: f64,
    /// Interval splits allowed per boundary segment before the quadrature gives up.
    pub max_quadrature_subdivisions: usize,
    /// How close an argument principle integral must be to an integer to be trusted.
    /// Also used when rounding multiplicities.
    pub integer_tolerance: f64,
    /// Relative step size at which the local solvers stop.
    pub root_tolerance: f64,
    pub max_iterations: usize,
    pub max_subdivision_depth: usize,
    /// Regions with more roots than this are split before refinement.
    pub max_roots_per_leaf: usize,
    pub refine_multiplicity: bool,
    /// Derive `f'` with finite differences when no derivative is given.
    pub numerical_derivative: bool,
    pub derivative_step: f64,
    /// Extract several roots at once from moment integrals.
    pub moment_method: bool,
    /// Scaled spread of the moments below which all roots of a region are
    /// taken to coincide.
    pub coincidence_tolerance: f64,
    /// Scaled distance below which polynomial root approximations are merged.
    pub cluster_tolerance: f64,
    /// Distance below which two refined roots are the same root.
    pub duplicate_tolerance: f64,
    pub parallel: bool,
    pub max_integrations: Option<usize>,
    pub time_limit: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            integration_tolerance: 1e-10,
            max_quadrature_subdivisions: 200,
            integer_tolerance: 0.1,
            root_tolerance: 1e-12,
            max_iterations: 100,
            max_subdivision_depth: 30,
            max_roots_per_leaf: 5,
            refine_multiplicity: true,
            numerical_derivative: true,
            derivative_step: 1e-3,
            moment_method: true,
            coincidence_tolerance: 1e-6,
            cluster_tolerance: 1e-3,
            duplicate_tolerance: 1e-8,
            parallel: false,
            max_integrations: None,
            time_limit: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        }

        positive("integration_tolerance", self.integration_tolerance)?;
        positive("root_tolerance", self.root_tolerance)?;
        positive("derivative_step", self.derivative_step)?;
        positive("coincidence_tolerance", self.coincidence_tolerance)?;
        positive("cluster_tolerance", self.cluster_tolerance)?;
        positive("duplicate_tolerance", self.duplicate_tolerance)?;

        if !(self.integer_tolerance > 0.0 && self.integer_tolerance < 0.5) {
            return Err(Error::InvalidConfig(format!(
                "integer_tolerance must lie in (0, 0.5), got {}",
                self.integer_tolerance
            )));
        }
        if self.max_roots_per_leaf == 0 {
            return Err(Error::InvalidConfig(
                "max_roots_per_leaf must be at least 1".to_owned(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be at least 1".to_owned(),
            ));
        }
        if self.max_quadrature_subdivisions == 0 {
            return Err(Error::InvalidConfig(
                "max_quadrature_subdivisions must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Reads a configuration written either as RON or as JSON.
    pub fn from_str_any(input: &str) -> Result<Self> {
        let input = input.trim();

        let config: Self = match ron::from_str(input) {
            Ok(config) => config,
            Err(ron_err) => {
                log::info!("Could not decode RON ({ron_err}), trying JSON");
                serde_json::from_str(input).map_err(|json_err| {
                    Error::Decode(format!("not RON ({ron_err}) and not JSON ({json_err})"))
                })?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::to_string(self).map_err(|err| Error::Decode(format!("cannot write RON: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_tolerances() {
        let config = Config {
            integer_tolerance: 0.7,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            root_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_roots_per_leaf: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn decodes_ron_and_json() {
        let config = Config {
            max_roots_per_leaf: 2,
            parallel: true,
            ..Default::default()
        };
        let ron = config.to_ron().unwrap();
        assert!(ron.contains("max_roots_per_leaf:2"), "{ron}");
        assert_eq!(Config::from_str_any(&ron).unwrap(), config);

        let json = r#"{ "max_roots_per_leaf": 3, "refine_multiplicity": false }"#;
        let decoded = Config::from_str_any(json).unwrap();
        assert_eq!(decoded.max_roots_per_leaf, 3);
        assert!(!decoded.refine_multiplicity);
        assert_eq!(decoded.root_tolerance, Config::default().root_tolerance);

        assert!(matches!(
            Config::from_str_any("not a config"),
            Err(Error::Decode(_))
        ));
    }
}
