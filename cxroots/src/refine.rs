use std::f64::consts::{FRAC_PI_4, TAU};

use num::complex::Complex64;

use crate::config::Config;
use crate::contour::Contour;
use crate::count::count_roots;
use crate::error::RefinementFailure;
use crate::function::{central_difference, AnalyticFunction};
use crate::integrate::integrate;
use crate::solve::{self, Convergence};

const ABERTH_ITERATIONS: usize = 500;

/// A refined root.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Root {
    pub root: Complex64,
    pub multiplicity: usize,
    /// Bound on `|root - exact root|` estimated from the last iterations.
    pub error: f64,
    /// `|f(root)|`
    pub residual: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    Roots(Vec<Root>),
    /// The roots could not be separated inside this contour; splitting it
    /// further is always safe.
    Subdivide,
}

/// Converges the `expected` roots (counted with multiplicity) inside
/// `contour`.
pub fn refine(
    contour: &Contour,
    expected: usize,
    function: &AnalyticFunction,
    config: &Config,
) -> Result<Refinement, RefinementFailure> {
    if expected == 0 {
        return Ok(Refinement::Roots(vec![]));
    }

    let integral = match integrate(contour, function, expected, config) {
        Ok(integral) => integral,
        Err(failure) => {
            log::debug!("Moments in {contour} failed: {failure}");
            return Ok(Refinement::Subdivide);
        }
    };
    let sums = integral.values;
    if (sums[0] - expected as f64).norm() >= config.integer_tolerance {
        log::debug!(
            "Moment count {} in {contour} disagrees with {expected}",
            sums[0]
        );
        return Ok(Refinement::Subdivide);
    }

    let center = contour.center();
    let scale = contour.size();
    let mean = sums[1] / sums[0];

    if expected == 1 {
        let start = center + mean * scale;
        let convergence = local_solve(function, start, 1, contour, config)?;
        let root = validate(function, &convergence, 1, contour, config)?;
        log::debug!("Refined {} in {contour}", root.root);
        return Ok(Refinement::Roots(vec![root]));
    }

    if let Some(root) = coincident_root(&sums, expected, function, contour, config) {
        log::debug!(
            "Found {} with multiplicity {expected} in {contour}",
            root.root
        );
        return Ok(Refinement::Roots(vec![root]));
    }

    if config.moment_method {
        if let Some(roots) = moment_roots(&sums, function, contour, config) {
            log::debug!("Moment method found {} roots in {contour}", roots.len());
            return Ok(Refinement::Roots(roots));
        }
        log::debug!("Moment system in {contour} is ill-conditioned");
    }

    Ok(Refinement::Subdivide)
}

/// Newton's method when `f'` is known. Without it, Muller's method for
/// simple roots and Newton on a finite difference derivative for multiple
/// ones, where Muller loses its order.
fn local_solve(
    function: &AnalyticFunction,
    start: Complex64,
    multiplicity: usize,
    contour: &Contour,
    config: &Config,
) -> Result<Convergence, RefinementFailure> {
    let convergence = match function {
        AnalyticFunction::WithDerivative { f, df } => solve::newton(
            f.as_ref(),
            df.as_ref(),
            start,
            multiplicity,
            config.root_tolerance,
            config.max_iterations,
        )?,
        AnalyticFunction::DerivativeFree { f } if multiplicity == 1 => solve::muller(
            f.as_ref(),
            start,
            1e-2 * contour.size(),
            config.root_tolerance,
            config.max_iterations,
        )?,
        AnalyticFunction::DerivativeFree { f } => solve::newton(
            f.as_ref(),
            |z| central_difference(f.as_ref(), z, config.derivative_step),
            start,
            multiplicity,
            config.root_tolerance,
            config.max_iterations,
        )?,
    };

    if !contour.contains(convergence.root) {
        return Err(RefinementFailure::LeftRegion {
            z: convergence.root,
        });
    }
    Ok(convergence)
}

/// A root is accepted when `|f|` there is no larger than on a small ring
/// around it.
fn validate(
    function: &AnalyticFunction,
    convergence: &Convergence,
    multiplicity: usize,
    contour: &Contour,
    config: &Config,
) -> Result<Root, RefinementFailure> {
    let z = convergence.root;
    let residual = function.eval(z).norm();
    let radius = (100.0 * convergence.error).max(1e-6 * contour.size());

    let is_root = residual.is_finite()
        && (0..4).all(|k| {
            let point = z + Complex64::from_polar(radius, FRAC_PI_4 + k as f64 * TAU / 4.0);
            function.eval(point).norm() >= residual
        });
    if !is_root {
        return Err(RefinementFailure::Validation { z });
    }

    Ok(Root {
        root: z,
        multiplicity: if config.refine_multiplicity {
            multiplicity
        } else {
            1
        },
        error: convergence.error,
        residual,
    })
}

/// `(1/n) sum_i (w_i - mean)^k` from the power sums.
fn centered_moment(sums: &[Complex64], mean: Complex64, k: usize) -> Complex64 {
    let mut binomial = 1.0;
    let mut total = Complex64::new(0.0, 0.0);
    for j in 0..=k {
        total += sums[j] * (-mean).powu((k - j) as u32) * binomial;
        binomial *= (k - j) as f64 / (j + 1) as f64;
    }
    total / sums[0]
}

/// All roots in the contour coincide: the centered moments vanish and the
/// multiplicity aware solver reaches the same point from `n` distinct
/// starting offsets.
fn coincident_root(
    sums: &[Complex64],
    n: usize,
    function: &AnalyticFunction,
    contour: &Contour,
    config: &Config,
) -> Option<Root> {
    let mean = sums[1] / sums[0];
    let spread = (2..=n)
        .map(|k| centered_moment(sums, mean, k).norm())
        .fold(0.0, f64::max);
    if spread >= config.coincidence_tolerance {
        return None;
    }

    let scale = contour.size();
    let estimate = contour.center() + mean * scale;
    let offset = 0.05 * scale;
    let runs = (0..n)
        .map(|k| {
            let start = estimate + Complex64::from_polar(offset, 0.3 + TAU * k as f64 / n as f64);
            local_solve(function, start, n, contour, config)
        })
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    let (best, spread) = confirm(&runs, n, function, contour, config)?;
    let root = validate(function, &best, n, contour, config).ok()?;
    Some(Root {
        error: root.error.max(spread),
        ..root
    })
}

/// The most accurate of several runs, provided they all ended within
/// `distance` of each other, and their spread.
fn agree(runs: &[Convergence], distance: f64) -> Option<(Convergence, f64)> {
    let best = runs
        .iter()
        .min_by(|a, b| a.error.total_cmp(&b.error))?
        .clone();
    let spread = runs
        .iter()
        .map(|run| (run.root - best.root).norm())
        .fold(0.0, f64::max);
    (spread < distance).then_some((best, spread))
}

/// Runs towards a root of multiplicity `m` must end within
/// `root_tolerance^(1/m)` (scaled) of each other, and for `m > 1` a circle of
/// that radius around the best run must hold exactly `m` zeros. Close simple
/// roots fail one of the two tests.
fn confirm(
    runs: &[Convergence],
    multiplicity: usize,
    function: &AnalyticFunction,
    contour: &Contour,
    config: &Config,
) -> Option<(Convergence, f64)> {
    let radius = config.root_tolerance.powf(1.0 / multiplicity as f64) * contour.size();
    let Some((best, spread)) = agree(runs, radius) else {
        log::debug!("Runs for a root of multiplicity {multiplicity} in {contour} disagree");
        return None;
    };
    if multiplicity > 1 {
        let circle = Contour::circle(best.root, radius).ok()?;
        let count = count_roots(&circle, function, config);
        if count.trusted() != Some(multiplicity) {
            log::debug!(
                "{} is not a root of multiplicity {multiplicity}: {:?} zeros within {radius:.2e}",
                best.root,
                count.trusted()
            );
            return None;
        }
    }
    Some((best, spread))
}

/// Several roots at once: Newton's identities turn the power sums into a
/// polynomial whose roots approximate the zeros of `f`, multiplicities come
/// from the Vandermonde system, and every root is polished against `f`.
fn moment_roots(
    sums: &[Complex64],
    function: &AnalyticFunction,
    contour: &Contour,
    config: &Config,
) -> Option<Vec<Root>> {
    let n = sums.len() - 1;
    let center = contour.center();
    let scale = contour.size();

    let coeffs = solve::polynomial_from_power_sums(&sums[1..]);
    let approximations = solve::aberth(&coeffs, ABERTH_ITERATIONS)?;
    if approximations.iter().any(|w| w.norm() > 2.0) {
        return None;
    }

    let mut clusters: Vec<Vec<Complex64>> = vec![];
    for w in approximations {
        match clusters
            .iter_mut()
            .find(|cluster| (cluster[0] - w).norm() < config.cluster_tolerance)
        {
            Some(cluster) => cluster.push(w),
            None => clusters.push(vec![w]),
        }
    }

    let points = clusters
        .iter()
        .map(|cluster| cluster.iter().sum::<Complex64>() / cluster.len() as f64)
        .collect::<Vec<_>>();
    let weights = solve::vandermonde_weights(&points, sums)?;

    let mut multiplicities = vec![];
    for weight in &weights {
        let rounded = weight.re.round();
        if (weight.re - rounded).abs() >= config.integer_tolerance
            || weight.im.abs() >= config.integer_tolerance
            || rounded < 1.0
        {
            log::debug!("Non-integer multiplicities {weights:?}");
            return None;
        }
        multiplicities.push(rounded as usize);
    }
    if multiplicities.iter().sum::<usize>() != n {
        return None;
    }

    let mut roots: Vec<Root> = vec![];
    for (cluster, &multiplicity) in clusters.iter().zip(&multiplicities) {
        let runs = cluster
            .iter()
            .map(|w| local_solve(function, center + w * scale, multiplicity, contour, config))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        let (best, spread) = confirm(&runs, multiplicity, function, contour, config)?;
        let root = validate(function, &best, multiplicity, contour, config).ok()?;

        // Distinct clusters polishing onto one root means the multiplicities
        // were guessed wrong.
        if roots
            .iter()
            .any(|other| (other.root - root.root).norm() < config.cluster_tolerance * scale)
        {
            return None;
        }
        roots.push(Root {
            error: root.error.max(spread),
            ..root
        });
    }
    Some(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn refines_a_single_root_with_and_without_derivative() {
        let config = Config::default();
        let rect = Contour::rectangle((0.5, 1.5), (-0.5, 0.5)).unwrap();
        let functions = [
            AnalyticFunction::with_derivative(|z| z * z * z - 1.0, |z| z * z * 3.0),
            AnalyticFunction::new(|z| z * z * z - 1.0),
        ];
        for f in functions {
            let Ok(Refinement::Roots(roots)) = refine(&rect, 1, &f, &config) else {
                panic!("no roots for {f:?}");
            };
            assert_eq!(roots.len(), 1);
            assert!((roots[0].root - 1.0).norm() < 1e-12);
            assert_eq!(roots[0].multiplicity, 1);
        }
    }

    #[test]
    fn detects_a_double_root() {
        let config = Config::default();
        let circle = Contour::circle(c(1.0, 0.0), 0.5).unwrap();
        let f = AnalyticFunction::with_derivative(|z| (z - 1.0) * (z - 1.0), |z| (z - 1.0) * 2.0);
        let Ok(Refinement::Roots(roots)) = refine(&circle, 2, &f, &config) else {
            panic!("double root not refined");
        };
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].multiplicity, 2);
        assert!((roots[0].root - 1.0).norm() < 1e-8);
    }

    #[test]
    fn simple_multiplicities_when_disabled() {
        let config = Config {
            refine_multiplicity: false,
            ..Default::default()
        };
        let circle = Contour::circle(c(1.0, 0.0), 0.5).unwrap();
        let f = AnalyticFunction::new(|z| (z - 1.0) * (z - 1.0));
        let Ok(Refinement::Roots(roots)) = refine(&circle, 2, &f, &config) else {
            panic!("double root not refined");
        };
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].multiplicity, 1);
    }

    #[test]
    fn moment_method_separates_several_roots() {
        let config = Config::default();
        let circle = Contour::circle(c(0.0, 0.0), 2.0).unwrap();
        let f = AnalyticFunction::with_derivative(|z| z * z * z - 1.0, |z| z * z * 3.0);
        let Ok(Refinement::Roots(mut roots)) = refine(&circle, 3, &f, &config) else {
            panic!("cube roots not refined");
        };
        roots.sort_by(|a, b| a.root.im.total_cmp(&b.root.im));
        let expected = [
            Complex64::from_polar(1.0, -TAU / 3.0),
            c(1.0, 0.0),
            Complex64::from_polar(1.0, TAU / 3.0),
        ];
        for (root, expected) in roots.iter().zip(expected) {
            assert!((root.root - expected).norm() < 1e-10);
            assert_eq!(root.multiplicity, 1);
        }
    }

    #[test]
    fn mixed_multiplicities_from_moments() {
        let config = Config::default();
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        let f = AnalyticFunction::with_derivative(
            |z| z * z * (z - 0.5),
            |z| z * z * 3.0 - z,
        );
        let Ok(Refinement::Roots(mut roots)) = refine(&circle, 3, &f, &config) else {
            panic!("roots not refined");
        };
        roots.sort_by(|a, b| a.root.re.total_cmp(&b.root.re));
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].multiplicity, 2);
        assert!(roots[0].root.norm() < 1e-6);
        assert_eq!(roots[1].multiplicity, 1);
        assert!((roots[1].root - 0.5).norm() < 1e-12);
    }

    #[test]
    fn close_simple_roots_are_not_a_double_root() {
        let config = Config::default();
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        for d in [3e-4, 1e-5] {
            let f = move |z: Complex64| (z - 0.5) * (z - 0.5 - d);
            let df = move |z: Complex64| (z - 0.5) * 2.0 - d;
            for function in [AnalyticFunction::with_derivative(f, df), AnalyticFunction::new(f)] {
                assert_eq!(
                    refine(&circle, 2, &function, &config),
                    Ok(Refinement::Subdivide),
                    "d = {d}, {function:?}"
                );
            }
        }
    }

    #[test]
    fn confirm_requires_an_isolated_multiple_root() {
        let config = Config::default();
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        let run = |re: f64| Convergence {
            root: c(re, 0.0),
            iterations: 3,
            error: 1e-9,
            residuals: vec![],
        };

        let double = AnalyticFunction::new(|z| (z - 0.5) * (z - 0.5));
        let (best, _) = confirm(&[run(0.5), run(0.5 + 1e-9)], 2, &double, &circle, &config).unwrap();
        assert_eq!(best.root, c(0.5, 0.0));

        // runs a pair apart
        let pair = AnalyticFunction::new(|z| (z - 0.5) * (z - 0.5004));
        assert!(confirm(&[run(0.5), run(0.5004)], 2, &pair, &circle, &config).is_none());
        // both runs on one root of the pair
        assert!(confirm(&[run(0.5), run(0.5 + 1e-9)], 2, &pair, &circle, &config).is_none());
    }

    #[test]
    fn without_moment_method_several_roots_need_splitting() {
        let config = Config {
            moment_method: false,
            ..Default::default()
        };
        let circle = Contour::circle(c(0.0, 0.0), 2.0).unwrap();
        let f = AnalyticFunction::with_derivative(|z| z * z * z - 1.0, |z| z * z * 3.0);
        assert_eq!(refine(&circle, 3, &f, &config), Ok(Refinement::Subdivide));
    }
}
