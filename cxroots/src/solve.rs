//! Local iterations and the small dense problems of the moment method.

use nalgebra::{DMatrix, DVector};
use num::complex::Complex64;

use crate::error::RefinementFailure;

#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub root: Complex64,
    pub iterations: usize,
    /// Size of the last step, an upper bound for the remaining error.
    pub error: f64,
    /// `|f|` at every iterate before its step.
    pub residuals: Vec<f64>,
}

/// Stop on a small step, or on a step that stopped shrinking once it is
/// already at the square root of the tolerance (rounding noise around a
/// multiple root). A stalled step must still lower `|f|`.
fn converged(
    step: f64,
    previous: f64,
    residual: f64,
    previous_residual: f64,
    z: Complex64,
    tolerance: f64,
) -> bool {
    let scale = z.norm().max(1.0);
    step <= tolerance * scale
        || (step >= 0.5 * previous
            && step <= tolerance.sqrt() * scale
            && residual < previous_residual)
}

/// Newton's method for a root of known multiplicity `m`: `z -= m f/f'`.
pub fn newton(
    f: impl Fn(Complex64) -> Complex64,
    df: impl Fn(Complex64) -> Complex64,
    start: Complex64,
    multiplicity: usize,
    tolerance: f64,
    max_iterations: usize,
) -> Result<Convergence, RefinementFailure> {
    let mut z = start;
    let mut fz = f(z);
    let mut residuals = vec![];
    let mut previous = f64::INFINITY;

    for iteration in 0..max_iterations {
        residuals.push(fz.norm());
        if fz == Complex64::new(0.0, 0.0) {
            return Ok(Convergence {
                root: z,
                iterations: iteration,
                error: 0.0,
                residuals,
            });
        }

        let dfz = df(z);
        let step = fz / dfz * multiplicity as f64;
        if !step.is_finite() {
            return Err(RefinementFailure::Diverged { z });
        }
        z -= step;
        let last = fz.norm();
        fz = f(z);

        let size = step.norm();
        if converged(size, previous, fz.norm(), last, z, tolerance) {
            return Ok(Convergence {
                root: z,
                iterations: iteration + 1,
                error: size,
                residuals,
            });
        }
        previous = size;
    }

    Err(RefinementFailure::IterationBudget {
        iterations: max_iterations,
        step: previous,
    })
}

/// Muller's method from the three points `start - h`, `start + h`, `start`.
pub fn muller(
    f: impl Fn(Complex64) -> Complex64,
    start: Complex64,
    h: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<Convergence, RefinementFailure> {
    let mut x0 = start - h;
    let mut x1 = start + h;
    let mut x2 = start;
    let (mut f0, mut f1, mut f2) = (f(x0), f(x1), f(x2));
    let mut residuals = vec![];
    let mut previous = f64::INFINITY;

    for iteration in 0..max_iterations {
        residuals.push(f2.norm());
        if f2 == Complex64::new(0.0, 0.0) {
            return Ok(Convergence {
                root: x2,
                iterations: iteration,
                error: 0.0,
                residuals,
            });
        }

        let q = (x2 - x1) / (x1 - x0);
        let a = q * f2 - q * (q + 1.0) * f1 + q * q * f0;
        let b = (q * 2.0 + 1.0) * f2 - (q + 1.0) * (q + 1.0) * f1 + q * q * f0;
        let c = (q + 1.0) * f2;

        let disc = (b * b - a * c * 4.0).sqrt();
        let denominator = if (b + disc).norm() >= (b - disc).norm() {
            b + disc
        } else {
            b - disc
        };
        let step = (x2 - x1) * c * 2.0 / denominator;
        if !step.is_finite() {
            return Err(RefinementFailure::Diverged { z: x2 });
        }

        let x3 = x2 - step;
        x0 = x1;
        x1 = x2;
        x2 = x3;
        f0 = f1;
        f1 = f2;
        f2 = f(x2);

        let size = step.norm();
        if converged(size, previous, f2.norm(), f1.norm(), x2, tolerance) {
            residuals.push(f2.norm());
            return Ok(Convergence {
                root: x2,
                iterations: iteration + 1,
                error: size,
                residuals,
            });
        }
        previous = size;
    }

    Err(RefinementFailure::IterationBudget {
        iterations: max_iterations,
        step: previous,
    })
}

/// Coefficients, highest degree first, of the monic polynomial whose roots
/// have the power sums `sums[k] = sum_i w_i^k`, `k = 1..=n`.
pub fn polynomial_from_power_sums(sums: &[Complex64]) -> Vec<Complex64> {
    let n = sums.len();
    let mut e = vec![Complex64::new(1.0, 0.0)];
    for k in 1..=n {
        let mut acc = Complex64::new(0.0, 0.0);
        for i in 1..=k {
            let term = e[k - i] * sums[i - 1];
            if i % 2 == 1 {
                acc += term;
            } else {
                acc -= term;
            }
        }
        e.push(acc / k as f64);
    }
    e.iter()
        .enumerate()
        .map(|(k, ek)| if k % 2 == 0 { *ek } else { -ek })
        .collect()
}

fn horner(coeffs: &[Complex64], z: Complex64) -> (Complex64, Complex64) {
    let mut p = Complex64::new(0.0, 0.0);
    let mut dp = Complex64::new(0.0, 0.0);
    for c in coeffs {
        dp = dp * z + p;
        p = p * z + c;
    }
    (p, dp)
}

/// All roots of a monic polynomial by Aberth-Ehrlich iteration. `None` when
/// the iteration does not settle.
pub fn aberth(coeffs: &[Complex64], max_iterations: usize) -> Option<Vec<Complex64>> {
    let degree = coeffs.len().checked_sub(1)?;
    if degree == 0 {
        return Some(vec![]);
    }

    // Cauchy bound for the starting circle, rotated away from the axes.
    let bound = 1.0
        + coeffs[1..]
            .iter()
            .map(|c| c.norm() / coeffs[0].norm())
            .fold(0.0, f64::max);
    let radius = 0.5 * bound;
    let mut roots = (0..degree)
        .map(|k| {
            Complex64::from_polar(
                radius,
                std::f64::consts::TAU * k as f64 / degree as f64 + 0.4,
            )
        })
        .collect::<Vec<_>>();

    for _ in 0..max_iterations {
        let mut largest = 0.0_f64;
        for i in 0..degree {
            let (p, dp) = horner(coeffs, roots[i]);
            if p == Complex64::new(0.0, 0.0) {
                continue;
            }
            let ratio = p / dp;
            let repulsion = (0..degree)
                .filter(|&j| j != i)
                .map(|j| (roots[i] - roots[j]).inv())
                .sum::<Complex64>();
            let correction = ratio / (-ratio * repulsion + 1.0);
            if !correction.is_finite() {
                return None;
            }
            roots[i] -= correction;
            largest = largest.max(correction.norm() / roots[i].norm().max(1.0));
        }
        if largest < 4.0 * f64::EPSILON {
            return Some(roots);
        }
    }

    // Near multiple roots the corrections stall at rounding level; the
    // approximations are still usable as starting points.
    let settled = roots.iter().all(|z| {
        let (p, dp) = horner(coeffs, *z);
        (p / dp).norm() < 1e-6
    });
    settled.then_some(roots)
}

/// Solves `sum_j m_j w_j^p = s_p` for `p < n`, the weights of the distinct
/// points `w_j` reproducing the power sums `s_p`.
pub fn vandermonde_weights(points: &[Complex64], sums: &[Complex64]) -> Option<Vec<Complex64>> {
    let n = points.len();
    if sums.len() < n {
        return None;
    }
    let matrix = DMatrix::from_fn(n, n, |p, j| points[j].powu(p as u32));
    let rhs = DVector::from_iterator(n, sums[..n].iter().copied());
    let solution = matrix.lu().solve(&rhs)?;
    Some(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn newton_residuals_decrease_monotonically() {
        let result = newton(
            |z| z * z + 1.0,
            |z| z * 2.0,
            c(0.3, 0.8),
            1,
            1e-14,
            50,
        )
        .unwrap();
        assert!((result.root - c(0.0, 1.0)).norm() < 1e-12);
        assert!(result.iterations < 50);
        for pair in result.residuals.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", result.residuals);
        }
    }

    #[test]
    fn newton_with_multiplicity_converges_quadratically() {
        let f = |z: Complex64| (z - 1.0) * (z - 1.0) * (z - 1.0) * (z + 2.0);
        let df = |z: Complex64| {
            (z - 1.0) * (z - 1.0) * 3.0 * (z + 2.0) + (z - 1.0) * (z - 1.0) * (z - 1.0)
        };
        let result = newton(f, df, c(1.2, 0.1), 3, 1e-12, 50).unwrap();
        assert!((result.root - 1.0).norm() < 1e-6);
        assert!(result.iterations < 20);
    }

    #[test]
    fn stalled_steps_must_lower_the_residual() {
        let z = c(0.5, 0.0);
        assert!(converged(1e-7, 1e-7, 1e-11, 1e-10, z, 1e-12));
        assert!(!converged(1e-7, 1e-7, 1e-10, 1e-10, z, 1e-12));
        assert!(!converged(1e-7, 1e-7, 2e-10, 1e-10, z, 1e-12));
        assert!(converged(1e-13, 1e-7, 2e-10, 1e-10, z, 1e-12));
    }

    #[test]
    fn double_step_newton_cycles_between_separate_roots() {
        // m = 2 maps u = z - (a + b) / 2 to ((b - a) / 2)^2 / u
        let (a, b) = (c(0.5, 0.0), c(0.5 + 1e-5, 0.0));
        let f = |z: Complex64| (z - a) * (z - b);
        let df = |z: Complex64| (z - a) + (z - b);
        let result = newton(f, df, c(0.55, 0.02), 2, 1e-12, 100);
        assert!(result.is_err(), "{result:?}");
    }

    #[test]
    fn newton_reports_exhausted_budget() {
        // z^2 + 1 from a real start never leaves the real axis
        let result = newton(|z| z * z + 1.0, |z| z * 2.0, c(0.5, 0.0), 1, 1e-14, 30);
        assert!(matches!(
            result,
            Err(RefinementFailure::IterationBudget { iterations: 30, .. })
                | Err(RefinementFailure::Diverged { .. })
        ));
    }

    #[test]
    fn muller_finds_complex_roots_without_derivative() {
        let f = |z: Complex64| z.exp() - c(0.0, 2.0);
        let result = muller(f, c(0.5, 1.0), 1e-2, 1e-14, 50).unwrap();
        let expected = c(2.0_f64.ln(), std::f64::consts::FRAC_PI_2);
        assert!((result.root - expected).norm() < 1e-12);
    }

    #[test]
    fn power_sums_give_the_polynomial() {
        let roots = [c(0.5, 0.0), c(-0.25, 0.5), c(0.1, -0.3)];
        let sums = (1..=3)
            .map(|k| roots.iter().map(|r| r.powu(k)).sum::<Complex64>())
            .collect::<Vec<_>>();
        let coeffs = polynomial_from_power_sums(&sums);
        assert_eq!(coeffs.len(), 4);
        for r in roots {
            assert!(horner(&coeffs, r).0.norm() < 1e-14);
        }
    }

    #[test]
    fn aberth_recovers_polynomial_roots() {
        let roots = [c(0.5, 0.0), c(-0.25, 0.5), c(-0.25, -0.5), c(0.8, 0.7)];
        let sums = (1..=4)
            .map(|k| roots.iter().map(|r| r.powu(k)).sum::<Complex64>())
            .collect::<Vec<_>>();
        let found = aberth(&polynomial_from_power_sums(&sums), 500).unwrap();
        for r in roots {
            assert!(found.iter().any(|z| (z - r).norm() < 1e-10), "{r} not in {found:?}");
        }
    }

    #[test]
    fn vandermonde_recovers_multiplicities() {
        let points = [c(0.0, 0.0), c(0.5, 0.5)];
        // 2 x 0 + 1 x (0.5 + 0.5i)
        let sums = [c(3.0, 0.0), c(0.5, 0.5)];
        let weights = vandermonde_weights(&points, &sums).unwrap();
        assert!((weights[0] - 2.0).norm() < 1e-12);
        assert!((weights[1] - 1.0).norm() < 1e-12);
    }
}
