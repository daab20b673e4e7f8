//! Contour integrals of `w^k f'(z)/f(z)`.
//!
//! Every boundary segment is integrated with adaptive Gauss-Kronrod
//! quadrature. All requested moments are carried through the same adaptive
//! loop so that `f` and `f'` are sampled once per node.

use std::f64::consts::TAU;

use num::complex::Complex64;

use crate::config::Config;
use crate::contour::{Contour, Segment};
use crate::error::IntegrationFailure;
use crate::function::AnalyticFunction;

const INITIAL_INTERVALS: usize = 4;

// Intervals narrower than this (in segment parameter) only shrink because of
// a singularity on the segment.
const WIDTH_FLOOR: f64 = 1e-12;

// Kronrod nodes on [-1, 1]; the odd entries are the 7 Gauss nodes.
const XGK: [f64; 15] = [
    -0.991_455_371_120_812_6,
    -0.949_107_912_342_758_5,
    -0.864_864_423_359_769_1,
    -0.741_531_185_599_394_4,
    -0.586_087_235_467_691_1,
    -0.405_845_151_377_397_2,
    -0.207_784_955_007_898_5,
    0.0,
    0.207_784_955_007_898_5,
    0.405_845_151_377_397_2,
    0.586_087_235_467_691_1,
    0.741_531_185_599_394_4,
    0.864_864_423_359_769_1,
    0.949_107_912_342_758_5,
    0.991_455_371_120_812_6,
];

const WGK: [f64; 15] = [
    0.022_935_322_010_529_224,
    0.063_092_092_629_978_56,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_89,
    0.209_482_141_084_727_82,
    0.204_432_940_075_298_89,
    0.190_350_578_064_785_4,
    0.169_004_726_639_267_9,
    0.140_653_259_715_525_92,
    0.104_790_010_322_250_18,
    0.063_092_092_629_978_56,
    0.022_935_322_010_529_224,
];

const WG: [f64; 7] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_64,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
    0.381_830_050_505_118_9,
    0.279_705_391_489_276_64,
    0.129_484_966_168_869_7,
];

/// Moments `(1/2 pi i) ∮ w^k f'/f dz` for `k = 0..=moments`, with
/// `w = (z - center) / size` of the contour.
#[derive(Debug, Clone)]
pub struct Integral {
    pub values: Vec<Complex64>,
    pub error: f64,
    pub evaluations: usize,
}

struct Interval {
    a: f64,
    b: f64,
    values: Vec<Complex64>,
    error: f64,
}

pub fn integrate(
    contour: &Contour,
    function: &AnalyticFunction,
    moments: usize,
    config: &Config,
) -> Result<Integral, IntegrationFailure> {
    let center = contour.center();
    let scale = contour.size();
    let segments = contour.segments();
    let tolerance = config.integration_tolerance / segments.len() as f64;

    let mut values = vec![Complex64::new(0.0, 0.0); moments + 1];
    let mut error = 0.0;
    let mut evaluations = 0;

    for segment in &segments {
        let integrand = |t: f64| -> Result<Vec<Complex64>, IntegrationFailure> {
            let z = segment.point(t);
            let (fz, dfz) = function.eval_with_derivative(z, config);
            if fz == Complex64::new(0.0, 0.0) || !fz.is_finite() || !dfz.is_finite() {
                return Err(IntegrationFailure::Singular { z });
            }
            let g = dfz / fz * segment.derivative(t) / Complex64::new(0.0, TAU);
            if !g.is_finite() {
                return Err(IntegrationFailure::Singular { z });
            }
            let w = (z - center) / scale;
            let mut wk = Complex64::new(1.0, 0.0);
            Ok((0..=moments)
                .map(|_| {
                    let value = g * wk;
                    wk *= w;
                    value
                })
                .collect())
        };

        let result = adaptive(&integrand, segment, moments + 1, tolerance, config)?;
        for (total, value) in values.iter_mut().zip(&result.values) {
            *total += value;
        }
        error += result.error;
        evaluations += result.evaluations;
    }

    Ok(Integral {
        values,
        error,
        evaluations,
    })
}

fn adaptive<F>(
    f: &F,
    segment: &Segment,
    width: usize,
    tolerance: f64,
    config: &Config,
) -> Result<Integral, IntegrationFailure>
where
    F: Fn(f64) -> Result<Vec<Complex64>, IntegrationFailure>,
{
    let mut intervals = Vec::with_capacity(INITIAL_INTERVALS + 2 * config.max_quadrature_subdivisions);
    let mut evaluations = 0;

    for i in 0..INITIAL_INTERVALS {
        let a = i as f64 / INITIAL_INTERVALS as f64;
        let b = (i + 1) as f64 / INITIAL_INTERVALS as f64;
        let (values, error) = gauss_kronrod_15(f, a, b, width)?;
        evaluations += 15;
        intervals.push(Interval { a, b, values, error });
    }

    let mut subdivisions = 0;
    loop {
        let mut values = vec![Complex64::new(0.0, 0.0); width];
        let mut error = 0.0;
        for interval in &intervals {
            for (total, value) in values.iter_mut().zip(&interval.values) {
                *total += value;
            }
            error += interval.error;
        }

        let magnitude = values.iter().map(|v| v.norm()).fold(0.0, f64::max);
        if error <= tolerance * (1.0 + magnitude) {
            return Ok(Integral {
                values,
                error,
                evaluations,
            });
        }
        if subdivisions >= config.max_quadrature_subdivisions {
            log::debug!(
                "Quadrature on {:?} stopped with error {:.2e} after {} subdivisions",
                segment,
                error,
                subdivisions
            );
            return Err(IntegrationFailure::NotConverged {
                subdivisions,
                error,
            });
        }

        let Some(worst) = intervals
            .iter()
            .enumerate()
            .max_by(|(_, x), (_, y)| x.error.total_cmp(&y.error))
            .map(|(i, _)| i) else {
            return Err(IntegrationFailure::NotConverged { subdivisions, error });
        };

        let Interval { a, b, .. } = intervals.swap_remove(worst);
        let mid = 0.5 * (a + b);
        if b - a < WIDTH_FLOOR {
            return Err(IntegrationFailure::Singular {
                z: segment.point(mid),
            });
        }
        for (a, b) in [(a, mid), (mid, b)] {
            let (values, error) = gauss_kronrod_15(f, a, b, width)?;
            intervals.push(Interval { a, b, values, error });
        }
        evaluations += 30;
        subdivisions += 1;
    }
}

/// G7-K15 on `[a, b]`; the error is the largest `|K15 - G7|` over the moments.
fn gauss_kronrod_15<F>(
    f: &F,
    a: f64,
    b: f64,
    width: usize,
) -> Result<(Vec<Complex64>, f64), IntegrationFailure>
where
    F: Fn(f64) -> Result<Vec<Complex64>, IntegrationFailure>,
{
    let mid = 0.5 * (a + b);
    let half_width = 0.5 * (b - a);

    let mut kronrod = vec![Complex64::new(0.0, 0.0); width];
    let mut gauss = vec![Complex64::new(0.0, 0.0); width];

    for (i, x) in XGK.iter().enumerate() {
        let fx = f(mid + half_width * x)?;
        for k in 0..width {
            kronrod[k] += fx[k] * WGK[i];
            if i % 2 == 1 {
                gauss[k] += fx[k] * WG[i / 2];
            }
        }
    }

    let mut error = 0.0_f64;
    for k in 0..width {
        kronrod[k] *= half_width;
        gauss[k] *= half_width;
        error = error.max((kronrod[k] - gauss[k]).norm());
    }
    Ok((kronrod, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn counts_zeros_of_a_polynomial() {
        let config = Config::default();
        let f = AnalyticFunction::with_derivative(
            |z| (z - c(0.5, 0.5)) * (z + c(0.3, 0.0)) * (z - c(3.0, 0.0)),
            |z| {
                let a = z - c(0.5, 0.5);
                let b = z + c(0.3, 0.0);
                let d = z - c(3.0, 0.0);
                b * d + a * d + a * b
            },
        );
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        let integral = integrate(&circle, &f, 0, &config).unwrap();
        assert!((integral.values[0] - c(2.0, 0.0)).norm() < 1e-8);
        assert!(integral.error < 1e-6);
        assert!(integral.evaluations > 0);
    }

    #[test]
    fn first_moment_locates_a_single_root() {
        let config = Config::default();
        let root = c(0.25, -0.4);
        let f = AnalyticFunction::with_derivative(move |z| (z - root) * z.exp(), move |z| {
            (z - root + 1.0) * z.exp()
        });
        let rect = Contour::rectangle((-1.0, 1.0), (-1.0, 0.5)).unwrap();
        let integral = integrate(&rect, &f, 2, &config).unwrap();
        let w = (root - rect.center()) / rect.size();
        assert!((integral.values[0] - 1.0).norm() < 1e-8);
        assert!((integral.values[1] - w).norm() < 1e-8);
        assert!((integral.values[2] - w * w).norm() < 1e-8);
    }

    #[test]
    fn annulus_excludes_the_hole() {
        let config = Config::default();
        let f = AnalyticFunction::new(|z| z * (z - c(1.5, 0.0)));
        let annulus = Contour::annulus(c(0.0, 0.0), (1.0, 2.0)).unwrap();
        let integral = integrate(&annulus, &f, 0, &config).unwrap();
        assert!((integral.values[0] - 1.0).norm() < 1e-8);
    }

    #[test]
    fn root_on_the_boundary_is_singular() {
        let config = Config::default();
        let f = AnalyticFunction::new(|z| z - c(1.0, 0.0));
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        assert!(matches!(
            integrate(&circle, &f, 0, &config),
            Err(IntegrationFailure::Singular { .. })
        ));
    }

    #[test]
    fn subdivision_budget_is_enforced() {
        let config = Config {
            max_quadrature_subdivisions: 1,
            ..Default::default()
        };
        let f = AnalyticFunction::new(|z| z - c(1.0 + 1e-7, 0.0));
        let circle = Contour::circle(c(0.0, 0.0), 1.0).unwrap();
        assert!(matches!(
            integrate(&circle, &f, 0, &config),
            Err(IntegrationFailure::NotConverged { .. })
        ));
    }
}
