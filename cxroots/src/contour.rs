use std::f64::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use num::complex::Complex64;

use crate::error::{Error, Result};

/// Split positions tried in order when a region is subdivided. None of them
/// is exactly one half, so that symmetric problems do not put a root on the
/// first cut.
pub const SPLIT_RATIOS: [f64; 6] = [0.47, 0.53, 0.41, 0.59, 0.35, 0.65];

const CURVE_SAMPLES: usize = 512;

pub type CurveFn = Arc<dyn Fn(f64) -> Complex64 + Send + Sync>;

/// A closed curve `t -> z(t)`, `t in [0, 1]`, together with `dz/dt`.
#[derive(Clone)]
pub struct ParametricCurve {
    pub point: CurveFn,
    pub derivative: CurveFn,
}

impl fmt::Debug for ParametricCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParametricCurve")
    }
}

impl ParametricCurve {
    pub fn new(
        point: impl Fn(f64) -> Complex64 + Send + Sync + 'static,
        derivative: impl Fn(f64) -> Complex64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            point: Arc::new(point),
            derivative: Arc::new(derivative),
        }
    }

    fn polygon(&self) -> Vec<Complex64> {
        (0..CURVE_SAMPLES)
            .map(|i| (self.point)(i as f64 / CURVE_SAMPLES as f64))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Line {
        start: Complex64,
        end: Complex64,
    },
    Arc {
        center: Complex64,
        radius: f64,
        start_angle: f64,
        sweep: f64,
    },
    Curve(ParametricCurve),
}

impl Segment {
    pub fn point(&self, t: f64) -> Complex64 {
        match self {
            Self::Line { start, end } => start + (end - start) * t,
            Self::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => center + Complex64::from_polar(*radius, start_angle + sweep * t),
            Self::Curve(curve) => (curve.point)(t),
        }
    }

    pub fn derivative(&self, t: f64) -> Complex64 {
        match self {
            Self::Line { start, end } => end - start,
            Self::Arc {
                radius,
                start_angle,
                sweep,
                ..
            } => Complex64::i() * *sweep * Complex64::from_polar(*radius, start_angle + sweep * t),
            Self::Curve(curve) => (curve.derivative)(t),
        }
    }
}

/// A positively oriented region boundary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Contour {
    Rectangle {
        x_range: (f64, f64),
        y_range: (f64, f64),
    },
    Circle {
        center: Complex64,
        radius: f64,
    },
    Annulus {
        center: Complex64,
        radii: (f64, f64),
    },
    AnnulusSector {
        center: Complex64,
        radii: (f64, f64),
        phase: (f64, f64),
    },
    #[serde(skip)]
    Custom(ParametricCurve),
}

impl Contour {
    pub fn rectangle(x_range: (f64, f64), y_range: (f64, f64)) -> Result<Self> {
        let contour = Self::Rectangle { x_range, y_range };
        contour.validate()?;
        Ok(contour)
    }

    /// The rectangle spanned by two opposite corners.
    pub fn rectangle_from_corners(a: Complex64, b: Complex64) -> Result<Self> {
        Self::rectangle((a.re.min(b.re), a.re.max(b.re)), (a.im.min(b.im), a.im.max(b.im)))
    }

    pub fn circle(center: Complex64, radius: f64) -> Result<Self> {
        let contour = Self::Circle { center, radius };
        contour.validate()?;
        Ok(contour)
    }

    pub fn annulus(center: Complex64, radii: (f64, f64)) -> Result<Self> {
        let contour = Self::Annulus { center, radii };
        contour.validate()?;
        Ok(contour)
    }

    pub fn annulus_sector(center: Complex64, radii: (f64, f64), phase: (f64, f64)) -> Result<Self> {
        let contour = Self::AnnulusSector {
            center,
            radii,
            phase,
        };
        contour.validate()?;
        Ok(contour)
    }

    pub fn custom(curve: ParametricCurve) -> Result<Self> {
        let contour = Self::Custom(curve);
        contour.validate()?;
        Ok(contour)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = |values: &[f64]| values.iter().all(|v| v.is_finite());
        let ok = match self {
            Self::Rectangle { x_range, y_range } => {
                finite(&[x_range.0, x_range.1, y_range.0, y_range.1])
                    && x_range.0 < x_range.1
                    && y_range.0 < y_range.1
            }
            Self::Circle { center, radius } => finite(&[center.re, center.im, *radius]) && *radius > 0.0,
            Self::Annulus { center, radii } => {
                finite(&[center.re, center.im, radii.0, radii.1]) && 0.0 < radii.0 && radii.0 < radii.1
            }
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => {
                finite(&[center.re, center.im, radii.0, radii.1, phase.0, phase.1])
                    && 0.0 <= radii.0
                    && radii.0 < radii.1
                    && phase.0 < phase.1
                    && phase.1 - phase.0 <= TAU
            }
            Self::Custom(curve) => {
                let polygon = curve.polygon();
                let closed = ((curve.point)(0.0) - (curve.point)(1.0)).norm();
                let area = self.area();
                if polygon.iter().any(|z| !z.is_finite()) || !area.is_finite() {
                    false
                } else if area < 0.0 {
                    return Err(Error::InvalidBoundary(
                        "custom curve must be positively oriented".to_owned(),
                    ));
                } else {
                    area > 0.0 && closed <= 1e-9 * self.size().max(1.0)
                }
            }
        };

        if ok {
            Ok(())
        } else {
            Err(Error::InvalidBoundary(format!("degenerate region {self}")))
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Self::Rectangle { x_range, y_range } => {
                let corners = [
                    Complex64::new(x_range.0, y_range.0),
                    Complex64::new(x_range.1, y_range.0),
                    Complex64::new(x_range.1, y_range.1),
                    Complex64::new(x_range.0, y_range.1),
                ];
                corners
                    .iter()
                    .circular_tuple_windows()
                    .map(|(&start, &end)| Segment::Line { start, end })
                    .collect()
            }
            Self::Circle { center, radius } => vec![Segment::Arc {
                center: *center,
                radius: *radius,
                start_angle: 0.0,
                sweep: TAU,
            }],
            Self::Annulus { center, radii } => vec![
                Segment::Arc {
                    center: *center,
                    radius: radii.1,
                    start_angle: 0.0,
                    sweep: TAU,
                },
                Segment::Arc {
                    center: *center,
                    radius: radii.0,
                    start_angle: 0.0,
                    sweep: -TAU,
                },
            ],
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => {
                let (r0, r1) = *radii;
                let (phi0, phi1) = *phase;
                let sweep = phi1 - phi0;
                let mut segments = vec![
                    Segment::Line {
                        start: center + Complex64::from_polar(r0, phi0),
                        end: center + Complex64::from_polar(r1, phi0),
                    },
                    Segment::Arc {
                        center: *center,
                        radius: r1,
                        start_angle: phi0,
                        sweep,
                    },
                    Segment::Line {
                        start: center + Complex64::from_polar(r1, phi1),
                        end: center + Complex64::from_polar(r0, phi1),
                    },
                ];
                if r0 > 0.0 {
                    segments.push(Segment::Arc {
                        center: *center,
                        radius: r0,
                        start_angle: phi1,
                        sweep: -sweep,
                    });
                }
                segments
            }
            Self::Custom(curve) => vec![Segment::Curve(curve.clone())],
        }
    }

    /// Strict interior test.
    pub fn contains(&self, z: Complex64) -> bool {
        match self {
            Self::Rectangle { x_range, y_range } => {
                x_range.0 < z.re && z.re < x_range.1 && y_range.0 < z.im && z.im < y_range.1
            }
            Self::Circle { center, radius } => (z - center).norm() < *radius,
            Self::Annulus { center, radii } => {
                let r = (z - center).norm();
                radii.0 < r && r < radii.1
            }
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => {
                let r = (z - center).norm();
                let angle = ((z - center).arg() - phase.0).rem_euclid(TAU);
                radii.0 < r && r < radii.1 && angle > 0.0 && angle < phase.1 - phase.0
            }
            Self::Custom(curve) => winding_number(&curve.polygon(), z) != 0,
        }
    }

    pub fn center(&self) -> Complex64 {
        match self {
            Self::Rectangle { x_range, y_range } => Complex64::new(
                0.5 * (x_range.0 + x_range.1),
                0.5 * (y_range.0 + y_range.1),
            ),
            Self::Circle { center, .. } | Self::Annulus { center, .. } => *center,
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => center + Complex64::from_polar(0.5 * (radii.0 + radii.1), 0.5 * (phase.0 + phase.1)),
            Self::Custom(curve) => {
                let polygon = curve.polygon();
                polygon.iter().sum::<Complex64>() / polygon.len() as f64
            }
        }
    }

    /// Largest distance from [`Contour::center`] to the boundary.
    pub fn size(&self) -> f64 {
        match self {
            Self::Rectangle { x_range, y_range } => {
                0.5 * (x_range.1 - x_range.0).hypot(y_range.1 - y_range.0)
            }
            Self::Circle { radius, .. } => *radius,
            Self::Annulus { radii, .. } => radii.1,
            Self::AnnulusSector { .. } | Self::Custom(_) => {
                let center = self.center();
                self.boundary_points(32)
                    .into_iter()
                    .map(|z| (z - center).norm())
                    .fold(0.0, f64::max)
            }
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Rectangle { x_range, y_range } => (x_range.1 - x_range.0) * (y_range.1 - y_range.0),
            Self::Circle { radius, .. } => PI * radius * radius,
            Self::Annulus { radii, .. } => PI * (radii.1 * radii.1 - radii.0 * radii.0),
            Self::AnnulusSector { radii, phase, .. } => {
                0.5 * (phase.1 - phase.0) * (radii.1 * radii.1 - radii.0 * radii.0)
            }
            Self::Custom(curve) => {
                0.5 * curve
                    .polygon()
                    .iter()
                    .circular_tuple_windows()
                    .map(|(a, b)| a.re * b.im - b.re * a.im)
                    .sum::<f64>()
            }
        }
    }

    /// Points along every segment, `per_segment` of them per piece.
    pub fn boundary_points(&self, per_segment: usize) -> Vec<Complex64> {
        let segments = self.segments();
        segments
            .iter()
            .flat_map(|segment| {
                (0..per_segment).map(move |i| segment.point(i as f64 / per_segment as f64))
            })
            .collect()
    }

    /// Children covering the region exactly, cut at `ratio` of the chosen
    /// extent. Custom curves cannot be split.
    pub fn subdivide(&self, ratio: f64) -> Option<Vec<Contour>> {
        let children = match self {
            Self::Rectangle { x_range, y_range } => {
                let width = x_range.1 - x_range.0;
                let height = y_range.1 - y_range.0;
                if width >= height {
                    let x = x_range.0 + ratio * width;
                    vec![
                        Self::Rectangle {
                            x_range: (x_range.0, x),
                            y_range: *y_range,
                        },
                        Self::Rectangle {
                            x_range: (x, x_range.1),
                            y_range: *y_range,
                        },
                    ]
                } else {
                    let y = y_range.0 + ratio * height;
                    vec![
                        Self::Rectangle {
                            x_range: *x_range,
                            y_range: (y_range.0, y),
                        },
                        Self::Rectangle {
                            x_range: *x_range,
                            y_range: (y, y_range.1),
                        },
                    ]
                }
            }
            Self::Circle { center, radius } => {
                let r = ratio * radius;
                vec![
                    Self::Circle {
                        center: *center,
                        radius: r,
                    },
                    Self::Annulus {
                        center: *center,
                        radii: (r, *radius),
                    },
                ]
            }
            Self::Annulus { center, radii } => {
                // The first cut moves with the ratio as well, otherwise every
                // retry would share the same radial edge.
                let phi0 = ratio;
                let phi1 = phi0 + TAU * ratio;
                vec![
                    Self::AnnulusSector {
                        center: *center,
                        radii: *radii,
                        phase: (phi0, phi1),
                    },
                    Self::AnnulusSector {
                        center: *center,
                        radii: *radii,
                        phase: (phi1, phi0 + TAU),
                    },
                ]
            }
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => {
                let radial = radii.1 - radii.0;
                let angular = 0.5 * (radii.0 + radii.1) * (phase.1 - phase.0);
                if radial >= angular {
                    let r = radii.0 + ratio * radial;
                    vec![
                        Self::AnnulusSector {
                            center: *center,
                            radii: (radii.0, r),
                            phase: *phase,
                        },
                        Self::AnnulusSector {
                            center: *center,
                            radii: (r, radii.1),
                            phase: *phase,
                        },
                    ]
                } else {
                    let phi = phase.0 + ratio * (phase.1 - phase.0);
                    vec![
                        Self::AnnulusSector {
                            center: *center,
                            radii: *radii,
                            phase: (phase.0, phi),
                        },
                        Self::AnnulusSector {
                            center: *center,
                            radii: *radii,
                            phase: (phi, phase.1),
                        },
                    ]
                }
            }
            Self::Custom(_) => return None,
        };
        Some(children)
    }
}

impl fmt::Display for Contour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rectangle { x_range, y_range } => write!(
                f,
                "Rectangle [{}, {}] x [{}, {}]",
                x_range.0, x_range.1, y_range.0, y_range.1
            ),
            Self::Circle { center, radius } => write!(f, "Circle |z - ({center})| < {radius}"),
            Self::Annulus { center, radii } => {
                write!(f, "Annulus {} < |z - ({center})| < {}", radii.0, radii.1)
            }
            Self::AnnulusSector {
                center,
                radii,
                phase,
            } => write!(
                f,
                "AnnulusSector {} < |z - ({center})| < {}, {} < arg < {}",
                radii.0, radii.1, phase.0, phase.1
            ),
            Self::Custom(_) => write!(f, "Custom curve"),
        }
    }
}

fn winding_number(polygon: &[Complex64], z: Complex64) -> i32 {
    fn cross(v: Complex64, w: Complex64) -> f64 {
        v.re * w.im - v.im * w.re
    }

    polygon
        .iter()
        .circular_tuple_windows()
        .map(|(&a, &b)| {
            if a.im <= z.im {
                if b.im > z.im && cross(b - a, z - a) > 0.0 {
                    1
                } else {
                    0
                }
            } else if b.im <= z.im && cross(b - a, z - a) < 0.0 {
                -1
            } else {
                0
            }
        })
        .sum()
}
