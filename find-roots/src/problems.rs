use cxroots::{AnalyticFunction, Contour, Result};
use num::complex::Complex64;

pub type RegionFunction = fn() -> Result<Contour>;
pub type ComplexFunction = fn(Complex64) -> Complex64;

pub struct Problem {
    pub name: &'static str,
    pub description: &'static str,
    pub region: RegionFunction,
    pub f: ComplexFunction,
    pub df: ComplexFunction,
    pub max_roots_per_leaf: Option<usize>,
}

impl Problem {
    pub fn function(&self, with_derivative: bool) -> AnalyticFunction {
        if with_derivative {
            AnalyticFunction::with_derivative(self.f, self.df)
        } else {
            AnalyticFunction::new(self.f)
        }
    }
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn cubic(z: Complex64) -> Complex64 {
    z * z * z - 1.0
}

fn cubic_prime(z: Complex64) -> Complex64 {
    z * z * 3.0
}

fn square(z: Complex64) -> Complex64 {
    (z - 1.0) * (z - 1.0)
}

fn square_prime(z: Complex64) -> Complex64 {
    (z - 1.0) * 2.0
}

fn shifted(z: Complex64) -> Complex64 {
    z - c(2.0, 2.0)
}

fn one(_: Complex64) -> Complex64 {
    c(1.0, 0.0)
}

// Examples from Kravanja and Van Barel, "Computing the zeros of analytic
// functions" (2000).

fn kb_141(z: Complex64) -> Complex64 {
    let s = 3.0_f64.sqrt();
    (z - 1e-2) * ((z - s) * (z - s) + 1.0)
}

fn kb_141_prime(z: Complex64) -> Complex64 {
    let s = 3.0_f64.sqrt();
    (z - s) * (z - s) + 1.0 + (z - 1e-2) * 2.0 * (z - s)
}

fn kb_142(z: Complex64) -> Complex64 {
    (z * 3.0).exp() + z * 2.0 * z.cos() - 1.0
}

fn kb_142_prime(z: Complex64) -> Complex64 {
    (z * 3.0).exp() * 3.0 + z.cos() * 2.0 - z * 2.0 * z.sin()
}

fn kb_143(z: Complex64) -> Complex64 {
    z * z * (z - 1.0) * (z - 2.0) * (z - 3.0) * (z - 4.0) + z * z.sin()
}

fn kb_143_prime(z: Complex64) -> Complex64 {
    z * 2.0 * (z.powu(4) * 3.0 - z.powu(3) * 25.0 + z * z * 70.0 - z * 75.0 + 24.0)
        + z.sin()
        + z * z.cos()
}

fn kb_144_factor(z: Complex64) -> Complex64 {
    (z * 2.0).exp() * z.cos() + z.powu(3) - 1.0 - z.sin()
}

fn kb_144(z: Complex64) -> Complex64 {
    (z * (z - 2.0)).powu(2) * kb_144_factor(z)
}

fn kb_144_prime(z: Complex64) -> Complex64 {
    let g = kb_144_factor(z);
    let dg = (z * 2.0).exp() * (z.cos() * 2.0 - z.sin()) + z * z * 3.0 - z.cos();
    z * (z - 2.0) * (z - 2.0) * 2.0 * g + z * z * (z - 2.0) * 2.0 * g + (z * (z - 2.0)).powu(2) * dg
}

fn kb_145(z: Complex64) -> Complex64 {
    (1..=10).map(|k| z - k as f64).product()
}

fn kb_145_prime(z: Complex64) -> Complex64 {
    (1..=10)
        .map(|m| {
            (1..=10)
                .filter(|&k| k != m)
                .map(|k| z - k as f64)
                .product::<Complex64>()
        })
        .sum()
}

fn circle_2() -> Result<Contour> {
    Contour::circle(c(0.0, 0.0), 2.0)
}

fn circle_3() -> Result<Contour> {
    Contour::circle(c(0.0, 0.0), 3.0)
}

fn circle_5() -> Result<Contour> {
    Contour::circle(c(0.0, 0.0), 5.0)
}

fn circle_11() -> Result<Contour> {
    Contour::circle(c(0.0, 0.0), 11.0)
}

fn circle_around_one() -> Result<Contour> {
    Contour::circle(c(1.0, 0.0), 0.5)
}

fn unit_square() -> Result<Contour> {
    Contour::rectangle_from_corners(c(0.0, 0.0), c(1.0, 1.0))
}

fn square_2() -> Result<Contour> {
    Contour::rectangle((-2.0, 2.0), (-2.0, 2.0))
}

fn rectangle_151() -> Result<Contour> {
    Contour::rectangle((-2.0, 2.0), (-2.0, 3.0))
}

fn rectangle_152() -> Result<Contour> {
    Contour::rectangle((-0.5, 5.5), (-0.5, 1.5))
}

fn rectangle_153() -> Result<Contour> {
    Contour::rectangle((-1.0, 3.0), (-1.0, 1.0))
}

fn thin_rectangle() -> Result<Contour> {
    Contour::rectangle((-1.0, 11.0), (-1.0, 1.0))
}

pub const ALL_PROBLEMS: &[Problem] = &[
    Problem {
        name: "cube-roots",
        description: "z^3 - 1 in |z| < 2",
        region: circle_2,
        f: cubic,
        df: cubic_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "double-root",
        description: "(z - 1)^2 in |z - 1| < 0.5",
        region: circle_around_one,
        f: square,
        df: square_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "empty",
        description: "z - (2 + 2i) in the unit square",
        region: unit_square,
        f: shifted,
        df: one,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.1",
        description: "(z - 0.01)(1 + (z - sqrt 3)^2) in |z| < 3",
        region: circle_3,
        f: kb_141,
        df: kb_141_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.2",
        description: "exp(3z) + 2z cos z - 1 in |z| < 2",
        region: circle_2,
        f: kb_142,
        df: kb_142_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.2b",
        description: "exp(3z) + 2z cos z - 1 in [-2, 2] x [-2, 2]",
        region: square_2,
        f: kb_142,
        df: kb_142_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.3",
        description: "z^2 (z - 1)(z - 2)(z - 3)(z - 4) + z sin z in |z| < 5",
        region: circle_5,
        f: kb_143,
        df: kb_143_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.4",
        description: "(z (z - 2))^2 (exp(2z) cos z + z^3 - 1 - sin z) in |z| < 3",
        region: circle_3,
        f: kb_144,
        df: kb_144_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.5",
        description: "(z - 1)(z - 2)...(z - 10) in |z| < 11",
        region: circle_11,
        f: kb_145,
        df: kb_145_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.4.5b",
        description: "(z - 1)(z - 2)...(z - 10) in [-1, 11] x [-1, 1]",
        region: thin_rectangle,
        f: kb_145,
        df: kb_145_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.5.1",
        description: "exp(3z) + 2z cos z - 1 in [-2, 2] x [-2, 3], two roots per region",
        region: rectangle_151,
        f: kb_142,
        df: kb_142_prime,
        max_roots_per_leaf: Some(2),
    },
    Problem {
        name: "kb-1.5.2",
        description: "z^2 (z - 1)(z - 2)(z - 3)(z - 4) + z sin z in [-0.5, 5.5] x [-0.5, 1.5]",
        region: rectangle_152,
        f: kb_143,
        df: kb_143_prime,
        max_roots_per_leaf: None,
    },
    Problem {
        name: "kb-1.5.3",
        description: "(z (z - 2))^2 (exp(2z) cos z + z^3 - 1 - sin z) in [-1, 3] x [-1, 1]",
        region: rectangle_153,
        f: kb_144,
        df: kb_144_prime,
        max_roots_per_leaf: None,
    },
];

pub fn find(name: &str) -> Option<&'static Problem> {
    ALL_PROBLEMS.iter().find(|problem| problem.name == name)
}
