//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::{Error, Rule};
use std::f64::consts::PI;

/// Recurrence relation for Legendre polynomials.
///
/// Note: we use a formula for which derivatives are *not* defined at |x| == 1, so it is only
/// suitable for evaluation in the open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // The current value, i.e. p_n(x)
    p1: f64,
    // The previous value in the recurrence, i.e. p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        let mut p3;
        for m in 1..=n {
            let m = m as f64;
            p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    fn value(&self) -> f64 {
        self.p1
    }

    fn derivative(&self) -> f64 {
        let Self { n, x, p1, p2 } = &self;
        let n = *n as f64;
        // dp_n/dx (x) = n * (x * p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
        n * (x * p1 - p2) / (x * x - 1.0)
    }

    fn value_and_derivative(&self) -> (f64, f64) {
        (self.value(), self.derivative())
    }
}

/// Maximum number of Newton iterations per root.
const MAX_NEWTON_ITERATIONS: usize = 100;

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points, with points sorted in
/// ascending order. Given `n` points, the rule integrates polynomials of order up to `2 n - 1`
/// exactly.
///
/// # Panics
///
/// Panics if zero points are requested. See [`try_gauss`] for a non-panicking variant.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule<1> {
    try_gauss(num_points).expect("number of points must be positive")
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns [`Error::NoRuleAvailable`] if zero points are requested.
pub fn try_gauss(num_points: usize) -> Result<Rule<1>, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Loosely based on the procedure used in
    // Numerical Recipes, The art of Scientific Computing, Third Edition (2007)
    let num_positive_roots = n / 2;

    // Positive roots in descending order
    let mut positive_roots = Vec::with_capacity(num_positive_roots);
    for i in 0..num_positive_roots {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = LegendreRecurrence::evaluate(n, x).derivative();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p, dp_current) = LegendreRecurrence::evaluate(n, x).value_and_derivative();
            let dx = -p / dp_current;
            x += dx;
            dp = LegendreRecurrence::evaluate(n, x).derivative();
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        positive_roots.push((x, w));
    }

    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Negative roots in ascending order, then (for odd n) the root at the origin,
    // then the positive roots in ascending order. This makes the rule exactly symmetric.
    for &(x, w) in &positive_roots {
        points.push([-x]);
        weights.push(w);
    }
    if n % 2 == 1 {
        let dp = LegendreRecurrence::evaluate(n, 0.0).derivative();
        points.push([0.0]);
        weights.push(2.0 / (dp * dp));
    }
    for &(x, w) in positive_roots.iter().rev() {
        points.push([x]);
        weights.push(w);
    }

    assert_eq!(points.len(), n, "Internal error: incorrect number of points produced");
    Ok((weights, points))
}
