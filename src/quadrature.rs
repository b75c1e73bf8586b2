//! Gauss quadrature for the reference interval, quadrilateral and hexahedron.
//!
//! Reference domains are `[-1, 1]^d`. Rules in higher dimensions are tensor products of the
//! one-dimensional Gauss-Legendre rule, with the last coordinate varying fastest.
use itertools::izip;
use std::f64::consts::PI;

/// A quadrature rule on a `dim`-dimensional reference domain.
///
/// Points are stored contiguously, `dim` coordinates per point.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    dim: usize,
    weights: Vec<f64>,
    points: Vec<f64>,
}

impl QuadratureRule {
    /// Constructs a rule from weights and (flattened) points.
    ///
    /// # Panics
    ///
    /// Panics if the number of coordinates is not `dim` times the number of weights.
    pub fn from_weights_and_points(dim: usize, weights: Vec<f64>, points: Vec<f64>) -> Self {
        assert_eq!(points.len(), dim * weights.len(), "points and weights must have consistent sizes");
        Self { dim, weights, points }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn point(&self, index: usize) -> &[f64] {
        &self.points[self.dim * index..self.dim * (index + 1)]
    }

    /// Iterate over `(weight, point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> {
        izip!(&self.weights, self.points.chunks_exact(self.dim.max(1))).map(|(w, xi)| (*w, xi))
    }

    /// Approximates the integral of `f` over the reference domain.
    pub fn integrate(&self, mut f: impl FnMut(&[f64]) -> f64) -> f64 {
        self.iter().map(|(w, xi)| w * f(xi)).sum()
    }
}

/// Evaluates the Legendre polynomial `P_n` and its predecessor `P_{n-1}` at `x`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    // m P_m(x) = (2m - 1) x P_{m-1}(x) - (m - 1) P_{m-2}(x)
    let mut p_current = 1.0;
    let mut p_previous = 0.0;
    for m in 1..=n {
        let m = m as f64;
        let p_next = ((2.0 * m - 1.0) * x * p_current - (m - 1.0) * p_previous) / m;
        p_previous = p_current;
        p_current = p_next;
    }
    (p_current, p_previous)
}

/// Derivative of `P_n` at `x`, valid only in the open interval `(-1, 1)`.
fn legendre_derivative(n: usize, x: f64, p_n: f64, p_n_minus_one: f64) -> f64 {
    n as f64 * (x * p_n - p_n_minus_one) / (x * x - 1.0)
}

/// Gauss-Legendre rule with `num_points` points on `[-1, 1]`.
///
/// The rule integrates polynomials up to degree `2 n - 1` exactly. The points are returned in
/// increasing order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> QuadratureRule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];

    // Roots are symmetric around the origin, so only the first half is computed by
    // Newton's method starting from the Chebyshev-like initial guess.
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp;
        loop {
            let (p, p_prev) = legendre(n, x);
            dp = legendre_derivative(n, x, p, p_prev);
            let dx = -p / dp;
            x += dx;
            if dx.abs() <= 1e-15 {
                let (p, p_prev) = legendre(n, x);
                dp = legendre_derivative(n, x, p, p_prev);
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        // Newton converges to the roots in decreasing order
        points[n - 1 - i] = x;
        weights[n - 1 - i] = w;
        points[i] = -x;
        weights[i] = w;
    }

    // The middle root of an odd rule is exactly zero
    if n % 2 == 1 {
        points[n / 2] = 0.0;
    }

    QuadratureRule::from_weights_and_points(1, weights, points)
}

/// Tensor product of the `n`-point Gauss rule in `dim` dimensions.
pub fn tensor_gauss(dim: usize, num_points_per_dim: usize) -> QuadratureRule {
    let rule1d = gauss(num_points_per_dim);
    let mut weights = vec![1.0];
    let mut points: Vec<Vec<f64>> = vec![Vec::new()];

    for _ in 0..dim {
        let mut next_weights = Vec::with_capacity(weights.len() * rule1d.len());
        let mut next_points = Vec::with_capacity(points.len() * rule1d.len());
        for (w, xi) in izip!(&weights, &points) {
            for (w1d, x1d) in rule1d.iter() {
                next_weights.push(w * w1d);
                let mut point = xi.clone();
                point.push(x1d[0]);
                next_points.push(point);
            }
        }
        weights = next_weights;
        points = next_points;
    }

    QuadratureRule::from_weights_and_points(dim, weights, points.concat())
}

/// Gauss rule for the reference quadrilateral `[-1, 1]^2`.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> QuadratureRule {
    tensor_gauss(2, num_points_per_dim)
}

/// Gauss rule for the reference hexahedron `[-1, 1]^3`.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> QuadratureRule {
    tensor_gauss(3, num_points_per_dim)
}
