use nalgebra::DMatrix;

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Relative comparison in the Frobenius norm, `||x - y|| <= tol * min(||x||, ||y||)`.
#[macro_export]
macro_rules! assert_relative_matrix_eq {
    ($x:expr, $y:expr, reltol = $tol:expr) => {{
        let diff = $x - $y;
        let scale = $x.norm().min($y.norm());
        let approx_eq = diff.norm() <= $tol * scale;

        if !approx_eq {
            println!("reltol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// A deterministic symmetric positive definite matrix `B^T B + I` with entries of `B` in `[-1, 1]`.
///
/// Different values of `seed` give different matrices.
pub fn spd_matrix(n: usize, seed: u32) -> DMatrix<f64> {
    let b = DMatrix::from_fn(n, n, |i, j| {
        let k = (i * n + j) as f64 + 0.618 * seed as f64;
        (1.7 * k + 0.3).sin()
    });
    b.transpose() * b + DMatrix::identity(n, n)
}

/// A deterministic matrix with entries in `[-1, 1]`.
pub fn dense_matrix(nrows: usize, ncols: usize, seed: u32) -> DMatrix<f64> {
    DMatrix::from_fn(nrows, ncols, |i, j| {
        let k = (i * ncols + j) as f64 + 0.618 * seed as f64;
        (2.3 * k + 1.1).cos()
    })
}
