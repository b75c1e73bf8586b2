//! Strategies for property-based testing.
use crate::element::ReferenceElement;
use crate::grid::Grid;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::DMatrix;

/// Densities in `[0, 1]`, including the endpoints.
pub fn density() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(1.0), 0.0..=1.0]
}

/// Resolutions of at most `max_cells` elements along each axis.
pub fn resolution(dim: usize, max_cells: usize) -> impl Strategy<Value = Vec<usize>> {
    vec(1..=max_cells, dim)
}

/// Grids with small resolutions, cell sizes in `[0.1, 10]` and arbitrary densities.
pub fn grid<E: ReferenceElement>(max_cells: usize) -> impl Strategy<Value = Grid<E>> {
    let size = vec(0.1..10.0, E::DIM);
    (resolution(E::DIM, max_cells), size)
        .prop_flat_map(|(resolution, size)| {
            let num_elements: usize = resolution.iter().product();
            (Just(resolution), Just(size), vec(density(), num_elements))
        })
        .prop_filter_map("grid construction failed", |(resolution, size, densities)| {
            let mut grid = Grid::new(&resolution, &size).ok()?;
            grid.set_densities(&densities).ok()?;
            Some(grid)
        })
}

/// Symmetric positive definite `n x n` matrices `R^T R + I`, with entries of `R` in `[-1, 1]`.
pub fn spd_matrix(n: usize) -> impl Strategy<Value = DMatrix<f64>> {
    vec(-1.0..=1.0, n * n).prop_map(move |entries| {
        let r = DMatrix::from_vec(n, n, entries);
        r.transpose() * r + DMatrix::identity(n, n)
    })
}
