//! Physical models that can be homogenized by a [`PeriodicCellSolver`](crate::solver::PeriodicCellSolver).
//!
//! A [`Physics`] ties together a material model, the dof layout of its field, the element kernel,
//! the unit macroscopic fields and the shape of the final results.
use crate::dof::DofTraits;
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::grid::Grid;
use crate::kernel::ReferenceOperator;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

mod diffusive;
mod elastic;
mod piezoelectric;

pub use diffusive::*;
pub use elastic::*;
pub use piezoelectric::*;

/// Nodal fields in the global dof space, one column per macroscopic loading.
///
/// Fields that were not requested are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolvedFields {
    pub total: Option<DMatrix<f64>>,
    pub macroscopic: Option<DMatrix<f64>>,
    pub microscopic: Option<DMatrix<f64>>,
}

pub trait Physics: Send + Sync + 'static {
    /// Spatial dimension of the model.
    const DIM: usize;

    type Material: Clone + Debug + Sync;
    type Dofs: DofTraits;
    type Results;

    /// Number of independent unit macroscopic loadings.
    fn num_macro_fields() -> usize;

    fn material_dim(material: &Self::Material) -> usize;

    /// Reference stiffness and source matrices of a unit density element.
    fn reference_operator<E>(material: &Self::Material, nodes: &DMatrix<f64>) -> Result<ReferenceOperator>
    where
        E: ReferenceElement;

    /// The unit macroscopic fields, evaluated at the global nodes.
    ///
    /// Returns a matrix with one row per global dof and one column per macroscopic loading.
    fn macroscopic_field<E>(grid: &Grid<E>) -> DMatrix<f64>
    where
        E: ReferenceElement;

    /// Packages the homogenized tensor and the requested nodal fields.
    fn make_results(homogenized: DMatrix<f64>, fields: SolvedFields, num_nodes: usize) -> Self::Results;
}

/// Unit macroscopic strains as displacements `u = eps x`, with dofs interleaved per node.
///
/// Columns follow Voigt order. For an engineering shear strain in the `(a, b)` plane, the
/// displacement is split symmetrically: `u_a = x_b / 2`, `u_b = x_a / 2`.
pub(crate) fn macroscopic_displacements<E: ReferenceElement>(grid: &Grid<E>) -> DMatrix<f64> {
    let dim = E::DIM;
    let shear_pairs = crate::material::voigt_shear_pairs(dim);
    let mut field = DMatrix::zeros(dim * grid.num_nodes(), dim + shear_pairs.len());
    for node in 0..grid.num_nodes() {
        let x = grid.node(node);
        for axis in 0..dim {
            field[(dim * node + axis, axis)] = x[axis];
        }
        for (column, &(a, b)) in shear_pairs.iter().enumerate() {
            field[(dim * node + a, dim + column)] = 0.5 * x[b];
            field[(dim * node + b, dim + column)] = 0.5 * x[a];
        }
    }
    field
}

/// Unit macroscopic gradients as potentials `phi = s x_j` for the gradient sign `s`.
pub(crate) fn macroscopic_potentials<E: ReferenceElement>(grid: &Grid<E>, sign: f64) -> DMatrix<f64> {
    let mut field = DMatrix::zeros(grid.num_nodes(), E::DIM);
    for node in 0..grid.num_nodes() {
        let x = grid.node(node);
        for axis in 0..E::DIM {
            field[(node, axis)] = sign * x[axis];
        }
    }
    field
}

/// Splits every column of interleaved nodal vectors into a `num_nodes x dim` matrix.
pub(crate) fn split_vector_field(field: &DMatrix<f64>, num_nodes: usize, dim: usize) -> Vec<DMatrix<f64>> {
    field
        .column_iter()
        .map(|column| DMatrix::from_fn(num_nodes, dim, |node, axis| column[dim * node + axis]))
        .collect()
}

pub(crate) fn split_scalar_field(field: &DMatrix<f64>) -> Vec<DVector<f64>> {
    field
        .column_iter()
        .map(|column| column.clone_owned())
        .collect()
}
