//! Element kernels: reference stiffness and source matrices for a single element at unit density.
//!
//! Every kernel integrates over the element with the quadrature rule of the element type and
//! rejects elements whose Jacobian determinant is zero or negative at any quadrature point.
//!
//! The *source* matrix `F` has one column per macroscopic loading direction. Its columns are the
//! generalized forces `-K x_macro` produced by the corresponding unit macroscopic loading, so that
//! the microscopic correction solves `K x_micro = F`.
use crate::element::ReferenceElement;
use crate::error::{HomogenizationError, Result};
use nalgebra::DMatrix;

mod diffusive;
mod elastic;
mod piezoelectric;

pub use diffusive::*;
pub use elastic::*;
pub use piezoelectric::*;

/// Stiffness and source matrices of the reference element at unit density.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOperator {
    pub stiffness: DMatrix<f64>,
    pub source: DMatrix<f64>,
}

/// Sums `w * integrand(dN_x, det J)` over the quadrature points of `E`.
///
/// `dN_x` is the `DIM x NUM_NODES` matrix of physical basis gradients.
fn integrate_matrix<E, F>(nodes: &DMatrix<f64>, shape: (usize, usize), mut integrand: F) -> Result<DMatrix<f64>>
where
    E: ReferenceElement,
    F: FnMut(&DMatrix<f64>, f64) -> DMatrix<f64>,
{
    let mut result = DMatrix::zeros(shape.0, shape.1);
    for (w, xi) in E::quadrature().iter() {
        let (dn_x, det_j) = E::physical_gradients(xi, nodes)?;
        result += w * integrand(&dn_x, det_j);
    }
    Ok(result)
}

fn check_nodes<E: ReferenceElement>(nodes: &DMatrix<f64>) -> Result<()> {
    if nodes.shape() != (E::NUM_NODES, E::DIM) {
        return Err(HomogenizationError::invalid_configuration(format!(
            "{} element nodes must be a {}x{} matrix, got {}x{}.",
            E::NAME,
            E::NUM_NODES,
            E::DIM,
            nodes.nrows(),
            nodes.ncols()
        )));
    }
    Ok(())
}

fn check_material_dim<E: ReferenceElement>(material_dim: usize) -> Result<()> {
    if material_dim != E::DIM {
        return Err(HomogenizationError::invalid_configuration(format!(
            "Material dimension ({}) does not match element dimension ({}).",
            material_dim,
            E::DIM
        )));
    }
    Ok(())
}
