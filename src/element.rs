//! Isoparametric reference elements on `[-1, 1]^d`.
//!
//! Element types are zero-sized markers: all data is given by the reference geometry, and the
//! physical geometry of an element is supplied separately as a `NUM_NODES x DIM` matrix of node
//! coordinates (one node per row).
use crate::error::InvalidGeometry;
use crate::quadrature::QuadratureRule;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

mod hexahedron;
mod quadrilateral;

pub use hexahedron::*;
pub use quadrilateral::*;

pub trait ReferenceElement: Debug + Copy + Default + Send + Sync + 'static {
    /// Spatial dimension of the element.
    const DIM: usize;
    const NUM_NODES: usize;
    /// Human-readable name, e.g. `"Quad4"`.
    const NAME: &'static str;

    /// Coordinates of the nodes in the reference domain, one node per row.
    fn reference_nodes() -> DMatrix<f64>;

    /// Evaluates all basis functions at the reference coordinate `xi`.
    fn basis(xi: &[f64]) -> DVector<f64>;

    /// Evaluates the reference gradients, as a `DIM x NUM_NODES` matrix.
    fn gradients(xi: &[f64]) -> DMatrix<f64>;

    /// Quadrature rule used to integrate element operators.
    fn quadrature() -> QuadratureRule;

    /// The Jacobian `J = dN * X` of the reference map, with entries `J_ij = dx_j / dxi_i`.
    fn jacobian(xi: &[f64], nodes: &DMatrix<f64>) -> DMatrix<f64> {
        Self::gradients(xi) * nodes
    }

    /// Maps reference coordinates to physical coordinates.
    fn map_reference_coords(xi: &[f64], nodes: &DMatrix<f64>) -> DVector<f64> {
        nodes.tr_mul(&Self::basis(xi))
    }

    /// Area (2D) or volume (3D) of the element with the given nodes.
    fn measure(nodes: &DMatrix<f64>) -> f64 {
        Self::quadrature().integrate(|xi| Self::jacobian(xi, nodes).determinant().abs())
    }

    /// Gradients with respect to physical coordinates together with `det J`.
    ///
    /// Returns an error if the element is degenerate (`det J = 0`) or inverted (`det J < 0`) at
    /// `xi`.
    fn physical_gradients(xi: &[f64], nodes: &DMatrix<f64>) -> Result<(DMatrix<f64>, f64), InvalidGeometry> {
        let dn = Self::gradients(xi);
        let j = &dn * nodes;
        let det = j.determinant();
        if det == 0.0 {
            return Err(InvalidGeometry::Degenerate);
        } else if det < 0.0 {
            return Err(InvalidGeometry::Inverted);
        }
        let j_inv = j.try_inverse().ok_or(InvalidGeometry::Degenerate)?;
        Ok((j_inv * dn, det))
    }
}
