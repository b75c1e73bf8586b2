use super::{check_material_dim, check_nodes, integrate_matrix, ReferenceOperator};
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::material::{voigt_shear_pairs, voigt_size, LinearElasticMaterial};
use crate::util::symmetrize;
use nalgebra::DMatrix;

/// The `voigt_size x (dim * num_nodes)` strain-displacement matrix.
///
/// Displacement dofs are interleaved per node, `[u_0, v_0, (w_0), u_1, ...]`.
pub fn strain_displacement_matrix(dn_x: &DMatrix<f64>) -> DMatrix<f64> {
    let (dim, num_nodes) = dn_x.shape();
    let mut b = DMatrix::zeros(voigt_size(dim), dim * num_nodes);
    for node in 0..num_nodes {
        for axis in 0..dim {
            b[(axis, dim * node + axis)] = dn_x[(axis, node)];
        }
        for (row, &(a, c)) in voigt_shear_pairs(dim).iter().enumerate() {
            b[(dim + row, dim * node + a)] = dn_x[(c, node)];
            b[(dim + row, dim * node + c)] = dn_x[(a, node)];
        }
    }
    b
}

/// Linear elastic element operator.
///
/// `K = sym(int B^T C B)` and `F = -int B^T C`.
pub fn linear_elastic_kernel<E>(material: &LinearElasticMaterial, nodes: &DMatrix<f64>) -> Result<ReferenceOperator>
where
    E: ReferenceElement,
{
    check_nodes::<E>(nodes)?;
    check_material_dim::<E>(material.dim())?;
    let c = material.material_tensor();
    let num_dofs = E::DIM * E::NUM_NODES;

    let stiffness = integrate_matrix::<E, _>(nodes, (num_dofs, num_dofs), |dn_x, det_j| {
        let b = strain_displacement_matrix(dn_x);
        b.transpose() * c * b * det_j
    })?;
    let source = integrate_matrix::<E, _>(nodes, (num_dofs, c.ncols()), |dn_x, det_j| {
        strain_displacement_matrix(dn_x).transpose() * c * det_j
    })?;

    Ok(ReferenceOperator {
        stiffness: symmetrize(&stiffness),
        source: -source,
    })
}
