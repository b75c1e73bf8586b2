use super::{check_material_dim, check_nodes, integrate_matrix, ReferenceOperator};
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::material::LinearTransportMaterial;
use crate::util::symmetrize;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Sign relating the physical field `G` to the potential gradient.
///
/// With `Negative`, `G = -grad(phi)`, as for the electric field. With `Positive`, `G = grad(phi)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientConvention {
    Negative,
    Positive,
}

impl GradientConvention {
    pub fn sign(&self) -> f64 {
        match self {
            Self::Negative => -1.0,
            Self::Positive => 1.0,
        }
    }
}

/// Field-potential matrix `B = s dN_x` for the convention with sign `s`.
pub fn field_potential_matrix(dn_x: &DMatrix<f64>, convention: GradientConvention) -> DMatrix<f64> {
    convention.sign() * dn_x
}

/// Scalar diffusion element operator.
///
/// `K = sym(int B^T A B)` and `F = -int B^T A`, with `A` the transport tensor.
pub fn linear_scalar_diffusive_kernel<E>(
    material: &LinearTransportMaterial,
    convention: GradientConvention,
    nodes: &DMatrix<f64>,
) -> Result<ReferenceOperator>
where
    E: ReferenceElement,
{
    check_nodes::<E>(nodes)?;
    check_material_dim::<E>(material.dim())?;
    let a = material.material_tensor();

    let stiffness = integrate_matrix::<E, _>(nodes, (E::NUM_NODES, E::NUM_NODES), |dn_x, det_j| {
        let b = field_potential_matrix(dn_x, convention);
        b.transpose() * a * b * det_j
    })?;
    let source = integrate_matrix::<E, _>(nodes, (E::NUM_NODES, E::DIM), |dn_x, det_j| {
        field_potential_matrix(dn_x, convention).transpose() * a * det_j
    })?;

    Ok(ReferenceOperator {
        stiffness: symmetrize(&stiffness),
        source: -source,
    })
}
