use super::{
    field_potential_matrix, integrate_matrix, linear_elastic_kernel, linear_scalar_diffusive_kernel,
    strain_displacement_matrix, GradientConvention, ReferenceOperator,
};
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::material::LinearPiezoelectricMaterial;
use crate::util::block_matrix;
use nalgebra::DMatrix;

/// Piezoelectric element operator.
///
/// Displacement dofs come first, followed by the electric potential dofs. The electric part uses
/// [`GradientConvention::Negative`]. With the coupling block `K_pu = int B_p^T d B_u`,
///
/// ```text
/// K = [ K_uu    -K_pu^T ]      F = [ F_uu    F_up  ]
///     [ -K_pu   -K_pp   ]          [ -F_pu   -F_pp ]
/// ```
///
/// where `F_pu = -int B_p^T d` and `F_up = int B_u^T d^T`. The stiffness is symmetric but
/// indefinite.
pub fn linear_piezoelectric_kernel<E>(
    material: &LinearPiezoelectricMaterial,
    nodes: &DMatrix<f64>,
) -> Result<ReferenceOperator>
where
    E: ReferenceElement,
{
    let convention = GradientConvention::Negative;
    let mechanical = linear_elastic_kernel::<E>(material.elastic_material(), nodes)?;
    let electrical = linear_scalar_diffusive_kernel::<E>(material.dielectric_material(), convention, nodes)?;

    let d = material.coupling_tensor();
    let num_u_dofs = E::DIM * E::NUM_NODES;
    let num_phi_dofs = E::NUM_NODES;

    let k_phi_u = integrate_matrix::<E, _>(nodes, (num_phi_dofs, num_u_dofs), |dn_x, det_j| {
        let b_u = strain_displacement_matrix(dn_x);
        let b_phi = field_potential_matrix(dn_x, convention);
        b_phi.transpose() * d * b_u * det_j
    })?;
    let f_phi_u = -integrate_matrix::<E, _>(nodes, (num_phi_dofs, d.ncols()), |dn_x, det_j| {
        field_potential_matrix(dn_x, convention).transpose() * d * det_j
    })?;
    let f_u_phi = integrate_matrix::<E, _>(nodes, (num_u_dofs, E::DIM), |dn_x, det_j| {
        strain_displacement_matrix(dn_x).transpose() * d.transpose() * det_j
    })?;

    let stiffness = block_matrix(
        &mechanical.stiffness,
        &(-k_phi_u.transpose()),
        &(-&k_phi_u),
        &(-&electrical.stiffness),
    );
    let source = block_matrix(&mechanical.source, &f_u_phi, &(-&f_phi_u), &(-&electrical.source));

    Ok(ReferenceOperator { stiffness, source })
}
