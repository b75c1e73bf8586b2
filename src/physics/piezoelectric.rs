use super::{
    macroscopic_displacements, macroscopic_potentials, split_scalar_field, split_vector_field, Physics, SolvedFields,
};
use crate::dof::PiezoelectricDofs;
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::grid::Grid;
use crate::kernel::{linear_piezoelectric_kernel, GradientConvention, ReferenceOperator};
use crate::material::{voigt_size, LinearPiezoelectricMaterial};
use nalgebra::{DMatrix, DVector};

/// Linear piezoelectricity in `D` dimensions.
///
/// The unit macroscopic loadings are the `voigt_size(D)` unit strains at zero electric field,
/// followed by the `D` unit electric fields at zero strain.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LinearPiezoelectric<const D: usize>;

/// Homogenized piezoelectric tensors and nodal fields.
///
/// `u*` fields are `num_nodes x D` matrices and `phi*` fields are nodal vectors, one of each per
/// macroscopic loading.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPiezoelectricResults {
    pub c_bar: DMatrix<f64>,
    pub epsilon_bar: DMatrix<f64>,
    pub d_bar: DMatrix<f64>,
    pub u: Vec<DMatrix<f64>>,
    pub u_macro: Vec<DMatrix<f64>>,
    pub u_micro: Vec<DMatrix<f64>>,
    pub phi: Vec<DVector<f64>>,
    pub phi_macro: Vec<DVector<f64>>,
    pub phi_micro: Vec<DVector<f64>>,
}

impl<const D: usize> Physics for LinearPiezoelectric<D> {
    const DIM: usize = D;

    type Material = LinearPiezoelectricMaterial;
    type Dofs = PiezoelectricDofs<D>;
    type Results = LinearPiezoelectricResults;

    fn num_macro_fields() -> usize {
        voigt_size(D) + D
    }

    fn material_dim(material: &Self::Material) -> usize {
        material.dim()
    }

    fn reference_operator<E>(material: &Self::Material, nodes: &DMatrix<f64>) -> Result<ReferenceOperator>
    where
        E: ReferenceElement,
    {
        linear_piezoelectric_kernel::<E>(material, nodes)
    }

    fn macroscopic_field<E>(grid: &Grid<E>) -> DMatrix<f64>
    where
        E: ReferenceElement,
    {
        let displacements = macroscopic_displacements(grid);
        let potentials = macroscopic_potentials(grid, GradientConvention::Negative.sign());
        let mut field = DMatrix::zeros(
            displacements.nrows() + potentials.nrows(),
            displacements.ncols() + potentials.ncols(),
        );
        field
            .view_mut((0, 0), displacements.shape())
            .copy_from(&displacements);
        field
            .view_mut(displacements.shape(), potentials.shape())
            .copy_from(&potentials);
        field
    }

    fn make_results(homogenized: DMatrix<f64>, fields: SolvedFields, num_nodes: usize) -> Self::Results {
        let v = voigt_size(D);
        let num_u_dofs = D * num_nodes;
        let split_u = |field: &Option<DMatrix<f64>>| {
            field
                .as_ref()
                .map(|field| split_vector_field(&field.rows(0, num_u_dofs).into_owned(), num_nodes, D))
                .unwrap_or_default()
        };
        let split_phi = |field: &Option<DMatrix<f64>>| {
            field
                .as_ref()
                .map(|field| split_scalar_field(&field.rows(num_u_dofs, num_nodes).into_owned()))
                .unwrap_or_default()
        };

        LinearPiezoelectricResults {
            c_bar: homogenized.view((0, 0), (v, v)).into_owned(),
            epsilon_bar: -homogenized.view((v, v), (D, D)),
            d_bar: -homogenized.view((v, 0), (D, v)),
            u: split_u(&fields.total),
            u_macro: split_u(&fields.macroscopic),
            u_micro: split_u(&fields.microscopic),
            phi: split_phi(&fields.total),
            phi_macro: split_phi(&fields.macroscopic),
            phi_micro: split_phi(&fields.microscopic),
        }
    }
}
