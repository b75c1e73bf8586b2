use super::{macroscopic_displacements, split_vector_field, Physics, SolvedFields};
use crate::dof::ElasticDofs;
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::grid::Grid;
use crate::kernel::{linear_elastic_kernel, ReferenceOperator};
use crate::material::{voigt_size, LinearElasticMaterial};
use nalgebra::DMatrix;

/// Linear elasticity in `D` dimensions.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LinearElastic<const D: usize>;

/// Homogenized stiffness and displacement fields.
///
/// Each displacement field is a `num_nodes x D` matrix, one per unit macroscopic strain in Voigt
/// order. Fields that were not requested are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearElasticResults {
    pub c_bar: DMatrix<f64>,
    pub u: Vec<DMatrix<f64>>,
    pub u_macro: Vec<DMatrix<f64>>,
    pub u_micro: Vec<DMatrix<f64>>,
}

impl<const D: usize> Physics for LinearElastic<D> {
    const DIM: usize = D;

    type Material = LinearElasticMaterial;
    type Dofs = ElasticDofs<D>;
    type Results = LinearElasticResults;

    fn num_macro_fields() -> usize {
        voigt_size(D)
    }

    fn material_dim(material: &Self::Material) -> usize {
        material.dim()
    }

    fn reference_operator<E>(material: &Self::Material, nodes: &DMatrix<f64>) -> Result<ReferenceOperator>
    where
        E: ReferenceElement,
    {
        linear_elastic_kernel::<E>(material, nodes)
    }

    fn macroscopic_field<E>(grid: &Grid<E>) -> DMatrix<f64>
    where
        E: ReferenceElement,
    {
        macroscopic_displacements(grid)
    }

    fn make_results(homogenized: DMatrix<f64>, fields: SolvedFields, num_nodes: usize) -> Self::Results {
        let split = |field: Option<DMatrix<f64>>| {
            field
                .map(|field| split_vector_field(&field, num_nodes, D))
                .unwrap_or_default()
        };
        LinearElasticResults {
            c_bar: homogenized,
            u: split(fields.total),
            u_macro: split(fields.macroscopic),
            u_micro: split(fields.microscopic),
        }
    }
}
