use super::{macroscopic_potentials, split_scalar_field, Physics, SolvedFields};
use crate::dof::DiffusiveDofs;
use crate::element::ReferenceElement;
use crate::error::Result;
use crate::grid::Grid;
use crate::kernel::{linear_scalar_diffusive_kernel, GradientConvention, ReferenceOperator};
use crate::material::LinearTransportMaterial;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;
use std::marker::PhantomData;

/// Type-level choice of [`GradientConvention`].
pub trait Convention: Debug + Copy + Default + Send + Sync + 'static {
    const CONVENTION: GradientConvention;
}

/// `G = -grad(phi)`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct NegativeGradient;

/// `G = grad(phi)`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PositiveGradient;

impl Convention for NegativeGradient {
    const CONVENTION: GradientConvention = GradientConvention::Negative;
}

impl Convention for PositiveGradient {
    const CONVENTION: GradientConvention = GradientConvention::Positive;
}

/// Steady-state scalar diffusion in `D` dimensions, such as heat conduction or electrostatics.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LinearScalarDiffusive<const D: usize, C = NegativeGradient>(PhantomData<C>);

/// Homogenized transport tensor and potential fields, one per unit macroscopic gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScalarDiffusiveResults {
    pub a_bar: DMatrix<f64>,
    pub phi: Vec<DVector<f64>>,
    pub phi_macro: Vec<DVector<f64>>,
    pub phi_micro: Vec<DVector<f64>>,
}

impl<const D: usize, C: Convention> Physics for LinearScalarDiffusive<D, C> {
    const DIM: usize = D;

    type Material = LinearTransportMaterial;
    type Dofs = DiffusiveDofs;
    type Results = LinearScalarDiffusiveResults;

    fn num_macro_fields() -> usize {
        D
    }

    fn material_dim(material: &Self::Material) -> usize {
        material.dim()
    }

    fn reference_operator<E>(material: &Self::Material, nodes: &DMatrix<f64>) -> Result<ReferenceOperator>
    where
        E: ReferenceElement,
    {
        linear_scalar_diffusive_kernel::<E>(material, C::CONVENTION, nodes)
    }

    fn macroscopic_field<E>(grid: &Grid<E>) -> DMatrix<f64>
    where
        E: ReferenceElement,
    {
        macroscopic_potentials(grid, C::CONVENTION.sign())
    }

    fn make_results(homogenized: DMatrix<f64>, fields: SolvedFields, _num_nodes: usize) -> Self::Results {
        let split = |field: Option<DMatrix<f64>>| field.map(|field| split_scalar_field(&field)).unwrap_or_default();
        LinearScalarDiffusiveResults {
            a_bar: homogenized,
            phi: split(fields.total),
            phi_macro: split(fields.macroscopic),
            phi_micro: split(fields.microscopic),
        }
    }
}
