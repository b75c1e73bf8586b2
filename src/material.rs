//! Linear constitutive models.
//!
//! Tensors are stored in Voigt notation where applicable, with the normal components first,
//! followed by the shear components `12` (2D) or `12, 13, 23` (3D). Shear strains are
//! engineering strains.
use crate::element::ReferenceElement;
use crate::error::{HomogenizationError, Result};
use crate::grid::Grid;
use crate::util::{arithmetic_mean, block_matrix, harmonic_mean, is_pd};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Number of Voigt components of a symmetric tensor in the given dimension.
pub fn voigt_size(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Axis pairs `(a, b)` of the shear components, in Voigt order.
pub fn voigt_shear_pairs(dim: usize) -> &'static [(usize, usize)] {
    match dim {
        2 => &[(0, 1)],
        3 => &[(0, 1), (0, 2), (1, 2)],
        _ => &[],
    }
}

fn dim_from_voigt_size(voigt_size: usize) -> Option<usize> {
    match voigt_size {
        3 => Some(2),
        6 => Some(3),
        _ => None,
    }
}

/// Isotropic elastic parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YoungPoisson {
    pub young: f64,
    pub poisson: f64,
}

impl YoungPoisson {
    fn validate(&self) -> Result<()> {
        let &Self { young, poisson } = self;
        if !(young > 0.0) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "E ({}) must be positive.",
                young
            )));
        }
        if !(poisson > -1.0 && poisson < 0.5) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "nu ({}) must be in range (-1,0.5).",
                poisson
            )));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaneCondition {
    PlaneStress,
    PlaneStrain,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinearElasticMaterial {
    c: DMatrix<f64>,
}

impl LinearElasticMaterial {
    /// Creates a material from a stiffness tensor in Voigt notation.
    ///
    /// The tensor must be `3 x 3` (2D) or `6 x 6` (3D) and positive definite.
    pub fn from_tensor(c: DMatrix<f64>) -> Result<Self> {
        if !c.is_square() || dim_from_voigt_size(c.nrows()).is_none() {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Stiffness tensor must be 3x3 or 6x6, got {}x{}.",
                c.nrows(),
                c.ncols()
            )));
        }
        if !is_pd(&c) {
            return Err(HomogenizationError::invalid_configuration(
                "Stiffness tensor is not positive definite.",
            ));
        }
        Ok(Self { c })
    }

    #[rustfmt::skip]
    pub fn isotropic_2d(parameters: YoungPoisson, condition: PlaneCondition) -> Result<Self> {
        parameters.validate()?;
        let YoungPoisson { young: e, poisson: nu } = parameters;
        let c = match condition {
            PlaneCondition::PlaneStress => {
                e / (1.0 - nu * nu) * DMatrix::from_row_slice(3, 3, &[
                    1.0, nu,  0.0,
                    nu,  1.0, 0.0,
                    0.0, 0.0, (1.0 - nu) / 2.0,
                ])
            }
            PlaneCondition::PlaneStrain => {
                e / ((1.0 + nu) * (1.0 - 2.0 * nu)) * DMatrix::from_row_slice(3, 3, &[
                    1.0 - nu, nu,       0.0,
                    nu,       1.0 - nu, 0.0,
                    0.0,      0.0,      (1.0 - 2.0 * nu) / 2.0,
                ])
            }
        };
        Ok(Self { c })
    }

    pub fn isotropic_3d(parameters: YoungPoisson) -> Result<Self> {
        parameters.validate()?;
        let YoungPoisson { young: e, poisson: nu } = parameters;
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = e / (2.0 * (1.0 + nu));

        let mut c = DMatrix::zeros(6, 6);
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = lambda;
            }
            c[(i, i)] = lambda + 2.0 * mu;
            c[(i + 3, i + 3)] = mu;
        }
        Ok(Self { c })
    }

    pub fn dim(&self) -> usize {
        // The size is validated on construction
        dim_from_voigt_size(self.c.nrows()).unwrap_or(0)
    }

    pub fn voigt_size(&self) -> usize {
        self.c.nrows()
    }

    pub fn material_tensor(&self) -> &DMatrix<f64> {
        &self.c
    }

    /// Upper (Voigt) bound: the arithmetic mean of the densities times the stiffness.
    pub fn voigt<E: ReferenceElement>(&self, grid: &Grid<E>) -> DMatrix<f64> {
        arithmetic_mean(grid.densities()) * &self.c
    }

    /// Lower (Reuss) bound: the harmonic mean of the densities times the stiffness.
    pub fn reuss<E: ReferenceElement>(&self, grid: &Grid<E>) -> Result<DMatrix<f64>> {
        Ok(harmonic_mean(grid.densities())? * &self.c)
    }
}

/// A linear transport law `q = -K grad(phi)`, such as heat conduction or dielectric response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinearTransportMaterial {
    k: DMatrix<f64>,
}

pub type LinearDielectricMaterial = LinearTransportMaterial;
pub type LinearElectricalConductiveMaterial = LinearTransportMaterial;
pub type LinearMagneticMaterial = LinearTransportMaterial;
pub type LinearMassDiffusiveMaterial = LinearTransportMaterial;
pub type LinearPorousMaterial = LinearTransportMaterial;
pub type LinearThermalConductiveMaterial = LinearTransportMaterial;

impl LinearTransportMaterial {
    /// The tensor must be `2 x 2` or `3 x 3` and positive definite.
    pub fn from_tensor(k: DMatrix<f64>) -> Result<Self> {
        if !k.is_square() || !(k.nrows() == 2 || k.nrows() == 3) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Transport tensor must be 2x2 or 3x3, got {}x{}.",
                k.nrows(),
                k.ncols()
            )));
        }
        if !is_pd(&k) {
            return Err(HomogenizationError::invalid_configuration(
                "Transport tensor is not positive definite.",
            ));
        }
        Ok(Self { k })
    }

    /// `K = k I`.
    pub fn isotropic(dim: usize, k: f64) -> Result<Self> {
        if !(k > 0.0) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "K ({}) must be positive.",
                k
            )));
        }
        Self::from_tensor(k * DMatrix::identity(dim, dim))
    }

    pub fn dim(&self) -> usize {
        self.k.nrows()
    }

    pub fn material_tensor(&self) -> &DMatrix<f64> {
        &self.k
    }

    pub fn voigt<E: ReferenceElement>(&self, grid: &Grid<E>) -> DMatrix<f64> {
        arithmetic_mean(grid.densities()) * &self.k
    }

    pub fn reuss<E: ReferenceElement>(&self, grid: &Grid<E>) -> Result<DMatrix<f64>> {
        Ok(harmonic_mean(grid.densities())? * &self.k)
    }
}

/// Linear piezoelectricity in stress-charge form.
///
/// The coupled constitutive operator maps `(strain, -E)` to `(stress, -D)`:
///
/// ```text
/// [ c   -d^T ]
/// [ -d  -eps ]
/// ```
///
/// with the coupling tensor `d` of size `dim x voigt_size`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinearPiezoelectricMaterial {
    elastic: LinearElasticMaterial,
    dielectric: LinearDielectricMaterial,
    d: DMatrix<f64>,
    operator: DMatrix<f64>,
}

impl LinearPiezoelectricMaterial {
    pub fn new(elastic: LinearElasticMaterial, dielectric: LinearDielectricMaterial, d: DMatrix<f64>) -> Result<Self> {
        let dim = elastic.dim();
        if dielectric.dim() != dim {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Spatial dimension of materials must be equal, got {} and {}.",
                dim,
                dielectric.dim()
            )));
        }
        if d.shape() != (dim, elastic.voigt_size()) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Coupling tensor must be {}x{}, got {}x{}.",
                dim,
                elastic.voigt_size(),
                d.nrows(),
                d.ncols()
            )));
        }

        let c = elastic.material_tensor();
        let epsilon = dielectric.material_tensor();
        let epsilon_inv = epsilon.clone().try_inverse().ok_or_else(|| {
            HomogenizationError::invalid_configuration("Dielectric tensor is not invertible.")
        })?;

        // Schur complement, positive definite for a thermodynamically stable material
        let schur = c - d.transpose() * epsilon_inv * &d;
        if !is_pd(&crate::util::symmetrize(&schur)) {
            return Err(HomogenizationError::invalid_configuration(
                "Schur complement is not positive definite.",
            ));
        }

        let operator = block_matrix(c, &(-d.transpose()), &(-&d), &(-epsilon));
        Ok(Self {
            elastic,
            dielectric,
            d,
            operator,
        })
    }

    pub fn dim(&self) -> usize {
        self.elastic.dim()
    }

    pub fn elastic_material(&self) -> &LinearElasticMaterial {
        &self.elastic
    }

    pub fn dielectric_material(&self) -> &LinearDielectricMaterial {
        &self.dielectric
    }

    pub fn coupling_tensor(&self) -> &DMatrix<f64> {
        &self.d
    }

    /// The coupled operator of size `(voigt_size + dim)^2`.
    pub fn material_tensor(&self) -> &DMatrix<f64> {
        &self.operator
    }
}
