//! The periodic cell solver.
//!
//! For every unit macroscopic loading, the total field is split into a prescribed macroscopic part
//! and a periodic microscopic correction. The correction solves the reduced system `K x = F`, and
//! the homogenized tensor follows from the energy average of the total fields,
//!
//! ```text
//! M = 1/V sum_e rho_e X_e^T K_ref X_e,
//! ```
//!
//! which is symmetrized at the end.
use crate::dof::DofTraits;
use crate::element::ReferenceElement;
use crate::error::{ConvergenceFailureReason, HomogenizationError, Result};
use crate::grid::Grid;
use crate::kernel::ReferenceOperator;
use crate::krylov::cg::CgWorkspace;
use crate::krylov::{BiConjugateGradientStabilized, ConjugateGradient, RelativeResidualCriterion, SolveError};
use crate::operator::{MatrixFreeOperator, MIN_ELEMENTS_PER_TASK};
use crate::physics::{
    LinearElastic, LinearPiezoelectric, LinearScalarDiffusive, NegativeGradient, Physics, SolvedFields,
};
use crate::preconditioner::JacobiPreconditioner;
use crate::util::symmetrize;
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};
use std::time::Instant;

/// Set of nodal fields to keep in the results.
///
/// Flags combine with `|`. The `&` operator intersects two sets, so `a & b` is non-empty exactly
/// when the sets share a field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FieldSave(u8);

impl FieldSave {
    pub const NONE: Self = Self(0);
    pub const TOTAL: Self = Self(1);
    pub const MACRO: Self = Self(2);
    pub const MICRO: Self = Self(4);
    pub const ALL: Self = Self(7);

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether the two sets have at least one field in common.
    pub fn intersects(&self, other: Self) -> bool {
        !(*self & other).is_empty()
    }

    /// Whether all fields of `other` are in `self`.
    pub fn contains(&self, other: Self) -> bool {
        *self & other == other
    }
}

impl TryFrom<u8> for FieldSave {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_bits(bits)
            .ok_or_else(|| format!("Invalid field flags {bits:#04x}, allowed bits are {:#04x}.", Self::ALL.0))
    }
}

impl From<FieldSave> for u8 {
    fn from(fields: FieldSave) -> u8 {
        fields.0
    }
}

impl BitOr for FieldSave {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FieldSave {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FieldSave {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for FieldSave {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum number of Krylov iterations per macroscopic loading.
    pub max_iterations: usize,
    /// Relative residual tolerance `|r| <= tol |b|`.
    pub tolerance: f64,
    pub fields: FieldSave,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            fields: FieldSave::NONE,
        }
    }
}

impl SolverOptions {
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self { max_iterations, ..self }
    }

    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }

    pub fn with_fields(self, fields: FieldSave) -> Self {
        Self { fields, ..self }
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(HomogenizationError::invalid_configuration(
                "Maximum number of iterations must be positive.",
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Tolerance ({}) must be positive.",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Homogenizes a material distribution on a grid.
///
/// The reference operator is computed once on construction, from the first element of the grid.
/// Densities are read at solve time, so the grid may not be modified while the solver exists.
#[derive(Debug)]
pub struct PeriodicCellSolver<'g, E, P: Physics> {
    grid: &'g Grid<E>,
    material: P::Material,
    reference: ReferenceOperator,
    marker: PhantomData<P>,
}

impl<'g, E, P> PeriodicCellSolver<'g, E, P>
where
    E: ReferenceElement,
    P: Physics,
{
    pub fn new(grid: &'g Grid<E>, material: P::Material) -> Result<Self> {
        if P::DIM != E::DIM {
            return Err(HomogenizationError::invalid_configuration(format!(
                "{}-dimensional physics cannot be used with {} elements.",
                P::DIM,
                E::NAME
            )));
        }
        if P::material_dim(&material) != E::DIM {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Spatial dimension of material ({}) and grid ({}) must be equal.",
                P::material_dim(&material),
                E::DIM
            )));
        }
        let reference = P::reference_operator::<E>(&material, &grid.element_nodes(0))?;
        Ok(Self {
            grid,
            material,
            reference,
            marker: PhantomData,
        })
    }

    pub fn grid(&self) -> &Grid<E> {
        self.grid
    }

    pub fn material(&self) -> &P::Material {
        &self.material
    }

    pub fn reference_operator(&self) -> &ReferenceOperator {
        &self.reference
    }

    pub fn solve(&self, options: &SolverOptions) -> Result<P::Results> {
        options.validate()?;
        let grid = self.grid;
        let timer = Instant::now();
        info!(
            "Homogenizing {} elements ({}) with {} macroscopic loadings",
            grid.num_elements(),
            E::NAME,
            P::num_macro_fields()
        );

        let macroscopic = P::macroscopic_field(grid);
        let operator = MatrixFreeOperator::new::<P::Dofs, E>(grid, &self.reference.stiffness)?;
        debug!(
            "Reduced system has {} dofs (symmetric: {}, positive semi-definite: {})",
            operator.nrows(),
            operator.is_symmetric(),
            operator.is_psd()
        );

        let rhs = reduced_rhs(&operator, &self.reference.source);
        let reduced_solution = solve_reduced(&operator, &rhs, options)?;
        let microscopic = expand_reduced::<P::Dofs, E>(grid, &reduced_solution);
        let total = &macroscopic + &microscopic;

        let homogenized = homogenize::<P::Dofs, E>(grid, &self.reference.stiffness, &total);
        debug!("Homogenized tensor: {}", homogenized);
        info!("Homogenization finished in {:.3} s", timer.elapsed().as_secs_f64());

        let save = options.fields;
        let fields = SolvedFields {
            total: save.intersects(FieldSave::TOTAL).then_some(total),
            macroscopic: save.intersects(FieldSave::MACRO).then_some(macroscopic),
            microscopic: save.intersects(FieldSave::MICRO).then_some(microscopic),
        };
        Ok(P::make_results(homogenized, fields, grid.num_nodes()))
    }
}

pub type LinearElasticSolver<'g, E, const D: usize> = PeriodicCellSolver<'g, E, LinearElastic<D>>;
pub type LinearScalarDiffusiveSolver<'g, E, const D: usize, C = NegativeGradient> =
    PeriodicCellSolver<'g, E, LinearScalarDiffusive<D, C>>;
pub type LinearDielectricSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearElectricalConductiveSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearMagneticSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearMassDiffusiveSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearPorousSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearThermalConductiveSolver<'g, E, const D: usize> = LinearScalarDiffusiveSolver<'g, E, D>;
pub type LinearPiezoelectricSolver<'g, E, const D: usize> = PeriodicCellSolver<'g, E, LinearPiezoelectric<D>>;

/// Accumulates the density-scaled reference source into the reduced space.
///
/// Returns a matrix with one row per reduced dof and one column per macroscopic loading.
pub fn reduced_rhs(operator: &MatrixFreeOperator, reference_source: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, m) = (operator.nrows(), reference_source.ncols());
    operator
        .par_elements()
        .fold(
            || DMatrix::zeros(n, m),
            |mut rhs: DMatrix<f64>, (dofs, density)| {
                for (local, dof) in dofs.iter().enumerate() {
                    if let Some(dof) = dof {
                        let mut row = rhs.row_mut(*dof);
                        row += reference_source.row(local) * density;
                    }
                }
                rhs
            },
        )
        .reduce(|| DMatrix::zeros(n, m), |a, b| a + b)
}

fn convergence_failure(column: usize, error: SolveError<f64>) -> HomogenizationError {
    let reason = if error.kind.is_max_iterations_reached() {
        ConvergenceFailureReason::NoConvergence
    } else {
        ConvergenceFailureReason::NumericalIssue
    };
    HomogenizationError::ConvergenceFailure {
        reason,
        column,
        iterations: error.output.num_iterations,
    }
}

/// Solves `K x = b` for every column of `rhs`, starting from a zero guess.
///
/// A symmetric operator is solved with Jacobi-preconditioned conjugate gradients, which are also
/// applied when the operator is indefinite. Other operators fall back to BiCGSTAB.
pub fn solve_reduced(operator: &MatrixFreeOperator, rhs: &DMatrix<f64>, options: &SolverOptions) -> Result<DMatrix<f64>> {
    let preconditioner = JacobiPreconditioner::compute(operator);
    let criterion = RelativeResidualCriterion::new(options.tolerance);
    let mut solution = DMatrix::zeros(rhs.nrows(), rhs.ncols());

    if operator.is_symmetric() {
        let mut workspace = CgWorkspace::default();
        for column in 0..rhs.ncols() {
            let cg = ConjugateGradient::with_workspace(&mut workspace)
                .with_operator(operator)
                .with_preconditioner(&preconditioner)
                .with_stopping_criterion(criterion)
                .with_max_iter(options.max_iterations);
            let mut cg = if operator.is_psd() { cg } else { cg.allow_indefinite() };
            let output = cg
                .solve_with_guess(rhs.column(column), solution.column_mut(column))
                .map_err(|error| convergence_failure(column, error))?;
            debug!("Column {} converged after {} CG iterations", column, output.num_iterations);
        }
    } else {
        warn!("Operator is not symmetric, falling back to BiCGSTAB");
        for column in 0..rhs.ncols() {
            let output = BiConjugateGradientStabilized::new()
                .with_operator(operator)
                .with_preconditioner(&preconditioner)
                .with_stopping_criterion(criterion)
                .with_max_iter(options.max_iterations)
                .solve_with_guess(rhs.column(column), solution.column_mut(column))
                .map_err(|error| convergence_failure(column, error))?;
            debug!(
                "Column {} converged after {} BiCGSTAB iterations",
                column, output.num_iterations
            );
        }
    }
    Ok(solution)
}

/// Maps a reduced solution to the global dofs of the grid.
///
/// Fixed dofs are zero. Global dofs that share a periodic node receive identical values.
pub fn expand_reduced<Dofs, E>(grid: &Grid<E>, reduced: &DMatrix<f64>) -> DMatrix<f64>
where
    Dofs: DofTraits,
    E: ReferenceElement,
{
    let num_periodic_nodes = grid.num_periodic_nodes();
    let mut periodic = DMatrix::zeros(Dofs::num_dofs(num_periodic_nodes), reduced.ncols());
    for (reduced_dof, row) in reduced.row_iter().enumerate() {
        periodic
            .row_mut(Dofs::expanded_dof(reduced_dof, num_periodic_nodes))
            .copy_from(&row);
    }

    let num_nodes = grid.num_nodes();
    let mut global = DMatrix::zeros(Dofs::num_dofs(num_nodes), reduced.ncols());
    let mut global_dofs = Vec::new();
    let mut periodic_dofs = Vec::new();
    for (nodes, periodic_nodes) in grid.elements().zip(grid.periodic_elements()) {
        global_dofs.clear();
        periodic_dofs.clear();
        Dofs::populate_dofs(&nodes, num_nodes, &mut global_dofs);
        Dofs::populate_dofs(&periodic_nodes, num_periodic_nodes, &mut periodic_dofs);
        for (&g, &p) in global_dofs.iter().zip(&periodic_dofs) {
            global.row_mut(g).copy_from(&periodic.row(p));
        }
    }
    global
}

struct HomogenizationState {
    accumulated: DMatrix<f64>,
    nodes: Vec<usize>,
    dofs: Vec<usize>,
    local_field: DMatrix<f64>,
}

/// Computes `sym(1/V sum_e rho_e X_e^T K_ref X_e)` for global nodal fields `X`.
pub fn homogenize<Dofs, E>(grid: &Grid<E>, reference_stiffness: &DMatrix<f64>, field: &DMatrix<f64>) -> DMatrix<f64>
where
    Dofs: DofTraits,
    E: ReferenceElement,
{
    let m = field.ncols();
    let num_nodes = grid.num_nodes();
    let num_local_dofs = reference_stiffness.nrows();
    let densities = grid.densities();

    let sum = (0..grid.num_elements())
        .into_par_iter()
        .with_min_len(MIN_ELEMENTS_PER_TASK)
        .fold(
            || HomogenizationState {
                accumulated: DMatrix::zeros(m, m),
                nodes: vec![0; E::NUM_NODES],
                dofs: Vec::with_capacity(num_local_dofs),
                local_field: DMatrix::zeros(num_local_dofs, m),
            },
            |mut state, element| {
                grid.populate_element(element, &mut state.nodes);
                state.dofs.clear();
                Dofs::populate_dofs(&state.nodes, num_nodes, &mut state.dofs);
                for (local, &dof) in state.dofs.iter().enumerate() {
                    state.local_field.row_mut(local).copy_from(&field.row(dof));
                }
                let x_e = &state.local_field;
                state.accumulated += densities[element] * x_e.transpose() * reference_stiffness * x_e;
                state
            },
        )
        .map(|state| state.accumulated)
        .reduce(|| DMatrix::zeros(m, m), |a, b| a + b);

    symmetrize(&(sum / grid.measure()))
}
