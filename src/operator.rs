//! Matrix-free action of the reduced periodic stiffness operator.
use crate::dof::DofTraits;
use crate::element::ReferenceElement;
use crate::error::{HomogenizationError, Result};
use crate::grid::Grid;
use crate::krylov::LinearOperator;
use crate::util::{is_psd, is_symmetric};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use std::cell::RefCell;
use std::error::Error;
use thread_local::ThreadLocal;

/// Minimum number of elements processed by a single rayon task.
pub(crate) const MIN_ELEMENTS_PER_TASK: usize = 64;

#[derive(Debug)]
struct ElementWorkspace {
    local_x: DVector<f64>,
    local_y: DVector<f64>,
}

impl Default for ElementWorkspace {
    fn default() -> Self {
        Self {
            local_x: DVector::zeros(0),
            local_y: DVector::zeros(0),
        }
    }
}

/// The global stiffness operator in the reduced dof space, `y = K x`, never assembled.
///
/// All elements share the same reference stiffness matrix, scaled by their density. For each
/// element, the reduced index of every local dof is precomputed, with `None` for fixed dofs.
/// Fixed dofs are treated as zero when gathering and skipped when scattering.
#[derive(Debug)]
pub struct MatrixFreeOperator<'a> {
    reference_stiffness: &'a DMatrix<f64>,
    densities: &'a [f64],
    element_dofs: Vec<Option<usize>>,
    num_local_dofs: usize,
    num_reduced_dofs: usize,
    symmetric: bool,
    psd: bool,
    workspace: ThreadLocal<RefCell<ElementWorkspace>>,
}

impl<'a> MatrixFreeOperator<'a> {
    /// Sets up the operator for a grid and a reference stiffness computed at unit density.
    ///
    /// The reference stiffness must be square with `Dofs::NUM_NODE_DOFS * E::NUM_NODES` rows.
    pub fn new<Dofs, E>(grid: &'a Grid<E>, reference_stiffness: &'a DMatrix<f64>) -> Result<Self>
    where
        Dofs: DofTraits,
        E: ReferenceElement,
    {
        let num_local_dofs = Dofs::NUM_NODE_DOFS * E::NUM_NODES;
        if reference_stiffness.shape() != (num_local_dofs, num_local_dofs) {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Reference stiffness must be {0}x{0}, got {1}x{2}.",
                num_local_dofs,
                reference_stiffness.nrows(),
                reference_stiffness.ncols()
            )));
        }

        let num_periodic_nodes = grid.num_periodic_nodes();
        let element_dofs = (0..grid.num_elements())
            .into_par_iter()
            .with_min_len(MIN_ELEMENTS_PER_TASK)
            .flat_map_iter(|element| {
                let nodes = grid.periodic_element(element);
                Dofs::dofs(&nodes, num_periodic_nodes)
                    .into_iter()
                    .map(|dof| Dofs::reduced_dof(dof, num_periodic_nodes))
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(Self {
            reference_stiffness,
            densities: grid.densities(),
            element_dofs,
            num_local_dofs,
            num_reduced_dofs: Dofs::num_reduced_dofs(num_periodic_nodes),
            symmetric: is_symmetric(reference_stiffness),
            psd: is_psd(reference_stiffness),
            workspace: ThreadLocal::new(),
        })
    }

    pub fn nrows(&self) -> usize {
        self.num_reduced_dofs
    }

    pub fn ncols(&self) -> usize {
        self.num_reduced_dofs
    }

    pub fn num_elements(&self) -> usize {
        self.densities.len()
    }

    pub fn num_local_dofs(&self) -> usize {
        self.num_local_dofs
    }

    /// Reduced dofs of all elements, `num_local_dofs` consecutive entries per element.
    pub fn element_dofs(&self) -> &[Option<usize>] {
        &self.element_dofs
    }

    /// Reduced dofs of a single element.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn element_reduced_dofs(&self, element: usize) -> &[Option<usize>] {
        let n = self.num_local_dofs;
        &self.element_dofs[n * element..n * (element + 1)]
    }

    pub fn densities(&self) -> &[f64] {
        self.densities
    }

    pub fn reference_stiffness(&self) -> &DMatrix<f64> {
        self.reference_stiffness
    }

    /// Whether the reference stiffness, and therefore the operator, is symmetric.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Whether the reference stiffness, and therefore the operator, is positive semi-definite.
    pub fn is_psd(&self) -> bool {
        self.psd
    }

    /// Iterates over `(reduced dofs, density)` of every element in parallel.
    pub(crate) fn par_elements(&self) -> impl IndexedParallelIterator<Item = (&[Option<usize>], f64)> + '_ {
        self.element_dofs
            .par_chunks_exact(self.num_local_dofs)
            .zip(self.densities.par_iter().copied())
            .with_min_len(MIN_ELEMENTS_PER_TASK)
    }

    /// Computes `y = K x`.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` do not have `self.nrows()` entries.
    pub fn apply_to(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) {
        let n = self.num_reduced_dofs;
        assert_eq!(x.len(), n, "x must have one entry per reduced dof");
        assert_eq!(y.len(), n, "y must have one entry per reduced dof");
        let x = x.clone_owned();
        let k = self.reference_stiffness;

        let result = self
            .par_elements()
            .fold(
                || DVector::zeros(n),
                |mut y_partial: DVector<f64>, (dofs, density)| {
                    let ws = &mut *self.workspace.get_or_default().borrow_mut();
                    ws.local_x.resize_vertically_mut(dofs.len(), 0.0);
                    ws.local_y.resize_vertically_mut(dofs.len(), 0.0);

                    // Gather
                    for (x_local, dof) in ws.local_x.iter_mut().zip(dofs) {
                        *x_local = dof.map_or(0.0, |dof| x[dof]);
                    }

                    ws.local_y.gemv(density, k, &ws.local_x, 0.0);

                    // Scatter
                    for (y_local, dof) in ws.local_y.iter().zip(dofs) {
                        if let Some(dof) = dof {
                            y_partial[*dof] += y_local;
                        }
                    }
                    y_partial
                },
            )
            .reduce(|| DVector::zeros(n), |a, b| a + b);

        y.copy_from(&result);
    }

    /// Convenience wrapper around [`apply_to`](Self::apply_to).
    pub fn mul(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.nrows());
        self.apply_to((&mut y).into(), x.into());
        y
    }

    /// Assembles the reduced operator as a dense matrix.
    ///
    /// Only intended for small problems, such as testing and debugging.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut matrix = DMatrix::zeros(self.nrows(), self.ncols());
        let k = self.reference_stiffness;
        for (dofs, &density) in self
            .element_dofs
            .chunks_exact(self.num_local_dofs)
            .zip(self.densities)
        {
            for (i, row) in dofs.iter().enumerate() {
                for (j, col) in dofs.iter().enumerate() {
                    if let (Some(row), Some(col)) = (row, col) {
                        matrix[(*row, *col)] += density * k[(i, j)];
                    }
                }
            }
        }
        matrix
    }
}

impl<'a> LinearOperator<f64> for MatrixFreeOperator<'a> {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> std::result::Result<(), Box<dyn Error>> {
        if x.len() != self.ncols() || y.len() != self.nrows() {
            return Err(Box::from(format!(
                "Operator of size {} cannot be applied to vectors of size {} and {}.",
                self.nrows(),
                x.len(),
                y.len()
            )));
        }
        self.apply_to(y, x);
        Ok(())
    }
}
