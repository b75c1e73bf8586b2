use crate::krylov::LinearOperator;
use crate::operator::MatrixFreeOperator;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use std::error::Error;

/// Diagonal (Jacobi) preconditioner for a [`MatrixFreeOperator`].
///
/// The diagonal is accumulated with the same element loop as the operator itself, and is
/// therefore exactly the diagonal of the unassembled reduced stiffness matrix. Applying the
/// preconditioner divides by the diagonal. An entry that is exactly zero can only belong to a dof
/// without any element contribution, and is passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobiPreconditioner {
    diagonal: DVector<f64>,
}

impl JacobiPreconditioner {
    pub fn compute(operator: &MatrixFreeOperator) -> Self {
        let n = operator.nrows();
        let k = operator.reference_stiffness();
        let diagonal = operator
            .par_elements()
            .fold(
                || DVector::zeros(n),
                |mut diagonal: DVector<f64>, (dofs, density)| {
                    for (local, dof) in dofs.iter().enumerate() {
                        if let Some(dof) = dof {
                            diagonal[*dof] += density * k[(local, local)];
                        }
                    }
                    diagonal
                },
            )
            .reduce(|| DVector::zeros(n), |a, b| a + b);
        Self { diagonal }
    }

    pub fn diagonal(&self) -> &DVector<f64> {
        &self.diagonal
    }

    pub fn nrows(&self) -> usize {
        self.diagonal.len()
    }

    /// Returns `b ./ diag`.
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();
        self.solve_in_place(&mut x);
        x
    }

    fn solve_in_place(&self, x: &mut DVector<f64>) {
        x.zip_apply(&self.diagonal, |x_i, d_i| {
            if d_i != 0.0 {
                *x_i /= d_i;
            }
        });
    }
}

impl LinearOperator<f64> for JacobiPreconditioner {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        if x.len() != self.nrows() || y.len() != self.nrows() {
            return Err(Box::from("Preconditioner dimensions do not match the vectors."));
        }
        for ((y_i, x_i), d_i) in y.iter_mut().zip(x.iter()).zip(self.diagonal.iter()) {
            *y_i = if *d_i != 0.0 { x_i / d_i } else { *x_i };
        }
        Ok(())
    }
}
