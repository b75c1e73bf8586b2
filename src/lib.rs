//! Homogenization of periodic unit cells with matrix-free finite elements.
//!
//! A unit cell is discretized by a structured [`Grid`](grid::Grid) of congruent elements, each
//! carrying a material density in `[0, 1]`. A [`PeriodicCellSolver`](solver::PeriodicCellSolver)
//! computes the reference element stiffness once, solves the periodic cell problem for every unit
//! macroscopic loading with a preconditioned Krylov method and a [`MatrixFreeOperator`], and
//! finally reduces the nodal fields to a homogenized material tensor.
//!
//! [`MatrixFreeOperator`]: operator::MatrixFreeOperator

pub mod dof;
pub mod element;
pub mod error;
pub mod grid;
pub mod io;
pub mod kernel;
pub mod material;
pub mod operator;
pub mod physics;
pub mod preconditioner;
pub mod quadrature;
pub mod solver;
pub mod util;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate unitcell_krylov as krylov;
pub extern crate vtkio;

pub use error::{HomogenizationError, Result};
