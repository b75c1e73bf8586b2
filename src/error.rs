//! Error types.
use std::fmt;

pub type Result<T> = std::result::Result<T, HomogenizationError>;

/// Why an element was rejected when its reference operator was evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvalidGeometry {
    /// The Jacobian determinant vanishes somewhere in the element.
    Degenerate,
    /// The Jacobian determinant is negative, i.e. the node ordering is reversed.
    Inverted,
}

impl fmt::Display for InvalidGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degenerate => write!(f, "Element Jacobian determinant is zero. The element is degenerate."),
            Self::Inverted => write!(f, "Element Jacobian determinant is negative. The element is inverted."),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConvergenceFailureReason {
    /// The iteration cap was reached before the tolerance was met.
    NoConvergence,
    /// The Krylov recurrence broke down, or the operator had an unexpected sign.
    NumericalIssue,
}

impl fmt::Display for ConvergenceFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConvergence => write!(f, "No Convergence - Max iterations reached or tolerance not met."),
            Self::NumericalIssue => write!(f, "Numerical Issue - Solver encountered stability problems."),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum HomogenizationError {
    /// Malformed element geometry, detected when a kernel is evaluated.
    InvalidInput(InvalidGeometry),
    /// Inconsistent parameters, detected eagerly at construction or mutation time.
    InvalidConfiguration(String),
    /// The iterative solver failed for one of the macroscopic loading directions.
    ConvergenceFailure {
        reason: ConvergenceFailureReason,
        /// Index of the macroscopic field (column) that failed.
        column: usize,
        iterations: usize,
    },
    Io(std::io::Error),
}

impl HomogenizationError {
    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// The sub-reason of a convergence failure, if this is one.
    pub fn convergence_failure_reason(&self) -> Option<ConvergenceFailureReason> {
        match self {
            Self::ConvergenceFailure { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for HomogenizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(geometry) => write!(f, "{}", geometry),
            Self::InvalidConfiguration(message) => write!(f, "{}", message),
            Self::ConvergenceFailure { reason, .. } => write!(f, "Solver failed to converge. {}", reason),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for HomogenizationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidGeometry> for HomogenizationError {
    fn from(geometry: InvalidGeometry) -> Self {
        Self::InvalidInput(geometry)
    }
}

impl From<std::io::Error> for HomogenizationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
