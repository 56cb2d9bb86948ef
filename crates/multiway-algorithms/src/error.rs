//! Errors returned by model building, prediction and filtering

use crate::stopping::CriterionType;
use multiway_kernels::KernelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlgorithmError {
    /// The input failed validation; the message explains why.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Algorithm was force stopped before it finished")]
    ForceStopped,

    #[error("{0} model has not been built yet")]
    ModelNotBuilt(&'static str),

    #[error("{algorithm} does not support the {criterion} stopping criterion")]
    UnsupportedCriterion {
        algorithm: &'static str,
        criterion: CriterionType,
    },

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl AlgorithmError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type AlgorithmResult<T> = std::result::Result<T, AlgorithmError>;
