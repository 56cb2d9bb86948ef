//! Kernel failures
//!
//! Every variant names the kernel that failed. Only
//! [`KernelError::SingularMatrix`] is recoverable: the PLS and ALS loops
//! answer it with a pseudo-inverse.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Operand shapes do not line up
    DimensionMismatch {
        kernel: String,
        expected: Vec<usize>,
        found: Vec<usize>,
        reason: String,
    },

    /// Mode or axis out of range
    InvalidMode {
        mode: usize,
        order: usize,
        reason: String,
    },

    /// Operand has the wrong number of axes
    OrderMismatch {
        kernel: String,
        expected: usize,
        found: usize,
    },

    EmptyInput { kernel: String, argument: String },

    NotSquare { kernel: String, shape: Vec<usize> },

    /// The matrix has no inverse
    SingularMatrix { kernel: String, reason: String },

    /// Failure reported by `scirs2_linalg` or an array reshape
    Linalg { kernel: String, message: String },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use KernelError::*;
        match self {
            DimensionMismatch {
                kernel,
                expected,
                found,
                reason,
            } => write!(
                f,
                "{kernel}: shape mismatch, expected {expected:?} but found {found:?} ({reason})"
            ),
            InvalidMode {
                mode,
                order,
                reason,
            } => write!(f, "mode {mode} is out of range for order {order} ({reason})"),
            OrderMismatch {
                kernel,
                expected,
                found,
            } => write!(f, "{kernel}: needs an order-{expected} operand, found order {found}"),
            EmptyInput { kernel, argument } => write!(f, "{kernel}: '{argument}' is empty"),
            NotSquare { kernel, shape } => write!(f, "{kernel}: {shape:?} is not a square matrix"),
            SingularMatrix { kernel, reason } => write!(f, "{kernel}: singular matrix ({reason})"),
            Linalg { kernel, message } => write!(f, "{kernel}: {message}"),
        }
    }
}

impl std::error::Error for KernelError {}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    pub fn dimension_mismatch(
        kernel: impl Into<String>,
        expected: Vec<usize>,
        found: Vec<usize>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DimensionMismatch {
            kernel: kernel.into(),
            expected,
            found,
            reason: reason.into(),
        }
    }

    pub fn invalid_mode(mode: usize, order: usize, reason: impl Into<String>) -> Self {
        Self::InvalidMode {
            mode,
            order,
            reason: reason.into(),
        }
    }

    pub fn order_mismatch(kernel: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::OrderMismatch {
            kernel: kernel.into(),
            expected,
            found,
        }
    }

    pub fn empty_input(kernel: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::EmptyInput {
            kernel: kernel.into(),
            argument: argument.into(),
        }
    }

    pub fn not_square(kernel: impl Into<String>, shape: &[usize]) -> Self {
        Self::NotSquare {
            kernel: kernel.into(),
            shape: shape.to_vec(),
        }
    }

    pub fn singular(kernel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SingularMatrix {
            kernel: kernel.into(),
            reason: reason.into(),
        }
    }

    pub fn linalg(kernel: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Linalg {
            kernel: kernel.into(),
            message: err.to_string(),
        }
    }

    pub fn is_singular(&self) -> bool {
        matches!(self, Self::SingularMatrix { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_kernel() {
        let msg = KernelError::dimension_mismatch("khatri_rao", vec![10, 5], vec![10, 3], "column counts")
            .to_string();
        assert_eq!(
            msg,
            "khatri_rao: shape mismatch, expected [10, 5] but found [10, 3] (column counts)"
        );
        assert_eq!(
            KernelError::order_mismatch("orth", 2, 3).to_string(),
            "orth: needs an order-2 operand, found order 3"
        );
        assert_eq!(
            KernelError::empty_input("reconstruct", "factors").to_string(),
            "reconstruct: 'factors' is empty"
        );
    }

    #[test]
    fn test_invalid_mode() {
        let msg = KernelError::invalid_mode(3, 3, "matricize").to_string();
        assert_eq!(msg, "mode 3 is out of range for order 3 (matricize)");
    }

    #[test]
    fn test_only_singular_is_recoverable() {
        let err = KernelError::singular("invert", "zero pivot");
        assert!(err.is_singular());
        assert_eq!(err.to_string(), "invert: singular matrix (zero pivot)");
        assert!(!KernelError::not_square("invert", &[2, 3]).is_singular());
        assert!(KernelError::not_square("invert", &[2, 3])
            .to_string()
            .contains("[2, 3]"));
    }
}
