//! Tensor construction backends.
//!
//! Algorithms never create tensors through a hard-wired factory. They ask a
//! [`TensorBackend`], either one handed to them at construction time or the
//! process-wide default returned by [`default_backend`].
//!
//! The default is registered at most once per process with
//! [`register_default_backend`]. When nothing has been registered the
//! built-in [`NdarrayBackend`] is used.
//!
//! # Examples
//!
//! ```
//! use multiway_core::backend::{default_backend, TensorBackend};
//!
//! let backend = default_backend();
//! let x = backend.random_normal(&[3, 2], 42);
//! assert_eq!(x.shape(), &[3, 2]);
//! ```

use crate::tensor::Tensor;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

/// Factory for the tensors algorithms allocate internally.
///
/// Implementations must be deterministic: equal arguments give equal tensors.
pub trait TensorBackend: Send + Sync + Debug {
    /// Human-readable backend name, used in log messages.
    fn name(&self) -> &str;

    fn zeros(&self, shape: &[usize]) -> Tensor;

    fn ones(&self, shape: &[usize]) -> Tensor;

    /// Standard normal draws reproducible from `seed`.
    fn random_normal(&self, shape: &[usize], seed: u64) -> Tensor;
}

/// Backend built on `scirs2_core::ndarray_ext` arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdarrayBackend;

impl TensorBackend for NdarrayBackend {
    fn name(&self) -> &str {
        "ndarray"
    }

    fn zeros(&self, shape: &[usize]) -> Tensor {
        Tensor::zeros(shape)
    }

    fn ones(&self, shape: &[usize]) -> Tensor {
        Tensor::ones(shape)
    }

    fn random_normal(&self, shape: &[usize], seed: u64) -> Tensor {
        Tensor::random_normal(shape, seed)
    }
}

/// Shared handle to a backend.
pub type BackendRef = Arc<dyn TensorBackend>;

static DEFAULT_BACKEND: OnceLock<BackendRef> = OnceLock::new();

/// Register the process-wide default backend.
///
/// Returns `false` when a default was already in place. In that case the
/// first registration stays active and a warning is logged.
pub fn register_default_backend(backend: BackendRef) -> bool {
    let name = backend.name().to_string();
    match DEFAULT_BACKEND.set(backend) {
        Ok(()) => {
            tracing::debug!(backend = %name, "registered default tensor backend");
            true
        }
        Err(_) => {
            let active = DEFAULT_BACKEND
                .get()
                .map(|b| b.name().to_string())
                .unwrap_or_default();
            tracing::warn!(
                rejected = %name,
                active = %active,
                "a default tensor backend is already registered; keeping the first one"
            );
            false
        }
    }
}

/// The process-wide default backend.
///
/// Falls back to (and pins) [`NdarrayBackend`] when nothing was registered.
pub fn default_backend() -> BackendRef {
    DEFAULT_BACKEND
        .get_or_init(|| Arc::new(NdarrayBackend))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ConstantBackend;

    impl TensorBackend for ConstantBackend {
        fn name(&self) -> &str {
            "constant"
        }
        fn zeros(&self, shape: &[usize]) -> Tensor {
            Tensor::zeros(shape)
        }
        fn ones(&self, shape: &[usize]) -> Tensor {
            Tensor::ones(shape)
        }
        fn random_normal(&self, shape: &[usize], _seed: u64) -> Tensor {
            Tensor::from_elem(shape, 0.5)
        }
    }

    #[test]
    fn test_ndarray_backend() {
        let b = NdarrayBackend;
        assert_eq!(b.zeros(&[2, 2]), Tensor::zeros(&[2, 2]));
        assert_eq!(b.ones(&[3]), Tensor::ones(&[3]));
        assert_eq!(
            b.random_normal(&[4, 2], 9),
            Tensor::random_normal(&[4, 2], 9)
        );
    }

    #[test]
    fn test_second_registration_keeps_first() {
        // Whatever registered first (possibly the implicit default) stays.
        let first = default_backend();
        assert!(!register_default_backend(Arc::new(ConstantBackend)));
        assert_eq!(default_backend().name(), first.name());
    }

    #[test]
    fn test_custom_backend_object() {
        let backend: BackendRef = Arc::new(ConstantBackend);
        assert_eq!(backend.random_normal(&[2], 1).get(&[1]), Some(0.5));
    }
}
