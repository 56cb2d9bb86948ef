//! # multiway - Multiway Chemometrics in Rust
//!
//! Decomposition and regression of multiway (tensor) data: PARAFAC, PLS2,
//! MNPLS, N-PLS, SO-N-PLS, NTF and two-way PCA, all driven by a shared
//! stopping-criteria engine.
//!
//! This is the **meta crate** that re-exports the multiway components.
//!
//! ## Quick Start
//!
//! ```
//! use multiway::prelude::*;
//!
//! let x = Tensor::random_normal(&[20, 5, 4], 1);
//! let y = Tensor::random_normal(&[20, 1], 2);
//!
//! let mut npls = NPls::with_config(NPlsConfig::default().with_num_components(2));
//! npls.build(&x, &y)?;
//! assert_eq!(npls.predict(&x)?.shape(), &[20, 1]);
//! # Ok::<(), multiway::algorithms::AlgorithmError>(())
//! ```
//!
//! ## Components
//!
//! ### Tensors ([`core`])
//!
//! The dense [`core::Tensor`] type and the backend used for the initial
//! values algorithms draw.
//!
//! ```
//! use multiway::core::Tensor;
//!
//! let tensor = Tensor::ones(&[2, 3, 4]);
//! let reshaped = tensor.reshape(&[6, 4]).unwrap();
//! assert_eq!(reshaped.shape(), &[6, 4]);
//! ```
//!
//! ### Kernels ([`kernels`])
//!
//! Matricization, Khatri-Rao and outer products, MTTKRP, inverses and
//! column scaling.
//!
//! ```
//! use multiway::kernels::khatri_rao;
//! use multiway::core::Tensor;
//!
//! let a = Tensor::ones(&[4, 2]).to_matrix().unwrap();
//! let b = Tensor::ones(&[3, 2]).to_matrix().unwrap();
//! let kr = khatri_rao(&a.view(), &b.view()).unwrap();
//! assert_eq!(kr.shape(), &[12, 2]);
//! ```
//!
//! ### Algorithms ([`algorithms`])
//!
//! The models and their stopping criteria.
//!
//! ## Features
//!
//! - `subscriber`: enables `core::tracing_support::init_tracing` for
//!   binaries that want log output without wiring `tracing-subscriber`
//!   themselves

#![deny(warnings)]

pub use multiway_algorithms as algorithms;
pub use multiway_core as core;
pub use multiway_kernels as kernels;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use multiway::prelude::*;
    //!
    //! let tensor = Tensor::zeros(&[10, 20, 30]);
    //! let parafac = Parafac::new();
    //! assert!(!parafac.is_finished());
    //! ```

    // Core types
    pub use crate::core::{BackendRef, Tensor, TensorBackend};

    // Models
    pub use crate::algorithms::{
        Mnpls, NPls, NPlsConfig, Ntf, NtfConfig, NtfUpdate, Parafac, ParafacConfig, PcaConfig,
        Pls2, PlsConfig, SoNPls, SoNPlsConfig, TwoWayPca,
    };

    // Model traits
    pub use crate::algorithms::{
        Filter, LoadingMatrixAccessor, Model, MultiBlockSupervised, Supervised, Unsupervised,
    };

    // Stopping criteria
    pub use crate::algorithms::{Criterion, CriterionType, StopHandle, StoppingCriteria};

    // Errors
    pub use crate::algorithms::{AlgorithmError, AlgorithmResult};
}
