//! # multiway-algorithms
//!
//! Decomposition and regression algorithms for multiway (tensor) data, as
//! used in chemometrics.
//!
//! ## Overview
//!
//! ### Decompositions
//!
//! - [`Parafac`]: trilinear decomposition by alternating least squares,
//!   with SVD or random (multi-start) initialization
//! - [`Ntf`]: non-negative tensor factorization of any order, with
//!   multiplicative or optimizer-driven updates
//! - [`TwoWayPca`]: principal component analysis of a matrix
//!
//! ### Regression
//!
//! - [`Pls2`]: NIPALS partial least squares with several responses
//! - [`Mnpls`]: PLS2 with mixed-norm regularized weights
//! - [`NPls`]: trilinear PLS for `(I × J × K)` predictors
//! - [`SoNPls`]: sequential, orthogonalized multi-block N-PLS
//!
//! ## Stopping Criteria
//!
//! Every iterative loop runs until one of its attached criteria matches:
//!
//! ```text
//! ITERATION    the loop ran max times
//! TIME         the build ran max seconds
//! IMPROVEMENT  |old − new| / old < tol on the watched value
//! KILL         a stop was requested through a StopHandle
//! ```
//!
//! Criteria are attached with [`Model::add_criterion`]; each algorithm
//! accepts a fixed set of types and keeps at most one criterion per type.
//!
//! ## Quick Start
//!
//! ```
//! use multiway_algorithms::{
//!     Criterion, LoadingMatrixAccessor, Model, Parafac, ParafacConfig, Unsupervised,
//! };
//! use multiway_core::Tensor;
//!
//! let x = Tensor::random_normal(&[8, 6, 5], 7);
//! let mut parafac = Parafac::with_config(ParafacConfig::default().with_num_components(2));
//! parafac.add_criterion(Criterion::improvement(1e-6))?;
//! parafac.build(&x)?;
//!
//! let loadings = parafac.loading_matrices()?;
//! assert_eq!(loadings["A"].shape(), &[8, 2]);
//! # Ok::<(), multiway_algorithms::AlgorithmError>(())
//! ```
//!
//! ## Cancellation
//!
//! A [`StopHandle`] taken before `build` can stop it from another thread.
//! The build then returns [`AlgorithmError::ForceStopped`] and the model
//! stays unbuilt.

#![deny(warnings)]

pub mod error;
pub mod iterative;
pub mod mnpls;
pub mod npls;
pub mod ntf;
pub mod optimizers;
pub mod parafac;
pub mod pca;
pub mod pls2;
pub mod sonpls;
pub mod stopping;


pub use error::{AlgorithmError, AlgorithmResult};
pub use iterative::{
    run_recording, run_until_stopped, AlgorithmState, BestSoFar, Filter, LoadingMatrices, LoadingMatrixAccessor,
    Model, MultiBlockSupervised, Supervised, Unsupervised,
};
pub use mnpls::Mnpls;
pub use npls::{NPls, NPlsConfig};
pub use ntf::{Ntf, NtfConfig, NtfUpdate};
pub use optimizers::{Optimizer, OptimizerConfig, OptimizerKind};
pub use parafac::{Initialization, Parafac, ParafacConfig};
pub use pca::{PcaConfig, TwoWayPca};
pub use pls2::{Pls2, PlsConfig};
pub use sonpls::{SoNPls, SoNPlsConfig};
pub use stopping::{
    Criterion, CriterionType, ImprovementCriterion, IterationCriterion, StopHandle,
    StoppingCriteria, TimeCriterion, DEFAULT_IMPROVEMENT_TOLERANCE, DEFAULT_MAX_ITERATIONS,
};
