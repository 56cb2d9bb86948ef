//! # multiway-core
//!
//! Core tensor type and backend injection for the multiway algorithms.
//!
//! This crate provides the foundation the kernels and algorithms build on:
//!
//! - **Dense tensor** ([`Tensor`]): an `f64` array of arbitrary order with
//!   bounds-checked access, reshape and permute
//! - **Tensor backends** ([`TensorBackend`]): the factory algorithms use for
//!   zeros, ones and seeded random-normal tensors, injected per instance or
//!   registered once per process
//! - **Tracing setup** ([`tracing_support`]): optional subscriber
//!   initialization behind the `subscriber` feature
//!
//! ## SciRS2 Integration
//!
//! Arrays come from `scirs2_core::ndarray_ext` and random numbers from
//! `scirs2_core::random`. Direct use of `ndarray` or `rand` is avoided.
//!
//! ## Quick Start
//!
//! ```
//! use multiway_core::Tensor;
//!
//! let x = Tensor::zeros(&[5, 4, 3]);
//! assert_eq!(x.order(), 3);
//! assert_eq!(x.shape(), &[5, 4, 3]);
//!
//! let mut y = Tensor::ones(&[2, 2]);
//! y[&[0, 1]] = 4.0;
//! assert_eq!(y.get(&[0, 1]), Some(4.0));
//! ```
//!
//! ## Error Handling
//!
//! Construction and shape operations return `anyhow::Result`:
//!
//! ```
//! use multiway_core::Tensor;
//!
//! let t = Tensor::zeros(&[2, 3]);
//! assert!(t.reshape(&[7]).is_err());
//! assert!(t.permute(&[0, 0]).is_err());
//! ```
//!
//! ## Features
//!
//! - `subscriber`: enables [`tracing_support::init_tracing`] through
//!   `tracing-subscriber`

#![deny(warnings)]

pub mod backend;
pub mod tensor;
pub mod tracing_support;

#[cfg(test)]
mod property_tests;

pub use backend::{default_backend, register_default_backend, BackendRef, NdarrayBackend, TensorBackend};
pub use tensor::Tensor;
