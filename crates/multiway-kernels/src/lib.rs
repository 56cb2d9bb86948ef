//! # multiway-kernels
//!
//! Tensor algebra primitives used by the multiway algorithms.
//!
//! Every function here is stateless and deterministic:
//!
//! - **Matricization** ([`matricize`], [`fold`], [`invert_matricize`],
//!   [`invert_vectorize`]): unfolding with the remaining axes in descending
//!   order, and its exact inverse
//! - **Khatri-Rao product** ([`khatri_rao`]): column-wise Kronecker product
//! - **Outer products** ([`outer`], [`outer_product`], [`reconstruct`])
//! - **MTTKRP** ([`mttkrp`]): the tensor-times-Khatri-Rao contraction
//! - **Linear algebra** ([`invert`], [`pseudo_invert`], [`pseudo_invert2`],
//!   [`svd`], [`orth`], [`generalized_eigenvectors`])
//! - **Preprocessing** ([`Scaling`], [`center`], [`standardize_tensor`])
//!
//! ## Ordering Conventions
//!
//! The Khatri-Rao product is U-major (row `i*rows(V) + j`) and the
//! mode-0 unfolding of an `(I, J, K)` tensor puts `X[i,j,k]` in column
//! `k*J + j`. Together they give `X₍₀₎ = A(C⊙B)ᵀ` for a PARAFAC model.
//!
//! ```
//! use multiway_core::Tensor;
//! use multiway_kernels::{khatri_rao, matricize, reconstruct};
//!
//! let a = Tensor::random_normal(&[4, 2], 0).to_matrix().unwrap();
//! let b = Tensor::random_normal(&[3, 2], 1).to_matrix().unwrap();
//! let c = Tensor::random_normal(&[5, 2], 2).to_matrix().unwrap();
//! let x = Tensor::from_array(reconstruct(&[a.view(), b.view(), c.view()]).unwrap());
//!
//! let x0 = matricize(&x.view(), 0).unwrap();
//! let model = a.dot(&khatri_rao(&c.view(), &b.view()).unwrap().t());
//! for (l, r) in x0.iter().zip(model.iter()) {
//!     assert!((l - r).abs() < 1e-10);
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible kernels return [`KernelResult`]. Singular inversions are
//! reported as [`KernelError::SingularMatrix`] so callers can fall back to
//! [`pseudo_invert`] (see [`invert_or_pseudo`]).

#![deny(warnings)]

pub mod error;
pub mod khatri_rao;
pub mod linalg;
pub mod matricize;
pub mod mttkrp;
pub mod outer;
pub mod reductions;

#[cfg(test)]
mod property_tests;

pub use error::{KernelError, KernelResult};
pub use khatri_rao::{khatri_rao, khatri_rao_dyn};
pub use linalg::{
    generalized_eigenvectors, invert, invert_or_pseudo, orth, project, pseudo_invert,
    pseudo_invert2, svd, symmetric_eigen, Svd,
};
pub use matricize::{fold, invert_matricize, invert_vectorize, matricize, vectorize};
pub use mttkrp::mttkrp;
pub use outer::{outer, outer_product, outer_vectors, reconstruct};
pub use reductions::{
    center, column_means, column_std, mean_squared_error, normalize_columns, scale_with,
    squared_distance, standardize_tensor, unscale_with, Scaling,
};
