//! Matricization (unfolding) and its inverse
//!
//! `matricize(X, axis)` moves `axis` to the front, places the remaining axes
//! after it in **descending** order and reshapes row-major into a matrix of
//! shape `(size(axis), product of remaining sizes)`.
//!
//! For an order-3 tensor `X ∈ ℝ^(I×J×K)` the column index of element
//! `X[i,j,k]` is:
//!
//! | axis | row | column      |
//! |------|-----|-------------|
//! | 0    | i   | `k*J + j`   |
//! | 1    | j   | `k*I + i`   |
//! | 2    | k   | `j*I + i`   |
//!
//! With [`khatri_rao`](crate::khatri_rao) this ordering gives the familiar
//! PARAFAC identities `X₍₀₎ = A(C⊙B)ᵀ`, `X₍₁₎ = B(C⊙A)ᵀ` and `X₍₂₎ = C(B⊙A)ᵀ`.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array, Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, IxDyn};

/// Axis order used by [`matricize`]: `axis` first, the rest descending.
fn unfolding_permutation(order: usize, axis: usize) -> Vec<usize> {
    std::iter::once(axis)
        .chain((0..order).rev().filter(|&a| a != axis))
        .collect()
}

/// Unfold `x` along `axis`.
///
/// # Errors
///
/// Returns [`KernelError::InvalidMode`] when `axis >= x.ndim()`.
///
/// # Complexity
///
/// Time: O(N) for N elements. Space: O(N).
///
/// # Examples
///
/// ```
/// use multiway_core::Tensor;
/// use multiway_kernels::matricize;
///
/// let x = Tensor::from_vec((0..24).map(f64::from).collect(), &[2, 3, 4]).unwrap();
/// let x0 = matricize(&x.view(), 0).unwrap();
/// assert_eq!(x0.shape(), &[2, 12]);
/// // X[1, 2, 3] lands in column k*J + j = 3*3 + 2
/// assert_eq!(x0[[1, 11]], x[&[1, 2, 3]]);
/// ```
pub fn matricize(x: &ArrayViewD<f64>, axis: usize) -> KernelResult<Array2<f64>> {
    let order = x.ndim();
    if axis >= order {
        return Err(KernelError::invalid_mode(
            axis,
            order,
            "matricize axis out of range",
        ));
    }

    let perm = unfolding_permutation(order, axis);
    let rows = x.shape()[axis];
    let cols: usize = perm[1..].iter().map(|&a| x.shape()[a]).product();
    let permuted = x.view().permuted_axes(IxDyn(&perm));
    let data: Vec<f64> = permuted.iter().copied().collect();

    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| KernelError::linalg("matricize", e))
}

/// Fold a matrix produced by [`matricize`] back into a tensor of `shape`.
///
/// # Errors
///
/// Fails when `axis` is out of range for `shape`, or when the matrix shape
/// does not match `(shape[axis], product of the other sizes)`.
pub fn fold(m: &ArrayView2<f64>, shape: &[usize], axis: usize) -> KernelResult<ArrayD<f64>> {
    let order = shape.len();
    if axis >= order {
        return Err(KernelError::invalid_mode(axis, order, "fold axis out of range"));
    }

    let perm = unfolding_permutation(order, axis);
    let permuted_shape: Vec<usize> = perm.iter().map(|&a| shape[a]).collect();
    let expected = vec![shape[axis], permuted_shape[1..].iter().product()];
    if m.shape() != expected.as_slice() {
        return Err(KernelError::dimension_mismatch(
            "fold",
            expected,
            m.shape().to_vec(),
            format!("cannot fold into shape {:?} along axis {}", shape, axis),
        ));
    }

    let data: Vec<f64> = m.iter().copied().collect();
    let permuted = Array::from_shape_vec(IxDyn(&permuted_shape), data)
        .map_err(|e| KernelError::linalg("fold", e))?;

    let mut inverse = vec![0usize; order];
    for (position, &source) in perm.iter().enumerate() {
        inverse[source] = position;
    }
    Ok(permuted
        .permuted_axes(IxDyn(&inverse))
        .as_standard_layout()
        .to_owned())
}

/// Invert [`matricize`] for an order-3 tensor.
///
/// `dim2` and `dim3` are the sizes of the two folded axes in ascending axis
/// order. For `axis = 1` of an `(I, J, K)` tensor they are `I` and `K`.
///
/// ```
/// use multiway_core::Tensor;
/// use multiway_kernels::{invert_matricize, matricize};
///
/// let x = Tensor::random_normal(&[3, 4, 5], 1);
/// let x1 = matricize(&x.view(), 1).unwrap();
/// let back = invert_matricize(&x1.view(), 1, 3, 5).unwrap();
/// assert_eq!(&back, x.as_array());
/// ```
pub fn invert_matricize(
    m: &ArrayView2<f64>,
    axis: usize,
    dim2: usize,
    dim3: usize,
) -> KernelResult<ArrayD<f64>> {
    let n = m.nrows();
    let shape = match axis {
        0 => [n, dim2, dim3],
        1 => [dim2, n, dim3],
        2 => [dim2, dim3, n],
        _ => {
            return Err(KernelError::invalid_mode(
                axis,
                3,
                "invert_matricize supports order-3 tensors",
            ))
        }
    };
    fold(m, &shape, axis)
}

/// Reshape a vector to `(len / dim1, dim1)` row-major and transpose.
///
/// The result is a `(dim1, len / dim1)` matrix with `Z[j, k] = x[k*dim1 + j]`,
/// which undoes the column ordering of `matricize(X, 0)` for the two
/// trailing axes.
///
/// # Errors
///
/// Fails when `dim1` is zero or does not divide the vector length.
pub fn invert_vectorize(x: &ArrayView1<f64>, dim1: usize) -> KernelResult<Array2<f64>> {
    if dim1 == 0 || x.len() % dim1 != 0 {
        return Err(KernelError::dimension_mismatch(
            "invert_vectorize",
            vec![dim1],
            vec![x.len()],
            "vector length must be a multiple of dim1",
        ));
    }
    let rows = x.len() / dim1;
    let reshaped = Array2::from_shape_vec((rows, dim1), x.iter().copied().collect())
        .map_err(|e| KernelError::linalg("invert_vectorize", e))?;
    Ok(reshaped.reversed_axes().as_standard_layout().to_owned())
}

/// Flatten a matrix row-major into a vector.
pub fn vectorize(m: &ArrayView2<f64>) -> Array1<f64> {
    m.iter().copied().collect()
}
