//! Outer (tensor) products
//!
//! For arrays x and y the outer product is the array of shape
//! `shape(x) ++ shape(y)` with `Z[a.., b..] = x[a..] * y[b..]`, laid out
//! row-major with the indices of `x` varying slowest.
//!
//! Column vectors stored as `(n, 1)` matrices are treated as plain vectors:
//! trailing singleton axes are squeezed before the product is formed.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array, Array2, ArrayView1, ArrayView2, ArrayViewD, IxDyn};

fn squeezed_shape(shape: &[usize]) -> Vec<usize> {
    let mut dims = shape.to_vec();
    while dims.len() > 1 && dims.last() == Some(&1) {
        dims.pop();
    }
    dims
}

/// Outer product of two arrays of any order.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use multiway_kernels::outer;
///
/// let x = array![[1.0], [2.0], [3.0]].into_dyn();
/// let y = array![[2.0], [0.0]].into_dyn();
/// let z = outer(&x.view(), &y.view()).unwrap();
/// assert_eq!(z.shape(), &[3, 2]);
/// assert_eq!(z.iter().copied().collect::<Vec<_>>(), vec![2.0, 0.0, 4.0, 0.0, 6.0, 0.0]);
/// ```
pub fn outer(x: &ArrayViewD<f64>, y: &ArrayViewD<f64>) -> KernelResult<Array<f64, IxDyn>> {
    let mut shape = squeezed_shape(x.shape());
    shape.extend(squeezed_shape(y.shape()));
    tensor_product("outer", x, y, &shape)
}

/// Product of every pair of entries, `x` major, reshaped to `shape`.
fn tensor_product(
    kernel: &str,
    x: &ArrayViewD<f64>,
    y: &ArrayViewD<f64>,
    shape: &[usize],
) -> KernelResult<Array<f64, IxDyn>> {
    let y_vals: Vec<f64> = y.iter().copied().collect();
    let mut data = Vec::with_capacity(x.len() * y_vals.len());
    for &xv in x.iter() {
        data.extend(y_vals.iter().map(|&yv| xv * yv));
    }

    if data.len() != shape.iter().product::<usize>() {
        return Err(KernelError::dimension_mismatch(
            kernel,
            shape.to_vec(),
            vec![data.len()],
            "outer product has the wrong number of entries for the target shape",
        ));
    }
    Array::from_shape_vec(IxDyn(shape), data).map_err(|e| KernelError::linalg(kernel, e))
}

/// Outer product of two vectors as a matrix, `M[i,j] = u[i] × v[j]`.
///
/// # Complexity
///
/// Time: O(I × J)
/// Space: O(I × J)
pub fn outer_vectors(u: &ArrayView1<f64>, v: &ArrayView1<f64>) -> Array2<f64> {
    let mut result = Array2::<f64>::zeros((u.len(), v.len()));
    for (row, &u_val) in u.iter().enumerate() {
        for (col, &v_val) in v.iter().enumerate() {
            result[[row, col]] = u_val * v_val;
        }
    }
    result
}

/// Outer product of several vectors, `T[i₁,…,iₙ] = v₁[i₁] × … × vₙ[iₙ]`.
///
/// # Errors
///
/// Fails when `vectors` is empty.
pub fn outer_product(vectors: &[ArrayView1<f64>]) -> KernelResult<Array<f64, IxDyn>> {
    let (first, rest) = vectors
        .split_first()
        .ok_or_else(|| KernelError::empty_input("outer_product", "vectors"))?;

    let mut acc = first.to_owned().into_dyn();
    for v in rest {
        let mut shape = acc.shape().to_vec();
        shape.push(v.len());
        acc = tensor_product("outer_product", &acc.view(), &v.view().into_dyn(), &shape)?;
    }
    Ok(acc)
}

/// Sum over components of the outer products of the factor columns.
///
/// Factor `m` has shape `(dim_m, F)`; the result has shape
/// `(dim_0, …, dim_{N-1})`.
///
/// # Errors
///
/// Fails when no factors are given or their column counts differ.
///
/// # Complexity
///
/// Time: O(F × ∏ dim_m)
pub fn reconstruct(factors: &[ArrayView2<f64>]) -> KernelResult<Array<f64, IxDyn>> {
    let first = factors
        .first()
        .ok_or_else(|| KernelError::empty_input("reconstruct", "factors"))?;
    let rank = first.ncols();
    for (idx, factor) in factors.iter().enumerate() {
        if factor.ncols() != rank {
            return Err(KernelError::dimension_mismatch(
                "reconstruct",
                vec![factor.nrows(), rank],
                factor.shape().to_vec(),
                format!("factor {} has a different number of components", idx),
            ));
        }
    }

    let shape: Vec<usize> = factors.iter().map(|f| f.nrows()).collect();
    let mut result = Array::<f64, IxDyn>::zeros(IxDyn(&shape));
    for r in 0..rank {
        let columns: Vec<ArrayView1<f64>> = factors.iter().map(|f| f.column(r)).collect();
        result += &outer_product(&columns)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    #[test]
    fn test_outer_column_vectors() {
        let x = array![[1.0], [2.0], [3.0]].into_dyn();
        let y = array![[2.0], [0.0]].into_dyn();
        let z = outer(&x.view(), &y.view()).unwrap();
        let expected = array![[2.0, 0.0], [4.0, 0.0], [6.0, 0.0]].into_dyn();
        assert_eq!(z, expected);
    }

    #[test]
    fn test_outer_matrix_vector_order() {
        let x = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let y = array![10.0, 100.0].into_dyn();
        let z = outer(&x.view(), &y.view()).unwrap();
        assert_eq!(z.shape(), &[2, 2, 2]);
        assert_eq!(z[[1, 0, 1]], 300.0);
        assert_eq!(z[[0, 1, 0]], 20.0);
    }

    #[test]
    fn test_inconsistent_target_shape_is_an_error() {
        let x = array![1.0, 2.0].into_dyn();
        let y = array![3.0, 4.0, 5.0].into_dyn();
        let err = tensor_product("outer", &x.view(), &y.view(), &[2, 2]).unwrap_err();
        assert!(matches!(
            err,
            KernelError::DimensionMismatch { ref expected, ref found, .. }
                if expected == &vec![2, 2] && found == &vec![6]
        ));
    }

    #[test]
    fn test_outer_vectors() {
        let u = array![1.0, 2.0, 3.0];
        let v = array![4.0, 5.0];
        let m = outer_vectors(&u.view(), &v.view());
        assert_eq!(m, array![[4.0, 5.0], [8.0, 10.0], [12.0, 15.0]]);
    }

    #[test]
    fn test_outer_product_three() {
        let v1 = array![1.0, 2.0];
        let v2 = array![3.0, 4.0, 5.0];
        let v3 = array![6.0, 7.0];
        let t = outer_product(&[v1.view(), v2.view(), v3.view()]).unwrap();
        assert_eq!(t.shape(), &[2, 3, 2]);
        assert_eq!(t[[0, 0, 0]], 18.0);
        assert_eq!(t[[1, 2, 1]], 70.0);
        assert!(outer_product(&[]).is_err());
    }

    #[test]
    fn test_outer_product_keeps_singleton_modes() {
        let v1 = array![1.0, 2.0];
        let v2 = array![3.0];
        let t = outer_product(&[v1.view(), v2.view(), v1.view()]).unwrap();
        assert_eq!(t.shape(), &[2, 1, 2]);
        assert_eq!(t[[1, 0, 1]], 12.0);
    }

    #[test]
    fn test_reconstruct_rank_one() {
        let a = array![[1.0], [2.0]];
        let b = array![[3.0], [4.0]];
        let t = reconstruct(&[a.view(), b.view()]).unwrap();
        assert_eq!(t, array![[3.0, 4.0], [6.0, 8.0]].into_dyn());
    }

    #[test]
    fn test_reconstruct_sums_components() {
        let a = array![[1.0, 0.0], [0.0, 1.0]];
        let b = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let t = reconstruct(&[a.view(), b.view()]).unwrap();
        assert_eq!(t, array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]].into_dyn());
    }

    #[test]
    fn test_reconstruct_rank_mismatch() {
        let a = array![[1.0, 0.0]];
        let b = array![[1.0]];
        assert!(reconstruct(&[a.view(), b.view()]).is_err());
    }
}
