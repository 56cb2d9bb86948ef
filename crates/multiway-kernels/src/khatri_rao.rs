//! Khatri-Rao product (column-wise Kronecker product)
//!
//! For matrices U (I × F) and V (J × F), the Khatri-Rao product U ⊙ V has
//! size (I*J × F). Column `c` holds the flattened outer product of `U[:,c]`
//! and `V[:,c]`, so row `i*J + j` equals `U[i,c] * V[j,c]`.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView2, ArrayViewD, Ix2};

/// Column-wise Khatri-Rao product of two matrices.
///
/// # Errors
///
/// [`KernelError::DimensionMismatch`] when the column counts differ.
///
/// # Complexity
///
/// Time: O(I * J * F)
/// Space: O(I * J * F)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use multiway_kernels::khatri_rao;
///
/// let u = array![[1.0, 2.0], [3.0, 4.0]];
/// let v = array![[5.0, 6.0], [7.0, 8.0]];
/// let kr = khatri_rao(&u.view(), &v.view()).unwrap();
/// assert_eq!(kr.shape(), &[4, 2]);
///
/// // First column: [1*5, 1*7, 3*5, 3*7]
/// assert_eq!(kr.column(0).to_vec(), vec![5.0, 7.0, 15.0, 21.0]);
/// ```
pub fn khatri_rao(u: &ArrayView2<f64>, v: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
    let (i, f_u) = u.dim();
    let (j, f_v) = v.dim();

    if f_u != f_v {
        return Err(KernelError::dimension_mismatch(
            "khatri_rao",
            vec![i, f_u],
            vec![j, f_v],
            format!(
                "Number of columns must match: U is {}x{}, V is {}x{}",
                i, f_u, j, f_v
            ),
        ));
    }

    let mut result = Array2::<f64>::zeros((i * j, f_u));
    for col in 0..f_u {
        let u_col = u.column(col);
        let v_col = v.column(col);
        for (row_u, &u_val) in u_col.iter().enumerate() {
            for (row_v, &v_val) in v_col.iter().enumerate() {
                result[[row_u * j + row_v, col]] = u_val * v_val;
            }
        }
    }

    Ok(result)
}

/// Khatri-Rao product of two dynamic-dimension arrays.
///
/// Both operands must be matrices; any other order fails with a dimension
/// mismatch, as does a column count mismatch.
pub fn khatri_rao_dyn(u: &ArrayViewD<f64>, v: &ArrayViewD<f64>) -> KernelResult<Array2<f64>> {
    if u.ndim() != 2 || v.ndim() != 2 {
        return Err(KernelError::dimension_mismatch(
            "khatri_rao",
            vec![2, 2],
            vec![u.ndim(), v.ndim()],
            "both operands must be matrices",
        ));
    }
    let u2 = u
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| KernelError::linalg("khatri_rao", e))?;
    let v2 = v
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| KernelError::linalg("khatri_rao", e))?;
    khatri_rao(&u2, &v2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::{array, Array2};

    #[test]
    fn test_wiki_example() {
        let c = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let d = c.t().to_owned();
        let expected = array![
            [1.0, 8.0, 21.0],
            [2.0, 10.0, 24.0],
            [3.0, 12.0, 27.0],
            [4.0, 20.0, 42.0],
            [8.0, 25.0, 48.0],
            [12.0, 30.0, 54.0],
            [7.0, 32.0, 63.0],
            [14.0, 40.0, 72.0],
            [21.0, 48.0, 81.0]
        ];

        let kr = khatri_rao(&c.view(), &d.view()).unwrap();
        assert_eq!(kr, expected);
    }

    #[test]
    fn test_rectangular_example() {
        let u = Array2::from_shape_vec((4, 5), (1..21).map(f64::from).collect()).unwrap();
        let v = Array2::from_shape_vec((4, 5), (21..41).map(f64::from).collect()).unwrap();

        let kr = khatri_rao(&u.view(), &v.view()).unwrap();
        assert_eq!(kr.shape(), &[16, 5]);
        assert_eq!(kr.row(0).to_vec(), vec![21.0, 44.0, 69.0, 96.0, 125.0]);
        assert_eq!(kr.row(15).to_vec(), vec![576.0, 629.0, 684.0, 741.0, 800.0]);
    }

    #[test]
    fn test_column_mismatch() {
        let u = Array2::<f64>::zeros((4, 2));
        let v = Array2::<f64>::zeros((3, 3));
        let err = khatri_rao(&u.view(), &v.view()).unwrap_err();
        match err {
            KernelError::DimensionMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, vec![4, 2]);
                assert_eq!(found, vec![3, 3]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_dyn_rejects_non_matrix() {
        let u = Array2::<f64>::ones((3, 2)).into_dyn();
        let v = scirs2_core::ndarray_ext::Array::<f64, _>::ones(vec![3, 2, 1]);
        assert!(khatri_rao_dyn(&u.view(), &v.view()).is_err());
        assert_eq!(
            khatri_rao_dyn(&u.view(), &u.view()).unwrap().shape(),
            &[9, 2]
        );
    }
}
