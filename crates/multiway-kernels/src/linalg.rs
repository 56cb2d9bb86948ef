//! Dense linear algebra used by the decomposition and regression loops
//!
//! - [`invert`]: LU-based inverse from `scirs2_linalg`
//! - [`pseudo_invert`]: Moore-Penrose inverse via SVD
//! - [`pseudo_invert2`]: normal equations with a pseudo-inverse fallback
//! - [`svd`]: thin singular value decomposition
//! - [`orth`]: classical Gram-Schmidt
//! - [`symmetric_eigen`] / [`generalized_eigenvectors`]: sorted eigenpairs
//!
//! # SciRS2 Integration
//!
//! Inversion, SVD and symmetric eigendecomposition use `scirs2_linalg`.

use crate::error::{KernelError, KernelResult};
use scirs2_linalg::LinalgError;
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewD, Axis, Ix2};

/// Inverse of a square matrix, computed by `scirs2_linalg::inv`.
///
/// # Errors
///
/// - [`KernelError::NotSquare`] for non-square input
/// - [`KernelError::SingularMatrix`] when the factorization meets a zero
///   pivot or the result is not finite
///
/// # Complexity
///
/// Time: O(n³)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use multiway_kernels::invert;
///
/// let m = array![[4.0, 7.0], [2.0, 6.0]];
/// let inv = invert(&m.view()).unwrap();
/// assert!((inv[[0, 0]] - 0.6).abs() < 1e-12);
/// assert!((inv[[1, 0]] + 0.2).abs() < 1e-12);
/// ```
pub fn invert(m: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
    let (rows, cols) = m.dim();
    if rows != cols {
        return Err(KernelError::not_square("invert", m.shape()));
    }
    if rows == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let inverse = scirs2_linalg::inv(m, None).map_err(|e| match e {
        LinalgError::SingularMatrixError(msg) | LinalgError::ComputationError(msg) => {
            KernelError::singular("invert", msg)
        }
        other => KernelError::linalg("invert", other),
    })?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(KernelError::singular("invert", "inverse has non-finite entries"));
    }
    Ok(inverse)
}

/// Moore-Penrose pseudo-inverse via SVD.
///
/// Singular values below `max(m, n) · σ_max · ε` are treated as zero.
/// The result has shape `(n, m)` for an `(m, n)` input.
pub fn pseudo_invert(m: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
    let (rows, cols) = m.dim();
    if rows == 0 || cols == 0 {
        return Ok(Array2::zeros((cols, rows)));
    }

    let (u, s, vt) =
        scirs2_linalg::svd(m, false, None).map_err(|e| KernelError::linalg("pseudo_invert", e))?;

    let s_max = s.iter().fold(0.0_f64, |acc, &v| acc.max(v));
    let tol = rows.max(cols) as f64 * s_max * f64::EPSILON;

    // pinv = V Σ⁺ Uᵀ
    let mut v_scaled = vt.t().to_owned();
    for (k, mut column) in v_scaled.axis_iter_mut(Axis(1)).enumerate() {
        let sigma = s[k];
        let factor = if sigma > tol { 1.0 / sigma } else { 0.0 };
        column.mapv_inplace(|v| v * factor);
    }
    Ok(v_scaled.dot(&u.t()))
}

/// `(MᵀM)⁻¹Mᵀ`, falling back to [`pseudo_invert`] when `MᵀM` is singular.
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use multiway_kernels::pseudo_invert2;
///
/// let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
/// let p = pseudo_invert2(&m.view()).unwrap();
/// assert!((p[[0, 0]] + 16.0 / 12.0).abs() < 1e-10);
/// ```
pub fn pseudo_invert2(m: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
    let gram = m.t().dot(m);
    match invert(&gram.view()) {
        Ok(inv) => Ok(inv.dot(&m.t())),
        Err(e) if e.is_singular() => {
            tracing::debug!(shape = ?m.shape(), "normal equations singular, using SVD pseudo-inverse");
            pseudo_invert(m)
        }
        Err(e) => Err(e),
    }
}

/// Inverse of a square matrix, or its pseudo-inverse when it is singular.
pub fn invert_or_pseudo(m: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
    match invert(m) {
        Ok(inv) => Ok(inv),
        Err(e) if e.is_singular() => {
            tracing::debug!(shape = ?m.shape(), "singular matrix, using SVD pseudo-inverse");
            pseudo_invert(m)
        }
        Err(e) => Err(e),
    }
}

/// Thin singular value decomposition `X = U S Vᵀ`.
#[derive(Debug, Clone)]
pub struct Svd {
    /// Left singular vectors, `(m, k)`
    pub u: Array2<f64>,
    /// Singular values on the diagonal, `(k, k)`
    pub s: Array2<f64>,
    /// Right singular vectors, `(n, k)`
    pub v: Array2<f64>,
    /// Singular values as a `(k, 1)` column, descending
    pub singular_values: Array2<f64>,
}

/// Thin SVD with `k = min(m, n)`.
pub fn svd(x: &ArrayView2<f64>) -> KernelResult<Svd> {
    let (u, s, vt) = scirs2_linalg::svd(x, false, None).map_err(|e| KernelError::linalg("svd", e))?;
    let k = s.len();
    Ok(Svd {
        u,
        s: Array2::from_diag(&s),
        v: vt.t().to_owned(),
        singular_values: s.into_shape_with_order((k, 1)).map_err(|e| KernelError::linalg("svd", e))?,
    })
}

/// Projection of `v` onto `u`: `(uᵀv / uᵀu) u`.
///
/// A zero `u` projects everything to zero.
pub fn project(u: &ArrayView1<f64>, v: &ArrayView1<f64>) -> KernelResult<Array1<f64>> {
    if u.len() != v.len() {
        return Err(KernelError::dimension_mismatch(
            "project",
            vec![u.len()],
            vec![v.len()],
            "u and v must have the same length",
        ));
    }
    let uu = u.dot(u);
    if uu == 0.0 {
        return Ok(Array1::zeros(u.len()));
    }
    let scale = u.dot(v) / uu;
    Ok(u.mapv(|x| x * scale))
}

/// Classical Gram-Schmidt orthogonalization of the columns of `v`.
///
/// With `normalize` every non-zero column is scaled to unit L2 norm.
///
/// # Errors
///
/// [`KernelError::OrderMismatch`] when `v` is not a matrix.
pub fn orth(v: &ArrayViewD<f64>, normalize: bool) -> KernelResult<Array2<f64>> {
    if v.ndim() != 2 {
        return Err(KernelError::order_mismatch("orth", 2, v.ndim()));
    }
    let v = v
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| KernelError::linalg("orth", e))?;

    let mut u = Array2::<f64>::zeros(v.raw_dim());
    for i in 0..v.ncols() {
        let vi = v.column(i);
        let mut ui = vi.to_owned();
        for j in 0..i {
            ui -= &project(&u.column(j), &vi)?;
        }
        u.column_mut(i).assign(&ui);
    }

    if normalize {
        for mut column in u.axis_iter_mut(Axis(1)) {
            let norm = column.dot(&column).sqrt();
            if norm > 0.0 {
                column.mapv_inplace(|x| x / norm);
            }
        }
    }
    Ok(u)
}

/// Eigenpairs of a real symmetric matrix sorted by descending eigenvalue.
///
/// Column `i` of the returned matrix belongs to eigenvalue `i`.
pub fn symmetric_eigen(a: &ArrayView2<f64>) -> KernelResult<(Array1<f64>, Array2<f64>)> {
    let (rows, cols) = a.dim();
    if rows != cols {
        return Err(KernelError::not_square("symmetric_eigen", a.shape()));
    }
    let (values, vectors) =
        scirs2_linalg::eigh(a, None).map_err(|e| KernelError::linalg("symmetric_eigen", e))?;
    Ok(sort_descending(&values, &vectors))
}

fn sort_descending(values: &Array1<f64>, vectors: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let sorted_values = order.iter().map(|&i| values[i]).collect();
    let sorted_vectors = vectors.select(Axis(1), &order);
    (sorted_values, sorted_vectors)
}

/// Solve `A v = λ B v` for symmetric `A` and symmetric positive
/// semi-definite `B`.
///
/// The problem is restricted to the range of `B`: with `B = QΛQᵀ` and
/// `W = Q_r Λ_r^{-1/2}` over the eigenvalues above tolerance, the reduced
/// symmetric problem `WᵀAW y = λ y` is solved and `v = W y`. Eigenvectors are
/// `B`-orthonormal and sorted by descending eigenvalue.
///
/// # Errors
///
/// Fails for non-square or mismatched inputs, or when `B` has no positive
/// eigenvalues.
pub fn generalized_eigenvectors(
    a: &ArrayView2<f64>,
    b: &ArrayView2<f64>,
) -> KernelResult<(Array1<f64>, Array2<f64>)> {
    if a.nrows() != a.ncols() {
        return Err(KernelError::not_square("generalized_eigenvectors", a.shape()));
    }
    if a.shape() != b.shape() {
        return Err(KernelError::dimension_mismatch(
            "generalized_eigenvectors",
            a.shape().to_vec(),
            b.shape().to_vec(),
            "A and B must have the same shape",
        ));
    }

    let (b_values, b_vectors) = symmetric_eigen(b)?;
    let largest = b_values.iter().copied().fold(0.0_f64, f64::max);
    let tol = largest * b_values.len() as f64 * f64::EPSILON;
    let kept: Vec<usize> = (0..b_values.len()).filter(|&i| b_values[i] > tol).collect();
    if kept.is_empty() {
        return Err(KernelError::singular("generalized_eigenvectors", "B has no positive eigenvalue"));
    }

    let mut whiten = b_vectors.select(Axis(1), &kept);
    for (mut col, &idx) in whiten.axis_iter_mut(Axis(1)).zip(kept.iter()) {
        let scale = 1.0 / b_values[idx].sqrt();
        col.mapv_inplace(|x| x * scale);
    }

    let reduced = whiten.t().dot(a).dot(&whiten);
    let symmetric = (&reduced + &reduced.t()) * 0.5;
    let (values, y) = symmetric_eigen(&symmetric.view())?;
    Ok((values, whiten.dot(&y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_invert_identity_product() {
        let m = array![[2.0, 1.0, 0.5], [1.0, 3.0, 0.0], [0.0, 1.0, 4.0]];
        let inv = invert(&m.view()).unwrap();
        assert_close(&inv.dot(&m), &Array2::eye(3), 1e-12);
        assert_close(&m.dot(&inv), &Array2::eye(3), 1e-12);
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let m = array![[0.0, 1.0], [1.0, 0.0]];
        let inv = invert(&m.view()).unwrap();
        assert_close(&inv, &m, 1e-15);
    }

    #[test]
    fn test_invert_errors() {
        let rect = Array2::<f64>::ones((2, 3));
        assert!(matches!(
            invert(&rect.view()),
            Err(KernelError::NotSquare { .. })
        ));
        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(invert(&singular.view()).unwrap_err().is_singular());
        let zero = Array2::<f64>::zeros((3, 3));
        assert!(invert(&zero.view()).unwrap_err().is_singular());
    }

    #[test]
    fn test_singular_invert_falls_back_to_pseudo_inverse() {
        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        let p = invert_or_pseudo(&singular.view()).unwrap();
        assert_close(&p, &pseudo_invert(&singular.view()).unwrap(), 1e-12);
    }

    #[test]
    fn test_pseudo_invert2_reference() {
        let m = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let expected = array![[-16.0, -4.0, 8.0], [13.0, 4.0, -5.0]] / 12.0;
        assert_close(&pseudo_invert2(&m.view()).unwrap(), &expected, 1e-10);
        assert_close(&pseudo_invert(&m.view()).unwrap(), &expected, 1e-10);
    }

    #[test]
    fn test_pseudo_invert2_falls_back_on_rank_deficiency() {
        let m = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let p = pseudo_invert2(&m.view()).unwrap();
        // Moore-Penrose condition M P M = M
        assert_close(&m.dot(&p).dot(&m), &m, 1e-10);
    }

    #[test]
    fn test_pseudo_invert_square_matches_inverse() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        assert_close(
            &pseudo_invert(&m.view()).unwrap(),
            &invert(&m.view()).unwrap(),
            1e-10,
        );
    }

    #[test]
    fn test_svd_reconstructs() {
        let x = array![[3.0, 1.0, 1.0], [-1.0, 3.0, 1.0]];
        let d = svd(&x.view()).unwrap();
        assert_eq!(d.u.shape(), &[2, 2]);
        assert_eq!(d.v.shape(), &[3, 2]);
        assert_eq!(d.singular_values.shape(), &[2, 1]);
        assert!(d.singular_values[[0, 0]] >= d.singular_values[[1, 0]]);
        assert_close(&d.u.dot(&d.s).dot(&d.v.t()), &x, 1e-10);
    }

    #[test]
    fn test_orth_orthonormal() {
        let v = array![[1.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0]];
        let u = orth(&v.view().into_dyn(), true).unwrap();
        assert_close(&u.t().dot(&u), &Array2::eye(3), 1e-10);
    }

    #[test]
    fn test_orth_without_normalization_keeps_first_column() {
        let v = array![[3.0, 1.0], [4.0, 2.0]];
        let u = orth(&v.view().into_dyn(), false).unwrap();
        assert_eq!(u.column(0), v.column(0));
        assert!(u.column(0).dot(&u.column(1)).abs() < 1e-12);
    }

    #[test]
    fn test_orth_rejects_non_matrix() {
        let t = scirs2_core::ndarray_ext::Array::<f64, _>::zeros(vec![2, 2, 2]);
        assert!(matches!(
            orth(&t.view(), true),
            Err(KernelError::OrderMismatch { .. })
        ));
    }

    #[test]
    fn test_project() {
        let u = array![1.0, 0.0];
        let v = array![3.0, 4.0];
        assert_eq!(project(&u.view(), &v.view()).unwrap(), array![3.0, 0.0]);
        assert!(project(&u.view(), &array![1.0].view()).is_err());
    }

    #[test]
    fn test_symmetric_eigen_sorted() {
        let a = array![[2.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 1.0]];
        let (values, vectors) = symmetric_eigen(&a.view()).unwrap();
        assert!((values[0] - 5.0).abs() < 1e-10);
        assert!((values[2] - 1.0).abs() < 1e-10);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_generalized_eigenvectors_satisfy_equation() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 1.0]];
        let b = array![[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]];
        let (values, vectors) = generalized_eigenvectors(&a.view(), &b.view()).unwrap();
        assert_eq!(vectors.shape(), &[3, 3]);
        for k in 0..3 {
            let v = vectors.column(k);
            let lhs = a.dot(&v);
            let rhs = b.dot(&v) * values[k];
            for (l, r) in lhs.iter().zip(rhs.iter()) {
                assert!((l - r).abs() < 1e-8);
            }
        }
        assert!(values[0] >= values[1] && values[1] >= values[2]);
    }

    #[test]
    fn test_generalized_eigenvectors_mismatch() {
        let a = Array2::<f64>::eye(2);
        let b = Array2::<f64>::eye(3);
        assert!(generalized_eigenvectors(&a.view(), &b.view()).is_err());
    }
}
