//! Matricized tensor times Khatri-Rao product (MTTKRP)
//!
//! For a tensor X of order N and factor matrices U₀ … U_{N-1} (each Iₘ × F),
//! the mode-n MTTKRP is the `Iₙ × F` matrix
//!
//! `M[i, f] = Σ_{all indices with iₙ = i} X[i₀,…,i_{N-1}] · Π_{m≠n} Uₘ[iₘ, f]`
//!
//! It is the numerator of the multiplicative non-negative update and the
//! right-hand side of the ALS normal equations.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{KernelError, KernelResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView2, ArrayViewD};

/// Mode-`mode` MTTKRP by direct accumulation over the tensor entries.
///
/// The factor for `mode` itself is only checked for shape; its values are
/// not read.
///
/// # Errors
///
/// - [`KernelError::InvalidMode`] when `mode` is out of range
/// - [`KernelError::DimensionMismatch`] when the factor count, row counts or
///   column counts do not line up with the tensor
///
/// # Complexity
///
/// Time: O(∏ Iₘ × F × N)
/// Space: O(Iₙ × F)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use multiway_core::Tensor;
/// use multiway_kernels::mttkrp;
///
/// let x = Tensor::ones(&[2, 3, 2]);
/// let a = array![[1.0], [1.0]];
/// let b = array![[1.0], [2.0], [3.0]];
/// let c = array![[1.0], [1.0]];
/// let m = mttkrp(&x.view(), &[a.view(), b.view(), c.view()], 0).unwrap();
/// // Σ_j Σ_k b[j] c[k] = 6 * 2
/// assert_eq!(m[[0, 0]], 12.0);
/// ```
pub fn mttkrp(
    tensor: &ArrayViewD<f64>,
    factors: &[ArrayView2<f64>],
    mode: usize,
) -> KernelResult<Array2<f64>> {
    let shape = tensor.shape();
    let order = shape.len();

    if mode >= order {
        return Err(KernelError::invalid_mode(mode, order, "mttkrp mode out of range"));
    }
    if factors.len() != order {
        return Err(KernelError::dimension_mismatch(
            "mttkrp",
            vec![order],
            vec![factors.len()],
            "one factor matrix per tensor mode is required",
        ));
    }

    let rank = factors[0].ncols();
    for (m, factor) in factors.iter().enumerate() {
        if factor.nrows() != shape[m] || factor.ncols() != rank {
            return Err(KernelError::dimension_mismatch(
                "mttkrp",
                vec![shape[m], rank],
                factor.shape().to_vec(),
                format!("factor {} does not match mode size or rank", m),
            ));
        }
    }

    let mut result = Array2::<f64>::zeros((shape[mode], rank));
    let mut weights = vec![0.0; rank];
    for (index, &value) in tensor.indexed_iter() {
        if value == 0.0 {
            continue;
        }
        weights.iter_mut().for_each(|w| *w = value);
        for (m, factor) in factors.iter().enumerate() {
            if m == mode {
                continue;
            }
            let row = factor.row(index[m]);
            for (w, &u) in weights.iter_mut().zip(row.iter()) {
                *w *= u;
            }
        }
        let mut out = result.row_mut(index[mode]);
        for (o, &w) in out.iter_mut().zip(weights.iter()) {
            *o += w;
        }
    }

    Ok(result)
}
