//! Column statistics and preprocessing for two-way data blocks
//!
//! Samples are rows and variables are columns throughout. Standard
//! deviations are sample estimates (n − 1); a zero or undefined deviation is
//! replaced by 1 so constant columns pass through scaling unchanged.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{KernelError, KernelResult};
use crate::matricize::{fold, matricize};
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis};

/// Mean of each column. Empty inputs give zeros.
pub fn column_means(x: &ArrayView2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// Sample standard deviation of each column, with zero mapped to 1.
pub fn column_std(x: &ArrayView2<f64>) -> Array1<f64> {
    let n = x.nrows();
    if n < 2 {
        return Array1::ones(x.ncols());
    }
    let means = column_means(x);
    let mut std = Array1::<f64>::zeros(x.ncols());
    for (j, column) in x.axis_iter(Axis(1)).enumerate() {
        let ss: f64 = column.iter().map(|v| (v - means[j]).powi(2)).sum();
        let s = (ss / (n - 1) as f64).sqrt();
        std[j] = if s.is_finite() && s > 0.0 { s } else { 1.0 };
    }
    std
}

/// `(x - means) / stds`, column-wise.
pub fn scale_with(x: &ArrayView2<f64>, means: &ArrayView1<f64>, stds: &ArrayView1<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        for ((v, &m), &s) in row.iter_mut().zip(means.iter()).zip(stds.iter()) {
            *v = (*v - m) / s;
        }
    }
    out
}

/// Inverse of [`scale_with`]: `x * stds + means`.
pub fn unscale_with(x: &ArrayView2<f64>, means: &ArrayView1<f64>, stds: &ArrayView1<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        for ((v, &m), &s) in row.iter_mut().zip(means.iter()).zip(stds.iter()) {
            *v = *v * s + m;
        }
    }
    out
}

/// Column statistics captured when a block is preprocessed.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    pub means: Array1<f64>,
    /// All ones when the block was only centered
    pub stds: Array1<f64>,
}

impl Scaling {
    /// Estimate means (and deviations when `standardize`) from `x`.
    pub fn fit(x: &ArrayView2<f64>, standardize: bool) -> Self {
        let means = column_means(x);
        let stds = if standardize {
            column_std(x)
        } else {
            Array1::ones(x.ncols())
        };
        Self { means, stds }
    }

    pub fn apply(&self, x: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
        self.check_width("scale", x.ncols())?;
        Ok(scale_with(x, &self.means.view(), &self.stds.view()))
    }

    pub fn invert(&self, x: &ArrayView2<f64>) -> KernelResult<Array2<f64>> {
        self.check_width("unscale", x.ncols())?;
        Ok(unscale_with(x, &self.means.view(), &self.stds.view()))
    }

    fn check_width(&self, operation: &str, width: usize) -> KernelResult<()> {
        if width != self.means.len() {
            return Err(KernelError::dimension_mismatch(
                operation,
                vec![self.means.len()],
                vec![width],
                "column count differs from the fitted block",
            ));
        }
        Ok(())
    }
}

/// Center the columns of `x`, returning the centered block and the means.
pub fn center(x: &ArrayView2<f64>) -> (Array2<f64>, Array1<f64>) {
    let means = column_means(x);
    let centered = scale_with(x, &means.view(), &Array1::ones(x.ncols()).view());
    (centered, means)
}

/// Center and scale an order-3 tensor along `axis`.
///
/// The tensor is unfolded along `axis`; each column of the unfolding is
/// centered, and each row is divided by the L2 norm of the corresponding
/// row of the uncentered unfolding. Rows of zero norm are left unscaled.
pub fn standardize_tensor(x: &ArrayViewD<f64>, axis: usize) -> KernelResult<ArrayD<f64>> {
    if x.ndim() != 3 {
        return Err(KernelError::order_mismatch("standardize_tensor", 3, x.ndim()));
    }
    let unfolded = matricize(x, axis)?;
    let (mut centered, _) = center(&unfolded.view());
    for (mut row, raw) in centered.axis_iter_mut(Axis(0)).zip(unfolded.axis_iter(Axis(0))) {
        let norm = raw.dot(&raw).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    fold(&centered.view(), x.shape(), axis)
}

/// Scale every non-zero column to unit L2 norm.
pub fn normalize_columns(x: &ArrayView2<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut column in out.axis_iter_mut(Axis(1)) {
        let norm = column.dot(&column).sqrt();
        if norm > 0.0 {
            column.mapv_inplace(|v| v / norm);
        }
    }
    out
}

/// Sum of squared elementwise differences.
pub fn squared_distance(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> KernelResult<f64> {
    if a.shape() != b.shape() {
        return Err(KernelError::dimension_mismatch(
            "squared_distance",
            a.shape().to_vec(),
            b.shape().to_vec(),
            "operands must have the same shape",
        ));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum())
}

/// Squared distance divided by the number of rows.
pub fn mean_squared_error(a: &ArrayView2<f64>, b: &ArrayView2<f64>) -> KernelResult<f64> {
    let rows = a.nrows().max(1) as f64;
    Ok(squared_distance(a, b)? / rows)
}
