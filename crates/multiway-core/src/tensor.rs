//! Dense N-dimensional tensor used by every multiway algorithm.
//!
//! [`Tensor`] wraps a dynamically-dimensioned `f64` array from
//! `scirs2_core::ndarray_ext`. It is immutable by convention: the shape
//! operations return new tensors and copies never alias each other.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Random numbers come from `scirs2_core::random`.

use scirs2_core::ndarray_ext::{Array, Array2, ArrayView, ArrayViewMut, Ix2, IxDyn};
use scirs2_core::random::{rngs::StdRng, Rng, SeedableRng};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// Dense `f64` tensor of arbitrary order.
///
/// # Examples
///
/// ```
/// use multiway_core::Tensor;
///
/// let x = Tensor::from_vec((0..24).map(f64::from).collect(), &[2, 3, 4]).unwrap();
/// assert_eq!(x.order(), 3);
/// assert_eq!(x.get(&[1, 2, 3]), Some(23.0));
/// assert_eq!(x.get(&[2, 0, 0]), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub(crate) data: Array<f64, IxDyn>,
}

impl Tensor {
    /// Wrap an existing dynamic-dimension array.
    pub fn from_array(array: Array<f64, IxDyn>) -> Self {
        Self { data: array }
    }

    /// Wrap a matrix as an order-2 tensor.
    pub fn from_matrix(matrix: Array2<f64>) -> Self {
        Self {
            data: matrix.into_dyn(),
        }
    }

    /// Create a tensor from row-major data.
    ///
    /// # Errors
    ///
    /// Fails when `vec.len()` differs from the product of `shape`.
    pub fn from_vec(vec: Vec<f64>, shape: &[usize]) -> anyhow::Result<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            anyhow::bail!(
                "Shape {:?} requires {} elements, but got {}",
                shape,
                total,
                vec.len()
            );
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec)?;
        Ok(Self { data: array })
    }

    /// Create a matrix tensor from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> anyhow::Result<Self> {
        let ncols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            anyhow::bail!(
                "Row {} has {} entries, expected {}",
                bad,
                rows[bad].len(),
                ncols
            );
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::from_vec(flat, &[rows.len(), ncols])
    }

    /// Tensor filled with `value`.
    pub fn from_elem(shape: &[usize], value: f64) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// Tensor of zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_elem(shape, 0.0)
    }

    /// Tensor of ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::from_elem(shape, 1.0)
    }

    /// Standard normal draws from a generator seeded with `seed`.
    ///
    /// The same `(shape, seed)` pair always yields the same tensor.
    ///
    /// ```
    /// use multiway_core::Tensor;
    ///
    /// let a = Tensor::random_normal(&[4, 3], 7);
    /// let b = Tensor::random_normal(&[4, 3], 7);
    /// assert_eq!(a, b);
    /// ```
    pub fn random_normal(shape: &[usize], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let total: usize = shape.iter().product();
        let mut data = Vec::with_capacity(total);
        // Box-Muller, two draws per pair of uniforms
        while data.len() < total {
            let u1 = 1.0 - rng.random::<f64>();
            let u2 = rng.random::<f64>();
            let radius = (-2.0 * u1.ln()).sqrt();
            let angle = 2.0 * std::f64::consts::PI * u2;
            data.push(radius * angle.cos());
            if data.len() < total {
                data.push(radius * angle.sin());
            }
        }
        Self {
            data: Array::from_shape_vec(IxDyn(shape), data)
                .unwrap_or_else(|_| Array::zeros(IxDyn(shape))),
        }
    }

    /// Number of axes.
    pub fn order(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Size along `axis`, or `None` when the axis does not exist.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.data.shape().get(axis).copied()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when any axis has length zero or the tensor has no axes.
    pub fn has_zero_dim(&self) -> bool {
        self.order() == 0 || self.shape().iter().any(|&d| d == 0)
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    pub fn as_array(&self) -> &Array<f64, IxDyn> {
        &self.data
    }

    pub fn into_array(self) -> Array<f64, IxDyn> {
        self.data
    }

    pub fn view(&self) -> ArrayView<'_, f64, IxDyn> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut<'_, f64, IxDyn> {
        self.data.view_mut()
    }

    /// Bounds-checked element read.
    ///
    /// Returns `None` for an index of the wrong length or out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if !self.index_in_bounds(index) {
            return None;
        }
        Some(self.data[IxDyn(index)])
    }

    /// Bounds-checked element write.
    pub fn set(&mut self, index: &[usize], value: f64) -> anyhow::Result<()> {
        if !self.index_in_bounds(index) {
            anyhow::bail!(
                "Index {:?} out of bounds for tensor of shape {:?}",
                index,
                self.shape()
            );
        }
        self.data[IxDyn(index)] = value;
        Ok(())
    }

    fn index_in_bounds(&self, index: &[usize]) -> bool {
        index.len() == self.order() && index.iter().zip(self.shape()).all(|(&i, &d)| i < d)
    }

    /// Copy of an order-2 tensor as a matrix.
    ///
    /// An order-1 tensor is returned as a single column.
    pub fn to_matrix(&self) -> anyhow::Result<Array2<f64>> {
        match self.order() {
            1 => {
                let n = self.len();
                Ok(Array2::from_shape_vec((n, 1), self.data.iter().copied().collect())?)
            }
            2 => Ok(self.data.view().into_dimensionality::<Ix2>()?.to_owned()),
            order => anyhow::bail!("Expected a matrix, got a tensor of order {}", order),
        }
    }

    /// Row-major reshape.
    pub fn reshape(&self, new_shape: &[usize]) -> anyhow::Result<Self> {
        let new_size: usize = new_shape.iter().product();
        if new_size != self.len() {
            anyhow::bail!(
                "Cannot reshape tensor of size {} into shape {:?} (size {})",
                self.len(),
                new_shape,
                new_size
            );
        }
        let flat: Vec<f64> = self.data.iter().copied().collect();
        Ok(Self {
            data: Array::from_shape_vec(IxDyn(new_shape), flat)?,
        })
    }

    /// Reorder axes; `axes[i]` names the source axis placed at position `i`.
    pub fn permute(&self, axes: &[usize]) -> anyhow::Result<Self> {
        if axes.len() != self.order() {
            anyhow::bail!(
                "Permutation axes length ({}) must match tensor order ({})",
                axes.len(),
                self.order()
            );
        }
        let mut sorted = axes.to_vec();
        sorted.sort_unstable();
        if sorted.iter().enumerate().any(|(i, &ax)| ax != i) {
            anyhow::bail!("Invalid permutation: {:?}", axes);
        }
        Ok(Self {
            data: self
                .data
                .clone()
                .permuted_axes(IxDyn(axes))
                .as_standard_layout()
                .to_owned(),
        })
    }

    /// Elementwise map into a new tensor.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.mapv(f),
        }
    }

    pub fn abs(&self) -> Self {
        self.map(f64::abs)
    }

    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Sum of squared elementwise differences.
    ///
    /// # Errors
    ///
    /// Fails when the shapes differ.
    pub fn squared_distance(&self, other: &Tensor) -> anyhow::Result<f64> {
        if self.shape() != other.shape() {
            anyhow::bail!(
                "Shape mismatch: {:?} vs {:?}",
                self.shape(),
                other.shape()
            );
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum())
    }
}

impl From<Array2<f64>> for Tensor {
    fn from(matrix: Array2<f64>) -> Self {
        Self::from_matrix(matrix)
    }
}

impl From<Array<f64, IxDyn>> for Tensor {
    fn from(array: Array<f64, IxDyn>) -> Self {
        Self::from_array(array)
    }
}

impl Index<&[usize]> for Tensor {
    type Output = f64;

    fn index(&self, index: &[usize]) -> &f64 {
        &self.data[IxDyn(index)]
    }
}

impl IndexMut<&[usize]> for Tensor {
    fn index_mut(&mut self, index: &[usize]) -> &mut f64 {
        &mut self.data[IxDyn(index)]
    }
}

impl<const N: usize> Index<&[usize; N]> for Tensor {
    type Output = f64;

    fn index(&self, index: &[usize; N]) -> &f64 {
        &self.data[IxDyn(index)]
    }
}

impl<const N: usize> IndexMut<&[usize; N]> for Tensor {
    fn index_mut(&mut self, index: &[usize; N]) -> &mut f64 {
        &mut self.data[IxDyn(index)]
    }
}

// Binary operators require identical shapes and panic otherwise,
// matching ndarray's own operator semantics.
impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: &Tensor) -> Tensor {
        assert_eq!(self.shape(), rhs.shape(), "tensor shapes must match");
        Tensor {
            data: &self.data + &rhs.data,
        }
    }
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, rhs: &Tensor) -> Tensor {
        assert_eq!(self.shape(), rhs.shape(), "tensor shapes must match");
        Tensor {
            data: &self.data - &rhs.data,
        }
    }
}

impl Mul<f64> for &Tensor {
    type Output = Tensor;

    fn mul(self, rhs: f64) -> Tensor {
        Tensor {
            data: &self.data * rhs,
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?})\n{}", self.shape(), self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
    }

    #[test]
    fn test_get_set_bounds() {
        let mut t = Tensor::zeros(&[2, 3]);
        t.set(&[1, 2], 5.0).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(5.0));
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0]), None);
        assert!(t.set(&[0, 3], 1.0).is_err());
    }

    #[test]
    fn test_random_normal_is_seeded() {
        let a = Tensor::random_normal(&[5, 3], 0);
        let b = Tensor::random_normal(&[5, 3], 0);
        let c = Tensor::random_normal(&[5, 3], 1000);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.shape(), &[5, 3]);
        assert!(a.as_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_random_normal_odd_length() {
        let t = Tensor::random_normal(&[7], 3);
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn test_permute_is_standard_layout() {
        let t = Tensor::from_vec((0..6).map(f64::from).collect(), &[2, 3]).unwrap();
        let p = t.permute(&[1, 0]).unwrap();
        assert_eq!(p.shape(), &[3, 2]);
        assert_eq!(p.get(&[2, 1]), Some(5.0));
        let flat: Vec<f64> = p.reshape(&[6]).unwrap().as_array().iter().copied().collect();
        assert_eq!(flat, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_permute_invalid() {
        let t = Tensor::zeros(&[2, 3, 4]);
        assert!(t.permute(&[0, 1]).is_err());
        assert!(t.permute(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_to_matrix() {
        let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let m = t.to_matrix().unwrap();
        assert_eq!(m[[1, 0]], 3.0);

        let v = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        assert_eq!(v.to_matrix().unwrap().shape(), &[3, 1]);

        assert!(Tensor::zeros(&[2, 2, 2]).to_matrix().is_err());
    }

    #[test]
    fn test_from_rows_ragged() {
        assert!(Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_nan_and_zero_dim() {
        let mut t = Tensor::ones(&[2, 2]);
        assert!(!t.has_nan());
        t.set(&[0, 1], f64::NAN).unwrap();
        assert!(t.has_nan());
        assert!(Tensor::zeros(&[3, 0]).has_zero_dim());
        assert!(!Tensor::zeros(&[3, 1]).has_zero_dim());
    }

    #[test]
    fn test_operators() {
        let a = Tensor::from_elem(&[2, 2], 3.0);
        let b = Tensor::ones(&[2, 2]);
        assert_eq!((&a - &b).get(&[0, 0]), Some(2.0));
        assert_eq!((&a + &b).get(&[1, 1]), Some(4.0));
        assert_eq!((&a * 2.0).get(&[1, 0]), Some(6.0));
        assert_eq!(a.squared_distance(&b).unwrap(), 16.0);
        assert!(a.squared_distance(&Tensor::ones(&[4])).is_err());
    }

    #[test]
    fn test_value_semantics() {
        let a = Tensor::ones(&[2]);
        let mut b = a.clone();
        b.set(&[0], 9.0).unwrap();
        assert_eq!(a.get(&[0]), Some(1.0));
    }
}
