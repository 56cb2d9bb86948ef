//! Two-way principal component analysis
//!
//! Components come from the SVD of whichever covariance is smaller: the
//! `(nx × nx)` matrix `XᵀX / (I−1)` when there are fewer variables than
//! samples, otherwise the `(I × I)` matrix `XXᵀ / (I−1)` whose singular
//! vectors are mapped back through `Xᵀ` and column-normalized.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    matrix_of, reject_empty, reject_nan, AlgorithmState, Filter, LoadingMatrices,
    LoadingMatrixAccessor, Model, Unsupervised,
};
use crate::stopping::Criterion;
use multiway_core::Tensor;
use multiway_kernels::{center, svd, Scaling};
use scirs2_core::ndarray_ext::{s, Array1, Array2, Axis};

const NAME: &str = "TwoWayPCA";

#[derive(Debug, Clone, PartialEq)]
pub struct PcaConfig {
    pub num_components: usize,
    /// Divide filtered scores by the square root of the explained variance
    pub whiten: bool,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            num_components: 3,
            whiten: false,
        }
    }
}

impl PcaConfig {
    pub fn with_num_components(mut self, num_components: usize) -> Self {
        self.num_components = num_components;
        self
    }

    pub fn with_whiten(mut self, whiten: bool) -> Self {
        self.whiten = whiten;
        self
    }
}

/// First `f` principal directions of an already centered block, and the
/// corresponding covariance singular values.
pub(crate) fn principal_components(
    xc: &Array2<f64>,
    f: usize,
) -> AlgorithmResult<(Array2<f64>, Array1<f64>)> {
    let (rows, nx) = xc.dim();
    let denom = (rows.max(2) - 1) as f64;

    let (components, values) = if nx < rows {
        let cov = xc.t().dot(xc) / denom;
        let decomposition = svd(&cov.view())?;
        (decomposition.v, decomposition.singular_values)
    } else {
        let cov = xc.dot(&xc.t()) / denom;
        let decomposition = svd(&cov.view())?;
        let mut v = xc.t().dot(&decomposition.v);
        for mut column in v.axis_iter_mut(Axis(1)) {
            let norm = column.dot(&column).sqrt();
            if norm > 0.0 {
                column.mapv_inplace(|x| x / norm);
            }
        }
        (v, decomposition.singular_values)
    };

    let f = f.min(components.ncols());
    Ok((
        components.slice(s![.., ..f]).to_owned(),
        values.slice(s![..f, 0]).to_owned(),
    ))
}

#[derive(Debug, Clone)]
struct PcaFit {
    means: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    t: Array2<f64>,
}

/// Principal component analysis of an `(I × nx)` matrix.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{PcaConfig, TwoWayPca, Unsupervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[10, 4], 3);
/// let mut pca = TwoWayPca::with_config(PcaConfig::default().with_num_components(2));
/// pca.build(&x).unwrap();
/// assert_eq!(pca.explained_variance().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TwoWayPca {
    config: PcaConfig,
    state: AlgorithmState,
    fit: Option<PcaFit>,
}

impl Default for TwoWayPca {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoWayPca {
    pub fn new() -> Self {
        Self::with_config(PcaConfig::default())
    }

    pub fn with_config(config: PcaConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(NAME, &[], std::iter::empty::<Criterion>()),
            fit: None,
        }
    }

    pub fn config(&self) -> &PcaConfig {
        &self.config
    }

    /// Variance captured by each component, largest first.
    pub fn explained_variance(&self) -> AlgorithmResult<&Array1<f64>> {
        Ok(&self.built()?.explained_variance)
    }

    fn built(&self) -> AlgorithmResult<&PcaFit> {
        self.state.ensure_finished()?;
        self.fit.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }

    fn decompose(&self, x: &Tensor) -> AlgorithmResult<PcaFit> {
        reject_empty(x, "X")?;
        reject_nan(
            x,
            "Input has missing data (NaNs found). TwoWayPCA currently does not support missing data.",
        )?;
        let xm = matrix_of(x, "X")?;
        let (rows, nx) = xm.dim();
        let f = self.config.num_components;
        if rows < 2 {
            return Err(AlgorithmError::invalid("PCA needs at least two samples"));
        }
        if f == 0 || f > rows.min(nx) {
            return Err(AlgorithmError::invalid(format!(
                "Number of components must be between 1 and {}, got {}",
                rows.min(nx),
                f
            )));
        }

        let (xc, means) = center(&xm.view());
        let (components, explained_variance) = principal_components(&xc, f)?;
        let t = xc.dot(&components);
        tracing::debug!(components = f, variables = nx, "principal components extracted");
        Ok(PcaFit {
            means,
            components,
            explained_variance,
            t,
        })
    }
}

impl Model for TwoWayPca {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Unsupervised for TwoWayPca {
    fn build(&mut self, x: &Tensor) -> AlgorithmResult<()> {
        self.fit = None;
        self.state.begin_build()?;
        let result = self.decompose(x);
        self.fit = Some(self.state.end_build(result)?);
        Ok(())
    }
}

impl Filter for TwoWayPca {
    /// `(X − mean) · components`, whitened when configured.
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        let xm = matrix_of(x, "X")?;
        let centering = Scaling {
            means: fit.means.clone(),
            stds: Array1::ones(fit.means.len()),
        };
        let mut scores = centering.apply(&xm.view())?.dot(&fit.components);
        if self.config.whiten {
            for (mut column, &variance) in scores
                .axis_iter_mut(Axis(1))
                .zip(fit.explained_variance.iter())
            {
                let scale = variance.sqrt();
                if scale > 0.0 {
                    column.mapv_inplace(|v| v / scale);
                }
            }
        }
        Ok(Tensor::from_matrix(scores))
    }
}

impl LoadingMatrixAccessor for TwoWayPca {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        let fit = self.built()?;
        Ok([("T", &fit.t), ("COMPONENTS", &fit.components)]
            .into_iter()
            .map(|(k, m)| (k.to_string(), Tensor::from_matrix(m.clone())))
            .collect())
    }
}
