//! SO-N-PLS: sequential and orthogonalized multi-block N-PLS
//!
//! Blocks are fitted one after another against the response residual. Each
//! block after the first is first orthogonalized against the scores of all
//! earlier block models,
//!
//! ```text
//! Xi ← Xi − Σ_k Tk (TkᵀTk)⁻¹ Tkᵀ Xi
//! ```
//!
//! so it only explains what the earlier blocks could not. Two-way blocks are
//! treated as `(I × J × 1)` arrays. Predictions are the sum of the block
//! models' predictions.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    reject_empty, reject_nan, AlgorithmState, BestSoFar, LoadingMatrices, LoadingMatrixAccessor,
    Model, MultiBlockSupervised, Supervised,
};
use crate::npls::{NPls, NPlsConfig, SUPPORTED};
use crate::pls2::response_matrix;
use crate::stopping::Criterion;
use multiway_core::Tensor;
use multiway_kernels::{invert_matricize, invert_or_pseudo, matricize, mean_squared_error};
use scirs2_core::ndarray_ext::Array2;

const NAME: &str = "SO-N-PLS";

#[derive(Debug, Clone, PartialEq)]
pub struct SoNPlsConfig {
    /// Components per block; ignored when `auto_num_components` is set
    pub num_components: Vec<usize>,
    /// Pick each block's component count by training error
    pub auto_num_components: bool,
    /// Upper bound of the automatic search
    pub max_auto_components: usize,
    pub standardize_y: bool,
}

impl Default for SoNPlsConfig {
    fn default() -> Self {
        Self {
            num_components: Vec::new(),
            auto_num_components: true,
            max_auto_components: 10,
            standardize_y: false,
        }
    }
}

impl SoNPlsConfig {
    /// Fixed component counts, one per block. Turns automatic selection off.
    pub fn with_num_components(mut self, num_components: Vec<usize>) -> Self {
        self.num_components = num_components;
        self.auto_num_components = false;
        self
    }

    pub fn with_auto_num_components(mut self, auto: bool) -> Self {
        self.auto_num_components = auto;
        self
    }

    pub fn with_max_auto_components(mut self, max: usize) -> Self {
        self.max_auto_components = max;
        self
    }

    pub fn with_standardize_y(mut self, standardize_y: bool) -> Self {
        self.standardize_y = standardize_y;
        self
    }
}

/// Multi-block regression with one N-PLS model per block.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{MultiBlockSupervised, SoNPls, SoNPlsConfig};
/// use multiway_core::Tensor;
///
/// let blocks = vec![
///     Tensor::random_normal(&[12, 3, 2], 1),
///     Tensor::random_normal(&[12, 4], 2),
/// ];
/// let y = Tensor::random_normal(&[12, 1], 3);
/// let mut model = SoNPls::with_config(SoNPlsConfig::default().with_num_components(vec![2, 1]));
/// model.build(&blocks, &y).unwrap();
/// assert_eq!(model.predict(&blocks).unwrap().shape(), &[12, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct SoNPls {
    config: SoNPlsConfig,
    state: AlgorithmState,
    models: Vec<NPls>,
}

impl Default for SoNPls {
    fn default() -> Self {
        Self::new()
    }
}

/// Order-3 view of a block; matrices gain a trailing axis of length one.
fn as_cube(block: &Tensor) -> AlgorithmResult<Tensor> {
    match block.order() {
        3 => Ok(block.clone()),
        2 => block
            .reshape(&[block.shape()[0], block.shape()[1], 1])
            .map_err(|e| AlgorithmError::invalid(e.to_string())),
        n => Err(AlgorithmError::invalid(format!(
            "X-blocks must be matrices or three-way arrays, got order {}",
            n
        ))),
    }
}

/// Remove from `block` its projection onto every score matrix in `scores`.
fn orthogonalize(block: &Tensor, scores: &[Array2<f64>]) -> AlgorithmResult<Tensor> {
    let (dim_j, dim_k) = (block.shape()[1], block.shape()[2]);
    let xm = matricize(&block.view(), 0)?;
    let mut orthogonal = xm.clone();
    for t in scores {
        let projector = t.dot(&invert_or_pseudo(&t.t().dot(t).view())?).dot(&t.t());
        orthogonal = orthogonal - projector.dot(&xm);
    }
    Ok(Tensor::from_array(invert_matricize(
        &orthogonal.view(),
        0,
        dim_j,
        dim_k,
    )?))
}

fn block_prediction(model: &NPls, block: &Tensor) -> AlgorithmResult<Array2<f64>> {
    model
        .predict(block)?
        .to_matrix()
        .map_err(|e| AlgorithmError::Numerical(e.to_string()))
}

impl SoNPls {
    pub fn new() -> Self {
        Self::with_config(SoNPlsConfig::default())
    }

    pub fn with_config(config: SoNPlsConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(
                NAME,
                SUPPORTED,
                [Criterion::iterations(250), Criterion::improvement(1e-7)],
            ),
            models: Vec::new(),
        }
    }

    pub fn config(&self) -> &SoNPlsConfig {
        &self.config
    }

    /// Component count chosen for each block by the last build.
    pub fn block_components(&self) -> AlgorithmResult<Vec<usize>> {
        self.state.ensure_finished()?;
        Ok(self
            .models
            .iter()
            .map(|model| model.config().num_components)
            .collect())
    }

    fn validate(&self, blocks: &[Tensor], y: &Tensor) -> AlgorithmResult<()> {
        if blocks.is_empty() {
            return Err(AlgorithmError::invalid("At least one X-block is required"));
        }
        reject_empty(y, "Y")?;
        let message =
            "Input has missing data (NaNs found). SO-N-PLS currently does not support missing data.";
        reject_nan(y, message)?;
        for block in blocks {
            reject_empty(block, "X-block")?;
            if !(2..=3).contains(&block.order()) {
                return Err(AlgorithmError::invalid(format!(
                    "X-blocks must be matrices or three-way arrays, got order {}",
                    block.order()
                )));
            }
            if block.shape()[0] != y.shape()[0] {
                return Err(AlgorithmError::invalid(
                    "Independent and dependent variables must be of the same length.",
                ));
            }
            reject_nan(block, message)?;
        }
        if self.config.auto_num_components {
            if self.config.max_auto_components == 0 {
                return Err(AlgorithmError::invalid(
                    "Maximum number of automatic components must be at least one",
                ));
            }
        } else if self.config.num_components.len() != blocks.len() {
            return Err(AlgorithmError::invalid(format!(
                "Number of components array does not match number of X-blocks. Was {} but should be {}.",
                self.config.num_components.len(),
                blocks.len()
            )));
        }
        Ok(())
    }

    fn block_model(&self, num_components: usize) -> NPls {
        NPls::for_block(
            NPlsConfig::default()
                .with_num_components(num_components)
                .with_standardize_y(self.config.standardize_y),
            self.state.criteria(),
            self.state.stop_handle(),
        )
    }

    /// Fit every candidate component count and keep the lowest training error.
    fn best_block_model(&self, block: &Tensor, y: &Array2<f64>) -> AlgorithmResult<NPls> {
        let max = (block.shape()[1] * block.shape()[2]).min(self.config.max_auto_components);
        let target = Tensor::from_matrix(y.clone());
        let mut best = BestSoFar::new();
        for k in 1..=max {
            let mut model = self.block_model(k);
            model.build(block, &target)?;
            let prediction = block_prediction(&model, block)?;
            let mse = mean_squared_error(&prediction.view(), &y.view())?;
            tracing::debug!(algorithm = NAME, components = k, mse, "candidate block model");
            best.offer(mse, model);
        }
        best.into_inner()
            .map(|(_, model)| model)
            .ok_or_else(|| AlgorithmError::Numerical("no candidate block model was built".into()))
    }

    fn fit_blocks(&self, blocks: &[Tensor], y: &Tensor) -> AlgorithmResult<Vec<NPls>> {
        let mut yres = response_matrix(y)?;
        let mut scores: Vec<Array2<f64>> = Vec::with_capacity(blocks.len());
        let mut models = Vec::with_capacity(blocks.len());

        for (i, block) in blocks.iter().enumerate() {
            let cube = as_cube(block)?;
            let xi = if i == 0 {
                cube
            } else {
                orthogonalize(&cube, &scores)?
            };

            let model = if self.config.auto_num_components {
                self.best_block_model(&xi, &yres)?
            } else {
                let mut model = self.block_model(self.config.num_components[i]);
                model.build(&xi, &Tensor::from_matrix(yres.clone()))?;
                model
            };
            tracing::debug!(
                algorithm = NAME,
                block = i,
                components = model.config().num_components,
                "block model fitted"
            );

            scores.push(model.scores()?.clone());
            yres = yres - block_prediction(&model, &xi)?;
            models.push(model);
        }
        Ok(models)
    }
}

impl Model for SoNPls {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl MultiBlockSupervised for SoNPls {
    fn build(&mut self, blocks: &[Tensor], y: &Tensor) -> AlgorithmResult<()> {
        self.models.clear();
        self.state.begin_build()?;
        let result = self
            .validate(blocks, y)
            .and_then(|_| self.fit_blocks(blocks, y));
        self.models = self.state.end_build(result)?;
        Ok(())
    }

    fn predict(&self, blocks: &[Tensor]) -> AlgorithmResult<Tensor> {
        self.state.ensure_finished()?;
        if blocks.len() != self.models.len() {
            return Err(AlgorithmError::invalid(format!(
                "Expected {} X-blocks, got {}",
                self.models.len(),
                blocks.len()
            )));
        }
        let mut total: Option<Array2<f64>> = None;
        for (model, block) in self.models.iter().zip(blocks) {
            let prediction = block_prediction(model, &as_cube(block)?)?;
            total = Some(match total {
                Some(sum) => sum + prediction,
                None => prediction,
            });
        }
        total
            .map(Tensor::from_matrix)
            .ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }
}

impl LoadingMatrixAccessor for SoNPls {
    /// Every block model's matrices, keyed `"<key>_<block>"`.
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        self.state.ensure_finished()?;
        let mut out = LoadingMatrices::new();
        for (i, model) in self.models.iter().enumerate() {
            for (key, matrix) in model.loading_matrices()? {
                out.insert(format!("{}_{}", key, i), matrix);
            }
        }
        Ok(out)
    }
}
