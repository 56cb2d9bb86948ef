//! Non-negative tensor factorization
//!
//! An order-N array X ≥ 0 is approximated by N non-negative factors
//! `U_m (dim_m × F)`:
//!
//! ```text
//! X ≈ Σ_s U_0[:,s] ∘ U_1[:,s] ∘ … ∘ U_{N-1}[:,s]
//! ```
//!
//! For mode m the update of entry `(l, s)` uses
//!
//! ```text
//! num[l,s] = mttkrp(X, U, m)[l,s]
//! den[l,s] = Σ_j U_m[l,j] · Π_{o≠m} (U_oᵀU_o)[j,s]
//! ```
//!
//! either multiplicatively (`u ← u · num / (den + ε)`) or as a gradient step
//! on `den − num` followed by clipping at zero. See [`NtfUpdate`].

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    matrix_of, reject_empty, reject_nan, run_recording, AlgorithmState, LoadingMatrices,
    LoadingMatrixAccessor, Model, Unsupervised,
};
use crate::optimizers::{Optimizer, OptimizerConfig};
use crate::stopping::{Criterion, CriterionType};
use multiway_core::{default_backend, BackendRef, Tensor};
use multiway_kernels::{mttkrp, reconstruct};
use scirs2_core::ndarray_ext::{Array2, ArrayView2, ArrayViewD, Zip};

const NAME: &str = "NTF";
const SUPPORTED: &[CriterionType] = &[
    CriterionType::Iteration,
    CriterionType::Time,
    CriterionType::Improvement,
];

/// How the factor entries are moved each sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NtfUpdate {
    /// Multiplicative update, entry by entry in mode, component, row order
    #[default]
    Normalized,
    /// One optimizer per entry, stepped as soon as its gradient is known
    StepCustom,
    /// Gradients of all modes from the same factors, then one optimizer
    /// step per mode on the whole matrix
    IterationCustom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NtfConfig {
    pub num_components: usize,
    pub update: NtfUpdate,
    /// Used by the custom update modes
    pub optimizer: OptimizerConfig,
    /// Mode m is initialized from seed `seed + 1000·m`
    pub seed: u64,
    /// Added to the multiplicative denominator
    pub epsilon: f64,
}

impl Default for NtfConfig {
    fn default() -> Self {
        Self {
            num_components: 3,
            update: NtfUpdate::Normalized,
            optimizer: OptimizerConfig::sgd(),
            seed: 0,
            epsilon: 1e-7,
        }
    }
}

impl NtfConfig {
    pub fn with_num_components(mut self, num_components: usize) -> Self {
        self.num_components = num_components;
        self
    }

    pub fn with_update(mut self, update: NtfUpdate) -> Self {
        self.update = update;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Optimizer state of one build.
enum Updater {
    Normalized,
    /// `[mode][row * F + component]`
    Step(Vec<Vec<Box<dyn Optimizer>>>),
    /// `[mode]`
    Iteration(Vec<Box<dyn Optimizer>>),
}

impl Updater {
    fn new(config: &NtfConfig, shape: &[usize]) -> Self {
        let f = config.num_components;
        match config.update {
            NtfUpdate::Normalized => Updater::Normalized,
            NtfUpdate::StepCustom => Updater::Step(
                shape
                    .iter()
                    .map(|&dim| (0..dim * f).map(|_| config.optimizer.build()).collect())
                    .collect(),
            ),
            NtfUpdate::IterationCustom => {
                Updater::Iteration(shape.iter().map(|_| config.optimizer.build()).collect())
            }
        }
    }
}

/// Numerator matrix and the Hadamard product of the other modes' Gram
/// matrices for mode `m`.
fn mode_terms(
    x: &ArrayViewD<f64>,
    factors: &[Array2<f64>],
    m: usize,
) -> AlgorithmResult<(Array2<f64>, Array2<f64>)> {
    let views: Vec<ArrayView2<f64>> = factors.iter().map(|u| u.view()).collect();
    let numerator = mttkrp(x, &views, m)?;
    let f = factors[m].ncols();
    let mut gram = Array2::<f64>::ones((f, f));
    for (o, u) in factors.iter().enumerate() {
        if o != m {
            gram *= &u.t().dot(u);
        }
    }
    Ok((numerator, gram))
}

fn sweep(
    x: &ArrayViewD<f64>,
    factors: &mut [Array2<f64>],
    updater: &mut Updater,
    epsilon: f64,
) -> AlgorithmResult<()> {
    match updater {
        Updater::Normalized => {
            for m in 0..factors.len() {
                let (numerator, gram) = mode_terms(x, factors, m)?;
                let u = &mut factors[m];
                let (rows, f) = u.dim();
                for s in 0..f {
                    for l in 0..rows {
                        let denominator = u.row(l).dot(&gram.column(s));
                        u[[l, s]] *= numerator[[l, s]] / (denominator + epsilon);
                    }
                }
            }
        }
        Updater::Step(optimizers) => {
            for m in 0..factors.len() {
                let (numerator, gram) = mode_terms(x, factors, m)?;
                let u = &mut factors[m];
                let (rows, f) = u.dim();
                for s in 0..f {
                    for l in 0..rows {
                        let denominator = u.row(l).dot(&gram.column(s));
                        let gradient =
                            Array2::from_elem((1, 1), denominator - numerator[[l, s]]);
                        let mut value = Array2::from_elem((1, 1), u[[l, s]]);
                        optimizers[m][l * f + s].step(&mut value, &gradient)?;
                        u[[l, s]] = value[[0, 0]].max(0.0);
                    }
                }
            }
        }
        Updater::Iteration(optimizers) => {
            let current: &[Array2<f64>] = &*factors;
            let gradients = (0..current.len())
                .map(|m| {
                    let (numerator, gram) = mode_terms(x, current, m)?;
                    Ok(current[m].dot(&gram) - numerator)
                })
                .collect::<AlgorithmResult<Vec<_>>>()?;
            for ((u, gradient), optimizer) in
                factors.iter_mut().zip(&gradients).zip(optimizers.iter_mut())
            {
                optimizer.step(u, gradient)?;
                u.mapv_inplace(|v| v.max(0.0));
            }
        }
    }
    Ok(())
}

fn loss(x: &ArrayViewD<f64>, factors: &[Array2<f64>]) -> AlgorithmResult<f64> {
    let views: Vec<ArrayView2<f64>> = factors.iter().map(|u| u.view()).collect();
    let model = reconstruct(&views)?;
    let mut total = 0.0;
    Zip::from(x).and(&model).for_each(|&a, &b| {
        let d = a - b;
        total += d * d;
    });
    Ok(total)
}

/// Non-negative factorization of an order-N array.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{Criterion, Model, Ntf, NtfConfig, Unsupervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[5, 4, 3], 1).abs();
/// let mut ntf = Ntf::with_config(NtfConfig::default().with_num_components(2));
/// ntf.add_criterion(Criterion::iterations(30)).unwrap();
/// ntf.build(&x).unwrap();
///
/// assert_eq!(ntf.loss_history().len(), 30);
/// assert!(ntf.factors().unwrap().iter().all(|u| u.as_array().iter().all(|&v| v >= 0.0)));
/// ```
#[derive(Debug, Clone)]
pub struct Ntf {
    config: NtfConfig,
    state: AlgorithmState,
    backend: BackendRef,
    factors: Option<Vec<Array2<f64>>>,
    loss_history: Vec<f64>,
}

impl Default for Ntf {
    fn default() -> Self {
        Self::new()
    }
}

impl Ntf {
    pub fn new() -> Self {
        Self::with_config(NtfConfig::default())
    }

    pub fn with_config(config: NtfConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(NAME, SUPPORTED, [Criterion::iterations(1000)]),
            backend: default_backend(),
            factors: None,
            loss_history: Vec::new(),
        }
    }

    /// Draw the initial factors from `backend` instead of the default.
    pub fn with_backend(mut self, backend: BackendRef) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &NtfConfig {
        &self.config
    }

    /// Squared reconstruction error after every sweep, including the sweeps
    /// of a force-stopped build.
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// One `(dim_m × F)` factor per mode.
    pub fn factors(&self) -> AlgorithmResult<Vec<Tensor>> {
        Ok(self
            .built()?
            .iter()
            .map(|u| Tensor::from_matrix(u.clone()))
            .collect())
    }

    pub fn reconstruction(&self) -> AlgorithmResult<Tensor> {
        let views: Vec<ArrayView2<f64>> = self.built()?.iter().map(|u| u.view()).collect();
        Ok(Tensor::from_array(reconstruct(&views)?))
    }

    fn built(&self) -> AlgorithmResult<&Vec<Array2<f64>>> {
        self.state.ensure_finished()?;
        self.factors.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }

    fn validate(&self, x: &Tensor) -> AlgorithmResult<()> {
        if x.order() < 2 {
            return Err(AlgorithmError::invalid(format!(
                "NTF requires a tensor of order two or more, got order {}",
                x.order()
            )));
        }
        reject_empty(x, "X")?;
        reject_nan(
            x,
            "Input has missing data (NaNs found). NTF currently does not support missing data.",
        )?;
        if x.as_array().iter().any(|&v| v < 0.0) {
            return Err(AlgorithmError::invalid(
                "Input tensor contains negative values. NTF requires non-negative data.",
            ));
        }
        if self.config.num_components == 0 {
            return Err(AlgorithmError::invalid(
                "Number of components must be at least one",
            ));
        }
        Ok(())
    }

    fn initial_factors(&self, shape: &[usize]) -> AlgorithmResult<Vec<Array2<f64>>> {
        let f = self.config.num_components;
        shape
            .iter()
            .enumerate()
            .map(|(m, &dim)| {
                let seed = self.config.seed + 1000 * m as u64;
                matrix_of(&self.backend.random_normal(&[dim, f], seed).abs(), "factor")
            })
            .collect()
    }

    fn fit(&mut self, x: &Tensor) -> AlgorithmResult<()> {
        self.validate(x)?;
        let data = x.view();
        let mut factors = self.initial_factors(x.shape())?;
        let mut updater = Updater::new(&self.config, x.shape());
        let epsilon = self.config.epsilon;

        run_recording(&mut self.state, &mut self.loss_history, || {
            sweep(&data, &mut factors, &mut updater, epsilon)?;
            let value = loss(&data, &factors)?;
            tracing::trace!(loss = value, "NTF sweep");
            Ok(value)
        })?;
        tracing::debug!(
            iterations = self.loss_history.len(),
            loss = self.loss_history.last().copied(),
            "NTF converged"
        );
        self.factors = Some(factors);
        Ok(())
    }
}

impl Model for Ntf {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Unsupervised for Ntf {
    fn build(&mut self, x: &Tensor) -> AlgorithmResult<()> {
        self.factors = None;
        self.loss_history.clear();
        self.state.begin_build()?;
        let result = self.fit(x);
        self.state.end_build(result)
    }
}

impl LoadingMatrixAccessor for Ntf {
    /// Factors keyed `"U_<mode>"`.
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        Ok(self
            .built()?
            .iter()
            .enumerate()
            .map(|(m, u)| (format!("U_{}", m), Tensor::from_matrix(u.clone())))
            .collect())
    }
}
