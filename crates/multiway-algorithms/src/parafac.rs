//! PARAFAC (trilinear decomposition via alternating least squares)
//!
//! A three-way array X of shape (I, J, K) is modelled as
//!
//! X[i,j,k] ≈ Σ_f A[i,f] · B[j,f] · C[k,f]
//!
//! or, on the unfoldings, `X_(0) = A·kr(C,B)ᵀ`, `X_(1) = B·kr(C,A)ᵀ` and
//! `X_(2) = C·kr(B,A)ᵀ`. Each ALS sweep solves those three least-squares
//! problems in turn with the other two factors held fixed.
//!
//! With random initialization the decomposition can be restarted several
//! times; the restart with the lowest final loss is kept. The kept factors
//! are then normalized:
//!
//! 1. column norms of B and C are moved into A
//! 2. components are ordered by descending `diag(AᵀA)`
//! 3. every column of C and B is flipped so its largest-magnitude entry is
//!    positive, with the same flips applied to A
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    matrix_of, reject_nan, run_recording, AlgorithmState, BestSoFar, Filter,
    LoadingMatrices, LoadingMatrixAccessor, Model, Unsupervised,
};
use crate::stopping::{Criterion, CriterionType};
use multiway_core::{default_backend, BackendRef, Tensor};
use multiway_kernels::{
    khatri_rao, matricize, orth, pseudo_invert, reconstruct, squared_distance, symmetric_eigen,
};
use scirs2_core::ndarray_ext::{Array1, Array2, Axis};

const NAME: &str = "PARAFAC";
const SUPPORTED: &[CriterionType] = &[
    CriterionType::Iteration,
    CriterionType::Time,
    CriterionType::Improvement,
];

/// Eigenvalues below this are skipped by the SVD initialization.
const EIGENVALUE_FLOOR: f64 = 1e-6;

/// Starting point of each restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initialization {
    /// A zero, B and C standard normal seeded by the restart index
    Random,
    /// As `Random`, with B and C orthogonalized
    RandomOrthogonalized,
    /// Leading eigenvectors of `X_(m)X_(m)ᵀ` for every mode (deterministic,
    /// so only one start is made)
    #[default]
    Svd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParafacConfig {
    pub num_components: usize,
    pub num_starts: usize,
    pub initialization: Initialization,
}

impl Default for ParafacConfig {
    fn default() -> Self {
        Self {
            num_components: 3,
            num_starts: 1,
            initialization: Initialization::Svd,
        }
    }
}

impl ParafacConfig {
    pub fn with_num_components(mut self, num_components: usize) -> Self {
        self.num_components = num_components;
        self
    }

    pub fn with_num_starts(mut self, num_starts: usize) -> Self {
        self.num_starts = num_starts;
        self
    }

    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }
}

#[derive(Debug, Clone)]
struct Factors {
    a: Array2<f64>,
    b: Array2<f64>,
    c: Array2<f64>,
}

/// PARAFAC model.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{Criterion, Model, Parafac, ParafacConfig, Unsupervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[6, 5, 4], 1);
/// let mut parafac = Parafac::with_config(ParafacConfig::default().with_num_components(2));
/// parafac.add_criterion(Criterion::iterations(20)).unwrap();
/// parafac.build(&x).unwrap();
///
/// assert_eq!(parafac.loss_history()[0].len(), 20);
/// ```
#[derive(Debug, Clone)]
pub struct Parafac {
    config: ParafacConfig,
    state: AlgorithmState,
    backend: BackendRef,
    factors: Option<Factors>,
    loss_history: Vec<Vec<f64>>,
    best_loss: Option<f64>,
}

impl Default for Parafac {
    fn default() -> Self {
        Self::new()
    }
}

impl Parafac {
    pub fn new() -> Self {
        Self::with_config(ParafacConfig::default())
    }

    pub fn with_config(config: ParafacConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(NAME, SUPPORTED, [Criterion::iterations(1000)]),
            backend: default_backend(),
            factors: None,
            loss_history: Vec::new(),
            best_loss: None,
        }
    }

    /// Draw random initializations from `backend` instead of the default.
    pub fn with_backend(mut self, backend: BackendRef) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &ParafacConfig {
        &self.config
    }

    /// Loss after every sweep, one list per restart.
    ///
    /// A force-stopped build keeps the sweeps it completed, with the
    /// interrupted restart last.
    pub fn loss_history(&self) -> &[Vec<f64>] {
        &self.loss_history
    }

    /// Final loss of the restart that was kept.
    pub fn best_loss(&self) -> Option<f64> {
        self.best_loss
    }

    /// The (I, J, K) array implied by the fitted factors.
    pub fn reconstruction(&self) -> AlgorithmResult<Tensor> {
        let f = self.built()?;
        let x = reconstruct(&[f.a.view(), f.b.view(), f.c.view()])?;
        Ok(Tensor::from_array(x))
    }

    fn built(&self) -> AlgorithmResult<&Factors> {
        self.state.ensure_finished()?;
        self.factors.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }

    fn validate(&self, x: &Tensor) -> AlgorithmResult<()> {
        if x.order() != 3 {
            return Err(AlgorithmError::invalid(format!(
                "PARAFAC requires a three-way array, got a tensor of order {}",
                x.order()
            )));
        }
        if x.has_zero_dim() {
            return Err(AlgorithmError::invalid(
                "Input tensor dimensions must be greater than 0.",
            ));
        }
        reject_nan(
            x,
            "Input has missing data (NaNs found). PARAFAC currently does not support missing data.",
        )?;
        if self.config.num_components == 0 {
            return Err(AlgorithmError::invalid(
                "Number of components must be at least one",
            ));
        }
        if self.config.num_starts == 0 {
            return Err(AlgorithmError::invalid("Number of starts must be at least one"));
        }
        Ok(())
    }

    fn fit(&mut self, x: &Tensor) -> AlgorithmResult<()> {
        self.validate(x)?;

        let unfoldings = [
            matricize(&x.view(), 0)?,
            matricize(&x.view(), 1)?,
            matricize(&x.view(), 2)?,
        ];

        let mut num_starts = self.config.num_starts;
        if num_starts > 1 && self.config.initialization == Initialization::Svd {
            tracing::warn!(
                num_starts,
                "SVD initialization is deterministic, making a single start"
            );
            num_starts = 1;
        }

        let mut best = BestSoFar::new();
        for start in 0..num_starts {
            let mut factors = self.initial_factors(x.shape(), &unfoldings, start)?;
            let mut history = Vec::new();
            let outcome = run_recording(&mut self.state, &mut history, || {
                als_sweep(&mut factors, &unfoldings)?;
                loss(&factors, &unfoldings[0])
            });
            if let Err(e) = outcome {
                self.loss_history.push(history);
                return Err(e);
            }
            let final_loss = match history.last() {
                Some(&l) => l,
                None => loss(&factors, &unfoldings[0])?,
            };
            tracing::debug!(
                start,
                iterations = history.len(),
                loss = final_loss,
                "PARAFAC restart finished"
            );
            best.offer(final_loss, factors);
            self.loss_history.push(history);
            self.state.criteria_mut().reset();
        }

        let (best_loss, factors) = best
            .into_inner()
            .ok_or_else(|| AlgorithmError::Numerical("no restart produced factors".into()))?;
        self.best_loss = Some(best_loss);
        self.factors = Some(postprocess(factors));
        Ok(())
    }

    fn initial_factors(
        &self,
        shape: &[usize],
        unfoldings: &[Array2<f64>; 3],
        start: usize,
    ) -> AlgorithmResult<Factors> {
        let f = self.config.num_components;
        let seed = start as u64;
        match self.config.initialization {
            Initialization::Svd => Ok(Factors {
                a: svd_initial_factor(&unfoldings[0], f)?,
                b: svd_initial_factor(&unfoldings[1], f)?,
                c: svd_initial_factor(&unfoldings[2], f)?,
            }),
            Initialization::Random | Initialization::RandomOrthogonalized => {
                let b = matrix_of(&self.backend.random_normal(&[shape[1], f], seed), "B")?;
                let c = matrix_of(&self.backend.random_normal(&[shape[2], f], seed + 1000), "C")?;
                let (b, c) = if self.config.initialization == Initialization::RandomOrthogonalized {
                    (
                        orth(&b.into_dyn().view(), false)?,
                        orth(&c.into_dyn().view(), false)?,
                    )
                } else {
                    (b, c)
                };
                Ok(Factors {
                    a: Array2::zeros((shape[0], f)),
                    b,
                    c,
                })
            }
        }
    }
}

/// Leading eigenvectors of `X_(m)X_(m)ᵀ` with a fixed sign convention.
///
/// Eigenvectors of negligible eigenvalues come after all others and fill the
/// remaining columns. Columns stay zero only when `f` exceeds the mode's
/// dimension.
fn svd_initial_factor(unfolded: &Array2<f64>, f: usize) -> AlgorithmResult<Array2<f64>> {
    let gram = unfolded.dot(&unfolded.t());
    let (values, vectors) = symmetric_eigen(&gram.view())?;

    let (mut order, rest): (Vec<usize>, Vec<usize>) =
        (0..values.len()).partition(|&i| values[i] >= EIGENVALUE_FLOOR);
    order.extend(rest);
    order.truncate(f);

    let mut factor = Array2::zeros((unfolded.nrows(), f));
    for (col, &idx) in order.iter().enumerate() {
        factor.column_mut(col).assign(&vectors.column(idx));
    }
    for mut column in factor.axis_iter_mut(Axis(1)) {
        let sign = dominant_sign(&column.view());
        column.mapv_inplace(|v| v * sign);
    }
    Ok(factor)
}

/// Sign of the largest-magnitude entry; zero counts as positive.
fn dominant_sign(column: &scirs2_core::ndarray_ext::ArrayView1<f64>) -> f64 {
    let mut best = 0.0_f64;
    for &v in column.iter() {
        if v.abs() > best.abs() {
            best = v;
        }
    }
    if best < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Least-squares update `X_(m)·pinv(kr(u, v))ᵀ`.
fn estimate(
    unfolded: &Array2<f64>,
    u: &Array2<f64>,
    v: &Array2<f64>,
) -> AlgorithmResult<Array2<f64>> {
    let kr = khatri_rao(&u.view(), &v.view())?;
    let pinv = pseudo_invert(&kr.view())?;
    Ok(unfolded.dot(&pinv.t()))
}

fn als_sweep(f: &mut Factors, unfoldings: &[Array2<f64>; 3]) -> AlgorithmResult<()> {
    f.a = estimate(&unfoldings[0], &f.c, &f.b)?;
    f.b = estimate(&unfoldings[1], &f.c, &f.a)?;
    f.c = estimate(&unfoldings[2], &f.b, &f.a)?;
    Ok(())
}

fn loss(f: &Factors, x0: &Array2<f64>) -> AlgorithmResult<f64> {
    let kr = khatri_rao(&f.c.view(), &f.b.view())?;
    let model = f.a.dot(&kr.t());
    Ok(squared_distance(&x0.view(), &model.view())?)
}

fn postprocess(mut f: Factors) -> Factors {
    // Variance into A
    for loading in [&mut f.b, &mut f.c] {
        for (mut col, mut a_col) in loading
            .axis_iter_mut(Axis(1))
            .zip(f.a.axis_iter_mut(Axis(1)))
        {
            let norm = col.dot(&col).sqrt();
            if norm > 0.0 {
                a_col.mapv_inplace(|v| v * norm);
                col.mapv_inplace(|v| v / norm);
            }
        }
    }

    let variance: Array1<f64> = f.a.axis_iter(Axis(1)).map(|c| c.dot(&c)).collect();
    let mut order: Vec<usize> = (0..variance.len()).collect();
    order.sort_by(|&i, &j| variance[j].total_cmp(&variance[i]));
    f.a = f.a.select(Axis(1), &order);
    f.b = f.b.select(Axis(1), &order);
    f.c = f.c.select(Axis(1), &order);

    let mut signs = vec![1.0; f.a.ncols()];
    for loading in [&mut f.c, &mut f.b] {
        for (mut col, total) in loading.axis_iter_mut(Axis(1)).zip(signs.iter_mut()) {
            let sign = dominant_sign(&col.view());
            *total *= sign;
            col.mapv_inplace(|v| v * sign);
        }
    }
    for (mut col, &sign) in f.a.axis_iter_mut(Axis(1)).zip(signs.iter()) {
        col.mapv_inplace(|v| v * sign);
    }
    f
}

impl Model for Parafac {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Unsupervised for Parafac {
    fn build(&mut self, x: &Tensor) -> AlgorithmResult<()> {
        self.factors = None;
        self.best_loss = None;
        self.loss_history.clear();
        self.state.begin_build()?;
        let result = self.fit(x);
        self.state.end_build(result)
    }
}

impl Filter for Parafac {
    /// Scores `X_(0)·pinv(kr(C,B))ᵀ` of new samples on the fitted B and C.
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let f = self.built()?;
        let (j, k) = (f.b.nrows(), f.c.nrows());
        if x.order() != 3 || x.shape()[1] != j || x.shape()[2] != k {
            return Err(AlgorithmError::invalid(format!(
                "Filter input must have shape (n, {}, {}), got {:?}",
                j,
                k,
                x.shape()
            )));
        }
        let x0 = matricize(&x.view(), 0)?;
        Ok(Tensor::from_matrix(estimate(&x0, &f.c, &f.b)?))
    }
}

impl LoadingMatrixAccessor for Parafac {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        let f = self.built()?;
        Ok(LoadingMatrices::from([
            ("A".to_string(), Tensor::from_matrix(f.a.clone())),
            ("B".to_string(), Tensor::from_matrix(f.b.clone())),
            ("C".to_string(), Tensor::from_matrix(f.c.clone())),
        ]))
    }
}
