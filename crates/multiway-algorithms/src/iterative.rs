//! Shared machinery of the iterative algorithms
//!
//! Every algorithm owns an [`AlgorithmState`]: its stopping criteria, the
//! stop flag shared with [`StopHandle`]s, and whether the last build
//! finished. The inner loops all run through [`run_until_stopped`], and
//! multi-start searches fold their restarts into a [`BestSoFar`].
//!
//! The front-end traits ([`Unsupervised`], [`Supervised`],
//! [`MultiBlockSupervised`], [`Filter`], [`LoadingMatrixAccessor`]) describe
//! what each algorithm can do; [`Model`] gives every one of them the same
//! criterion and cancellation surface.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::stopping::{Criterion, CriterionType, StopHandle, StoppingCriteria};
use multiway_core::Tensor;
use scirs2_core::ndarray_ext::{Array1, Array2, Array3, Ix2, Ix3};
use std::collections::BTreeMap;

/// Named output matrices of a built model, e.g. `"A"`, `"T"`, `"W_1"`.
pub type LoadingMatrices = BTreeMap<String, Tensor>;

/// Criteria, cancellation and completion state of one algorithm instance.
#[derive(Debug, Clone)]
pub struct AlgorithmState {
    name: &'static str,
    supported: &'static [CriterionType],
    criteria: StoppingCriteria,
    stop: StopHandle,
    /// False for sub-models, which observe the owner's flag but never clear it
    owns_stop: bool,
    finished: bool,
}

impl AlgorithmState {
    pub(crate) fn new(
        name: &'static str,
        supported: &'static [CriterionType],
        defaults: impl IntoIterator<Item = Criterion>,
    ) -> Self {
        let mut criteria = StoppingCriteria::new();
        for criterion in defaults {
            criteria.insert(criterion);
        }
        Self {
            name,
            supported,
            criteria,
            stop: StopHandle::new(),
            owns_stop: true,
            finished: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn supported_criteria(&self) -> &'static [CriterionType] {
        self.supported
    }

    pub fn criteria(&self) -> &StoppingCriteria {
        &self.criteria
    }

    pub(crate) fn criteria_mut(&mut self) -> &mut StoppingCriteria {
        &mut self.criteria
    }

    /// Add or replace a criterion of a supported type.
    pub fn add_criterion(&mut self, criterion: Criterion) -> AlgorithmResult<()> {
        let kind = criterion.kind();
        if !self.supported.contains(&kind) {
            return Err(AlgorithmError::UnsupportedCriterion {
                algorithm: self.name,
                criterion: kind,
            });
        }
        self.criteria.insert(criterion);
        Ok(())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Make this instance observe another instance's stop flag.
    pub(crate) fn share_stop_handle(&mut self, handle: StopHandle) {
        self.stop = handle;
        self.owns_stop = false;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn ensure_finished(&self) -> AlgorithmResult<()> {
        if self.finished {
            Ok(())
        } else {
            Err(AlgorithmError::ModelNotBuilt(self.name))
        }
    }

    /// Mark the start of a build. A stop requested beforehand ends it here.
    pub(crate) fn begin_build(&mut self) -> AlgorithmResult<()> {
        self.finished = false;
        self.criteria.reset();
        if self.stop.is_stopped() {
            tracing::debug!(algorithm = self.name, "stop requested before build started");
            return self.end_build(Err(AlgorithmError::ForceStopped));
        }
        Ok(())
    }

    /// Mark the end of a build.
    ///
    /// A stop requested while the build ran turns success into
    /// [`AlgorithmError::ForceStopped`]. Only the instance that owns the stop
    /// flag clears it, so a stop seen by a sub-model still reaches its owner.
    pub(crate) fn end_build<T>(&mut self, result: AlgorithmResult<T>) -> AlgorithmResult<T> {
        self.criteria.remove(CriterionType::Kill);
        self.criteria.reset();
        let stop_requested = if self.owns_stop {
            self.stop.take()
        } else {
            self.stop.is_stopped()
        };
        let result = match result {
            Ok(_) if stop_requested => Err(AlgorithmError::ForceStopped),
            other => other,
        };
        self.finished = result.is_ok();
        match &result {
            Ok(_) => tracing::info!(algorithm = self.name, "build finished"),
            Err(AlgorithmError::ForceStopped) => {
                tracing::info!(algorithm = self.name, "build force stopped")
            }
            Err(e) => tracing::debug!(algorithm = self.name, error = %e, "build failed"),
        }
        result
    }

    /// Top-of-iteration check: observe the stop flag, then OR the criteria.
    pub(crate) fn should_stop(&mut self) -> bool {
        if self.stop.is_stopped() && !self.criteria.contains(CriterionType::Kill) {
            self.criteria.insert(Criterion::Kill);
        }
        self.criteria.any_matches()
    }

    pub(crate) fn check_killed(&self) -> AlgorithmResult<()> {
        if self.criteria.contains(CriterionType::Kill) {
            Err(AlgorithmError::ForceStopped)
        } else {
            Ok(())
        }
    }
}

/// Run `step` until a criterion matches, feeding every returned value to
/// the criteria and collecting them.
///
/// Returns [`AlgorithmError::ForceStopped`] when the loop ended because a
/// stop was requested.
pub fn run_until_stopped<F>(state: &mut AlgorithmState, step: F) -> AlgorithmResult<Vec<f64>>
where
    F: FnMut() -> AlgorithmResult<f64>,
{
    let mut history = Vec::new();
    run_recording(state, &mut history, step)?;
    Ok(history)
}

/// Like [`run_until_stopped`], but appends each value to `history` as soon
/// as it is produced, so the iterations completed before a stop or an
/// error stay visible to the caller.
pub fn run_recording<F>(
    state: &mut AlgorithmState,
    history: &mut Vec<f64>,
    mut step: F,
) -> AlgorithmResult<()>
where
    F: FnMut() -> AlgorithmResult<f64>,
{
    while !state.should_stop() {
        let value = step()?;
        state.criteria.update(value);
        history.push(value);
    }
    state.check_killed()
}

/// Keeps the candidate with the strictly lowest loss; ties keep the first.
#[derive(Debug, Clone)]
pub struct BestSoFar<T> {
    best: Option<(f64, T)>,
}

impl<T> Default for BestSoFar<T> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<T> BestSoFar<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate; returns whether it became the best.
    pub fn offer(&mut self, loss: f64, candidate: T) -> bool {
        let better = match &self.best {
            None => true,
            Some((best, _)) => loss < *best,
        };
        if better {
            self.best = Some((loss, candidate));
        }
        better
    }

    pub fn loss(&self) -> Option<f64> {
        self.best.as_ref().map(|(loss, _)| *loss)
    }

    pub fn into_inner(self) -> Option<(f64, T)> {
        self.best
    }
}

/// Criterion and cancellation surface shared by all algorithms.
pub trait Model {
    fn state(&self) -> &AlgorithmState;

    fn state_mut(&mut self) -> &mut AlgorithmState;

    fn name(&self) -> &'static str {
        self.state().name()
    }

    /// Add or replace a stopping criterion.
    ///
    /// # Errors
    ///
    /// [`AlgorithmError::UnsupportedCriterion`] for a type this algorithm
    /// does not accept.
    fn add_criterion(&mut self, criterion: Criterion) -> AlgorithmResult<()> {
        self.state_mut().add_criterion(criterion)
    }

    fn criteria(&self) -> &StoppingCriteria {
        self.state().criteria()
    }

    fn stop_handle(&self) -> StopHandle {
        self.state().stop_handle()
    }

    /// Request a stop; equivalent to `stop_handle().stop()`.
    fn stop(&self) {
        self.state().stop_handle().stop();
    }

    fn is_finished(&self) -> bool {
        self.state().is_finished()
    }
}

/// Models built from a single input tensor.
pub trait Unsupervised: Model {
    fn build(&mut self, x: &Tensor) -> AlgorithmResult<()>;
}

/// Regression models built from predictors and responses.
pub trait Supervised: Model {
    fn build(&mut self, x: &Tensor, y: &Tensor) -> AlgorithmResult<()>;

    fn predict(&self, x: &Tensor) -> AlgorithmResult<Tensor>;
}

/// Regression models with several predictor blocks.
pub trait MultiBlockSupervised: Model {
    fn build(&mut self, blocks: &[Tensor], y: &Tensor) -> AlgorithmResult<()>;

    fn predict(&self, blocks: &[Tensor]) -> AlgorithmResult<Tensor>;
}

/// Projection of new data onto a built model.
pub trait Filter {
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor>;
}

pub trait LoadingMatrixAccessor {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices>;
}

pub(crate) fn matrix_of(x: &Tensor, what: &str) -> AlgorithmResult<Array2<f64>> {
    x.view()
        .into_dimensionality::<Ix2>()
        .map(|v| v.to_owned())
        .map_err(|_| {
            AlgorithmError::invalid(format!(
                "{} must be a matrix, got a tensor of order {}",
                what,
                x.order()
            ))
        })
}

pub(crate) fn cube_of(x: &Tensor, what: &str) -> AlgorithmResult<Array3<f64>> {
    x.view()
        .into_dimensionality::<Ix3>()
        .map(|v| v.to_owned())
        .map_err(|_| {
            AlgorithmError::invalid(format!(
                "{} must be a three-way array, got a tensor of order {}",
                what,
                x.order()
            ))
        })
}

/// Columns side by side; every column must have `rows` entries.
pub(crate) fn stack_columns(columns: &[Array1<f64>], rows: usize) -> Array2<f64> {
    let mut out = Array2::zeros((rows, columns.len()));
    for (mut target, column) in out.columns_mut().into_iter().zip(columns) {
        target.assign(column);
    }
    out
}

/// Scale to unit L2 norm; a zero vector is returned unchanged.
pub(crate) fn unit(v: Array1<f64>) -> Array1<f64> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

pub(crate) fn reject_nan(x: &Tensor, message: &str) -> AlgorithmResult<()> {
    if x.has_nan() {
        Err(AlgorithmError::invalid(message))
    } else {
        Ok(())
    }
}

pub(crate) fn reject_empty(x: &Tensor, what: &str) -> AlgorithmResult<()> {
    if x.order() == 0 || x.has_zero_dim() {
        Err(AlgorithmError::invalid(format!(
            "{} must have positive dimensions, got shape {:?}",
            what,
            x.shape()
        )))
    } else {
        Ok(())
    }
}
