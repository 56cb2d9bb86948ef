//! MNPLS: PLS2 with mixed-norm weights
//!
//! Runs the PLS2 component loop, but the weight vector of a component comes
//! from a mixed-norm regularized problem solved once per component, before
//! the inner loop:
//!
//! ```text
//! W ← first F generalized eigenvectors of (α XᵀYYᵀX − β D, XᵀX)
//! D  = diag(1 / (2 · max(‖W[i,:]‖, ε)))
//! α  = 2 / tr(WᵀDW)
//! β  = 2 tr(WᵀXᵀYYᵀXW) / tr(WᵀDW)²
//! ```
//!
//! starting from column-normalized standard normal draws. The solve is
//! bounded by fresh copies of the model's `ITERATION` and `IMPROVEMENT`
//! criteria, the latter watching `‖W_old − W‖_F`. Component `j` uses
//! column `j` of the converged `W`.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    AlgorithmState, Filter, LoadingMatrices, LoadingMatrixAccessor, Model, Supervised,
};
use crate::pls2::{
    fit_pls, predictor_matrix, response_matrix, validate_pair, PlsConfig, PlsFit, WeightContext,
    WeightStep, SUPPORTED,
};
use crate::stopping::{Criterion, CriterionType, StoppingCriteria};
use multiway_core::{default_backend, BackendRef, Tensor};
use multiway_kernels::{generalized_eigenvectors, normalize_columns};
use scirs2_core::ndarray_ext::{s, Array1, Array2, Axis};

const NAME: &str = "MNPLS";

/// Row norms below this are clamped when forming D.
const ROW_NORM_FLOOR: f64 = 1e-6;

pub(crate) struct MixedNormWeights;

impl WeightStep for MixedNormWeights {
    fn per_iteration(&self) -> bool {
        false
    }

    fn weight(
        &self,
        xres: &Array2<f64>,
        yres: &Array2<f64>,
        _u: &Array1<f64>,
        component: usize,
        ctx: &WeightContext,
    ) -> AlgorithmResult<Array1<f64>> {
        let w = mixed_norm_weights(xres, yres, ctx)?;
        let column = w.column(component);
        if column.iter().all(|&v| v == 0.0) {
            return Err(AlgorithmError::Numerical(format!(
                "mixed-norm problem has fewer than {} weight vectors for the deflated data",
                component + 1
            )));
        }
        Ok(column.to_owned())
    }
}

fn d_matrix(w: &Array2<f64>) -> Array2<f64> {
    let diag: Array1<f64> = w
        .axis_iter(Axis(0))
        .map(|row| 1.0 / (2.0 * row.dot(&row).sqrt().max(ROW_NORM_FLOOR)))
        .collect();
    Array2::from_diag(&diag)
}

fn trace(m: &Array2<f64>) -> f64 {
    m.diag().sum()
}

/// `(α, β)` for the current W and D.
fn multipliers(w: &Array2<f64>, d: &Array2<f64>, xtyytx: &Array2<f64>) -> AlgorithmResult<(f64, f64)> {
    let wdw = trace(&w.t().dot(d).dot(w));
    if !(wdw > 0.0) || !wdw.is_finite() {
        return Err(AlgorithmError::Numerical(
            "mixed-norm weights collapsed to zero".into(),
        ));
    }
    let alpha = 2.0 / wdw;
    let beta = 2.0 * trace(&w.t().dot(xtyytx).dot(w)) / (wdw * wdw);
    Ok((alpha, beta))
}

/// Leading `f` generalized eigenvectors, zero-padded, each flipped so its
/// largest-magnitude entry is positive.
fn leading_eigenvectors(a: &Array2<f64>, b: &Array2<f64>, f: usize) -> AlgorithmResult<Array2<f64>> {
    let (_, vectors) = generalized_eigenvectors(&a.view(), &b.view())?;
    let k = f.min(vectors.ncols());
    let mut w = Array2::zeros((a.nrows(), f));
    w.slice_mut(s![.., ..k]).assign(&vectors.slice(s![.., ..k]));
    for mut column in w.axis_iter_mut(Axis(1)) {
        let dominant = column
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if dominant < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }
    Ok(w)
}

fn mixed_norm_weights(
    x: &Array2<f64>,
    y: &Array2<f64>,
    ctx: &WeightContext,
) -> AlgorithmResult<Array2<f64>> {
    let f = ctx.num_components;
    let p = x.ncols();

    let initial = ctx.backend.random_normal(&[p, f], 0).to_matrix().map_err(|e| {
        AlgorithmError::Numerical(format!("could not draw initial weights: {}", e))
    })?;
    let mut w = normalize_columns(&initial.view());
    let mut d = d_matrix(&w);
    let xty = x.t().dot(y);
    let xtyytx = xty.dot(&xty.t());
    let gram = x.t().dot(x);
    let (mut alpha, mut beta) = multipliers(&w, &d, &xtyytx)?;

    let mut criteria = StoppingCriteria::new();
    for kind in [CriterionType::Iteration, CriterionType::Improvement] {
        if let Some(criterion) = ctx.criteria.get(kind) {
            criteria.insert(criterion.clone());
        }
    }
    if !criteria.contains(CriterionType::Iteration) {
        criteria.insert(Criterion::iterations(250));
    }
    criteria.reset();

    let mut iterations = 0usize;
    while !ctx.stop.is_stopped() && !criteria.any_matches() {
        let a = &xtyytx * alpha - &d * beta;
        let w_new = leading_eigenvectors(&a, &gram, f)?;
        (alpha, beta) = multipliers(&w_new, &d, &xtyytx)?;
        d = d_matrix(&w_new);

        let diff = &w - &w_new;
        w = w_new;
        criteria.update(diff.iter().map(|v| v * v).sum::<f64>().sqrt());
        iterations += 1;
    }
    tracing::trace!(iterations, "mixed-norm weights solved");
    Ok(w)
}

/// PLS2 with mixed-norm weights.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{Mnpls, PlsConfig, Supervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[20, 6], 1);
/// let y = Tensor::random_normal(&[20, 1], 2);
/// let mut model = Mnpls::with_config(PlsConfig::default().with_num_components(2));
/// model.build(&x, &y).unwrap();
/// assert_eq!(model.predict(&x).unwrap().shape(), &[20, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct Mnpls {
    config: PlsConfig,
    state: AlgorithmState,
    backend: BackendRef,
    fit: Option<PlsFit>,
}

impl Default for Mnpls {
    fn default() -> Self {
        Self::new()
    }
}

impl Mnpls {
    pub fn new() -> Self {
        Self::with_config(PlsConfig::default())
    }

    pub fn with_config(config: PlsConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(
                NAME,
                SUPPORTED,
                [Criterion::iterations(250), Criterion::improvement(1e-4)],
            ),
            backend: default_backend(),
            fit: None,
        }
    }

    /// Draw the initial weights from `backend` instead of the default.
    pub fn with_backend(mut self, backend: BackendRef) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &PlsConfig {
        &self.config
    }

    fn built(&self) -> AlgorithmResult<&PlsFit> {
        self.state.ensure_finished()?;
        self.fit.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }
}

impl Model for Mnpls {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Supervised for Mnpls {
    fn build(&mut self, x: &Tensor, y: &Tensor) -> AlgorithmResult<()> {
        self.fit = None;
        self.state.begin_build()?;
        let result = validate_pair(NAME, x, y, self.config.num_components).and_then(|_| {
            let xm = predictor_matrix(x)?;
            let ym = response_matrix(y)?;
            fit_pls(
                &mut self.state,
                &self.config,
                &xm,
                &ym,
                &MixedNormWeights,
                self.backend.clone(),
            )
        });
        self.fit = Some(self.state.end_build(result)?);
        Ok(())
    }

    fn predict(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        Ok(Tensor::from_matrix(fit.predict(&predictor_matrix(x)?)?))
    }
}

impl Filter for Mnpls {
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        Ok(Tensor::from_matrix(fit.filter(&predictor_matrix(x)?)?))
    }
}

impl LoadingMatrixAccessor for Mnpls {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        Ok(self.built()?.loading_matrices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stopping::StopHandle;
    use multiway_kernels::mean_squared_error;
    use scirs2_core::ndarray_ext::array;

    fn ctx(f: usize) -> WeightContext {
        let mut criteria = StoppingCriteria::new();
        criteria.insert(Criterion::iterations(50));
        criteria.insert(Criterion::improvement(1e-6));
        WeightContext {
            criteria,
            stop: StopHandle::new(),
            backend: default_backend(),
            num_components: f,
        }
    }

    #[test]
    fn test_d_matrix_clamps_small_rows() {
        let w = array![[3.0, 4.0], [0.0, 0.0]];
        let d = d_matrix(&w);
        assert!((d[[0, 0]] - 0.1).abs() < 1e-15);
        assert!((d[[1, 1]] - 1.0 / (2.0 * ROW_NORM_FLOOR)).abs() < 1e-3);
        assert_eq!(d[[0, 1]], 0.0);
    }

    #[test]
    fn test_weights_have_requested_shape() {
        let x = Tensor::random_normal(&[15, 5], 7).to_matrix().unwrap();
        let y = Tensor::random_normal(&[15, 2], 8).to_matrix().unwrap();
        let w = mixed_norm_weights(&x, &y, &ctx(3)).unwrap();
        assert_eq!(w.dim(), (5, 3));
        assert!(w.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_stop_flag_ends_weight_solve() {
        let x = Tensor::random_normal(&[10, 4], 1).to_matrix().unwrap();
        let y = Tensor::random_normal(&[10, 1], 2).to_matrix().unwrap();
        let c = ctx(2);
        c.stop.stop();
        let w = mixed_norm_weights(&x, &y, &c).unwrap();
        // Initial normalized draws are returned untouched
        for col in w.axis_iter(Axis(1)) {
            assert!((col.dot(&col) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_training_error_not_worse_than_mean() {
        let x = Tensor::random_normal(&[30, 6], 3).to_matrix().unwrap();
        let beta = array![[1.0], [0.0], [-2.0], [0.5], [0.0], [1.0]];
        let y = x.dot(&beta);
        let mut model = Mnpls::with_config(PlsConfig::default().with_num_components(2));
        model
            .build(&Tensor::from_matrix(x.clone()), &Tensor::from_matrix(y.clone()))
            .unwrap();
        let predicted = model.predict(&Tensor::from_matrix(x)).unwrap().to_matrix().unwrap();
        assert_eq!(predicted.dim(), (30, 1));
        let mean = y.mean().unwrap_or(0.0);
        let err = mean_squared_error(&predicted.view(), &y.view()).unwrap();
        let base = mean_squared_error(&y.mapv(|_| mean).view(), &y.view()).unwrap();
        assert!(err <= base * (1.0 + 1e-9));

        let loadings = model.loading_matrices().unwrap();
        assert_eq!(loadings["W"].shape(), &[6, 2]);
    }

    #[test]
    fn test_not_built_and_criteria() {
        let mut model = Mnpls::new();
        assert!(model.predict(&Tensor::ones(&[2, 2])).is_err());
        assert!(model.filter(&Tensor::ones(&[2, 2])).is_err());
        assert!(model.add_criterion(Criterion::seconds(10)).is_ok());
        match model.criteria().get(CriterionType::Improvement) {
            Some(Criterion::Improvement(c)) => assert_eq!(c.tolerance(), 1e-4),
            other => panic!("unexpected {:?}", other),
        }
    }
}
