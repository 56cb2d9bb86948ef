//! PLS2: partial least squares regression with several responses (NIPALS)
//!
//! X (I × p, or I × J × K unfolded on the sample axis) and Y (I × M) are
//! centered (and optionally standardized). For each component the inner loop
//! alternates
//!
//! ```text
//! w = Xresᵀu / ‖Xresᵀu‖
//! t = Xres w
//! q = Yresᵀt / ‖Yresᵀt‖
//! u = Yres q
//! ```
//!
//! until a stopping criterion matches, with the `IMPROVEMENT` criterion
//! watching `‖u_old − u‖`. Then `c = tᵀu / tᵀt`, `p = Xresᵀt / tᵀt`, and both
//! blocks are deflated: `Xres -= t pᵀ`, `Yres -= c t qᵀ`.
//!
//! Predictions use the regression matrix `W (PᵀW)⁻¹ C Qᵀ` on the scaled data.
//!
//! The same engine runs MNPLS, which replaces the weight step; see
//! [`crate::mnpls`].

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    matrix_of, reject_nan, run_until_stopped, stack_columns, unit, AlgorithmState, Filter,
    LoadingMatrices, LoadingMatrixAccessor, Model, Supervised,
};
use crate::stopping::{Criterion, CriterionType, StopHandle, StoppingCriteria};
use multiway_core::{default_backend, BackendRef, Tensor};
use multiway_kernels::{invert_or_pseudo, matricize, Scaling};
use scirs2_core::ndarray_ext::{Array1, Array2};

const NAME: &str = "PLS2";
pub(crate) const SUPPORTED: &[CriterionType] = &[
    CriterionType::Iteration,
    CriterionType::Time,
    CriterionType::Improvement,
];

/// Options shared by PLS2 and MNPLS.
#[derive(Debug, Clone, PartialEq)]
pub struct PlsConfig {
    pub num_components: usize,
    /// Divide X columns by their standard deviation after centering
    pub standardize_x: bool,
    /// Divide Y columns by their standard deviation after centering
    pub standardize_y: bool,
}

impl Default for PlsConfig {
    fn default() -> Self {
        Self {
            num_components: 5,
            standardize_x: false,
            standardize_y: true,
        }
    }
}

impl PlsConfig {
    pub fn with_num_components(mut self, num_components: usize) -> Self {
        self.num_components = num_components;
        self
    }

    pub fn with_standardize_x(mut self, standardize_x: bool) -> Self {
        self.standardize_x = standardize_x;
        self
    }

    pub fn with_standardize_y(mut self, standardize_y: bool) -> Self {
        self.standardize_y = standardize_y;
        self
    }
}

/// What the weight step may read besides the residual blocks.
pub(crate) struct WeightContext {
    pub criteria: StoppingCriteria,
    pub stop: StopHandle,
    pub backend: BackendRef,
    pub num_components: usize,
}

/// How the weight vector of a component is found.
pub(crate) trait WeightStep {
    /// Recompute the weight on every inner iteration (NIPALS) rather than
    /// once per component.
    fn per_iteration(&self) -> bool;

    fn weight(
        &self,
        xres: &Array2<f64>,
        yres: &Array2<f64>,
        u: &Array1<f64>,
        component: usize,
        ctx: &WeightContext,
    ) -> AlgorithmResult<Array1<f64>>;
}

/// `w = Xresᵀu / ‖Xresᵀu‖`
pub(crate) struct NipalsWeights;

impl WeightStep for NipalsWeights {
    fn per_iteration(&self) -> bool {
        true
    }

    fn weight(
        &self,
        xres: &Array2<f64>,
        _yres: &Array2<f64>,
        u: &Array1<f64>,
        _component: usize,
        _ctx: &WeightContext,
    ) -> AlgorithmResult<Array1<f64>> {
        Ok(unit(xres.t().dot(u)))
    }
}

/// Everything a fitted PLS2/MNPLS model keeps.
#[derive(Debug, Clone)]
pub(crate) struct PlsFit {
    x_scaling: Scaling,
    y_scaling: Scaling,
    t: Array2<f64>,
    u: Array2<f64>,
    w: Array2<f64>,
    p: Array2<f64>,
    q: Array2<f64>,
    c: Array2<f64>,
    /// `W (PᵀW)⁻¹`
    projection: Array2<f64>,
    /// `W (PᵀW)⁻¹ C Qᵀ`
    coefficients: Array2<f64>,
}

/// Two-way view of a PLS predictor block: matrices pass through, three-way
/// arrays are unfolded on the sample axis.
pub(crate) fn predictor_matrix(x: &Tensor) -> AlgorithmResult<Array2<f64>> {
    match x.order() {
        2 => matrix_of(x, "X"),
        3 => Ok(matricize(&x.view(), 0)?),
        n => Err(AlgorithmError::invalid(format!(
            "Independent variables must be a matrix or a three-way array, got order {}",
            n
        ))),
    }
}

/// Responses as an (I × M) matrix; a vector becomes one column.
pub(crate) fn response_matrix(y: &Tensor) -> AlgorithmResult<Array2<f64>> {
    match y.order() {
        1 | 2 => y
            .to_matrix()
            .map_err(|e| AlgorithmError::invalid(e.to_string())),
        n => Err(AlgorithmError::invalid(format!(
            "Dependent variables must be a vector or a matrix, got order {}",
            n
        ))),
    }
}

pub(crate) fn validate_pair(
    name: &str,
    x: &Tensor,
    y: &Tensor,
    num_components: usize,
) -> AlgorithmResult<()> {
    if x.has_zero_dim() || y.has_zero_dim() {
        return Err(AlgorithmError::invalid(
            "Input tensor dimensions must be greater than 0.",
        ));
    }
    if x.shape()[0] != y.shape()[0] {
        return Err(AlgorithmError::invalid(
            "Independent and dependent variables must be of the same length.",
        ));
    }
    let message = format!(
        "Input has missing data (NaNs found). {} currently does not support missing data.",
        name
    );
    reject_nan(x, &message)?;
    reject_nan(y, &message)?;
    if num_components == 0 {
        return Err(AlgorithmError::invalid(
            "Number of components must be at least one",
        ));
    }
    Ok(())
}

/// Run the component loop with the given weight step.
pub(crate) fn fit_pls<S: WeightStep>(
    state: &mut AlgorithmState,
    config: &PlsConfig,
    x: &Array2<f64>,
    y: &Array2<f64>,
    step: &S,
    backend: BackendRef,
) -> AlgorithmResult<PlsFit> {
    let name = state.name();
    let x_scaling = Scaling::fit(&x.view(), config.standardize_x);
    let y_scaling = Scaling::fit(&y.view(), config.standardize_y);
    let xc = x_scaling.apply(&x.view())?;
    let yc = y_scaling.apply(&y.view())?;

    let (rows, num_x) = xc.dim();
    let mut xres = xc.clone();
    let mut yres = yc.clone();
    let mut u = yc.column(0).to_owned();

    let mut ts = Vec::new();
    let mut us = Vec::new();
    let mut ws = Vec::new();
    let mut ps = Vec::new();
    let mut qs = Vec::new();
    let mut cs = Vec::new();

    for component in 0..config.num_components {
        let ctx = WeightContext {
            criteria: state.criteria().clone(),
            stop: state.stop_handle(),
            backend: backend.clone(),
            num_components: config.num_components,
        };
        let mut w = if step.per_iteration() {
            Array1::zeros(num_x)
        } else {
            step.weight(&xres, &yres, &u, component, &ctx)?
        };

        let mut scores = None;
        let history = run_until_stopped(state, || {
            if step.per_iteration() {
                w = step.weight(&xres, &yres, &u, component, &ctx)?;
            }
            let t = xres.dot(&w);
            let q = unit(yres.t().dot(&t));
            let u_new = yres.dot(&q);
            let diff = &u - &u_new;
            u = u_new;
            scores = Some((t, q));
            Ok(diff.dot(&diff).sqrt())
        })?;
        state.criteria_mut().reset();

        let (t, q) = scores.ok_or_else(|| {
            AlgorithmError::Numerical(format!("component {} ran no iterations", component))
        })?;
        let tt = t.dot(&t);
        if !(tt > 0.0) {
            tracing::warn!(
                algorithm = name,
                component,
                "score vector vanished, stopping component extraction"
            );
            break;
        }
        tracing::debug!(algorithm = name, component, iterations = history.len(), "component extracted");

        let c = t.dot(&u) / tt;
        let p = xres.t().dot(&t) / tt;
        for ((i, j), v) in xres.indexed_iter_mut() {
            *v -= t[i] * p[j];
        }
        for ((i, j), v) in yres.indexed_iter_mut() {
            *v -= c * t[i] * q[j];
        }

        ts.push(t);
        us.push(u.clone());
        ws.push(w);
        ps.push(p);
        qs.push(q);
        cs.push(c);
    }

    if ts.is_empty() {
        return Err(AlgorithmError::Numerical(
            "no component could be extracted from the data".into(),
        ));
    }

    let w = stack_columns(&ws, num_x);
    let p = stack_columns(&ps, num_x);
    let q = stack_columns(&qs, yc.ncols());
    let c = Array2::from_diag(&Array1::from(cs));
    let projection = w.dot(&invert_or_pseudo(&p.t().dot(&w).view())?);
    let coefficients = projection.dot(&c).dot(&q.t());

    Ok(PlsFit {
        x_scaling,
        y_scaling,
        t: stack_columns(&ts, rows),
        u: stack_columns(&us, rows),
        w,
        p,
        q,
        c,
        projection,
        coefficients,
    })
}

impl PlsFit {
    pub(crate) fn num_components(&self) -> usize {
        self.w.ncols()
    }

    pub(crate) fn predict(&self, x: &Array2<f64>) -> AlgorithmResult<Array2<f64>> {
        let xc = self.x_scaling.apply(&x.view())?;
        let scaled = xc.dot(&self.coefficients);
        Ok(self.y_scaling.invert(&scaled.view())?)
    }

    pub(crate) fn filter(&self, x: &Array2<f64>) -> AlgorithmResult<Array2<f64>> {
        let xc = self.x_scaling.apply(&x.view())?;
        Ok(xc.dot(&self.projection))
    }

    pub(crate) fn loading_matrices(&self) -> LoadingMatrices {
        [
            ("T", &self.t),
            ("U", &self.u),
            ("W", &self.w),
            ("P", &self.p),
            ("Q", &self.q),
            ("C", &self.c),
        ]
        .into_iter()
        .map(|(k, m)| (k.to_string(), Tensor::from_matrix(m.clone())))
        .collect()
    }
}

/// PLS2 regression model.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{Pls2, PlsConfig, Supervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[20, 4], 1);
/// let y = Tensor::random_normal(&[20, 2], 2);
/// let mut pls = Pls2::with_config(PlsConfig::default().with_num_components(2));
/// pls.build(&x, &y).unwrap();
/// assert_eq!(pls.predict(&x).unwrap().shape(), &[20, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Pls2 {
    config: PlsConfig,
    state: AlgorithmState,
    fit: Option<PlsFit>,
}

impl Default for Pls2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Pls2 {
    pub fn new() -> Self {
        Self::with_config(PlsConfig::default())
    }

    pub fn with_config(config: PlsConfig) -> Self {
        Self {
            config,
            state: AlgorithmState::new(
                NAME,
                SUPPORTED,
                [Criterion::iterations(250), Criterion::improvement(1e-7)],
            ),
            fit: None,
        }
    }

    pub fn config(&self) -> &PlsConfig {
        &self.config
    }

    /// Components actually extracted by the last build.
    pub fn num_components(&self) -> Option<usize> {
        self.fit.as_ref().map(PlsFit::num_components)
    }

    fn built(&self) -> AlgorithmResult<&PlsFit> {
        self.state.ensure_finished()?;
        self.fit.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }
}

impl Model for Pls2 {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Supervised for Pls2 {
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
                &NipalsWeights,
                default_backend(),
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

impl Filter for Pls2 {
    /// Scores `Xc W (PᵀW)⁻¹` of new samples.
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        Ok(Tensor::from_matrix(fit.filter(&predictor_matrix(x)?)?))
    }
}

impl LoadingMatrixAccessor for Pls2 {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        Ok(self.built()?.loading_matrices())
    }
}
