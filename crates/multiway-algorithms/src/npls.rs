//! N-PLS: trilinear partial least squares
//!
//! X is an `(I × J × K)` array, unfolded on the sample axis to `Xa`
//! (`I × J·K`, column `k·J + j`) and centered; Y is `(I × M)`. Each
//! component starts from the first principal score of the Y residual and
//! iterates
//!
//! ```text
//! Z        = unvec(Xaᵀu)            (J × K)
//! wJ, wK   = first singular vectors of Z
//! w        = vec(wK ⊗ wJ)
//! t        = Xres w
//! q        = Yresᵀt / ‖Yresᵀt‖
//! u        = Yres q
//! ```
//!
//! with the `IMPROVEMENT` criterion watching `‖u‖`. X is deflated through
//! the accumulated model `Σ t wᵀ`, and Y through the inner relation
//! `b = (TᵀT)⁻¹Tᵀu` stored column by column in the upper triangle of B.

use crate::error::{AlgorithmError, AlgorithmResult};
use crate::iterative::{
    cube_of, run_until_stopped, stack_columns, unit, AlgorithmState, Filter, LoadingMatrices,
    LoadingMatrixAccessor, Model, Supervised,
};
use crate::pca::principal_components;
use crate::pls2::{response_matrix, validate_pair};
use crate::stopping::{Criterion, CriterionType, StopHandle, StoppingCriteria};
use multiway_core::Tensor;
use multiway_kernels::{
    center, invert_or_pseudo, invert_vectorize, matricize, outer_vectors, svd, vectorize, Scaling,
};
use scirs2_core::ndarray_ext::{s, Array1, Array2};

const NAME: &str = "N-PLS";
pub(crate) const SUPPORTED: &[CriterionType] =
    &[CriterionType::Iteration, CriterionType::Improvement];

#[derive(Debug, Clone, PartialEq)]
pub struct NPlsConfig {
    pub num_components: usize,
    /// Divide Y columns by their standard deviation after centering
    pub standardize_y: bool,
}

impl Default for NPlsConfig {
    fn default() -> Self {
        Self {
            num_components: 10,
            standardize_y: true,
        }
    }
}

impl NPlsConfig {
    pub fn with_num_components(mut self, num_components: usize) -> Self {
        self.num_components = num_components;
        self
    }

    pub fn with_standardize_y(mut self, standardize_y: bool) -> Self {
        self.standardize_y = standardize_y;
        self
    }
}

#[derive(Debug, Clone)]
struct NPlsFit {
    x_scaling: Scaling,
    y_scaling: Scaling,
    t: Array2<f64>,
    u: Array2<f64>,
    w: Array2<f64>,
    wj: Array2<f64>,
    wk: Array2<f64>,
    q: Array2<f64>,
    b: Array2<f64>,
}

/// First left and right singular vectors of `unvec(Xᵀu)`.
fn mode_weights(
    x: &Array2<f64>,
    u: &Array1<f64>,
    dim_j: usize,
) -> AlgorithmResult<(Array1<f64>, Array1<f64>)> {
    let z = invert_vectorize(&x.t().dot(u).view(), dim_j)?;
    let decomposition = svd(&z.view())?;
    let wj = unit(decomposition.u.column(0).to_owned());
    let wk = unit(decomposition.v.column(0).to_owned());
    Ok((wj, wk))
}

/// `w[k·J + j] = wK[k] · wJ[j]`
fn combined_weight(wj: &Array1<f64>, wk: &Array1<f64>) -> Array1<f64> {
    vectorize(&outer_vectors(&wk.view(), &wj.view()).view())
}

fn fit_npls(
    state: &mut AlgorithmState,
    config: &NPlsConfig,
    xa: &Array2<f64>,
    dim_j: usize,
    y: &Array2<f64>,
) -> AlgorithmResult<NPlsFit> {
    let x_scaling = Scaling::fit(&xa.view(), false);
    let y_scaling = Scaling::fit(&y.view(), config.standardize_y);
    let xc = x_scaling.apply(&xa.view())?;
    let yc = y_scaling.apply(&y.view())?;

    let rows = xc.nrows();
    let f = config.num_components;
    let mut xres = xc.clone();
    let mut xmodel = Array2::<f64>::zeros(xc.raw_dim());
    let mut yres = yc.clone();
    let mut b = Array2::<f64>::zeros((f, f));

    let mut ts = Vec::with_capacity(f);
    let mut us = Vec::with_capacity(f);
    let mut ws = Vec::with_capacity(f);
    let mut wjs = Vec::with_capacity(f);
    let mut wks = Vec::with_capacity(f);
    let mut qs = Vec::with_capacity(f);

    for a in 0..f {
        let (yres_centered, _) = center(&yres.view());
        let (first, _) = principal_components(&yres_centered, 1)?;
        let mut u = yres_centered.dot(&first.column(0));

        let mut last = None;
        let history = run_until_stopped(state, || {
            let (wj, wk) = mode_weights(&xc, &u, dim_j)?;
            let w = combined_weight(&wj, &wk);
            let t = xres.dot(&w);
            let q = unit(yres.t().dot(&t));
            u = yres.dot(&q);
            last = Some((wj, wk, w, t, q));
            Ok(u.dot(&u).sqrt())
        })?;
        state.criteria_mut().reset();

        let (wj, wk, w, t, q) = last.ok_or_else(|| {
            AlgorithmError::Numerical(
                "Could not initialize the first components. The improvement tolerance might be set too high."
                    .into(),
            )
        })?;
        tracing::debug!(
            algorithm = NAME,
            component = a,
            iterations = history.len(),
            "component extracted"
        );

        for ((i, j), v) in xmodel.indexed_iter_mut() {
            *v += t[i] * w[j];
        }
        xres = &xc - &xmodel;

        ts.push(t);
        us.push(u.clone());
        ws.push(w);
        wjs.push(wj);
        wks.push(wk);
        qs.push(q);

        let tm = stack_columns(&ts, rows);
        let ba = invert_or_pseudo(&tm.t().dot(&tm).view())?
            .dot(&tm.t())
            .dot(&u);
        b.slice_mut(s![..=a, a]).assign(&ba);

        let qm = stack_columns(&qs, yc.ncols());
        yres = &yc - &tm.dot(&b.slice(s![..=a, ..=a])).dot(&qm.t());
    }

    Ok(NPlsFit {
        x_scaling,
        y_scaling,
        t: stack_columns(&ts, rows),
        u: stack_columns(&us, rows),
        w: stack_columns(&ws, xc.ncols()),
        wj: stack_columns(&wjs, dim_j),
        wk: stack_columns(&wks, xc.ncols() / dim_j),
        q: stack_columns(&qs, yc.ncols()),
        b,
    })
}

impl NPlsFit {
    fn scores(&self, xa: &Array2<f64>) -> AlgorithmResult<Array2<f64>> {
        let mut xres = self.x_scaling.apply(&xa.view())?;
        let mut columns = Vec::with_capacity(self.wj.ncols());
        for (wj, wk) in self.wj.columns().into_iter().zip(self.wk.columns()) {
            let load = combined_weight(&wj.to_owned(), &wk.to_owned());
            let t = xres.dot(&load);
            for ((i, j), v) in xres.indexed_iter_mut() {
                *v -= t[i] * load[j];
            }
            columns.push(t);
        }
        Ok(stack_columns(&columns, xa.nrows()))
    }

    fn predict(&self, xa: &Array2<f64>) -> AlgorithmResult<Array2<f64>> {
        let scaled = self.scores(xa)?.dot(&self.b).dot(&self.q.t());
        Ok(self.y_scaling.invert(&scaled.view())?)
    }
}

/// N-PLS regression of a three-way predictor array.
///
/// # Examples
///
/// ```
/// use multiway_algorithms::{NPls, NPlsConfig, Supervised};
/// use multiway_core::Tensor;
///
/// let x = Tensor::random_normal(&[15, 4, 3], 1);
/// let y = Tensor::random_normal(&[15, 2], 2);
/// let mut npls = NPls::with_config(NPlsConfig::default().with_num_components(2));
/// npls.build(&x, &y).unwrap();
/// assert_eq!(npls.predict(&x).unwrap().shape(), &[15, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct NPls {
    config: NPlsConfig,
    state: AlgorithmState,
    fit: Option<NPlsFit>,
}

impl Default for NPls {
    fn default() -> Self {
        Self::new()
    }
}

impl NPls {
    pub fn new() -> Self {
        Self::with_config(NPlsConfig::default())
    }

    pub fn with_config(config: NPlsConfig) -> Self {
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

    /// Sub-model of a multi-block fit: copies of the owner's criteria, and
    /// the owner's stop flag, which the sub-model observes but never clears.
    pub(crate) fn for_block(
        config: NPlsConfig,
        criteria: &StoppingCriteria,
        stop: StopHandle,
    ) -> Self {
        let mut model = Self::with_config(config);
        for kind in SUPPORTED {
            if let Some(criterion) = criteria.get(*kind) {
                model.state.criteria_mut().insert(criterion.clone());
            }
        }
        model.state.criteria_mut().reset();
        model.state.share_stop_handle(stop);
        model
    }

    pub fn config(&self) -> &NPlsConfig {
        &self.config
    }

    /// Training scores, as used to orthogonalize later blocks.
    pub(crate) fn scores(&self) -> AlgorithmResult<&Array2<f64>> {
        Ok(&self.built()?.t)
    }

    fn built(&self) -> AlgorithmResult<&NPlsFit> {
        self.state.ensure_finished()?;
        self.fit.as_ref().ok_or(AlgorithmError::ModelNotBuilt(NAME))
    }
}

fn unfolded(x: &Tensor) -> AlgorithmResult<Array2<f64>> {
    if x.order() != 3 {
        return Err(AlgorithmError::invalid(format!(
            "Independent variables must be a three-way array, got order {}",
            x.order()
        )));
    }
    Ok(matricize(&x.view(), 0)?)
}

impl Model for NPls {
    fn state(&self) -> &AlgorithmState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        &mut self.state
    }
}

impl Supervised for NPls {
    fn build(&mut self, x: &Tensor, y: &Tensor) -> AlgorithmResult<()> {
        self.fit = None;
        self.state.begin_build()?;
        let result = validate_pair(NAME, x, y, self.config.num_components).and_then(|_| {
            let (_, dim_j, _) = cube_of(x, "X")?.dim();
            let xa = unfolded(x)?;
            let ym = response_matrix(y)?;
            fit_npls(&mut self.state, &self.config, &xa, dim_j, &ym)
        });
        self.fit = Some(self.state.end_build(result)?);
        Ok(())
    }

    fn predict(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        Ok(Tensor::from_matrix(fit.predict(&unfolded(x)?)?))
    }
}

impl Filter for NPls {
    /// Scores of new samples, deflating with the stored mode weights.
    fn filter(&self, x: &Tensor) -> AlgorithmResult<Tensor> {
        let fit = self.built()?;
        Ok(Tensor::from_matrix(fit.scores(&unfolded(x)?)?))
    }
}

impl LoadingMatrixAccessor for NPls {
    fn loading_matrices(&self) -> AlgorithmResult<LoadingMatrices> {
        let fit = self.built()?;
        Ok([
            ("U", &fit.u),
            ("T", &fit.t),
            ("W", &fit.w),
            ("Wj", &fit.wj),
            ("Wk", &fit.wk),
            ("Q", &fit.q),
            ("B", &fit.b),
        ]
        .into_iter()
        .map(|(k, m)| (k.to_string(), Tensor::from_matrix(m.clone())))
        .collect())
    }
}
