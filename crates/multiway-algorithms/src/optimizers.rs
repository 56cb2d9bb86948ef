//! Gradient steps for the custom NTF update modes
//!
//! NTF hands each optimizer the gradient `den − num` of one factor (or of a
//! single factor entry, as a 1×1 matrix) and clips the result at zero
//! afterwards, so the optimizers themselves are unconstrained.
//!
//! - [`OptimizerKind::Sgd`]: `v ← μv + g`, `θ ← θ − ηv` (plain descent for
//!   `μ = 0`)
//! - [`OptimizerKind::Adam`]: first and second moment estimates with bias
//!   correction
//!
//! ```
//! use multiway_algorithms::optimizers::{Optimizer, OptimizerConfig};
//! use scirs2_core::ndarray_ext::array;
//!
//! let mut optimizer = OptimizerConfig::adam().learning_rate(0.01).build();
//! let mut factor = array![[1.0, 2.0]];
//! optimizer.step(&mut factor, &array![[0.5, -0.5]]).unwrap();
//! assert!(factor[[0, 0]] < 1.0 && factor[[0, 1]] > 2.0);
//! ```

use crate::error::{AlgorithmError, AlgorithmResult};
use scirs2_core::ndarray_ext::{Array2, Zip};
use std::fmt::Debug;

/// Which rule moves the factor, with its rule-specific constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerKind {
    Sgd {
        momentum: f64,
    },
    Adam {
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::sgd()
    }
}

impl OptimizerConfig {
    /// Descent without momentum, step size 0.01.
    pub fn sgd() -> Self {
        Self {
            kind: OptimizerKind::Sgd { momentum: 0.0 },
            learning_rate: 0.01,
        }
    }

    /// Adam with β1 = 0.9, β2 = 0.999, ε = 1e-8 and step size 0.001.
    pub fn adam() -> Self {
        Self {
            kind: OptimizerKind::Adam {
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
            learning_rate: 0.001,
        }
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Momentum coefficient; only SGD has one.
    pub fn momentum(mut self, value: f64) -> Self {
        match &mut self.kind {
            OptimizerKind::Sgd { momentum } => *momentum = value,
            OptimizerKind::Adam { .. } => ignored("momentum"),
        }
        self
    }

    pub fn beta1(mut self, value: f64) -> Self {
        match &mut self.kind {
            OptimizerKind::Adam { beta1, .. } => *beta1 = value,
            OptimizerKind::Sgd { .. } => ignored("beta1"),
        }
        self
    }

    pub fn beta2(mut self, value: f64) -> Self {
        match &mut self.kind {
            OptimizerKind::Adam { beta2, .. } => *beta2 = value,
            OptimizerKind::Sgd { .. } => ignored("beta2"),
        }
        self
    }

    pub fn epsilon(mut self, value: f64) -> Self {
        match &mut self.kind {
            OptimizerKind::Adam { epsilon, .. } => *epsilon = value,
            OptimizerKind::Sgd { .. } => ignored("epsilon"),
        }
        self
    }

    /// An optimizer with no accumulated state.
    pub fn build(&self) -> Box<dyn Optimizer> {
        match self.kind {
            OptimizerKind::Sgd { momentum } => Box::new(Sgd {
                learning_rate: self.learning_rate,
                momentum,
                velocity: None,
            }),
            OptimizerKind::Adam {
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam {
                learning_rate: self.learning_rate,
                beta1,
                beta2,
                epsilon,
                moments: None,
                steps: 0,
            }),
        }
    }
}

fn ignored(setting: &str) {
    tracing::warn!(setting, "setting does not apply to this optimizer, ignored");
}

/// Stateful descent rule for one parameter matrix.
pub trait Optimizer: Debug + Send {
    /// Move `params` against `gradients`; both must have the same shape.
    fn step(&mut self, params: &mut Array2<f64>, gradients: &Array2<f64>) -> AlgorithmResult<()>;

    fn learning_rate(&self) -> f64;
}

fn same_shape(params: &Array2<f64>, gradients: &Array2<f64>) -> AlgorithmResult<()> {
    if params.dim() == gradients.dim() {
        Ok(())
    } else {
        Err(AlgorithmError::invalid(format!(
            "Gradient shape {:?} does not match factor shape {:?}",
            gradients.dim(),
            params.dim()
        )))
    }
}

#[derive(Debug, Clone)]
struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocity: Option<Array2<f64>>,
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut Array2<f64>, gradients: &Array2<f64>) -> AlgorithmResult<()> {
        same_shape(params, gradients)?;
        let lr = self.learning_rate;
        if self.momentum == 0.0 {
            params.zip_mut_with(gradients, |p, &g| *p -= lr * g);
            return Ok(());
        }

        let momentum = self.momentum;
        let velocity = self
            .velocity
            .get_or_insert_with(|| Array2::zeros(gradients.raw_dim()));
        Zip::from(params)
            .and(velocity)
            .and(gradients)
            .for_each(|p, v, &g| {
                *v = momentum * *v + g;
                *p -= lr * *v;
            });
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    /// First and second moment estimates
    moments: Option<(Array2<f64>, Array2<f64>)>,
    steps: i32,
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut Array2<f64>, gradients: &Array2<f64>) -> AlgorithmResult<()> {
        same_shape(params, gradients)?;
        let (lr, beta1, beta2, epsilon) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);

        self.steps += 1;
        let correction1 = 1.0 - beta1.powi(self.steps);
        let correction2 = 1.0 - beta2.powi(self.steps);
        let (first, second) = self.moments.get_or_insert_with(|| {
            (
                Array2::zeros(gradients.raw_dim()),
                Array2::zeros(gradients.raw_dim()),
            )
        });

        Zip::from(params)
            .and(first)
            .and(second)
            .and(gradients)
            .for_each(|p, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= lr * (*m / correction1) / ((*v / correction2).sqrt() + epsilon);
            });
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
