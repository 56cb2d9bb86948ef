//! Stopping criteria for the iterative loops
//!
//! Every algorithm holds a [`StoppingCriteria`] map with at most one
//! criterion per [`CriterionType`]. At the top of each inner iteration the
//! loop asks whether *any* criterion matches and stops if so; after the
//! iteration's work the criteria are updated with the monitored value
//! (a loss, or a change in scores).
//!
//! | Type | Matches when |
//! |---|---|
//! | `ITERATION` | `current >= max` |
//! | `TIME` | whole seconds since the first `matches()` reach `max_seconds` |
//! | `IMPROVEMENT` | `\|old - new\| / old < tol` |
//! | `KILL` | always |
//!
//! Thresholds that are not positive are rejected with a warning and the
//! previous value is kept.
//!
//! # Examples
//!
//! ```
//! use multiway_algorithms::stopping::{Criterion, StoppingCriteria};
//!
//! let mut criteria = StoppingCriteria::new();
//! criteria.insert(Criterion::improvement(1e-3));
//! for loss in [10.0, 5.0, 5.0] {
//!     assert!(!criteria.any_matches());
//!     criteria.update(loss);
//! }
//! assert!(criteria.any_matches());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_IMPROVEMENT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CriterionType {
    Iteration,
    Time,
    Improvement,
    Kill,
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CriterionType::Iteration => "ITERATION",
            CriterionType::Time => "TIME",
            CriterionType::Improvement => "IMPROVEMENT",
            CriterionType::Kill => "KILL",
        };
        f.write_str(name)
    }
}

/// Stops after a fixed number of updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationCriterion {
    max: usize,
    current: usize,
}

impl IterationCriterion {
    pub fn new(max: usize) -> Self {
        let mut criterion = Self::default();
        criterion.set_max_iterations(max);
        criterion
    }

    pub fn set_max_iterations(&mut self, max: usize) {
        if max == 0 {
            tracing::warn!(
                keeping = self.max,
                "maximum number of iterations must be positive, ignoring 0"
            );
            return;
        }
        self.max = max;
    }

    pub fn max_iterations(&self) -> usize {
        self.max
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn matches(&self) -> bool {
        self.current >= self.max
    }

    pub fn update(&mut self) {
        self.current += 1;
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

impl Default for IterationCriterion {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX_ITERATIONS,
            current: 0,
        }
    }
}

/// Stops once a wall-clock budget is spent.
///
/// The clock starts on the first call to [`matches`](Self::matches), not at
/// construction, so a criterion configured long before a build still gets
/// its full budget.
#[derive(Debug, Clone)]
pub struct TimeCriterion {
    max_seconds: u64,
    start: OnceLock<Instant>,
    elapsed_seconds: u64,
}

impl TimeCriterion {
    pub fn new(max_seconds: u64) -> Self {
        let mut criterion = Self {
            max_seconds: 60,
            start: OnceLock::new(),
            elapsed_seconds: 0,
        };
        criterion.set_max_seconds(max_seconds);
        criterion
    }

    pub fn set_max_seconds(&mut self, max_seconds: u64) {
        if max_seconds == 0 {
            tracing::warn!(
                keeping = self.max_seconds,
                "time limit must be positive, ignoring 0"
            );
            return;
        }
        self.max_seconds = max_seconds;
    }

    pub fn max_seconds(&self) -> u64 {
        self.max_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    fn started(&self) -> Instant {
        *self.start.get_or_init(Instant::now)
    }

    pub fn matches(&self) -> bool {
        self.started().elapsed().as_secs() >= self.max_seconds
    }

    pub fn update(&mut self) {
        self.elapsed_seconds = self.started().elapsed().as_secs();
    }

    pub fn reset(&mut self) {
        self.start = OnceLock::new();
        self.elapsed_seconds = 0;
    }
}

/// Stops when the relative change of the monitored value drops below a
/// tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementCriterion {
    tolerance: f64,
    old: f64,
    improvement: f64,
}

impl ImprovementCriterion {
    pub fn new(tolerance: f64) -> Self {
        let mut criterion = Self::default();
        criterion.set_tolerance(tolerance);
        criterion
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        // NaN falls through as well
        if !(tolerance > 0.0) {
            tracing::warn!(
                rejected = tolerance,
                keeping = self.tolerance,
                "improvement tolerance must be positive"
            );
            return;
        }
        self.tolerance = tolerance;
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Relative change recorded by the last update.
    pub fn improvement(&self) -> f64 {
        self.improvement
    }

    pub fn matches(&self) -> bool {
        self.improvement < self.tolerance
    }

    pub fn update(&mut self, value: f64) {
        self.improvement = (self.old - value).abs() / self.old;
        self.old = value;
    }

    pub fn reset(&mut self) {
        self.old = f64::MAX;
        self.improvement = f64::MAX;
    }
}

impl Default for ImprovementCriterion {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_IMPROVEMENT_TOLERANCE,
            old: f64::MAX,
            improvement: f64::MAX,
        }
    }
}

/// A single stopping criterion.
#[derive(Debug, Clone)]
pub enum Criterion {
    Iteration(IterationCriterion),
    Time(TimeCriterion),
    Improvement(ImprovementCriterion),
    /// Inserted when a stop was requested; always matches.
    Kill,
}

impl Criterion {
    pub fn iterations(max: usize) -> Self {
        Criterion::Iteration(IterationCriterion::new(max))
    }

    pub fn seconds(max_seconds: u64) -> Self {
        Criterion::Time(TimeCriterion::new(max_seconds))
    }

    pub fn improvement(tolerance: f64) -> Self {
        Criterion::Improvement(ImprovementCriterion::new(tolerance))
    }

    pub fn kind(&self) -> CriterionType {
        match self {
            Criterion::Iteration(_) => CriterionType::Iteration,
            Criterion::Time(_) => CriterionType::Time,
            Criterion::Improvement(_) => CriterionType::Improvement,
            Criterion::Kill => CriterionType::Kill,
        }
    }

    pub fn matches(&self) -> bool {
        match self {
            Criterion::Iteration(c) => c.matches(),
            Criterion::Time(c) => c.matches(),
            Criterion::Improvement(c) => c.matches(),
            Criterion::Kill => true,
        }
    }

    /// Advance the criterion. Only `IMPROVEMENT` reads `value`.
    pub fn update(&mut self, value: f64) {
        match self {
            Criterion::Iteration(c) => c.update(),
            Criterion::Time(c) => c.update(),
            Criterion::Improvement(c) => c.update(value),
            Criterion::Kill => {}
        }
    }

    pub fn reset(&mut self) {
        match self {
            Criterion::Iteration(c) => c.reset(),
            Criterion::Time(c) => c.reset(),
            Criterion::Improvement(c) => c.reset(),
            Criterion::Kill => {}
        }
    }
}

/// At most one criterion per type, combined with OR.
#[derive(Debug, Clone, Default)]
pub struct StoppingCriteria {
    criteria: BTreeMap<CriterionType, Criterion>,
}

impl StoppingCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a criterion, returning the one of the same type it replaced.
    pub fn insert(&mut self, criterion: Criterion) -> Option<Criterion> {
        self.criteria.insert(criterion.kind(), criterion)
    }

    pub fn remove(&mut self, kind: CriterionType) -> Option<Criterion> {
        self.criteria.remove(&kind)
    }

    pub fn get(&self, kind: CriterionType) -> Option<&Criterion> {
        self.criteria.get(&kind)
    }

    pub fn contains(&self, kind: CriterionType) -> bool {
        self.criteria.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.values()
    }

    pub fn any_matches(&self) -> bool {
        self.criteria.values().any(Criterion::matches)
    }

    pub fn update(&mut self, value: f64) {
        for criterion in self.criteria.values_mut() {
            criterion.update(value);
        }
    }

    /// Update only the criterion of type `kind`, if present.
    pub fn update_one(&mut self, kind: CriterionType, value: f64) {
        if let Some(criterion) = self.criteria.get_mut(&kind) {
            criterion.update(value);
        }
    }

    pub fn reset(&mut self) {
        for criterion in self.criteria.values_mut() {
            criterion.reset();
        }
    }
}

/// Cloneable handle that asks a running build to stop.
///
/// The build notices the request at the top of its next inner iteration, or
/// at the latest when it ends, and returns
/// [`AlgorithmError::ForceStopped`](crate::AlgorithmError::ForceStopped).
/// A request made before the build starts stops it immediately.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the request, returning whether one was pending.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}
