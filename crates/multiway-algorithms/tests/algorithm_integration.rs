//! Integration tests across the algorithms
//!
//! These go through the public API only: building, cancelling, and using
//! models before they are built.

use multiway_algorithms::{
    AlgorithmError, Criterion, CriterionType, Filter, Initialization, LoadingMatrixAccessor,
    Mnpls, Model, MultiBlockSupervised, NPls, NPlsConfig, Ntf, NtfConfig, Parafac, ParafacConfig,
    Pls2, PlsConfig, SoNPls, SoNPlsConfig, StoppingCriteria, Supervised, TwoWayPca, Unsupervised,
};
use multiway_core::{NdarrayBackend, Tensor, TensorBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn assert_not_built<T: std::fmt::Debug>(result: Result<T, AlgorithmError>) {
    assert!(
        matches!(result, Err(AlgorithmError::ModelNotBuilt(_))),
        "expected ModelNotBuilt, got {:?}",
        result
    );
}

#[test]
fn test_every_algorithm_refuses_use_before_build() {
    let matrix = Tensor::random_normal(&[6, 4], 1);
    let cube = Tensor::random_normal(&[6, 3, 2], 2);

    let parafac = Parafac::new();
    assert_not_built(parafac.filter(&cube));
    assert_not_built(parafac.loading_matrices());
    assert_not_built(parafac.reconstruction());

    let pls = Pls2::new();
    assert_not_built(pls.predict(&matrix));
    assert_not_built(pls.filter(&matrix));

    let mnpls = Mnpls::new();
    assert_not_built(mnpls.predict(&matrix));
    assert_not_built(mnpls.filter(&matrix));

    let npls = NPls::new();
    assert_not_built(npls.predict(&cube));
    assert_not_built(npls.filter(&cube));

    let sonpls = SoNPls::new();
    assert_not_built(sonpls.predict(&[cube.clone()]));
    assert_not_built(sonpls.loading_matrices());

    let ntf = Ntf::new();
    assert_not_built(ntf.reconstruction());
    assert_not_built(ntf.factors());

    let pca = TwoWayPca::new();
    assert_not_built(pca.filter(&matrix));
    assert_not_built(pca.loading_matrices());
}

#[test]
fn test_stop_from_another_thread() {
    let x = Tensor::random_normal(&[10, 10, 10], 3);
    let mut parafac = Parafac::with_config(ParafacConfig::default().with_num_components(3));
    parafac.add_criterion(Criterion::iterations(1_000_000)).unwrap();

    let handle = parafac.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.stop();
    });

    let result = parafac.build(&x);
    stopper.join().unwrap();

    assert!(matches!(result, Err(AlgorithmError::ForceStopped)));
    assert!(!parafac.is_finished());
    assert!(!parafac.stop_handle().is_stopped());
    assert!(!parafac.criteria().contains(CriterionType::Kill));
    let history = parafac.loss_history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_empty());
    assert!(history[0].len() < 1_000_000);
}

#[test]
fn test_parafac_small_tensor_shapes() {
    let x = Tensor::random_normal(&[5, 4, 3], 13);
    let mut parafac = Parafac::with_config(ParafacConfig::default().with_num_components(2));
    parafac.add_criterion(Criterion::iterations(25)).unwrap();
    parafac.build(&x).unwrap();

    let loadings = parafac.loading_matrices().unwrap();
    assert_eq!(loadings["A"].shape(), &[5, 2]);
    assert_eq!(loadings["B"].shape(), &[4, 2]);
    assert_eq!(loadings["C"].shape(), &[3, 2]);
    assert!(parafac.loss_history().iter().all(|h| h.len() == 25));

    let mut with_nan = x.clone();
    with_nan[&[2, 1, 0]] = f64::NAN;
    assert!(matches!(
        parafac.build(&with_nan),
        Err(AlgorithmError::InvalidInput(_))
    ));
    assert!(!parafac.is_finished());
}

#[test]
fn test_stop_before_build_then_rebuild() {
    let x = Tensor::random_normal(&[5, 4, 3], 4);
    let y = Tensor::random_normal(&[5, 1], 5);

    let mut npls = NPls::with_config(NPlsConfig::default().with_num_components(2));
    npls.stop();
    assert!(matches!(npls.build(&x, &y), Err(AlgorithmError::ForceStopped)));
    assert!(!npls.is_finished());

    npls.build(&x, &y).unwrap();
    assert!(npls.is_finished());
    assert_eq!(npls.predict(&x).unwrap().shape(), &[5, 1]);
}

#[test]
fn test_unsupported_criteria_are_rejected() {
    assert!(NPls::new().add_criterion(Criterion::seconds(5)).is_err());
    assert!(SoNPls::new().add_criterion(Criterion::seconds(5)).is_err());
    assert!(TwoWayPca::new().add_criterion(Criterion::iterations(5)).is_err());
    assert!(Ntf::new().add_criterion(Criterion::seconds(5)).is_ok());

    let err = Pls2::new().add_criterion(Criterion::Kill).unwrap_err();
    assert_eq!(
        err.to_string(),
        "PLS2 does not support the KILL stopping criterion"
    );
}

#[test]
fn test_improvement_sequence() {
    let mut criteria = StoppingCriteria::new();
    criteria.insert(Criterion::improvement(1e-3));
    for loss in [10.0, 5.0] {
        criteria.update(loss);
        assert!(!criteria.any_matches());
    }
    criteria.update(5.0);
    assert!(criteria.any_matches());
}

#[test]
fn test_sonpls_predicts_sum_of_block_models() {
    let blocks = vec![
        Tensor::random_normal(&[14, 3, 3], 6),
        Tensor::random_normal(&[14, 5], 7),
    ];
    let y = Tensor::random_normal(&[14, 2], 8);
    let mut model = SoNPls::with_config(SoNPlsConfig::default().with_num_components(vec![2, 2]));
    model.build(&blocks, &y).unwrap();

    let prediction = model.predict(&blocks).unwrap();
    assert_eq!(prediction.shape(), &[14, 2]);

    let loadings = model.loading_matrices().unwrap();
    for key in ["T_0", "U_0", "W_0", "Wj_0", "Wk_0", "Q_0", "B_0", "T_1"] {
        assert!(loadings.contains_key(key), "missing {}", key);
    }
    assert_eq!(loadings["T_1"].shape(), &[14, 2]);

    // A single block model sees exactly the first block.
    let mut first = NPls::with_config(
        NPlsConfig::default()
            .with_num_components(2)
            .with_standardize_y(false),
    );
    first.build(&blocks[0], &y).unwrap();
    let t0 = loadings["T_0"].to_matrix().unwrap();
    let t_first = first.loading_matrices().unwrap()["T"].to_matrix().unwrap();
    for (a, b) in t0.iter().zip(t_first.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_regressions_fit_a_linear_target() -> anyhow::Result<()> {
    let x = Tensor::random_normal(&[30, 4], 9);
    let xm = x.to_matrix()?;
    let mut y = Tensor::zeros(&[30, 1]);
    for i in 0..30 {
        y[&[i, 0]] = 2.0 * xm[[i, 0]] - xm[[i, 2]] + 0.5 * xm[[i, 3]] + 1.0;
    }

    let mut pls = Pls2::with_config(PlsConfig::default().with_num_components(4));
    pls.build(&x, &y)?;
    let prediction = pls.predict(&x)?;
    let error = prediction.squared_distance(&y)?;
    assert!(error < 1e-8, "PLS2 residual {}", error);
    Ok(())
}

#[derive(Debug, Default)]
struct CountingBackend {
    draws: AtomicUsize,
}

impl TensorBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn zeros(&self, shape: &[usize]) -> Tensor {
        NdarrayBackend.zeros(shape)
    }

    fn ones(&self, shape: &[usize]) -> Tensor {
        NdarrayBackend.ones(shape)
    }

    fn random_normal(&self, shape: &[usize], seed: u64) -> Tensor {
        self.draws.fetch_add(1, Ordering::SeqCst);
        NdarrayBackend.random_normal(shape, seed)
    }
}

#[test]
fn test_injected_backend_supplies_initial_values() {
    let backend = Arc::new(CountingBackend::default());

    let mut ntf = Ntf::with_config(NtfConfig::default().with_num_components(2))
        .with_backend(backend.clone());
    ntf.add_criterion(Criterion::iterations(3)).unwrap();
    ntf.build(&Tensor::ones(&[3, 4, 2])).unwrap();
    assert_eq!(backend.draws.load(Ordering::SeqCst), 3);

    let config = ParafacConfig::default()
        .with_initialization(Initialization::Random)
        .with_num_components(2)
        .with_num_starts(2);
    let mut parafac = Parafac::with_config(config).with_backend(backend.clone());
    parafac.add_criterion(Criterion::iterations(3)).unwrap();
    parafac.build(&Tensor::random_normal(&[4, 3, 3], 1)).unwrap();
    assert_eq!(backend.draws.load(Ordering::SeqCst), 3 + 4);
}
