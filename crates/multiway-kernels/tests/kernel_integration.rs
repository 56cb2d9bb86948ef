//! Integration tests tying the kernels together
//!
//! The identities checked here are the ones the ALS and PLS loops rely on.

use multiway_core::Tensor;
use multiway_kernels::{
    invert_matricize, invert_or_pseudo, invert_vectorize, khatri_rao, matricize, mttkrp,
    reconstruct, vectorize, Scaling,
};
use scirs2_core::ndarray_ext::{Array2, Axis};

fn factor(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    Tensor::random_normal(&[rows, cols], seed).to_matrix().unwrap()
}

#[test]
fn test_unfolded_reconstruction_matches_khatri_rao_form() {
    let (a, b, c) = (factor(4, 2, 1), factor(3, 2, 2), factor(5, 2, 3));
    let x = reconstruct(&[a.view(), b.view(), c.view()]).unwrap();

    // X_(0) = A · (C ⊙ B)ᵀ with columns ordered k*J + j
    let x0 = matricize(&x.view(), 0).unwrap();
    let expected = a.dot(&khatri_rao(&c.view(), &b.view()).unwrap().t());
    for (got, want) in x0.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-10);
    }

    let back = invert_matricize(&x0.view(), 0, 3, 5).unwrap();
    assert_eq!(back, x);
}

#[test]
fn test_mttkrp_equals_unfolding_times_khatri_rao() {
    let x = Tensor::random_normal(&[4, 3, 5], 4);
    let (a, b, c) = (factor(4, 2, 5), factor(3, 2, 6), factor(5, 2, 7));

    let direct = mttkrp(&x.view(), &[a.view(), b.view(), c.view()], 0).unwrap();
    let x0 = matricize(&x.view(), 0).unwrap();
    let via_unfolding = x0.dot(&khatri_rao(&c.view(), &b.view()).unwrap());
    for (got, want) in direct.iter().zip(via_unfolding.iter()) {
        assert!((got - want).abs() < 1e-10);
    }
}

#[test]
fn test_vectorize_and_invert_vectorize_split_modes() {
    let x = Tensor::random_normal(&[1, 3, 4], 8);
    let row = matricize(&x.view(), 0).unwrap().index_axis(Axis(0), 0).to_owned();
    let z = invert_vectorize(&row.view(), 3).unwrap();
    assert_eq!(z.dim(), (3, 4));
    for j in 0..3 {
        for k in 0..4 {
            assert_eq!(z[[j, k]], x[&[0, j, k]]);
        }
    }
    assert_eq!(vectorize(&z.t()), row);
}

#[test]
fn test_scaling_round_trip_and_regression_solve() {
    let x = factor(20, 3, 9);
    let scaling = Scaling::fit(&x.view(), true);
    let scaled = scaling.apply(&x.view()).unwrap();
    for column in scaled.columns() {
        assert!(column.sum().abs() < 1e-10);
    }
    let restored = scaling.invert(&scaled.view()).unwrap();
    for (got, want) in restored.iter().zip(x.iter()) {
        assert!((got - want).abs() < 1e-10);
    }

    let gram = x.t().dot(&x);
    let inverse = invert_or_pseudo(&gram.view()).unwrap();
    let identity = gram.dot(&inverse);
    for ((i, j), value) in identity.indexed_iter() {
        let want = if i == j { 1.0 } else { 0.0 };
        assert!((value - want).abs() < 1e-8);
    }
}
