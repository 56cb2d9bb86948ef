//! Property-based tests for the tensor algebra kernels

#[cfg(test)]
mod tests {
    use crate::{fold, khatri_rao, matricize, mttkrp, orth, pseudo_invert};
    use multiway_core::Tensor;
    use proptest::prelude::*;

    fn dims3() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(1usize..6, 3)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_matricize_fold_roundtrip(shape in prop::collection::vec(1usize..5, 2..=4), seed in 0u64..500) {
            let x = Tensor::random_normal(&shape, seed);
            for axis in 0..shape.len() {
                let m = matricize(&x.view(), axis).unwrap();
                prop_assert_eq!(m.nrows(), shape[axis]);
                let back = fold(&m.view(), &shape, axis).unwrap();
                prop_assert_eq!(&back, x.as_array());
            }
        }

        #[test]
        fn prop_khatri_rao_shape_and_entries(dims in dims3(), seed in 0u64..500) {
            let (i, j, f) = (dims[0], dims[1], dims[2]);
            let u = Tensor::random_normal(&[i, f], seed).to_matrix().unwrap();
            let v = Tensor::random_normal(&[j, f], seed + 1).to_matrix().unwrap();
            let kr = khatri_rao(&u.view(), &v.view()).unwrap();
            prop_assert_eq!(kr.shape(), &[i * j, f]);
            prop_assert_eq!(kr[[i * j - 1, f - 1]], u[[i - 1, f - 1]] * v[[j - 1, f - 1]]);
        }

        #[test]
        fn prop_mttkrp_matches_unfolding(dims in dims3(), seed in 0u64..500) {
            let x = Tensor::random_normal(&dims, seed);
            let b = Tensor::random_normal(&[dims[1], 2], seed + 1).to_matrix().unwrap();
            let c = Tensor::random_normal(&[dims[2], 2], seed + 2).to_matrix().unwrap();
            let a = Tensor::zeros(&[dims[0], 2]).to_matrix().unwrap();
            let m = mttkrp(&x.view(), &[a.view(), b.view(), c.view()], 0).unwrap();
            let expected = matricize(&x.view(), 0).unwrap().dot(&khatri_rao(&c.view(), &b.view()).unwrap());
            for (l, r) in m.iter().zip(expected.iter()) {
                prop_assert!((l - r).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_orth_columns_orthogonal(rows in 4usize..8, cols in 1usize..4, seed in 0u64..500) {
            let v = Tensor::random_normal(&[rows, cols], seed);
            let u = orth(&v.view(), true).unwrap();
            let gram = u.t().dot(&u);
            for a in 0..cols {
                for b in 0..cols {
                    let target = if a == b { 1.0 } else { 0.0 };
                    prop_assert!((gram[[a, b]] - target).abs() < 1e-8);
                }
            }
        }

        #[test]
        fn prop_pseudo_inverse_condition(rows in 2usize..6, cols in 1usize..4, seed in 0u64..500) {
            let m = Tensor::random_normal(&[rows, cols], seed).to_matrix().unwrap();
            let p = pseudo_invert(&m.view()).unwrap();
            let mpm = m.dot(&p).dot(&m);
            for (l, r) in mpm.iter().zip(m.iter()) {
                prop_assert!((l - r).abs() < 1e-8);
            }
        }
    }
}
