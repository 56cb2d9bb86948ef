//! Property-based tests for tensor shape operations

#[cfg(test)]
mod tests {
    use crate::Tensor;
    use proptest::prelude::*;

    fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(1usize..6, 1..=4)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_reshape_roundtrip(shape in shape_strategy(), seed in 0u64..1000) {
            let tensor = Tensor::random_normal(&shape, seed);
            let flat = tensor.reshape(&[tensor.len()]).unwrap();
            let restored = flat.reshape(&shape).unwrap();
            prop_assert_eq!(restored, tensor);
        }

        #[test]
        fn prop_reverse_permute_twice_is_identity(shape in shape_strategy(), seed in 0u64..1000) {
            let tensor = Tensor::random_normal(&shape, seed);
            let perm: Vec<usize> = (0..tensor.order()).rev().collect();
            let back = tensor.permute(&perm).unwrap().permute(&perm).unwrap();
            prop_assert_eq!(back, tensor);
        }

        #[test]
        fn prop_get_matches_index(shape in shape_strategy(), seed in 0u64..1000) {
            let tensor = Tensor::random_normal(&shape, seed);
            let last: Vec<usize> = shape.iter().map(|d| d - 1).collect();
            prop_assert_eq!(tensor.get(&last), Some(tensor[last.as_slice()]));
            let mut outside = last.clone();
            outside[0] += 1;
            prop_assert_eq!(tensor.get(&outside), None);
        }
    }
}
