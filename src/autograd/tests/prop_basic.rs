//! Property-based gradient checks for element-wise operations

use super::test_utils::finite_difference;
use crate::autograd::ops::{add_graph, relu_graph, sum_graph};
use crate::autograd::pool::AutogradAllocators;
use crate::autograd::{backward, Tensor};
use proptest::prelude::*;

fn tracked(allocators: &AutogradAllocators, values: &[f64]) -> Tensor {
    let t = allocators.alloc(&[1, values.len()]).expect("alloc");
    t.data_mut().copy_from_slice(values);
    t
}

/// Forward value of sum(relu(x)) without graph bookkeeping.
fn relu_sum_value(values: &[f64]) -> f64 {
    values.iter().map(|&v| v.max(0.0)).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_relu_backward_gradient_check(
        x in prop::collection::vec(-10.0f64..10.0, 1..24)
    ) {
        // Keep inputs away from the kink where relu is not differentiable.
        prop_assume!(x.iter().all(|v| v.abs() > 1e-3));

        let allocators = AutogradAllocators::new();
        let t = tracked(&allocators, &x);
        let y = allocators.alloc(&[1, x.len()]).expect("alloc");
        relu_graph(&t, &y, &allocators).expect("relu");
        let loss = allocators.alloc(&[1, 1]).expect("alloc");
        sum_graph(&y, &loss, &allocators).expect("sum");
        backward(&loss, &allocators).expect("backward");

        let analytical = t.grad().expect("gradient").to_vec();
        let numerical = finite_difference(relu_sum_value, &x, 1e-6);

        for i in 0..x.len() {
            prop_assert!(
                (analytical[i] - numerical[i]).abs() < 1e-6,
                "gradient mismatch at {}: analytical={}, numerical={}",
                i, analytical[i], numerical[i]
            );
        }
    }

    #[test]
    fn prop_add_backward_gradient_check(
        xy in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 1..24)
    ) {
        let (x, y): (Vec<f64>, Vec<f64>) = xy.into_iter().unzip();

        let allocators = AutogradAllocators::new();
        let a = tracked(&allocators, &x);
        let b = tracked(&allocators, &y);
        let c = allocators.alloc(&[1, x.len()]).expect("alloc");
        add_graph(&a, &b, &c, &allocators).expect("add");
        let loss = allocators.alloc(&[1, 1]).expect("alloc");
        sum_graph(&c, &loss, &allocators).expect("sum");
        backward(&loss, &allocators).expect("backward");

        // d(sum(a + b))/da = d(sum(a + b))/db = 1 everywhere.
        let grad_a = a.grad().expect("gradient").to_vec();
        let grad_b = b.grad().expect("gradient").to_vec();
        prop_assert!(grad_a.iter().all(|&g| g == 1.0));
        prop_assert!(grad_b.iter().all(|&g| g == 1.0));
    }

    #[test]
    fn prop_sum_gradient_broadcasts_the_seed(
        x in prop::collection::vec(-100.0f64..100.0, 1..32)
    ) {
        let allocators = AutogradAllocators::new();
        let t = tracked(&allocators, &x);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");
        sum_graph(&t, &loss, &allocators).expect("sum");
        backward(&loss, &allocators).expect("backward");

        let grad = t.grad().expect("gradient").to_vec();
        prop_assert!(grad.iter().all(|&g| g == 1.0));
    }
}
