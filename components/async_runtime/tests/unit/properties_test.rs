//! Property tests: settle-once and associativity of chaining

use async_runtime::{Promise, Runtime, Step};
use core_types::Reason;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(i32),
    Mul(i32),
    Fail(i32),
}

#[derive(Debug, Clone, Copy)]
struct Stage {
    op: Op,
    nested: bool,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-100i32..100).prop_map(Op::Add),
        (-5i32..5).prop_map(Op::Mul),
        (0i32..3).prop_map(Op::Fail),
    ]
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    (op_strategy(), any::<bool>()).prop_map(|(op, nested)| Stage { op, nested })
}

/// Runs one stage; nested stages hand back an already-settled promise
/// instead of a plain value.
fn apply(rt: &Runtime, stage: Stage, x: i32) -> Result<Step<i32>, Reason> {
    let result = match stage.op {
        Op::Add(k) => Ok(x.wrapping_add(k)),
        Op::Mul(k) => Ok(x.wrapping_mul(k)),
        Op::Fail(k) => Err(Reason::new(format!("stage failed with {}", k))),
    };
    if !stage.nested {
        return result.map(Step::Value);
    }
    Ok(Step::Adopt(match result {
        Ok(value) => rt.resolved(value),
        Err(reason) => rt.rejected(reason),
    }))
}

fn source(rt: &Runtime, seed: Result<i32, String>) -> Promise<i32> {
    rt.new_promise(move |r| match seed {
        Ok(value) => r.resolve(value),
        Err(message) => r.reject(message),
    })
}

fn seed_strategy() -> impl Strategy<Value = Result<i32, String>> {
    prop_oneof![
        (-1000i32..1000).prop_map(|v| Ok::<i32, String>(v)),
        "[a-z]{1,8}".prop_map(|m| Err::<i32, String>(m)),
    ]
}

#[derive(Debug, Clone)]
enum Settle {
    Resolve(i32),
    Reject(String),
}

fn settle_strategy() -> impl Strategy<Value = Settle> {
    prop_oneof![
        any::<i32>().prop_map(Settle::Resolve),
        "[a-z]{1,8}".prop_map(Settle::Reject),
    ]
}

proptest! {
    #[test]
    fn settling_is_once_only(actions in prop::collection::vec(settle_strategy(), 1..8)) {
        let rt = Runtime::new();
        let (promise, resolver) = rt.deferred::<i32>();

        let expected = match &actions[0] {
            Settle::Resolve(v) => Ok(*v),
            Settle::Reject(m) => Err(Reason::new(m.clone())),
        };
        for action in actions {
            match action {
                Settle::Resolve(v) => resolver.resolve(v),
                Settle::Reject(m) => resolver.reject(m),
            }
        }

        prop_assert_eq!(promise.outcome(), Some(expected));
    }

    #[test]
    fn chaining_is_associative(seed in seed_strategy(), a in stage_strategy(), b in stage_strategy()) {
        let rt = Runtime::new();

        let left_rt = rt.clone();
        let left_rt2 = rt.clone();
        let left = source(&rt, seed.clone())
            .then_step(move |x| apply(&left_rt, a, x))
            .then_step(move |x| apply(&left_rt2, b, x));

        let right_rt = rt.clone();
        let right = source(&rt, seed).then_step(move |x| {
            let inner = match apply(&right_rt, a, x) {
                Ok(Step::Value(value)) => right_rt.resolved(value),
                Ok(Step::Adopt(promise)) => promise,
                Err(reason) => right_rt.rejected(reason),
            };
            let handle = right_rt.clone();
            Ok(Step::Adopt(inner.then_step(move |y| apply(&handle, b, y))))
        });

        rt.run_until_idle();
        prop_assert!(left.outcome().is_some());
        prop_assert_eq!(left.outcome(), right.outcome());
    }
}
