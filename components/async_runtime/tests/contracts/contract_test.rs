//! Contract tests for async_runtime component
//!
//! These tests pin the public surface other components build on: the
//! promise constructor, the chaining combinators, the task queue and the
//! unhandled-rejection hook.

use async_runtime::{
    Callback, ConfigError, Promise, PromiseId, PromiseState, Resolver, RunReport, Runtime,
    RuntimeConfig, Step, Task, TaskQueue,
};
use core_types::Reason;

mod runtime_contract {
    use super::*;

    #[test]
    fn runtime_new_returns_self() {
        let runtime = Runtime::new();
        let _: Runtime = runtime;
    }

    #[test]
    fn runtime_with_config_returns_result() {
        let result: Result<Runtime, ConfigError> = Runtime::with_config(RuntimeConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn new_promise_takes_resolver_callback() {
        let runtime = Runtime::new();
        let promise: Promise<i32> = runtime.new_promise(|resolver: Resolver<i32>| {
            resolver.resolve(1);
        });
        let _ = promise;
    }

    #[test]
    fn run_until_idle_returns_report() {
        let runtime = Runtime::new();
        let report: RunReport = runtime.run_until_idle();
        assert_eq!(report.executed, 0);
    }

    #[test]
    fn from_callback_accepts_boxed_completion() {
        let runtime = Runtime::new();
        let promise: Promise<u8> = runtime.from_callback(|done: Callback<u8>| done(Ok(1)));
        assert_eq!(promise.value(), Some(1));
    }

    #[test]
    fn on_unhandled_rejection_takes_reason_and_id() {
        let runtime = Runtime::new();
        runtime.on_unhandled_rejection(|_reason: &Reason, _id: PromiseId| {});
    }
}

mod promise_contract {
    use super::*;

    #[test]
    fn then_returns_promise_of_new_type() {
        let runtime = Runtime::new();
        let chained: Promise<String> = runtime.resolved(1).then(|x| Ok(x.to_string()));
        let _ = chained;
    }

    #[test]
    fn then_step_accepts_step() {
        let runtime = Runtime::new();
        let chained: Promise<i32> = runtime.resolved(1).then_step(|x| Ok(Step::Value(x)));
        let _ = chained;
    }

    #[test]
    fn catch_returns_promise_of_same_type() {
        let runtime = Runtime::new();
        let chained: Promise<i32> = runtime.rejected::<i32>("e").catch(|_| Ok(0));
        let _ = chained;
    }

    #[test]
    fn finally_returns_promise_of_same_type() {
        let runtime = Runtime::new();
        let chained: Promise<i32> = runtime.resolved(1).finally(|| Ok(()));
        let _ = chained;
    }

    #[test]
    fn outcome_is_option_result() {
        let runtime = Runtime::new();
        let outcome: Option<Result<i32, Reason>> = runtime.resolved(1).outcome();
        assert_eq!(outcome, Some(Ok(1)));
    }
}

mod promise_state_contract {
    use super::*;

    #[test]
    fn promise_state_has_pending_variant() {
        let state = PromiseState::Pending;
        assert!(matches!(state, PromiseState::Pending));
    }

    #[test]
    fn promise_state_has_fulfilled_variant() {
        let state = PromiseState::Fulfilled;
        assert!(matches!(state, PromiseState::Fulfilled));
    }

    #[test]
    fn promise_state_has_rejected_variant() {
        let state = PromiseState::Rejected;
        assert!(matches!(state, PromiseState::Rejected));
    }
}

mod task_queue_contract {
    use super::*;

    #[test]
    fn task_new_accepts_closure() {
        let task = Task::new(|| {});
        task.run();
    }

    #[test]
    fn queue_enqueue_takes_task() {
        let queue = TaskQueue::new();
        queue.enqueue(Task::new(|| {}));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn queue_drain_returns_count() {
        let queue = TaskQueue::new();
        queue.enqueue(Task::new(|| {}));
        let ran: usize = queue.drain();
        assert_eq!(ran, 1);
    }
}
