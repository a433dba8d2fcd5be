//! Unit tests for Promise

use async_runtime::{PromiseState, Runtime};
use core_types::{Reason, ReasonKind};

#[test]
fn new_promise_is_pending() {
    let rt = Runtime::new();
    let promise = rt.new_promise::<i32, _>(|_| {});
    assert!(matches!(promise.state(), PromiseState::Pending));
}

#[test]
fn new_promise_has_no_result() {
    let rt = Runtime::new();
    let promise = rt.new_promise::<i32, _>(|_| {});
    assert!(promise.value().is_none());
    assert!(promise.reason().is_none());
    assert!(promise.outcome().is_none());
}

#[test]
fn resolver_runs_synchronously() {
    let rt = Runtime::new();
    let mut ran = false;
    let _promise = rt.new_promise::<i32, _>(|_| ran = true);
    assert!(ran);
}

#[test]
fn resolve_changes_state_to_fulfilled() {
    let rt = Runtime::new();
    let promise = rt.new_promise(|r| r.resolve(42));
    assert!(matches!(promise.state(), PromiseState::Fulfilled));
    assert_eq!(promise.value(), Some(42));
}

#[test]
fn reject_changes_state_to_rejected() {
    let rt = Runtime::new();
    let promise = rt.new_promise::<i32, _>(|r| r.reject(Reason::type_error("test")));
    assert!(matches!(promise.state(), PromiseState::Rejected));
    assert_eq!(promise.reason().unwrap().kind(), ReasonKind::TypeError);
}

#[test]
fn cannot_resolve_already_fulfilled_promise() {
    let rt = Runtime::new();
    let promise = rt.new_promise(|r| {
        r.resolve(42);
        r.resolve(100);
    });
    assert_eq!(promise.value(), Some(42));
}

#[test]
fn cannot_reject_already_fulfilled_promise() {
    let rt = Runtime::new();
    let promise = rt.new_promise(|r| {
        r.resolve(42);
        r.reject("test");
    });
    assert!(matches!(promise.state(), PromiseState::Fulfilled));
    assert!(promise.reason().is_none());
}

#[test]
fn cannot_resolve_already_rejected_promise() {
    let rt = Runtime::new();
    let promise = rt.new_promise(|r| {
        r.reject("first");
        r.resolve(42);
        r.reject("second");
    });
    assert!(matches!(promise.state(), PromiseState::Rejected));
    assert_eq!(promise.reason(), Some(Reason::new("first")));
}

#[test]
fn resolver_can_settle_after_construction() {
    let rt = Runtime::new();
    let mut stash = None;
    let promise = rt.new_promise(|r| stash = Some(r));
    assert!(promise.is_pending());

    stash.unwrap().resolve("later");
    assert_eq!(promise.value(), Some("later"));
}

#[test]
fn cloned_resolvers_share_settle_once() {
    let rt = Runtime::new();
    let (promise, resolver) = rt.deferred::<u8>();
    let other = resolver.clone();

    other.reject("from the clone");
    resolver.resolve(1);

    assert_eq!(promise.reason(), Some(Reason::new("from the clone")));
}

#[test]
fn settle_with_result() {
    let rt = Runtime::new();
    let ok = rt.new_promise(|r| r.settle(Ok::<_, Reason>(1)));
    let err = rt.new_promise::<i32, _>(|r| r.settle(Err(Reason::new("no"))));
    assert_eq!(ok.outcome(), Some(Ok(1)));
    assert_eq!(err.outcome(), Some(Err(Reason::new("no"))));
}

#[test]
fn then_returns_new_promise() {
    let rt = Runtime::new();
    let promise = rt.resolved(1);
    let chained = promise.then(|x| Ok(x));
    assert!(!chained.ptr_eq(&promise));
    assert!(matches!(chained.state(), PromiseState::Pending));
}

#[test]
fn continuations_fire_in_registration_order() {
    let rt = Runtime::new();
    let order = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
    let (promise, resolver) = rt.deferred::<i32>();

    for tag in ["a", "b", "c"] {
        let order = order.clone();
        promise.then(move |_| {
            order.lock().unwrap().push(tag);
            Ok(())
        });
    }

    resolver.resolve(0);
    assert!(order.lock().unwrap().is_empty());

    rt.run_until_idle();
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn continuation_attached_after_settlement_is_deferred() {
    let rt = Runtime::new();
    let promise = rt.resolved(5);
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let s = seen.clone();

    promise.then(move |x| {
        *s.lock().unwrap() = Some(x);
        Ok(())
    });

    assert!(seen.lock().unwrap().is_none());
    assert_eq!(rt.pending_tasks(), 1);
    rt.run_until_idle();
    assert_eq!(*seen.lock().unwrap(), Some(5));
}

#[test]
fn promise_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<async_runtime::Promise<String>>();
    assert_send_sync::<async_runtime::Resolver<String>>();
    assert_send_sync::<Runtime>();
}

#[test]
fn promise_settled_from_another_thread() {
    let rt = Runtime::new();
    let (promise, resolver) = rt.deferred::<String>();
    let next = promise.then(|s| Ok(s.to_uppercase()));

    std::thread::spawn(move || resolver.resolve("threaded".to_string()))
        .join()
        .unwrap();

    rt.run_until_idle();
    assert_eq!(next.value(), Some("THREADED".to_string()));
}
