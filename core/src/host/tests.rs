//! Tests for the host adapter: dependency tracking, queueing and faults

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::Host;
use crate::errors::{ErrorInfo, HostError, RunnerError};
use crate::operator::{call, done, initial_state, merge, set_state, wait_state, wait_time};
use crate::program::script::*;
use crate::program::ProgramFactory;
use crate::types::RunnerId;

fn counter_program(hits: Arc<AtomicUsize>) -> Arc<dyn ProgramFactory> {
    Arc::new(script(
        "counter",
        vec![
            yield_op(|_| initial_state(json!({"step": 0, "go": false}))),
            loop_body(vec![
                yield_op(|_| wait_state(|s| s["go"] == json!(true))),
                yield_op(move |_| {
                    let hits = hits.clone();
                    call(
                        "hit",
                        move |_| {
                            let hits = hits.clone();
                            async move { Ok(json!(hits.fetch_add(1, Ordering::SeqCst))) }
                        },
                        vec![],
                    )
                }),
                yield_op(|_| {
                    set_state(|s| {
                        let step = s["step"].as_u64().unwrap_or(0) + 1;
                        merge(s, json!({"step": step, "go": false}))
                    })
                }),
            ]),
        ],
    ))
}

#[tokio::test]
async fn test_mount_activates_once_and_settles() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut host = Host::new();
    let handle = host.mount_owned("counter", counter_program(hits.clone())).unwrap();

    host.run_until_idle().await.unwrap();

    assert_eq!(handle.status().drains, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // Nothing changed, nothing runs
    host.run_until_idle().await.unwrap();
    assert_eq!(handle.status().drains, 1);
}

#[tokio::test]
async fn test_setter_change_drives_program_to_next_suspension() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut host = Host::new();
    let handle = host.mount_owned("counter", counter_program(hits.clone())).unwrap();
    host.run_until_idle().await.unwrap();

    let setter = handle.setter().unwrap().clone();
    setter.set(|s| merge(s, json!({"go": true})));
    host.run_until_idle().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(*handle.state(), json!({"step": 1, "go": false}));

    setter.set(|s| merge(s, json!({"go": true})));
    host.run_until_idle().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(handle.state()["step"], json!(2));
    assert!(handle.setter().unwrap().same_as(&setter));
}

#[tokio::test]
async fn test_program_runs_to_done() {
    let mut host = Host::new();
    let handle = host
        .mount_owned(
            "short",
            Arc::new(script(
                "short",
                vec![
                    yield_op(|_| initial_state(json!({"n": 0}))),
                    yield_op(|_| set_state(|s| merge(s, json!({"n": 1})))),
                    yield_op(|_| set_state(|s| merge(s, json!({"n": 2})))),
                    yield_op(|_| done()),
                ],
            )),
        )
        .unwrap();

    host.run_until_idle().await.unwrap();

    assert!(handle.is_done());
    assert_eq!(*handle.state(), json!({"n": 2}));
    assert!(host.is_done(handle.id()).unwrap());

    let setter = host.setter(handle.id()).unwrap().unwrap();
    assert!(setter.same_as(handle.setter().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_change_during_drain_is_caught_up() {
    let mut host = Host::new();
    let handle = host
        .mount_owned(
            "slow",
            Arc::new(script(
                "slow",
                vec![
                    yield_op(|_| initial_state(json!({"a": false, "b": false, "seen": 0}))),
                    yield_op(|_| wait_state(|s| s["a"] == json!(true))),
                    yield_op(|_| wait_time(Duration::from_millis(500))),
                    yield_op(|_| wait_state(|s| s["b"] == json!(true))),
                    yield_op(|_| set_state(|s| merge(s, json!({"seen": 1})))),
                ],
            )),
        )
        .unwrap();
    host.run_until_idle().await.unwrap();

    let setter = handle.setter().unwrap().clone();
    setter.set(|s| merge(s, json!({"a": true})));

    let probe = setter.clone();
    let flip = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        probe.set(|s| merge(s, json!({"b": true})));
    });

    host.run_until_idle().await.unwrap();
    flip.await.unwrap();
    host.run_until_idle().await.unwrap();

    assert_eq!(handle.state()["seen"], json!(1));
}

#[tokio::test]
async fn test_external_snapshot_reaches_runner() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let mut host = Host::new();
    let handle = host.mount_external(
        "watcher",
        Arc::new(script(
            "watcher",
            vec![
                yield_op(|_| wait_state(|s| s["ready"] == json!(true))),
                yield_op(move |_| {
                    let counter = counter.clone();
                    call(
                        "observe",
                        move |_| {
                            let counter = counter.clone();
                            async move { Ok(json!(counter.fetch_add(1, Ordering::SeqCst))) }
                        },
                        vec![],
                    )
                }),
            ],
        )),
        json!({"ready": false}),
    );
    assert!(handle.setter().is_none());

    host.run_until_idle().await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    host.set_external(handle.id(), json!({"ready": true})).unwrap();
    host.run_until_idle().await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(handle.is_done());
}

#[tokio::test]
async fn test_owned_runner_refuses_external_snapshot() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut host = Host::new();
    let handle = host.mount_owned("counter", counter_program(hits.clone())).unwrap();
    host.run_until_idle().await.unwrap();
    let before = handle.state();

    let err = host
        .set_external(handle.id(), json!({"step": 0, "go": true}))
        .unwrap_err();
    assert!(matches!(
        err,
        HostError::Runner(RunnerError::OwnedState { .. })
    ));

    host.run_until_idle().await.unwrap();
    assert!(Arc::ptr_eq(&handle.state(), &before));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unhandled_failure_surfaces_once() {
    let mut host = Host::new();
    let handle = host
        .mount_owned(
            "broken",
            Arc::new(script(
                "broken",
                vec![
                    yield_op(|_| initial_state(json!({}))),
                    yield_op(|_| {
                        call(
                            "explode",
                            |_| async { Err(ErrorInfo::message("Bad request")) },
                            vec![],
                        )
                    }),
                ],
            )),
        )
        .unwrap();

    let err = host.run_until_idle().await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Runner(RunnerError::Unhandled { .. })
    ));
    assert!(handle.status().faulted);

    // A faulted runner is left alone afterwards
    handle.setter().unwrap().replace(json!({"again": true}));
    host.run_until_idle().await.unwrap();
}

#[tokio::test]
async fn test_unknown_runner_is_rejected() {
    let mut host = Host::new();
    let id = RunnerId::new();

    assert!(matches!(
        host.set_external(id, json!({})),
        Err(HostError::UnknownRunner(_))
    ));
    assert!(matches!(host.unmount(id), Err(HostError::UnknownRunner(_))));
    assert!(host.state(id).is_err());
}

#[tokio::test]
async fn test_misconfigured_program_fails_at_mount() {
    let mut host = Host::new();
    let result = host.mount_owned(
        "no-seed",
        Arc::new(script("no-seed", vec![yield_op(|_| done())])),
    );

    assert!(matches!(
        result,
        Err(HostError::Runner(RunnerError::Configuration { .. }))
    ));
}
