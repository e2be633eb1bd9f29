// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the until loop: repeat a response until a condition lands, with
//! the repetition bound as the safety net.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use stepflow_sdk::{
    do_once, wait_for_condition, wait_for_frames, CancellationToken, ErrorKind, Responder,
    UntilOptions,
};

/// A responder that is ready every frame; each response bumps the counter and
/// then spans one frame.
fn bumping_responder(counter: Arc<AtomicUsize>) -> Responder<()> {
    wait_for_condition("ready", || Ok(Some(())))
        .then_respond_with("bump", move |_| {
            let counter = counter.clone();
            do_once("incr", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .then(wait_for_frames(1))
        })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_until_stops_when_condition_lands() {
    let (manual, ctx) = test_env();
    let counter = Arc::new(AtomicUsize::new(0));

    let done = {
        let counter = counter.clone();
        wait_for_condition("two bumps seen", move || {
            Ok((counter.load(Ordering::SeqCst) >= 2).then_some(()))
        })
    };

    let looped = bumping_responder(counter.clone()).until(done);
    let mut state = looped.create_state();
    let token = CancellationToken::new();
    manual
        .drive(state.execute(&ctx, &token), DT)
        .await
        .expect("condition lands");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_pre_satisfied_condition_runs_no_response() {
    let (manual, ctx) = test_env();
    let counter = Arc::new(AtomicUsize::new(0));

    let done = wait_for_condition("already done", || Ok(Some(())));
    let looped = bumping_responder(counter.clone()).until(done);
    let mut state = looped.create_state();
    let node = Arc::clone(state.node());
    let token = CancellationToken::new();
    manual
        .drive(state.execute(&ctx, &token), DT)
        .await
        .expect("resolves at once");

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    // the condition is the only child: no responder was ever attached
    assert_eq!(node.children().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_repetition_limit_fails_after_exactly_max_executions() {
    let (manual, ctx) = test_env();
    let counter = Arc::new(AtomicUsize::new(0));

    let never = wait_for_condition::<(), _>("never", || Ok(None));
    let looped = bumping_responder(counter.clone())
        .until_with(never, UntilOptions { max_repeats: 3 });

    let mut state = looped.create_state();
    let token = CancellationToken::new();
    let failure = manual
        .drive(state.execute(&ctx, &token), DT)
        .await
        .expect_err("limit trips");

    let error = failure.as_failure().expect("failure, not cancellation");
    assert!(matches!(error.kind(), ErrorKind::RepetitionLimit { limit: 3 }));
    // exactly three executions, never a fourth
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_response_failure_fails_the_loop() {
    let (manual, ctx) = test_env();

    let broken = wait_for_condition("ready", || Ok(Some(())))
        .then_respond_with("explode", |_| {
            do_once::<(), _>("explode", || anyhow::bail!("response boom"))
        });
    let never = wait_for_condition::<(), _>("never", || Ok(None));

    let mut state = broken.until(never).create_state();
    let token = CancellationToken::new();
    let failure = manual
        .drive(state.execute(&ctx, &token), DT)
        .await
        .expect_err("response failure surfaces");
    assert!(failure
        .as_failure()
        .expect("failure")
        .to_string()
        .contains("response boom"));
}
