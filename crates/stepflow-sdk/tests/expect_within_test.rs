// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the timeout race: the deadline is virtual time, the losing side
//! is cancelled, and a timeout is classified apart from user failures.

mod common;

use std::time::Duration;

use common::*;
use stepflow_sdk::{
    wait_for_condition, wait_for_seconds, CancellationToken, ErrorKind, TestFailure,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_condition_true_before_deadline_passes_through() {
    let (manual, ctx) = test_env();
    let scheduler = manual.scheduler();

    let halfway = wait_for_condition("halfway point", move || {
        Ok((scheduler.time_now() >= Duration::from_millis(500)).then_some(7))
    });

    let value = manual
        .drive(halfway.expect_within(Duration::from_secs(1)).run(&ctx), DT)
        .await
        .expect("completes before the deadline");
    assert_eq!(value, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_never_true_condition_times_out() {
    let (manual, ctx) = test_env();

    let never = wait_for_condition::<(), _>("never ready", || Ok(None));
    let failure = manual
        .drive(never.expect_within(Duration::from_secs(1)).run(&ctx), DT)
        .await
        .expect_err("deadline fires");

    let TestFailure::Failed { error, description } = failure else {
        panic!("expected a failed run");
    };
    assert!(matches!(
        error.kind(),
        ErrorKind::Timeout { timeout } if *timeout == Duration::from_secs(1)
    ));
    // deadline was 1 s of virtual time at 100 ms per tick
    assert!(manual.scheduler().frame_now() >= 10);
    // the losing wait was cancelled, not failed
    assert!(description.contains("[-] never ready"));
    assert!(description.contains("EXPECT WITHIN 1.00 s"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_instruction_finishing_in_time_is_untouched() {
    let (manual, ctx) = test_env();

    let quick = wait_for_seconds(Duration::from_millis(200))
        .expect_within(Duration::from_secs(1));
    manual.drive(quick.run(&ctx), DT).await.expect("in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_inner_failure_is_not_reported_as_timeout() {
    let (manual, ctx) = test_env();

    let broken = wait_for_condition::<(), _>("broken", || anyhow::bail!("inner boom"));
    let failure = manual
        .drive(broken.expect_within(Duration::from_secs(1)).run(&ctx), DT)
        .await
        .expect_err("inner failure wins the race");

    let TestFailure::Failed { error, .. } = failure else {
        panic!("expected a failed run");
    };
    assert!(matches!(error.kind(), ErrorKind::Failure(_)));
    assert!(error.to_string().contains("inner boom"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_cancelled_token_cancels_the_run() {
    let (_manual, ctx) = test_env();

    let token = CancellationToken::new();
    token.cancel();
    let outcome = wait_for_seconds(Duration::from_secs(5))
        .expect_within(Duration::from_secs(10))
        .run_with_token(&ctx, &token)
        .await;
    assert!(matches!(outcome, Err(TestFailure::Canceled)));
}
