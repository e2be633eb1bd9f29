// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the failure report of a real run: tree shape, verbose context
//! placement, continuation placeholders, and failure-listener delivery.

mod common;

use std::time::Duration;

use common::*;
use stepflow_sdk::{do_once, wait_for_condition, RunContext, TestFailure};

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_failure_report_shows_the_whole_tree() {
    let (manual, _) = test_env();
    let listener = RecordingFailureListener::new();
    let ctx = RunContext::builder(manual.scheduler())
        .failure_listener(listener.clone())
        .build();

    let tree = wait_for_condition::<(), _>("server ready", || Ok(None))
        .expect_within(Duration::from_millis(300))
        .and_then(|_| do_once("use server", || Ok(())));

    let failure = manual.drive(tree.run(&ctx), DT).await.expect_err("times out");
    let TestFailure::Failed { error, description } = failure else {
        panic!("expected a failed run");
    };

    // verbose context appears once, at the innermost failed node
    assert_eq!(description.matches("Failed with:").count(), 1);
    assert!(description.contains("timed out after"));
    assert!(description.contains("Operation stack:"));
    // the continuation was never constructed
    assert_eq!(description.matches("[ ] ...").count(), 1);
    assert!(!description.contains("use server"));
    // the losing wait is cancelled, compactly
    assert!(description.contains("[-] server ready"));
    assert!(description.contains("EXPECT WITHIN 0.30 s"));

    // the host listener got the same report, once
    let reports = listener.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].1, description);
    assert!(reports[0].0.contains("timed out"));
    assert!(error.is_timeout());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_passing_branches_render_compactly() {
    let (manual, _) = test_env();
    let listener = RecordingFailureListener::new();
    let ctx = RunContext::builder(manual.scheduler())
        .failure_listener(listener.clone())
        .build();

    let tree = do_once("prepare", || Ok(()))
        .then(do_once::<(), _>("explode", || anyhow::bail!("boom")));

    let failure = manual.drive(tree.run(&ctx), DT).await.expect_err("fails");
    let TestFailure::Failed { description, .. } = failure else {
        panic!("expected a failed run");
    };

    // the completed first step is a single compact line
    assert!(description.contains("[✓] prepare (Completed in"));
    assert!(!description.contains("prepare\n  Failed with"));
    assert!(description.contains("boom"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_display_of_test_failure_carries_the_report() {
    let (manual, ctx) = test_env();

    let failing = do_once::<(), _>("explode", || anyhow::bail!("boom"));
    let failure = manual.drive(failing.run(&ctx), DT).await.expect_err("fails");

    let rendered = failure.to_string();
    // proximate cause first, tree after
    assert!(rendered.starts_with("boom"));
    assert!(rendered.contains("[!] explode"));
}
