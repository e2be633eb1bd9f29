// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the state-change notification stream: every node reports
//! started and finished exactly once, including nodes that finish by being
//! dropped mid-race.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use stepflow_sdk::{
    wait_for_condition, OperationStatus, RunContext, StateListener, StateNode, TestFailure,
};

#[derive(Default)]
struct RecordingStateListener {
    events: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingStateListener {
    fn events(&self) -> Vec<(String, &'static str)> {
        self.events.lock().expect("events lock poisoned").clone()
    }
}

impl StateListener for RecordingStateListener {
    fn on_started(&self, node: &Arc<StateNode>) {
        self.events
            .lock()
            .expect("events lock poisoned")
            .push((node.name().name().to_string(), "started"));
    }

    fn on_finished(&self, node: &Arc<StateNode>) {
        assert!(
            node.status().is_terminal(),
            "finished notification for a non-terminal node"
        );
        self.events
            .lock()
            .expect("events lock poisoned")
            .push((node.name().name().to_string(), "finished"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_every_node_reports_started_and_finished() {
    let (manual, _) = test_env();
    let listener = Arc::new(RecordingStateListener::default());
    let ctx = RunContext::builder(manual.scheduler())
        .state_listener(listener.clone())
        .build();

    let tree = wait_for_condition::<(), _>("never ready", || Ok(None))
        .expect_within(Duration::from_millis(300));

    let failure = manual.drive(tree.run(&ctx), DT).await.expect_err("times out");
    assert!(matches!(failure, TestFailure::Failed { .. }));

    let events = listener.events();
    let count = |name: &str, phase: &str| {
        events
            .iter()
            .filter(|(n, p)| n == name && *p == phase)
            .count()
    };
    // the drop-cancelled leaf reported both phases, exactly once
    assert_eq!(count("never ready", "started"), 1);
    assert_eq!(count("never ready", "finished"), 1);
    assert_eq!(count("EXPECT WITHIN 0.30 s", "started"), 1);
    assert_eq!(count("EXPECT WITHIN 0.30 s", "finished"), 1);
    // balanced stream overall
    let started = events.iter().filter(|(_, p)| *p == "started").count();
    let finished = events.iter().filter(|(_, p)| *p == "finished").count();
    assert_eq!(started, finished);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_listener_sees_terminal_status_at_finish() {
    let (manual, _) = test_env();
    let listener = Arc::new(RecordingStateListener::default());
    let ctx = RunContext::builder(manual.scheduler())
        .state_listener(listener.clone())
        .build();

    let ready = wait_for_condition("instantly ready", || Ok(Some(())));
    let mut state = ready.create_state();
    let node = Arc::clone(state.node());
    manual
        .drive(
            state.execute(&ctx, &stepflow_sdk::CancellationToken::new()),
            DT,
        )
        .await
        .expect("resolves");

    assert!(matches!(node.status(), OperationStatus::Completed(_)));
    assert_eq!(
        listener.events(),
        [
            ("instantly ready".to_string(), "started"),
            ("instantly ready".to_string(), "finished"),
        ]
    );
}
