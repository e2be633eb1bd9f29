// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tree-shaped status reports.
//!
//! Depth-first, two-space indent per level, one status line per node. Verbose
//! context is reserved for the nodes that need it: the innermost failures get
//! the error message and operation stack, waiting leaves get their declaration
//! site, everything else stays one compact line. Passing runs render short;
//! failing runs render maximally informative.

use std::fmt::Write as _;
use std::sync::Arc;

use stepflow_core::{NodeChild, OperationStatus, StateNode};

const MESSAGE_LIMIT: usize = 500;

/// Render an operation tree as an indented status report.
pub fn render_tree(root: &Arc<StateNode>) -> String {
    let mut out = String::new();
    render_node(&mut out, root, 0);
    out
}

fn render_node(out: &mut String, node: &Arc<StateNode>, depth: usize) {
    let indent = "  ".repeat(depth);
    let status = node.status();
    match status.timing() {
        Some(timing) => {
            let _ = writeln!(out, "{indent}{} {} ({timing})", status.marker(), node.name());
        }
        None => {
            let _ = writeln!(out, "{indent}{} {}", status.marker(), node.name());
        }
    }

    let children = node.children();
    let has_node_children = children
        .iter()
        .any(|child| matches!(child, NodeChild::Node(_)));

    match &status {
        // A failure bubbles up through ancestors; only the innermost failed
        // node carries the details worth printing.
        OperationStatus::Failed { message, trail, .. }
            if !has_failed_descendant(&children) =>
        {
            let _ = writeln!(out, "{indent}  Failed with:");
            for line in truncated(message).lines() {
                let _ = writeln!(out, "{indent}    {line}");
            }
            if !trail.is_empty() {
                let _ = writeln!(out, "{indent}  Operation stack:");
                for entry in trail.entries() {
                    let _ = writeln!(out, "{indent}    {entry}");
                }
            }
        }
        OperationStatus::Waiting(_) if !has_node_children => {
            let _ = writeln!(out, "{indent}  started at {}", node.name().location());
        }
        _ => {}
    }

    for child in &children {
        match child {
            NodeChild::Node(child) => render_node(out, child, depth + 1),
            NodeChild::PendingContinuation => {
                let _ = writeln!(out, "{}[ ] ...", "  ".repeat(depth + 1));
            }
        }
    }
}

fn has_failed_descendant(children: &[NodeChild]) -> bool {
    children.iter().any(|child| match child {
        NodeChild::Node(node) => {
            matches!(node.status(), OperationStatus::Failed { .. })
                || has_failed_descendant(&node.children())
        }
        NodeChild::PendingContinuation => false,
    })
}

fn truncated(message: &str) -> String {
    if message.chars().count() <= MESSAGE_LIMIT {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MESSAGE_LIMIT).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stepflow_core::{
        ManualScheduler, NodeChild, OperationError, OperationName, SourceTrail, StateNode,
        WaitContext,
    };

    fn wait_context() -> WaitContext {
        let manual = ManualScheduler::new();
        WaitContext::open(Arc::clone(manual.scheduler().port()))
    }

    #[test]
    fn test_verbose_only_at_innermost_failure() {
        let failed = StateNode::new(OperationName::here("inner step"));
        failed.begin(wait_context());
        let mut trail = SourceTrail::default();
        trail.push(&OperationName::here("outer wait"));
        trail.push(&OperationName::here("inner step"));
        failed.fail(&OperationError::failure_msg("boom").with_trail_if_empty(&trail));

        let sibling = StateNode::new(OperationName::here("sibling step"));

        let waiting_child = StateNode::with_children(
            OperationName::here("outer wait"),
            vec![
                NodeChild::Node(Arc::clone(&failed)),
                NodeChild::Node(Arc::clone(&sibling)),
                NodeChild::PendingContinuation,
            ],
        );
        waiting_child.begin(wait_context());

        let root = StateNode::with_children(
            OperationName::here("root"),
            vec![NodeChild::Node(Arc::clone(&waiting_child))],
        );
        root.begin(wait_context());

        let rendered = render_tree(&root);
        assert_eq!(rendered.matches("[!]").count(), 1);
        assert_eq!(rendered.matches("Failed with:").count(), 1);
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Operation stack:"));
        // the not-started sibling is one compact line
        assert!(rendered.contains("[ ] sibling step\n"));
        assert_eq!(rendered.matches("[ ] ...").count(), 1);
    }

    #[test]
    fn test_waiting_leaf_shows_declaration_site() {
        let leaf = StateNode::new(OperationName::here("leaf wait"));
        leaf.begin(wait_context());

        let rendered = render_tree(&leaf);
        assert!(rendered.contains("started at"));
        assert!(rendered.contains("diagnostics.rs"));
    }

    #[test]
    fn test_waiting_parent_stays_compact() {
        let child = StateNode::new(OperationName::here("child"));
        let parent = StateNode::with_children(
            OperationName::here("parent"),
            vec![NodeChild::Node(child)],
        );
        parent.begin(wait_context());

        let rendered = render_tree(&parent);
        assert!(!rendered.contains("started at"));
    }

    #[test]
    fn test_oversized_message_is_truncated() {
        let node = StateNode::new(OperationName::here("big failure"));
        node.begin(wait_context());
        node.fail(&OperationError::failure_msg("x".repeat(800)));

        let rendered = render_tree(&node);
        assert!(rendered.contains(&format!("{}...", "x".repeat(500))));
        assert!(!rendered.contains(&"x".repeat(501)));
    }

    #[test]
    fn test_failure_attributed_to_ancestors_renders_once() {
        let inner = StateNode::new(OperationName::here("inner"));
        inner.begin(wait_context());
        inner.fail(&OperationError::failure_msg("deep failure"));

        let outer = StateNode::with_children(
            OperationName::here("outer"),
            vec![NodeChild::Node(inner)],
        );
        outer.begin(wait_context());
        outer.fail(&OperationError::failure_msg("deep failure"));

        let rendered = render_tree(&outer);
        assert_eq!(rendered.matches("[!]").count(), 2);
        assert_eq!(rendered.matches("Failed with:").count(), 1);
    }
}
