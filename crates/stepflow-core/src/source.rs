// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Source-location breadcrumbs for diagnostics.
//!
//! Descriptor constructors are `#[track_caller]`, so every node in an
//! operation tree knows the file and line where the test author declared it.
//! During execution a [`SourceTrail`] accumulates these entries as the engine
//! descends into nested combinators; a failure is stamped with the deepest
//! trail, which is what the diagnostics renderer prints as the
//! `Operation stack`.

use std::fmt;
use std::panic::Location;

/// A `file:line` pair captured at a descriptor construction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    file: &'static str,
    line: u32,
}

impl SourceLocation {
    /// Capture the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }

    /// Source file path.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Line number within the file.
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Display name of an operation plus where it was declared.
#[derive(Debug, Clone)]
pub struct OperationName {
    name: String,
    location: SourceLocation,
}

impl OperationName {
    /// Build a name with an explicit location.
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }

    /// Build a name located at the caller.
    #[track_caller]
    pub fn here(name: impl Into<String>) -> Self {
        Self::new(name, SourceLocation::caller())
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the operation was declared.
    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One frame of a [`SourceTrail`].
#[derive(Debug, Clone)]
pub struct TrailEntry {
    name: String,
    location: SourceLocation,
}

impl TrailEntry {
    /// The operation name of this frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration site of this frame.
    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

impl fmt::Display for TrailEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] at {}", self.name, self.location)
    }
}

/// Ordered, append-only list of operation frames, root first.
#[derive(Debug, Clone, Default)]
pub struct SourceTrail {
    entries: Vec<TrailEntry>,
}

impl SourceTrail {
    /// Whether no frame has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The recorded frames, root first.
    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    /// Append a frame for an operation name.
    pub fn push(&mut self, name: &OperationName) {
        self.push_entry(name.name(), name.location());
    }

    /// Append a frame from raw parts.
    pub fn push_entry(&mut self, name: impl Into<String>, location: SourceLocation) {
        self.entries.push(TrailEntry {
            name: name.into(),
            location,
        });
    }

    /// A copy of this trail with one more frame appended.
    pub fn extended(&self, name: &OperationName) -> Self {
        let mut trail = self.clone();
        trail.push(name);
        trail
    }
}
