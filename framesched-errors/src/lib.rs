/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared error taxonomy for the per-frame scheduler crates.
//!
//! [`ErrorKind`] is the one enum raised by [`dag-scheduler`](../dag_scheduler),
//! [`scope-alloc`](../scope_alloc), and [`frame-graph`](../frame_graph) — it is
//! lifted out to its own crate rather than kept local to each, since the same
//! four variants cross all three fallible layers.
//!
//! # Design decisions
//!
//! | Topic | Pattern |
//! |---|---|
//! | Variant set | Fixed at four: `OutOfMemory`, `InvalidState`, `InvalidArgument`, `ThreadViolation` |
//! | Extensibility | Each variant carries a `context: String` rather than structured per-site fields, since callers span three crates with unrelated data shapes |
//! | Display | Derived via `thiserror`, one `#[error(...)]` format string per variant |

use thiserror::Error;

/// The scheduler-wide error taxonomy.
///
/// `compile()` on a cyclic graph returns `InvalidState`; an allocation that
/// would overflow the Scope Allocator's remaining capacity returns
/// `OutOfMemory`; a cross-thread allocator use returns `ThreadViolation`; any
/// other caller misuse (bad index, wrong state for the call) returns
/// `InvalidArgument`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation would exceed available backing storage.
    #[error("out of memory: {context}")]
    OutOfMemory { context: String },

    /// The call is not valid in the component's current state (e.g. a cycle
    /// was detected during `compile`, or `add_pass` was called after
    /// `compile`).
    #[error("invalid state: {context}")]
    InvalidState { context: String },

    /// A caller-supplied argument is out of range or otherwise malformed.
    #[error("invalid argument: {context}")]
    InvalidArgument { context: String },

    /// A single-owner component (the Scope Allocator) was accessed from a
    /// thread other than the one that constructed it. Always checked, never
    /// gated behind `debug_assertions`.
    #[error("thread contract violated: {context}")]
    ThreadViolation { context: String },
}

impl ErrorKind {
    pub fn out_of_memory(context: impl Into<String>) -> Self {
        Self::OutOfMemory {
            context: context.into(),
        }
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Self::InvalidState {
            context: context.into(),
        }
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Self::InvalidArgument {
            context: context.into(),
        }
    }

    pub fn thread_violation(context: impl Into<String>) -> Self {
        Self::ThreadViolation {
            context: context.into(),
        }
    }
}
