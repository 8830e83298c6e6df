/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The `setup` callback's view of a single pass being declared.

use dag_scheduler::{DagScheduler, NodeIndex};

use crate::keys::{label_key, type_key};

/// Passed to a pass's `setup` closure; declares the reads, writes, and
/// label dependencies that become DAG edges.
pub struct Builder<'a> {
    pub(crate) dag: &'a mut DagScheduler,
    pub(crate) node: NodeIndex,
}

impl<'a> Builder<'a> {
    /// Declare a strong read of component type `T`.
    pub fn read<T: 'static>(&mut self) {
        self.dag.declare_read(self.node, type_key::<T>());
    }

    /// Declare a write of component type `T`.
    pub fn write<T: 'static>(&mut self) {
        self.dag.declare_write(self.node, type_key::<T>());
    }

    /// Order this pass after whichever pass most recently `signal`ed
    /// `label`, without becoming a dependency of a future `signal` of the
    /// same label (weak read).
    pub fn wait_for(&mut self, label: &str) {
        self.dag.declare_weak_read(self.node, label_key(label));
    }

    /// Mark this pass as producing `label`; passes that already `wait_for`
    /// it are ordered before this pass, and future `signal`s of the same
    /// label are ordered after it (WAW).
    pub fn signal(&mut self, label: &str) {
        self.dag.declare_write(self.node, label_key(label));
    }
}
