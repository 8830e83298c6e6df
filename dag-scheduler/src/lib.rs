/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-frame hazard-tracking DAG scheduler.
//!
//! [`DagScheduler`] accepts opaque nodes, derives ordering edges from
//! declared resource reads/writes (RAW/WAW/WAR) plus explicit edges, and
//! topologically partitions the result into parallel [`execution
//! layers`](DagScheduler::execution_layers) with Kahn's algorithm. It holds
//! no threads and does not execute anything — the [`frame-graph`] crate
//! drives the [`task-scheduler`] crate using the layering this produces.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | State | Not stateless like `GlobalScheduler::schedule()` — the node pool and per-resource state persist across `reset` on purpose, so the pool's backing capacity is reused frame over frame |
//! | Resource state map | `HashMap<ResourceKey, ResourceState>`, cleared (not dropped) on `reset` |
//! | Layering | pure function in [`layering`], kept independent of hazard bookkeeping so it can be tested in isolation |
//! | Cycle reporting | `compile()` returns `ErrorKind::InvalidState`, matching §6's "`compile` returns `InvalidState` on cycle" |

mod layering;

use std::collections::HashMap;

use framesched_errors::ErrorKind;
use tracing::warn;

/// A compact integer identifying a node within the current frame. Stable
/// only until the next `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An opaque key identifying a logical resource over which hazards are
/// tracked — a component type, a named label, or any caller-chosen value.
///
/// Label keys should have their high bit set (see
/// [`LABEL_KEY_TAG`]) to avoid colliding with type keys; the DAG scheduler
/// itself does not care which category a key belongs to, it only compares
/// keys for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey(pub u64);

/// High bit reserved for label-derived keys, so a string fingerprint can
/// never collide with a type-derived key in the same key space.
pub const LABEL_KEY_TAG: u64 = 1 << 63;

#[derive(Default)]
struct NodeData {
    dependents: Vec<NodeIndex>,
    in_degree: u32,
}

#[derive(Default)]
struct ResourceState {
    last_writer: Option<NodeIndex>,
    current_readers: Vec<NodeIndex>,
}

/// Read-only snapshot of the scheduler's size after `compile`, for logging
/// and telemetry attachment (not required by any invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub node_count: usize,
    pub layer_count: usize,
    pub edge_count: usize,
}

/// Per-frame DAG over caller-opaque nodes and resource keys.
///
/// The node pool and resource-state table are retained across `reset` calls
/// (their backing `Vec`/`HashMap` capacity grows to a high-water mark and is
/// never shrunk), matching the "Node pool memory retained" lifecycle rule.
pub struct DagScheduler {
    nodes: Vec<NodeData>,
    active_node_count: usize,
    resource_states: HashMap<ResourceKey, ResourceState>,
    execution_layers: Vec<Vec<NodeIndex>>,
}

impl Default for DagScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DagScheduler {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            active_node_count: 0,
            resource_states: HashMap::new(),
            execution_layers: Vec::new(),
        }
    }

    /// Clear per-frame state. Node pool capacity and resource-state table
    /// capacity are retained.
    pub fn reset(&mut self) {
        self.active_node_count = 0;
        self.resource_states.clear();
        self.execution_layers.clear();
    }

    /// Register a new node, recycling a pooled slot if one is available.
    pub fn add_node(&mut self) -> NodeIndex {
        let index = self.active_node_count;
        if index < self.nodes.len() {
            let slot = &mut self.nodes[index];
            slot.dependents.clear();
            slot.in_degree = 0;
        } else {
            self.nodes.push(NodeData::default());
        }
        self.active_node_count += 1;
        NodeIndex(index as u32)
    }

    fn is_valid(&self, n: NodeIndex) -> bool {
        n.index() < self.active_node_count
    }

    /// Add edge `producer -> consumer`, deduplicated, rejecting self-edges
    /// and out-of-range indices.
    pub fn add_edge(&mut self, producer: NodeIndex, consumer: NodeIndex) {
        if producer == consumer || !self.is_valid(producer) || !self.is_valid(consumer) {
            return;
        }
        let dependents = &mut self.nodes[producer.index()].dependents;
        if dependents.contains(&consumer) {
            return;
        }
        dependents.push(consumer);
        self.nodes[consumer.index()].in_degree += 1;
    }

    /// Strong read: orders `n` after the current writer of `key` (RAW) and
    /// registers `n` as a reader, so a future writer of `key` is ordered
    /// after `n` (WAR).
    pub fn declare_read(&mut self, n: NodeIndex, key: ResourceKey) {
        if !self.is_valid(n) {
            return;
        }
        let writer = self.resource_states.entry(key).or_default().last_writer;
        if let Some(writer) = writer {
            self.add_edge(writer, n);
        }
        let readers = &mut self.resource_states.entry(key).or_default().current_readers;
        if !readers.contains(&n) {
            readers.push(n);
        }
    }

    /// Weak read: orders `n` after the current writer of `key` (RAW) but
    /// does **not** register `n` as a reader — a future writer of `key` is
    /// not ordered after `n`.
    pub fn declare_weak_read(&mut self, n: NodeIndex, key: ResourceKey) {
        if !self.is_valid(n) {
            return;
        }
        let writer = self.resource_states.entry(key).or_default().last_writer;
        if let Some(writer) = writer {
            self.add_edge(writer, n);
        }
    }

    /// Write: orders `n` after the current writer (WAW) and every current
    /// reader (WAR) of `key`, clears the reader set, and installs `n` as the
    /// new writer.
    pub fn declare_write(&mut self, n: NodeIndex, key: ResourceKey) {
        if !self.is_valid(n) {
            return;
        }
        let (writer, readers) = {
            let state = self.resource_states.entry(key).or_default();
            (state.last_writer, std::mem::take(&mut state.current_readers))
        };

        if let Some(writer) = writer {
            self.add_edge(writer, n);
        }
        for reader in readers {
            self.add_edge(reader, n);
        }

        let state = self.resource_states.entry(key).or_default();
        state.last_writer = Some(n);
    }

    /// Compile the current node/edge set into parallel execution layers
    /// using Kahn's algorithm. Fails with `ErrorKind::InvalidState` iff the
    /// implied graph is cyclic.
    pub fn compile(&mut self) -> Result<(), ErrorKind> {
        let views: Vec<layering::NodeView<'_>> = self.nodes[..self.active_node_count]
            .iter()
            .map(|n| layering::NodeView {
                dependents: &n.dependents,
                in_degree: n.in_degree,
            })
            .collect();

        match layering::kahn_layers(&views) {
            Ok(layers) => {
                self.execution_layers = layers;
                Ok(())
            }
            Err(processed) => {
                warn!(
                    processed,
                    expected = self.active_node_count,
                    "cycle detected: frame skipped"
                );
                self.execution_layers.clear();
                Err(ErrorKind::invalid_state(format!(
                    "cycle detected: {processed}/{} nodes processed",
                    self.active_node_count
                )))
            }
        }
    }

    pub fn execution_layers(&self) -> &[Vec<NodeIndex>] {
        &self.execution_layers
    }

    pub fn active_node_count(&self) -> usize {
        self.active_node_count
    }

    pub fn stats(&self) -> Stats {
        let edge_count = self.nodes[..self.active_node_count]
            .iter()
            .map(|n| n.dependents.len())
            .sum();
        Stats {
            node_count: self.active_node_count,
            layer_count: self.execution_layers.len(),
            edge_count,
        }
    }
}
