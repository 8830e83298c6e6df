/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Kahn's-algorithm topological layering, as a pure function over the node
//! pool's `dependents` / `in_degree` columns.
//!
//! Kept separate from [`DagScheduler`](crate::DagScheduler) so the layering
//! step can be tested independently of hazard declaration.

use crate::NodeIndex;

/// One node's outgoing edges and current in-degree, as seen by the layering
/// pass. Borrowed from the scheduler's node pool — this module never owns
/// node storage.
pub struct NodeView<'a> {
    pub dependents: &'a [NodeIndex],
    pub in_degree: u32,
}

/// Run Kahn's algorithm over `nodes[0..active_node_count]`.
///
/// Returns `Ok(layers)` if the implied graph is acyclic, `Err(processed)`
/// (the number of nodes actually reached) otherwise — the caller compares
/// `processed` against `active_node_count` to report the cycle.
pub fn kahn_layers(nodes: &[NodeView<'_>]) -> Result<Vec<Vec<NodeIndex>>, usize> {
    let n = nodes.len();
    let mut in_degree: Vec<u32> = nodes.iter().map(|v| v.in_degree).collect();
    let mut layers = Vec::new();
    let mut processed = 0usize;

    let mut layer: Vec<NodeIndex> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(|i| NodeIndex(i as u32))
        .collect();

    while !layer.is_empty() {
        processed += layer.len();

        let mut next: Vec<NodeIndex> = Vec::new();
        for &node in &layer {
            for &dep in nodes[node.0 as usize].dependents {
                let d = dep.0 as usize;
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(dep);
                }
            }
        }
        // Preserve NodeIndex (insertion) order within the next layer for
        // determinism, per the tie-break rule: callers must not depend on
        // it, but it should be stable.
        next.sort_unstable_by_key(|idx| idx.0);
        next.dedup();

        layers.push(std::mem::take(&mut layer));
        layer = next;
    }

    if processed == n {
        Ok(layers)
    } else {
        Err(processed)
    }
}
