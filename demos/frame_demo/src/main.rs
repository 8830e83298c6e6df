/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Runnable illustration of the per-frame scheduler: wires up a
//! [`TaskScheduler`] and a [`FrameGraph`] and runs one of the textbook
//! scenarios end to end, logging each pass as it executes.
//!
//! Not part of the core's public contract — the core is a library. This
//! binary exists purely so the crates can be seen working together.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;

use frame_graph::{Config, FrameGraph};
use task_scheduler::TaskScheduler;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// A writes, B reads, C writes — three passes, three layers.
    Chain,
    /// Root writes, L1 and L2 both read, Join writes — three layers, middle one concurrent.
    FanOut,
}

#[derive(Parser, Debug)]
#[command(about = "Demonstrates the per-frame task/DAG/frame-graph scheduler")]
struct Args {
    #[arg(value_enum, default_value_t = Scenario::Chain)]
    scenario: Scenario,
}

struct Transform;

fn run_chain(graph: &mut FrameGraph, scheduler: &TaskScheduler) {
    graph.add_pass(
        "A",
        |b| b.write::<Transform>(),
        || info!(pass = "A", "executing"),
    );
    graph.add_pass(
        "B",
        |b| b.read::<Transform>(),
        || info!(pass = "B", "executing"),
    );
    graph.add_pass(
        "C",
        |b| b.write::<Transform>(),
        || info!(pass = "C", "executing"),
    );

    graph.compile().expect("chain scenario has no cycle");
    info!(layers = graph.execution_layers().len(), "compiled");
    graph.execute(scheduler);
}

fn run_fan_out(graph: &mut FrameGraph, scheduler: &TaskScheduler) {
    graph.add_pass(
        "Root",
        |b| b.write::<Transform>(),
        || info!(pass = "Root", "executing"),
    );
    graph.add_pass(
        "L1",
        |b| b.read::<Transform>(),
        || info!(pass = "L1", "executing"),
    );
    graph.add_pass(
        "L2",
        |b| b.read::<Transform>(),
        || info!(pass = "L2", "executing"),
    );
    graph.add_pass(
        "Join",
        |b| b.write::<Transform>(),
        || info!(pass = "Join", "executing"),
    );

    graph.compile().expect("fan-out scenario has no cycle");
    info!(layers = graph.execution_layers().len(), "compiled");
    graph.execute(scheduler);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let scheduler = TaskScheduler::new();
    scheduler.initialize(None);

    let mut graph = FrameGraph::new(Config::default());
    graph.reset();

    match args.scenario {
        Scenario::Chain => run_chain(&mut graph, &scheduler),
        Scenario::FanOut => run_fan_out(&mut graph, &scheduler),
    }

    info!(pass_count = graph.pass_count(), "frame complete");
    graph.scope_allocator_mut().reset()?;
    scheduler.shutdown();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_scenario_runs_to_completion() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        let mut graph = FrameGraph::new(Config::default());
        graph.reset();
        run_chain(&mut graph, &scheduler);
        assert_eq!(graph.pass_count(), 3);
        graph.scope_allocator_mut().reset().unwrap();
        scheduler.shutdown();
    }

    #[test]
    fn fan_out_scenario_runs_to_completion() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(Some(2));
        let mut graph = FrameGraph::new(Config::default());
        graph.reset();
        run_fan_out(&mut graph, &scheduler);
        assert_eq!(graph.pass_count(), 4);
        graph.scope_allocator_mut().reset().unwrap();
        scheduler.shutdown();
    }
}
