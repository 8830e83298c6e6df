/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-frame pass orchestrator.
//!
//! [`FrameGraph`] is a thin layer over [`dag_scheduler::DagScheduler`],
//! [`scope_alloc::ScopeAllocator`], and [`task_scheduler::TaskScheduler`]:
//! subsystems call [`add_pass`](FrameGraph::add_pass) with a name, a `setup`
//! closure (declares reads/writes/labels through a [`Builder`]), and an
//! `execute` closure (the work); the caller then drives `compile` and
//! `execute` once per frame.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | Pass names | `&'static str` rather than an arbitrary borrowed `&str` tied to a frame lifetime — nearly every real call site names a pass with a string literal, and a `'static` bound avoids threading a lifetime parameter through `FrameGraph` itself for a case that rarely occurs in practice |
//! | Execute closures | bounded by `FnMut() + Send + 'static` rather than `FnOnce`, so the closure can be invoked through a `&mut` reference into the arena without moving it out — the arena's own destructor chain (not the invocation) owns the single drop |
//! | State machine | `enum State { Idle, Setup, Ready }`, checked with `assert!` at each entry point per §9's "hard assertion" guidance for programmer errors |

mod builder;
mod keys;

use dag_scheduler::{DagScheduler, NodeIndex};
use framesched_errors::ErrorKind;
use scope_alloc::ScopeAllocator;
use task_scheduler::TaskScheduler;
use tracing::error;

pub use builder::Builder;
pub use keys::{label_key, type_key};

/// Construction-time sizing for a [`FrameGraph`]'s backing [`ScopeAllocator`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Bytes reserved for per-frame pass closures.
    pub scope_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope_capacity: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Setup,
    Ready,
}

struct PassSlot {
    name: &'static str,
    thunk: unsafe fn(*mut ()),
    user_data: *mut (),
}

/// Wraps a raw pointer so it can cross into a dispatched closure. Sound
/// because the pointee lives in the `FrameGraph`'s `ScopeAllocator`, which
/// is not reset until after `execute` returns and every dispatched closure
/// has completed (enforced by the layer barrier).
struct SendPtr(*mut ());
unsafe impl Send for SendPtr {}

/// Per-frame pass orchestrator: `reset` → `add_pass`* → `compile` →
/// `execute`, cycling through `Idle → Setup → Ready → Idle`.
pub struct FrameGraph {
    dag: DagScheduler,
    scope: ScopeAllocator,
    passes: Vec<PassSlot>,
    active_pass_count: usize,
    state: State,
}

impl FrameGraph {
    pub fn new(config: Config) -> Self {
        Self {
            dag: DagScheduler::new(),
            scope: ScopeAllocator::new(config.scope_capacity),
            passes: Vec::new(),
            active_pass_count: 0,
            state: State::Idle,
        }
    }

    /// Clear the pass pool's active region and delegate `reset` to the DAG
    /// scheduler. The Scope Allocator is **not** reset here — that remains
    /// the caller's responsibility via [`scope_allocator_mut`](Self::scope_allocator_mut),
    /// since its teardown must run after `execute`'s callbacks have all
    /// returned, which this call has no way to guarantee on its own.
    pub fn reset(&mut self) {
        assert_eq!(
            self.state,
            State::Idle,
            "FrameGraph::reset called outside Idle state"
        );
        self.dag.reset();
        self.active_pass_count = 0;
        self.state = State::Setup;
    }

    /// Direct access to the backing arena, so the caller can `reset` it at
    /// the appropriate point in the frame (after `execute` returns, before
    /// the next frame's `reset`).
    pub fn scope_allocator_mut(&mut self) -> &mut ScopeAllocator {
        &mut self.scope
    }

    /// Register a pass: allocate its execute closure into the arena, run
    /// `setup` synchronously (declaring reads/writes/labels), and record it
    /// for later execution.
    ///
    /// If the arena is out of capacity, the pass is logged and dropped —
    /// the frame continues with one fewer pass, per the resource-exhaustion
    /// policy.
    pub fn add_pass<S, F>(&mut self, name: &'static str, setup: S, execute: F)
    where
        S: FnOnce(&mut Builder<'_>),
        F: FnMut() + Send + 'static,
    {
        assert_eq!(
            self.state,
            State::Setup,
            "FrameGraph::add_pass called outside Setup state"
        );

        let user_data = match self.scope.new_value(execute) {
            Ok(ptr) => ptr as *mut (),
            Err(err) => {
                error!(pass = name, error = %err, "closure allocation failed; pass dropped");
                return;
            }
        };

        let node = self.dag.add_node();
        let mut builder = Builder {
            dag: &mut self.dag,
            node,
        };
        setup(&mut builder);

        let slot = PassSlot {
            name,
            thunk: invoke::<F> as unsafe fn(*mut ()),
            user_data,
        };
        let index = node.index();
        if index < self.passes.len() {
            self.passes[index] = slot;
        } else {
            self.passes.push(slot);
        }
        self.active_pass_count = index + 1;
    }

    /// Compile the declared passes into execution layers. On success the
    /// graph moves to `Ready`; on a cycle it returns to `Idle` directly and
    /// `execute` is disallowed for this frame.
    pub fn compile(&mut self) -> Result<(), ErrorKind> {
        assert_eq!(
            self.state,
            State::Setup,
            "FrameGraph::compile called outside Setup state"
        );
        match self.dag.compile() {
            Ok(()) => {
                self.state = State::Ready;
                Ok(())
            }
            Err(err) => {
                self.state = State::Idle;
                Err(err)
            }
        }
    }

    /// Run every layer in order on `scheduler`. A single-pass layer runs
    /// inline on the calling thread; a multi-pass layer is dispatched and
    /// the calling thread blocks on `wait_for_all` before the next layer.
    pub fn execute(&mut self, scheduler: &TaskScheduler) {
        assert_eq!(
            self.state,
            State::Ready,
            "FrameGraph::execute called outside Ready state"
        );

        for layer in self.dag.execution_layers() {
            if layer.len() == 1 {
                let slot = &self.passes[layer[0].index()];
                // SAFETY: `user_data` was produced by `ScopeAllocator::new_value::<F>`
                // for the same `F` that `invoke::<F>` was monomorphized over,
                // and the arena has not been reset since.
                unsafe { (slot.thunk)(slot.user_data) };
            } else {
                for &idx in layer {
                    let slot = &self.passes[idx.index()];
                    let thunk = slot.thunk;
                    let data = SendPtr(slot.user_data);
                    scheduler.dispatch(move || unsafe { thunk(data.0) });
                }
                scheduler.wait_for_all();
            }
        }

        self.state = State::Idle;
    }

    pub fn pass_count(&self) -> usize {
        self.active_pass_count
    }

    pub fn pass_name(&self, i: usize) -> Option<&'static str> {
        if i < self.active_pass_count {
            self.passes.get(i).map(|p| p.name)
        } else {
            None
        }
    }

    pub fn execution_layers(&self) -> &[Vec<NodeIndex>] {
        self.dag.execution_layers()
    }
}

/// Call through a `&mut F` rather than moving the closure out of the arena,
/// so the arena's own destructor chain remains the single owner of `F`'s
/// drop.
unsafe fn invoke<F: FnMut()>(data: *mut ()) {
    let f = &mut *(data as *mut F);
    f();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn graph() -> FrameGraph {
        FrameGraph::new(Config::default())
    }

    fn scheduler() -> TaskScheduler {
        let s = TaskScheduler::new();
        s.initialize(Some(4));
        s
    }

    #[test]
    fn zero_passes_compiles_and_executes_as_a_no_op() {
        let mut g = graph();
        g.reset();
        g.compile().unwrap();
        assert!(g.execution_layers().is_empty());
        let sched = scheduler();
        g.execute(&sched);
        assert_eq!(g.pass_count(), 0);
    }

    #[test]
    fn single_pass_runs_on_the_calling_thread() {
        let mut g = graph();
        g.reset();

        let seen_same_thread = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&seen_same_thread);
        let caller_thread = std::thread::current().id();

        g.add_pass(
            "OnlyPass",
            |_b| {},
            move || {
                *seen.lock().unwrap() = std::thread::current().id() == caller_thread;
            },
        );

        g.compile().unwrap();
        let sched = scheduler();
        g.execute(&sched);

        assert!(*seen_same_thread.lock().unwrap());
    }

    #[test]
    fn pure_chain_scenario_runs_each_pass_exactly_once() {
        let mut g = graph();
        g.reset();

        let counts: Arc<[AtomicU32; 3]> =
            Arc::new([AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)]);

        struct Marker;

        {
            let counts = Arc::clone(&counts);
            g.add_pass(
                "A",
                |b| b.write::<Marker>(),
                move || {
                    counts[0].fetch_add(1, Ordering::SeqCst);
                },
            );
        }
        {
            let counts = Arc::clone(&counts);
            g.add_pass(
                "B",
                |b| b.read::<Marker>(),
                move || {
                    counts[1].fetch_add(1, Ordering::SeqCst);
                },
            );
        }
        {
            let counts = Arc::clone(&counts);
            g.add_pass(
                "C",
                |b| b.write::<Marker>(),
                move || {
                    counts[2].fetch_add(1, Ordering::SeqCst);
                },
            );
        }

        g.compile().unwrap();
        assert_eq!(g.execution_layers().len(), 3);

        let sched = scheduler();
        g.execute(&sched);

        for c in counts.iter() {
            assert_eq!(c.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn fan_out_fan_in_scenario() {
        let mut g = graph();
        g.reset();

        struct Marker;
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        g.add_pass("Root", |b| b.write::<Marker>(), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("Root")
        });
        g.add_pass("L1", |b| b.read::<Marker>(), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("L1")
        });
        g.add_pass("L2", |b| b.read::<Marker>(), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("L2")
        });
        g.add_pass("Join", |b| b.write::<Marker>(), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("Join")
        });

        g.compile().unwrap();
        assert_eq!(g.execution_layers().len(), 3);

        let sched = scheduler();
        g.execute(&sched);

        let order = order.lock().unwrap();
        assert_eq!(order[0], "Root");
        assert_eq!(order[3], "Join");
        assert!(order[1..3].contains(&"L1"));
        assert!(order[1..3].contains(&"L2"));
    }

    // Cycle detection itself (InvalidState on a genuinely cyclic graph) is
    // exercised in `dag-scheduler`'s tests via `add_edge`, which is not part
    // of the Builder API `FrameGraph` exposes — every edge a pass can
    // declare through `read`/`write`/`wait_for`/`signal` points from an
    // earlier-added node to the current one, so a `FrameGraph` built only
    // through its public contract can never produce a cycle.

    #[test]
    fn multi_frame_reuse_retains_pass_pool_and_reports_current_count() {
        let mut g = graph();
        let sched = scheduler();

        g.reset();
        for i in 0..20 {
            let name: &'static str = Box::leak(format!("pass-{i}").into_boxed_str());
            g.add_pass(name, |_b| {}, || {});
        }
        g.compile().unwrap();
        g.execute(&sched);
        g.scope_allocator_mut().reset().unwrap();

        g.reset();
        for i in 0..5 {
            let name: &'static str = Box::leak(format!("pass-{i}").into_boxed_str());
            g.add_pass(name, |_b| {}, || {});
        }
        g.compile().unwrap();
        g.execute(&sched);

        assert_eq!(g.pass_count(), 5);
    }

    #[test]
    fn label_ordering_scenario() {
        let mut g = graph();
        g.reset();

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        g.add_pass("P1", |b| b.signal("GpuReady"), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("P1")
        });
        g.add_pass("P2", |b| b.wait_for("GpuReady"), {
            let order = Arc::clone(&order);
            move || order.lock().unwrap().push("P2")
        });

        g.compile().unwrap();
        let layers = g.execution_layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].len(), 1);
        assert_eq!(layers[1].len(), 1);

        let sched = scheduler();
        g.execute(&sched);
        assert_eq!(*order.lock().unwrap(), vec!["P1", "P2"]);
    }
}
