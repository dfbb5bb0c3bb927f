//! Reduction driver: walks the graph and applies a [`Reduction`] until the
//! worklist drains.
//!
//! The driver owns traversal; reductions request mutations through
//! [`ReduceCtx`] (`add`, `replace`, `change`) so scheduling stays in sync
//! with graph mutation. Newly added nodes and replacements are visited;
//! termination is the reduction's responsibility (a reduction must reach a
//! fixpoint, e.g. by never rewriting an already-lowered node).

use std::collections::VecDeque;

use log::trace;

use crate::graph::Graph;
use crate::node::{Literal, NodeRef};
use crate::opcode::Opcode;

/// A single rewrite pass over the graph.
pub trait Reduction {
    /// Fatal error type; returning `Err` aborts the run.
    type Error;

    /// Pass setup, before the first node is visited.
    fn start(&mut self, _cx: &mut ReduceCtx<'_>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Visit one node.
    fn reduce(&mut self, node: NodeRef, cx: &mut ReduceCtx<'_>) -> Result<(), Self::Error>;

    /// Pass teardown, after the worklist drains.
    fn end(&mut self) {}
}

/// Mutation interface handed to reductions.
///
/// Wraps the graph together with the driver's worklist.
pub struct ReduceCtx<'g> {
    graph: &'g mut Graph,
    queue: VecDeque<NodeRef>,
    queued: Vec<bool>,
}

impl<'g> ReduceCtx<'g> {
    fn new(graph: &'g mut Graph) -> Self {
        let queued = vec![false; graph.len()];
        Self {
            graph,
            queue: VecDeque::new(),
            queued,
        }
    }

    fn enqueue(&mut self, r: NodeRef) {
        let i = r.index() as usize;
        if i >= self.queued.len() {
            self.queued.resize(self.graph.len(), false);
        }
        if !self.queued[i] {
            self.queued[i] = true;
            self.queue.push_back(r);
        }
    }

    /// Next node to visit, skipping nodes replaced while queued.
    fn pop(&mut self) -> Option<NodeRef> {
        while let Some(r) = self.queue.pop_front() {
            self.queued[r.index() as usize] = false;
            if !self.graph.is_replaced(r) {
                return Some(r);
            }
        }
        None
    }

    // --- construction ---

    /// Allocate a new, not-yet-scheduled node.
    pub fn create(&mut self, opcode: impl Into<Opcode>, inputs: &[NodeRef]) -> NodeRef {
        self.graph.create(opcode, inputs)
    }

    /// Append an input to `r`.
    pub fn add_input(&mut self, r: NodeRef, input: NodeRef) {
        self.graph.add_input(r, input);
    }

    /// Attach a literal to `r`.
    pub fn add_literal(&mut self, r: NodeRef, literal: Literal) {
        self.graph.add_literal(r, literal);
    }

    // --- read access ---

    /// The opcode of `r`.
    pub fn opcode(&self, r: NodeRef) -> Opcode {
        self.graph.opcode(r)
    }

    /// The `i`-th input of `r`, resolved through replacements.
    pub fn input(&self, r: NodeRef, i: usize) -> NodeRef {
        self.graph.input(r, i)
    }

    /// Number of inputs of `r`.
    pub fn input_count(&self, r: NodeRef) -> usize {
        self.graph.input_count(r)
    }

    // --- mutation primitives ---

    /// Rewrite the opcode of `r` in place. Pair with [`ReduceCtx::change`]
    /// so the driver re-validates the node.
    pub fn set_opcode(&mut self, r: NodeRef, opcode: impl Into<Opcode>) {
        self.graph.set_opcode(r, opcode);
    }

    /// Insert a newly created node into the traversal.
    pub fn add(&mut self, r: NodeRef) {
        trace!("add n{}", r.index());
        self.enqueue(r);
    }

    /// Redirect every consumer of `old` to `new`; `new` is scheduled for a
    /// visit of its own.
    pub fn replace(&mut self, old: NodeRef, new: NodeRef) {
        self.graph.replace(old, new);
        self.enqueue(new);
    }

    /// Note that `r` was mutated in place and schedule it for another visit.
    pub fn change(&mut self, r: NodeRef) {
        self.enqueue(r);
    }
}

/// Run `reduction` over `graph`.
///
/// Seeds the worklist with every node live at pass start, in creation
/// order, then drains it. `start` runs before the first visit; `end` runs
/// after the queue drains. On `Err` from `reduce` the run aborts
/// immediately and the error is propagated.
pub fn run<R: Reduction>(graph: &mut Graph, reduction: &mut R) -> Result<(), R::Error> {
    let mut cx = ReduceCtx::new(graph);
    reduction.start(&mut cx)?;

    for i in 0..cx.graph.len() as u32 {
        let r = NodeRef(i);
        if !cx.graph.is_replaced(r) {
            cx.enqueue(r);
        }
    }

    while let Some(r) = cx.pop() {
        trace!("visit n{} {}", r.index(), cx.graph.opcode(r));
        reduction.reduce(r, &mut cx)?;
    }

    reduction.end();
    Ok(())
}
