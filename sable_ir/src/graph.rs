//! Graph arena owning all nodes of one compilation unit.
//!
//! Substitution (`replace`) records a redirection in a forwarding table
//! instead of rewriting every use in place. Input accessors resolve
//! redirections on read, so no consumer can observe a replaced node, and
//! substitution stays O(1).

use log::trace;

use crate::node::{Literal, Node, NodeRef};
use crate::opcode::Opcode;

/// The node arena for one compilation unit.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    /// `forward[i] = Some(r)` means node `i` has been replaced by `r`.
    forward: Vec<Option<NodeRef>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new node with the given opcode and inputs.
    pub fn create(&mut self, opcode: impl Into<Opcode>, inputs: &[NodeRef]) -> NodeRef {
        let r = NodeRef(self.nodes.len() as u32);
        let mut node = Node::new(opcode.into());
        node.inputs.extend(inputs.iter().copied());
        trace!("create n{} = {}", r.index(), node.opcode);
        self.nodes.push(node);
        self.forward.push(None);
        r
    }

    /// Number of nodes ever allocated, replaced ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node. The node may be replaced; use the input accessors
    /// for reference-integrity-preserving reads.
    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.index() as usize]
    }

    /// Follow replacement redirections to the live node `r` stands for.
    pub fn resolve(&self, mut r: NodeRef) -> NodeRef {
        while let Some(next) = self.forward[r.index() as usize] {
            r = next;
        }
        r
    }

    /// Whether `r` has been replaced by another node.
    pub fn is_replaced(&self, r: NodeRef) -> bool {
        self.forward[r.index() as usize].is_some()
    }

    /// The opcode of `r`.
    pub fn opcode(&self, r: NodeRef) -> Opcode {
        self.nodes[r.index() as usize].opcode
    }

    /// Rewrite the opcode of `r` in place.
    pub fn set_opcode(&mut self, r: NodeRef, opcode: impl Into<Opcode>) {
        let opcode = opcode.into();
        let node = &mut self.nodes[r.index() as usize];
        trace!("change n{} {} -> {}", r.index(), node.opcode, opcode);
        node.opcode = opcode;
    }

    /// The `i`-th input of `r`, resolved through replacements.
    pub fn input(&self, r: NodeRef, i: usize) -> NodeRef {
        self.resolve(self.nodes[r.index() as usize].inputs[i])
    }

    /// Number of inputs of `r`.
    pub fn input_count(&self, r: NodeRef) -> usize {
        self.nodes[r.index() as usize].inputs.len()
    }

    /// All inputs of `r`, resolved through replacements.
    pub fn inputs(&self, r: NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
        self.nodes[r.index() as usize]
            .inputs
            .iter()
            .map(move |&input| self.resolve(input))
    }

    /// Append an input to `r`.
    pub fn add_input(&mut self, r: NodeRef, input: NodeRef) {
        self.nodes[r.index() as usize].inputs.push(input);
    }

    /// Attach a literal to `r`.
    pub fn add_literal(&mut self, r: NodeRef, literal: Literal) {
        self.nodes[r.index() as usize].literals.push(literal);
    }

    /// Attached literals of `r`.
    pub fn literals(&self, r: NodeRef) -> &[Literal] {
        &self.nodes[r.index() as usize].literals
    }

    /// Redirect every consumer of `old` to `new` and retire `old`.
    ///
    /// `old` must not already be replaced; redirections never form cycles.
    pub fn replace(&mut self, old: NodeRef, new: NodeRef) {
        debug_assert!(!self.is_replaced(old), "node replaced twice");
        let new = self.resolve(new);
        debug_assert_ne!(old, new, "node replaced by itself");
        trace!("replace n{} -> n{}", old.index(), new.index());
        self.forward[old.index() as usize] = Some(new);
    }

    /// Iterate live (non-replaced) nodes in creation order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.nodes.len() as u32)
            .map(NodeRef)
            .filter(move |&r| !self.is_replaced(r))
    }
}
