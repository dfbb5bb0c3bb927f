//! Graph verifier: structural integrity checks.
//!
//! Collects all errors rather than stopping at the first one. Checks the
//! shape invariants the lowered graph must satisfy: every memory access is
//! rooted at the memory-space singleton and guarded by a bounds check, and
//! every bounds check carries a byte-width literal and references the
//! memory-size singleton.

use std::fmt;

use crate::graph::Graph;
use crate::node::Literal;
use crate::opcode::{Opcode, X64Op};

/// A single verification error.
#[derive(Debug, Clone)]
pub struct VerifyError {
    /// Arena index of the offending node.
    pub node: u32,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[n{}] {}", self.node, self.message)
    }
}

/// Collected verification results.
#[derive(Debug, Default)]
pub struct VerifyResult {
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, node: u32, message: impl Into<String>) {
        self.errors.push(VerifyError {
            node,
            message: message.into(),
        });
    }
}

/// Check structural integrity of `graph`.
pub fn verify(graph: &Graph) -> VerifyResult {
    let mut result = VerifyResult::default();

    for r in graph.live_nodes() {
        let idx = r.index();
        match graph.opcode(r) {
            Opcode::X64(X64Op::MemorySpace) | Opcode::X64(X64Op::MemorySize) => {
                if graph.input_count(r) != 0 {
                    result.error(idx, "memory descriptor with inputs");
                }
            }

            Opcode::X64(X64Op::BoundsCheck) => {
                if graph.input_count(r) != 2 {
                    result.error(
                        idx,
                        format!("bounds check expects 2 inputs, has {}", graph.input_count(r)),
                    );
                    continue;
                }
                if graph.opcode(graph.input(r, 1)) != Opcode::X64(X64Op::MemorySize) {
                    result.error(idx, "bounds check not against x64:memory.size");
                }
                match graph.literals(r) {
                    [Literal::Bytes(_)] => {}
                    _ => result.error(idx, "bounds check without byte-width literal"),
                }
            }

            Opcode::X64(op) if op.is_memory_access() => {
                let expected = if op.is_store() { 3 } else { 2 };
                if graph.input_count(r) != expected {
                    result.error(
                        idx,
                        format!(
                            "{op} expects {expected} inputs, has {}",
                            graph.input_count(r)
                        ),
                    );
                    continue;
                }
                if graph.opcode(graph.input(r, 0)) != Opcode::X64(X64Op::MemorySpace) {
                    result.error(idx, "memory access not rooted at x64:memory.space");
                }
                if graph.opcode(graph.input(r, 1)) != Opcode::X64(X64Op::BoundsCheck) {
                    result.error(idx, "memory access address is not bounds checked");
                }
            }

            Opcode::Generic(op) if op.is_const() => {
                if graph.literals(r).len() != 1 {
                    result.error(idx, "constant without a value literal");
                }
            }

            _ => {}
        }
    }

    result
}
