//! Text format for graphs.
//!
//! One line per live node, in creation order:
//! ```text
//! n0 = x64:memory.space
//! n2 = i64.const [57005]
//! n4 = x64:memory.bounds-check n2, n1 [8]
//! ```
//! Replaced nodes are omitted and inputs are printed fully resolved.

use std::fmt;

use crate::graph::Graph;
use crate::node::Literal;

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Bytes(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for r in self.live_nodes() {
            if !first {
                writeln!(f)?;
            }
            first = false;

            write!(f, "n{} = {}", r.index(), self.opcode(r))?;

            let inputs: Vec<String> = self
                .inputs(r)
                .map(|input| format!("n{}", input.index()))
                .collect();
            if !inputs.is_empty() {
                write!(f, " {}", inputs.join(", "))?;
            }

            let literals: Vec<String> = self.literals(r).iter().map(|l| l.to_string()).collect();
            if !literals.is_empty() {
                write!(f, " [{}]", literals.join(", "))?;
            }
        }
        Ok(())
    }
}
