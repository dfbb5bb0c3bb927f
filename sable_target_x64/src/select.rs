//! Opcode selection: rewrite architecture-independent opcodes into their
//! x86-64 forms.
//!
//! Every linear-memory access is rebuilt against a per-pass pair of
//! singleton nodes (`x64:memory.space`, `x64:memory.size`) and guarded by
//! a synthesized `x64:memory.bounds-check` node carrying the access width
//! in bytes. The sandboxing guarantee of the memory model rests on this
//! rule: a lowered graph contains no dereference whose address is not
//! checked against the canonical memory size. Downstream stages define the
//! trap taken when a check fails; this pass only inserts the check.
//!
//! Nodes already carrying an [`X64Op`] are terminal and never rewritten
//! again, which is what makes the pass idempotent.

use std::fmt;

use log::{debug, trace};
use sable_ir::node::{Literal, NodeRef};
use sable_ir::opcode::{GenericOp, Opcode, X64Op};
use sable_ir::reducer::{ReduceCtx, Reduction};

/// Fatal selection failure.
///
/// There is exactly one failure mode: a load/store opcode the canonical
/// mapping table does not cover. Anything else either matches a rule and
/// is rewritten, or is left untouched for a later pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// A memory access opcode absent from the canonical x64 table.
    UnknownMemoryAccess(GenericOp),
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMemoryAccess(op) => {
                write!(f, "unknown memory access opcode: {op}")
            }
        }
    }
}

impl std::error::Error for SelectError {}

/// The two memory descriptor singletons shared by every lowered access.
#[derive(Debug, Clone, Copy)]
struct MemoryRefs {
    space: NodeRef,
    size: NodeRef,
}

/// x86-64 opcode selection pass.
///
/// One value per pass run; the memory descriptor handles are populated by
/// `start` and cleared by `end`, so independent compilation units can each
/// run their own instance.
#[derive(Debug, Default)]
pub struct SelectX64 {
    memory: Option<MemoryRefs>,
}

impl SelectX64 {
    pub fn new() -> Self {
        Self { memory: None }
    }

    fn memory(&self) -> MemoryRefs {
        self.memory.expect("selection pass not started")
    }

    fn reduce_bool(&mut self, node: NodeRef, op: GenericOp, cx: &mut ReduceCtx<'_>) {
        // Floating point sources need a compare against zero; that rewrite
        // lives with the float rules, not here.
        if op.is_float_sourced() {
            return;
        }

        // A 64-bit integer already satisfies the boolean representation.
        let input = cx.input(node, 0);
        trace!("bool n{} elided to n{}", node.index(), input.index());
        cx.replace(node, input);
    }

    fn reduce_ret(&mut self, node: NodeRef, op: GenericOp, cx: &mut ReduceCtx<'_>) {
        let lowered = match op {
            GenericOp::F32Ret | GenericOp::F64Ret => X64Op::FloatRet,
            _ => X64Op::IntRet,
        };
        cx.set_opcode(node, lowered);
        cx.change(node);
    }

    fn reduce_memory_access(
        &mut self,
        node: NodeRef,
        op: GenericOp,
        cx: &mut ReduceCtx<'_>,
    ) -> Result<(), SelectError> {
        let (lowered, bits) = classify_access(op)?;
        let bytes = bits / 8;
        let memory = self.memory();

        let addr = cx.input(node, 0);
        let access = cx.create(lowered, &[memory.space]);
        let check = cx.create(X64Op::BoundsCheck, &[addr, memory.size]);
        cx.add_literal(check, Literal::Bytes(bytes));
        cx.add(check);

        cx.add_input(access, check);
        for i in 1..cx.input_count(node) {
            let input = cx.input(node, i);
            cx.add_input(access, input);
        }

        debug!("lower {op} -> {lowered}, {bytes} byte check");
        cx.replace(node, access);
        Ok(())
    }

    fn reduce_addr_coercion(&mut self, node: NodeRef, op: GenericOp, cx: &mut ReduceCtx<'_>) {
        // An i64 already is an address on this target. The i32 form stays
        // behind for the extension rules.
        if op == GenericOp::AddrFromI64 {
            let input = cx.input(node, 0);
            cx.replace(node, input);
        }
    }
}

impl Reduction for SelectX64 {
    type Error = SelectError;

    fn start(&mut self, cx: &mut ReduceCtx<'_>) -> Result<(), SelectError> {
        let space = cx.create(X64Op::MemorySpace, &[]);
        let size = cx.create(X64Op::MemorySize, &[]);
        cx.add(space);
        cx.add(size);
        self.memory = Some(MemoryRefs { space, size });
        Ok(())
    }

    fn reduce(&mut self, node: NodeRef, cx: &mut ReduceCtx<'_>) -> Result<(), SelectError> {
        let op = match cx.opcode(node) {
            // Already lowered; terminal for this pass.
            Opcode::X64(_) => return Ok(()),
            Opcode::Generic(op) => op,
        };

        if op.is_bool() {
            self.reduce_bool(node, op, cx);
        } else if op.is_ret() {
            self.reduce_ret(node, op, cx);
        } else if op.is_memory_access() {
            self.reduce_memory_access(node, op, cx)?;
        } else if op.is_addr_coercion() {
            self.reduce_addr_coercion(node, op, cx);
        }
        Ok(())
    }

    fn end(&mut self) {
        self.memory = None;
    }
}

/// Map a generic load/store opcode to its canonical x64 form and access
/// width in bits.
///
/// Narrow integer accesses collapse into width/sign canonical forms shared
/// between the i32 and i64 variants; 32/64-bit and direct i8/i16 accesses
/// keep their shape under the x64 namespace. An access opcode outside this
/// table means the table is incomplete relative to what the front end can
/// emit, and lowering must abort rather than mis-lower a memory access.
fn classify_access(op: GenericOp) -> Result<(X64Op, u32), SelectError> {
    use GenericOp::*;

    let classified = match op {
        I32Store8 | I64Store8 => (X64Op::IntStore8, 8),
        I32Store16 | I64Store16 => (X64Op::IntStore16, 16),
        I32Load8U | I64Load8U => (X64Op::IntLoad8U, 8),
        I32Load8S | I64Load8S => (X64Op::IntLoad8S, 8),
        I32Load16U | I64Load16U => (X64Op::IntLoad16U, 16),
        I32Load16S | I64Load16S => (X64Op::IntLoad16S, 16),
        I64Load32U => (X64Op::I64Load32U, 32),
        I64Load32S => (X64Op::I64Load32S, 32),
        I64Store32 => (X64Op::I64Store32, 32),
        I32Load => (X64Op::I32Load, 32),
        I32Store => (X64Op::I32Store, 32),
        F32Load => (X64Op::F32Load, 32),
        F32Store => (X64Op::F32Store, 32),
        I64Load => (X64Op::I64Load, 64),
        I64Store => (X64Op::I64Store, 64),
        F64Load => (X64Op::F64Load, 64),
        F64Store => (X64Op::F64Store, 64),
        I16Load => (X64Op::I16Load, 16),
        I16Store => (X64Op::I16Store, 16),
        I8Load => (X64Op::I8Load, 8),
        I8Store => (X64Op::I8Store, 8),
        other => return Err(SelectError::UnknownMemoryAccess(other)),
    };
    Ok(classified)
}
