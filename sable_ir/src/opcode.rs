//! Opcode definitions for graph nodes.
//!
//! Opcodes are namespaced: [`GenericOp`] covers what the front end emits
//! and is architecture independent, [`X64Op`] is target specific and
//! terminal for the selection pass. The two-level [`Opcode`] tag replaces
//! the textual `"x64:"` prefix convention of the wire format, so the
//! "already lowered" check is a variant match instead of string probing.
//! `Display` still renders the textual grammar (`i64.load8_s`,
//! `x64:memory.bounds-check`) for logs and the graph printer.

use std::fmt;

/// Architecture-independent opcode, as produced by the front end.
///
/// Memory access opcodes span the full width/sign matrix of the source
/// language: 8/16/32/64-bit integer and floating loads/stores, each in
/// sign- or zero-extending (loads) and truncating (stores) variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericOp {
    // -- Constants --
    I32Const,
    I64Const,
    F32Const,
    F64Const,

    // -- Arithmetic (not touched by opcode selection) --
    I32Add,
    I64Add,
    F32Add,
    F64Add,

    // -- Boolean coercions --
    I32Bool,
    I64Bool,
    F32Bool,
    F64Bool,

    // -- Returns --
    RetVoid,
    I8Ret,
    I16Ret,
    I32Ret,
    I64Ret,
    F32Ret,
    F64Ret,

    // -- Integer loads/stores --
    I8Load,
    I8Store,
    I16Load,
    I16Store,
    I32Load,
    I32Store,
    I64Load,
    I64Store,
    I32Load8U,
    I32Load8S,
    I32Load16U,
    I32Load16S,
    I32Store8,
    I32Store16,
    I64Load8U,
    I64Load8S,
    I64Load16U,
    I64Load16S,
    I64Load32U,
    I64Load32S,
    I64Store8,
    I64Store16,
    I64Store32,

    // -- Floating loads/stores --
    F32Load,
    F32Store,
    F64Load,
    F64Store,

    // -- Vector loads/stores (SIMD front ends only) --
    V128Load,
    V128Store,

    // -- Address coercions --
    AddrFromI32,
    AddrFromI64,
}

impl GenericOp {
    /// Whether this is a boolean coercion opcode (`<type>.bool`).
    pub fn is_bool(self) -> bool {
        matches!(
            self,
            Self::I32Bool | Self::I64Bool | Self::F32Bool | Self::F64Bool
        )
    }

    /// Whether this is a function return opcode.
    pub fn is_ret(self) -> bool {
        matches!(
            self,
            Self::RetVoid
                | Self::I8Ret
                | Self::I16Ret
                | Self::I32Ret
                | Self::I64Ret
                | Self::F32Ret
                | Self::F64Ret
        )
    }

    /// Whether this opcode dereferences linear memory.
    pub fn is_memory_access(self) -> bool {
        self.is_load() || self.is_store()
    }

    /// Whether this is a linear-memory load.
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Self::I8Load
                | Self::I16Load
                | Self::I32Load
                | Self::I64Load
                | Self::I32Load8U
                | Self::I32Load8S
                | Self::I32Load16U
                | Self::I32Load16S
                | Self::I64Load8U
                | Self::I64Load8S
                | Self::I64Load16U
                | Self::I64Load16S
                | Self::I64Load32U
                | Self::I64Load32S
                | Self::F32Load
                | Self::F64Load
                | Self::V128Load
        )
    }

    /// Whether this is a linear-memory store.
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Self::I8Store
                | Self::I16Store
                | Self::I32Store
                | Self::I64Store
                | Self::I32Store8
                | Self::I32Store16
                | Self::I64Store8
                | Self::I64Store16
                | Self::I64Store32
                | Self::F32Store
                | Self::F64Store
                | Self::V128Store
        )
    }

    /// Whether this is an address coercion opcode (`addr.from_*`).
    pub fn is_addr_coercion(self) -> bool {
        matches!(self, Self::AddrFromI32 | Self::AddrFromI64)
    }

    /// Whether this is a constant opcode (carries its value as a literal).
    pub fn is_const(self) -> bool {
        matches!(
            self,
            Self::I32Const | Self::I64Const | Self::F32Const | Self::F64Const
        )
    }

    /// Whether this opcode's source value is floating point (`f32.*`/`f64.*`).
    pub fn is_float_sourced(self) -> bool {
        matches!(
            self,
            Self::F32Const
                | Self::F64Const
                | Self::F32Add
                | Self::F64Add
                | Self::F32Bool
                | Self::F64Bool
                | Self::F32Ret
                | Self::F64Ret
                | Self::F32Load
                | Self::F32Store
                | Self::F64Load
                | Self::F64Store
        )
    }
}

impl fmt::Display for GenericOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32Const => "i32.const",
            Self::I64Const => "i64.const",
            Self::F32Const => "f32.const",
            Self::F64Const => "f64.const",
            Self::I32Add => "i32.add",
            Self::I64Add => "i64.add",
            Self::F32Add => "f32.add",
            Self::F64Add => "f64.add",
            Self::I32Bool => "i32.bool",
            Self::I64Bool => "i64.bool",
            Self::F32Bool => "f32.bool",
            Self::F64Bool => "f64.bool",
            Self::RetVoid => "void.ret",
            Self::I8Ret => "i8.ret",
            Self::I16Ret => "i16.ret",
            Self::I32Ret => "i32.ret",
            Self::I64Ret => "i64.ret",
            Self::F32Ret => "f32.ret",
            Self::F64Ret => "f64.ret",
            Self::I8Load => "i8.load",
            Self::I8Store => "i8.store",
            Self::I16Load => "i16.load",
            Self::I16Store => "i16.store",
            Self::I32Load => "i32.load",
            Self::I32Store => "i32.store",
            Self::I64Load => "i64.load",
            Self::I64Store => "i64.store",
            Self::I32Load8U => "i32.load8_u",
            Self::I32Load8S => "i32.load8_s",
            Self::I32Load16U => "i32.load16_u",
            Self::I32Load16S => "i32.load16_s",
            Self::I32Store8 => "i32.store8",
            Self::I32Store16 => "i32.store16",
            Self::I64Load8U => "i64.load8_u",
            Self::I64Load8S => "i64.load8_s",
            Self::I64Load16U => "i64.load16_u",
            Self::I64Load16S => "i64.load16_s",
            Self::I64Load32U => "i64.load32_u",
            Self::I64Load32S => "i64.load32_s",
            Self::I64Store8 => "i64.store8",
            Self::I64Store16 => "i64.store16",
            Self::I64Store32 => "i64.store32",
            Self::F32Load => "f32.load",
            Self::F32Store => "f32.store",
            Self::F64Load => "f64.load",
            Self::F64Store => "f64.store",
            Self::V128Load => "v128.load",
            Self::V128Store => "v128.store",
            Self::AddrFromI32 => "addr.from_i32",
            Self::AddrFromI64 => "addr.from_i64",
        };
        f.write_str(name)
    }
}

/// x86-64 specific opcode. Nodes carrying one of these are terminal for
/// opcode selection and are never rewritten again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum X64Op {
    /// Base reference to linear memory. One per pass run.
    MemorySpace,
    /// Current bound of linear memory. One per pass run.
    MemorySize,
    /// Validate an address against the memory size before dereference.
    /// Inputs: [address, memory size]; literal: access width in bytes.
    BoundsCheck,

    /// Return through the integer register class.
    IntRet,
    /// Return through the floating point register class.
    FloatRet,

    // -- Canonical narrow accesses, shared between i32 and i64 sources --
    IntStore8,
    IntStore16,
    IntLoad8U,
    IntLoad8S,
    IntLoad16U,
    IntLoad16S,

    // -- Wide and direct accesses, kept under the x64 namespace --
    I8Load,
    I8Store,
    I16Load,
    I16Store,
    I32Load,
    I32Store,
    I64Load,
    I64Store,
    I64Load32U,
    I64Load32S,
    I64Store32,
    F32Load,
    F32Store,
    F64Load,
    F64Store,
}

impl X64Op {
    /// Whether this opcode dereferences linear memory.
    pub fn is_memory_access(self) -> bool {
        self.is_load() || self.is_store()
    }

    /// Whether this is a linear-memory load.
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Self::IntLoad8U
                | Self::IntLoad8S
                | Self::IntLoad16U
                | Self::IntLoad16S
                | Self::I8Load
                | Self::I16Load
                | Self::I32Load
                | Self::I64Load
                | Self::I64Load32U
                | Self::I64Load32S
                | Self::F32Load
                | Self::F64Load
        )
    }

    /// Whether this is a linear-memory store.
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Self::IntStore8
                | Self::IntStore16
                | Self::I8Store
                | Self::I16Store
                | Self::I32Store
                | Self::I64Store
                | Self::I64Store32
                | Self::F32Store
                | Self::F64Store
        )
    }
}

impl fmt::Display for X64Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MemorySpace => "memory.space",
            Self::MemorySize => "memory.size",
            Self::BoundsCheck => "memory.bounds-check",
            Self::IntRet => "int.ret",
            Self::FloatRet => "float.ret",
            Self::IntStore8 => "int.store8",
            Self::IntStore16 => "int.store16",
            Self::IntLoad8U => "int.load8_u",
            Self::IntLoad8S => "int.load8_s",
            Self::IntLoad16U => "int.load16_u",
            Self::IntLoad16S => "int.load16_s",
            Self::I8Load => "i8.load",
            Self::I8Store => "i8.store",
            Self::I16Load => "i16.load",
            Self::I16Store => "i16.store",
            Self::I32Load => "i32.load",
            Self::I32Store => "i32.store",
            Self::I64Load => "i64.load",
            Self::I64Store => "i64.store",
            Self::I64Load32U => "i64.load32_u",
            Self::I64Load32S => "i64.load32_s",
            Self::I64Store32 => "i64.store32",
            Self::F32Load => "f32.load",
            Self::F32Store => "f32.store",
            Self::F64Load => "f64.load",
            Self::F64Store => "f64.store",
        };
        write!(f, "x64:{name}")
    }
}

/// A node opcode: either still architecture independent, or already
/// lowered to the x64 namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Generic(GenericOp),
    X64(X64Op),
}

impl Opcode {
    /// Whether the opcode is already target specific.
    pub fn is_lowered(self) -> bool {
        matches!(self, Self::X64(_))
    }
}

impl From<GenericOp> for Opcode {
    fn from(op: GenericOp) -> Self {
        Self::Generic(op)
    }
}

impl From<X64Op> for Opcode {
    fn from(op: X64Op) -> Self {
        Self::X64(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(op) => op.fmt(f),
            Self::X64(op) => op.fmt(f),
        }
    }
}
