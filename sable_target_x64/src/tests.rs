//! Tests for x86-64 opcode selection.

use num_bigint::BigInt;
use sable_ir::graph::Graph;
use sable_ir::node::{Literal, NodeRef};
use sable_ir::opcode::{GenericOp, Opcode, X64Op};
use sable_ir::reducer;

use crate::select::{SelectError, SelectX64};

fn lower(g: &mut Graph) -> Result<(), SelectError> {
    let mut pass = SelectX64::new();
    reducer::run(g, &mut pass)
}

fn iconst(g: &mut Graph, val: i64) -> NodeRef {
    let node = g.create(GenericOp::I64Const, &[]);
    g.add_literal(node, Literal::Int(BigInt::from(val)));
    node
}

fn find_all(g: &Graph, opcode: impl Into<Opcode>) -> Vec<NodeRef> {
    let opcode = opcode.into();
    g.live_nodes().filter(|&r| g.opcode(r) == opcode).collect()
}

/// The unique live node with the given opcode.
fn find_one(g: &Graph, opcode: impl Into<Opcode>) -> NodeRef {
    let opcode = opcode.into();
    let all = find_all(g, opcode);
    assert_eq!(all.len(), 1, "expected exactly one {opcode}");
    all[0]
}

// --- Returns ---

#[test]
fn ret_lowering_is_total() {
    let cases = [
        (GenericOp::RetVoid, X64Op::IntRet),
        (GenericOp::I8Ret, X64Op::IntRet),
        (GenericOp::I16Ret, X64Op::IntRet),
        (GenericOp::I32Ret, X64Op::IntRet),
        (GenericOp::I64Ret, X64Op::IntRet),
        (GenericOp::F32Ret, X64Op::FloatRet),
        (GenericOp::F64Ret, X64Op::FloatRet),
    ];

    for (generic, expected) in cases {
        let mut g = Graph::new();
        let val = iconst(&mut g, 1);
        let ret = if generic == GenericOp::RetVoid {
            g.create(generic, &[])
        } else {
            g.create(generic, &[val])
        };

        lower(&mut g).unwrap();

        assert_eq!(g.opcode(ret), Opcode::X64(expected), "{generic}");
        if generic != GenericOp::RetVoid {
            // In-place change keeps the operand list intact.
            assert_eq!(g.input(ret, 0), val);
        }
    }
}

// --- Boolean coercions ---

#[test]
fn int_bool_is_identity() {
    for generic in [GenericOp::I32Bool, GenericOp::I64Bool] {
        let mut g = Graph::new();
        let val = iconst(&mut g, 7);
        let cond = g.create(generic, &[val]);
        let ret = g.create(GenericOp::I64Ret, &[cond]);

        lower(&mut g).unwrap();

        assert!(g.is_replaced(cond), "{generic}");
        assert_eq!(g.input(ret, 0), val);
    }
}

#[test]
fn float_bool_is_left_untouched() {
    for (const_op, bool_op) in [
        (GenericOp::F32Const, GenericOp::F32Bool),
        (GenericOp::F64Const, GenericOp::F64Bool),
    ] {
        let mut g = Graph::new();
        let val = g.create(const_op, &[]);
        g.add_literal(val, Literal::Float(1.5));
        let cond = g.create(bool_op, &[val]);

        lower(&mut g).unwrap();

        assert_eq!(g.opcode(cond), Opcode::Generic(bool_op));
        assert_eq!(g.input(cond, 0), val);
    }
}

// --- Memory accesses ---

#[test]
fn load_lowering_table() {
    let cases = [
        (GenericOp::I8Load, X64Op::I8Load, 1),
        (GenericOp::I16Load, X64Op::I16Load, 2),
        (GenericOp::I32Load, X64Op::I32Load, 4),
        (GenericOp::I64Load, X64Op::I64Load, 8),
        (GenericOp::I32Load8U, X64Op::IntLoad8U, 1),
        (GenericOp::I32Load8S, X64Op::IntLoad8S, 1),
        (GenericOp::I32Load16U, X64Op::IntLoad16U, 2),
        (GenericOp::I32Load16S, X64Op::IntLoad16S, 2),
        (GenericOp::I64Load8U, X64Op::IntLoad8U, 1),
        (GenericOp::I64Load8S, X64Op::IntLoad8S, 1),
        (GenericOp::I64Load16U, X64Op::IntLoad16U, 2),
        (GenericOp::I64Load16S, X64Op::IntLoad16S, 2),
        (GenericOp::I64Load32U, X64Op::I64Load32U, 4),
        (GenericOp::I64Load32S, X64Op::I64Load32S, 4),
        (GenericOp::F32Load, X64Op::F32Load, 4),
        (GenericOp::F64Load, X64Op::F64Load, 8),
    ];

    for (generic, lowered, bytes) in cases {
        let mut g = Graph::new();
        let addr = iconst(&mut g, 64);
        let node = g.create(generic, &[addr]);

        lower(&mut g).unwrap();

        assert!(g.is_replaced(node), "{generic}");
        let access = find_one(&g, lowered);
        let space = find_one(&g, X64Op::MemorySpace);
        let size = find_one(&g, X64Op::MemorySize);
        let check = find_one(&g, X64Op::BoundsCheck);

        assert_eq!(g.input_count(access), 2, "{generic}");
        assert_eq!(g.input(access, 0), space, "{generic}");
        assert_eq!(g.input(access, 1), check, "{generic}");
        assert_eq!(g.input(check, 0), addr, "{generic}");
        assert_eq!(g.input(check, 1), size, "{generic}");
        assert_eq!(g.literals(check), &[Literal::Bytes(bytes)], "{generic}");
    }
}

#[test]
fn store_lowering_table() {
    let cases = [
        (GenericOp::I8Store, X64Op::I8Store, 1),
        (GenericOp::I16Store, X64Op::I16Store, 2),
        (GenericOp::I32Store, X64Op::I32Store, 4),
        (GenericOp::I64Store, X64Op::I64Store, 8),
        (GenericOp::I32Store8, X64Op::IntStore8, 1),
        (GenericOp::I64Store8, X64Op::IntStore8, 1),
        (GenericOp::I32Store16, X64Op::IntStore16, 2),
        (GenericOp::I64Store16, X64Op::IntStore16, 2),
        (GenericOp::I64Store32, X64Op::I64Store32, 4),
        (GenericOp::F32Store, X64Op::F32Store, 4),
        (GenericOp::F64Store, X64Op::F64Store, 8),
    ];

    for (generic, lowered, bytes) in cases {
        let mut g = Graph::new();
        let addr = iconst(&mut g, 64);
        let val = iconst(&mut g, 99);
        let node = g.create(generic, &[addr, val]);

        lower(&mut g).unwrap();

        assert!(g.is_replaced(node), "{generic}");
        let access = find_one(&g, lowered);
        let check = find_one(&g, X64Op::BoundsCheck);

        // Stored value follows the checked address, in original order.
        assert_eq!(g.input_count(access), 3, "{generic}");
        assert_eq!(g.input(access, 1), check, "{generic}");
        assert_eq!(g.input(access, 2), val, "{generic}");
        assert_eq!(g.literals(check), &[Literal::Bytes(bytes)], "{generic}");
    }
}

#[test]
fn narrow_load_sign_variants_share_canonical_forms() {
    for (i32_op, i64_op, lowered) in [
        (GenericOp::I32Load8S, GenericOp::I64Load8S, X64Op::IntLoad8S),
        (GenericOp::I32Load8U, GenericOp::I64Load8U, X64Op::IntLoad8U),
    ] {
        let mut g = Graph::new();
        let addr = iconst(&mut g, 0);
        let narrow32 = g.create(i32_op, &[addr]);
        let narrow64 = g.create(i64_op, &[addr]);

        lower(&mut g).unwrap();

        assert!(g.is_replaced(narrow32));
        assert!(g.is_replaced(narrow64));
        let accesses = find_all(&g, lowered);
        assert_eq!(accesses.len(), 2);
        for access in accesses {
            let check = g.input(access, 1);
            assert_eq!(g.literals(check), &[Literal::Bytes(1)]);
        }
    }
}

#[test]
fn unknown_memory_access_is_fatal() {
    let mut g = Graph::new();
    let addr = iconst(&mut g, 0);
    g.create(GenericOp::V128Load, &[addr]);

    let err = lower(&mut g).unwrap_err();
    assert_eq!(err, SelectError::UnknownMemoryAccess(GenericOp::V128Load));
    assert_eq!(err.to_string(), "unknown memory access opcode: v128.load");
}

// --- Singletons ---

#[test]
fn memory_descriptors_are_shared_singletons() {
    let mut g = Graph::new();
    let addr = iconst(&mut g, 8);
    let val = iconst(&mut g, 1);
    g.create(GenericOp::I64Store, &[addr, val]);
    g.create(GenericOp::I64Load, &[addr]);
    g.create(GenericOp::I32Load8S, &[addr]);

    lower(&mut g).unwrap();

    let space = find_one(&g, X64Op::MemorySpace);
    let size = find_one(&g, X64Op::MemorySize);

    let checks = find_all(&g, X64Op::BoundsCheck);
    assert_eq!(checks.len(), 3);
    for check in checks {
        assert_eq!(g.input(check, 1), size);
    }

    for access in g
        .live_nodes()
        .filter(|&r| matches!(g.opcode(r), Opcode::X64(op) if op.is_memory_access()))
    {
        assert_eq!(g.input(access, 0), space);
    }
}

// --- Address coercions ---

#[test]
fn addr_from_i64_elides_to_operand() {
    let mut g = Graph::new();
    let x = iconst(&mut g, 16);
    let addr = g.create(GenericOp::AddrFromI64, &[x]);
    g.create(GenericOp::I64Load, &[addr]);

    lower(&mut g).unwrap();

    assert!(g.is_replaced(addr));
    assert!(find_all(&g, GenericOp::AddrFromI64).is_empty());
    let check = find_one(&g, X64Op::BoundsCheck);
    assert_eq!(g.input(check, 0), x);
}

#[test]
fn addr_from_i32_is_left_untouched() {
    let mut g = Graph::new();
    let x = iconst(&mut g, 16);
    let addr = g.create(GenericOp::AddrFromI32, &[x]);

    lower(&mut g).unwrap();

    assert_eq!(g.opcode(addr), Opcode::Generic(GenericOp::AddrFromI32));
    assert_eq!(g.input(addr, 0), x);
}

// --- Dispatch fall-through ---

#[test]
fn unmatched_opcodes_are_left_for_later_passes() {
    let mut g = Graph::new();
    let a = iconst(&mut g, 1);
    let b = iconst(&mut g, 2);
    let sum = g.create(GenericOp::I64Add, &[a, b]);

    lower(&mut g).unwrap();

    assert_eq!(g.opcode(sum), Opcode::Generic(GenericOp::I64Add));
    assert_eq!(g.opcode(a), Opcode::Generic(GenericOp::I64Const));
}

// --- Idempotence ---

#[test]
fn lowered_nodes_are_terminal() {
    let mut g = Graph::new();
    let addr = iconst(&mut g, 0);
    let val = iconst(&mut g, 3);
    g.create(GenericOp::I64Store, &[addr, val]);
    g.create(GenericOp::I64Ret, &[val]);

    lower(&mut g).unwrap();

    let before: Vec<_> = g
        .live_nodes()
        .map(|r| {
            (
                r,
                g.opcode(r),
                g.inputs(r).collect::<Vec<_>>(),
                g.literals(r).to_vec(),
            )
        })
        .collect();
    let len_before = g.len();

    // A second run only contributes its own pair of memory descriptors;
    // every node lowered by the first run is left exactly as it was.
    lower(&mut g).unwrap();

    assert_eq!(g.len(), len_before + 2);
    for (r, opcode, inputs, literals) in before {
        assert!(!g.is_replaced(r));
        assert_eq!(g.opcode(r), opcode);
        assert_eq!(g.inputs(r).collect::<Vec<_>>(), inputs);
        assert_eq!(g.literals(r), &literals[..]);
    }
}

// --- Scenario: store/load round trip ---

#[test]
fn store_load_round_trip() {
    let mut g = Graph::new();
    let t = iconst(&mut g, 0);
    let v = iconst(&mut g, 0xdead);
    let store = g.create(GenericOp::I64Store, &[t, v]);
    let load = g.create(GenericOp::I64Load, &[t]);
    let ret = g.create(GenericOp::I64Ret, &[load]);

    lower(&mut g).unwrap();

    assert!(g.is_replaced(store));
    assert!(g.is_replaced(load));

    let store_access = find_one(&g, X64Op::I64Store);
    let load_access = find_one(&g, X64Op::I64Load);
    let size = find_one(&g, X64Op::MemorySize);

    // Two accesses, each behind its own check, both against the same
    // memory size and both 8 bytes wide.
    let store_check = g.input(store_access, 1);
    let load_check = g.input(load_access, 1);
    assert_ne!(store_check, load_check);
    for check in [store_check, load_check] {
        assert_eq!(g.opcode(check), Opcode::X64(X64Op::BoundsCheck));
        assert_eq!(g.input(check, 0), t);
        assert_eq!(g.input(check, 1), size);
        assert_eq!(g.literals(check), &[Literal::Bytes(8)]);
    }
    assert_eq!(g.input(store_access, 2), v);

    // The return's consumer edge was redirected to the lowered load.
    assert!(g.opcode(ret).is_lowered());
    assert_eq!(g.opcode(ret), Opcode::X64(X64Op::IntRet));
    assert_eq!(g.input(ret, 0), load_access);
}
