//! HIR → LIR factory (part of component K): constructs functions, basic
//! blocks, literals (Float32/64, Int32/64, String), and registers, assigning
//! stable virtual-register numbers. The translator that populates a
//! `hir::Function` is component J and external to this crate (see
//! `hir::translator`); lowering a verified one into LIR is this factory's
//! job.

use super::{Function as HirFunction, HirBlockId, HirOpcode, HirValueId, TypeRef};
use crate::lir::{BlockId, Function as LirFunction, Literal, Opcode, Value, ValueSize, ValueType};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

fn value_size_of(ty: &TypeRef) -> ValueSize {
    match ty {
        TypeRef::Bool => ValueSize::S8,
        _ => ValueSize::S64,
    }
}

fn value_type_of(ty: &TypeRef) -> ValueType {
    match ty {
        TypeRef::Float => ValueType::Float,
        _ => ValueType::Int,
    }
}

/// Lowers a translator-produced, already-`verify()`d `hir::Function` into
/// LIR. Panics if `hir_fn` was never verified, mirroring the editor's
/// "Commit failure is fatal" stance on internal-invariant breaks.
pub fn lower(hir_fn: &HirFunction) -> LirFunction {
    hir_fn.verify().expect("factory only lowers a well-formed SSA graph");

    let mut lir_fn = LirFunction::new(hir_fn.name.clone());
    let entry = hir_fn.entry.expect("a translated function always has an entry block");

    let order = reverse_postorder(hir_fn, entry);
    let mut block_of: HashMap<HirBlockId, BlockId> = HashMap::default();
    for &hb in &order {
        block_of.insert(hb, lir_fn.append_block());
    }
    for &hb in &order {
        let block = &hir_fn.blocks[hb.0];
        for &succ in &block.successors {
            lir_fn.connect(block_of[&hb], block_of[&succ]);
        }
    }
    lir_fn.set_entry(block_of[&entry]);

    let mut value_of: HashMap<HirValueId, Value> = HashMap::default();
    let mut param_index = 0u32;
    for &hb in &order {
        let block = &hir_fn.blocks[hb.0];
        for &v in block.phis.iter().chain(block.body.iter()) {
            let node = &hir_fn.values[v.0];
            let size = value_size_of(&node.ty);
            let ty = value_type_of(&node.ty);
            let value = if node.opcode == HirOpcode::Param {
                let p = Value::parameter(size, param_index);
                param_index += 1;
                lir_fn.params.push(p);
                p
            } else {
                lir_fn.fresh_virtual_register(ty, size)
            };
            value_of.insert(v, value);
        }
    }

    // Literals must be allocated before the block's edit lease is acquired
    // (both borrow `lir_fn` mutably), so resolve each ConstInt/ConstFloat's
    // operand value up front.
    let mut literal_input: HashMap<HirValueId, Value> = HashMap::default();
    for &hb in &order {
        for &v in hir_fn.blocks[hb.0].body.iter() {
            let node = &hir_fn.values[v.0];
            match node.opcode {
                HirOpcode::ConstInt(i) => {
                    let size = value_size_of(&node.ty);
                    let input = if (-(1i64 << 23)..(1i64 << 23)).contains(&i) {
                        Value::immediate(ValueType::Int, size, i as i32)
                    } else {
                        let lit = lir_fn.add_literal(Literal::Int64(i));
                        Value::literal(ValueType::Int, size, lit)
                    };
                    literal_input.insert(v, input);
                }
                HirOpcode::ConstFloat(bits) => {
                    let lit = lir_fn.add_literal(Literal::Float64(f64::from_bits(bits)));
                    literal_input.insert(v, Value::literal(ValueType::Float, ValueSize::S64, lit));
                }
                _ => {}
            }
        }
    }

    for &hb in &order {
        let lb = block_of[&hb];
        let block = &hir_fn.blocks[hb.0];
        let mut ed = lir_fn.editor(lb);
        for &v in &block.phis {
            let node = &hir_fn.values[v.0];
            let operands: Vec<Value> = node.operands.iter().map(|o| value_of[o]).collect();
            ed.append_phi(vec![value_of[&v]], operands);
        }
        for &v in &block.body {
            let node = &hir_fn.values[v.0];
            let out = value_of[&v];
            let inputs: Vec<Value> = node.operands.iter().map(|o| value_of[o]).collect();
            match node.opcode {
                HirOpcode::Param => {}
                HirOpcode::ConstInt(_) | HirOpcode::ConstFloat(_) => {
                    ed.append(Opcode::Lit, vec![out], vec![literal_input[&v]]);
                }
                HirOpcode::BinAdd => {
                    ed.append(Opcode::Add, vec![out], inputs);
                }
                HirOpcode::BinSub => {
                    ed.append(Opcode::Sub, vec![out], inputs);
                }
                HirOpcode::BinMul => {
                    ed.append(Opcode::Mul, vec![out], inputs);
                }
                HirOpcode::BinDiv => {
                    ed.append(Opcode::Div, vec![out], inputs);
                }
                HirOpcode::Call => {
                    ed.append(Opcode::Call, vec![out], inputs);
                }
                HirOpcode::Load => {
                    ed.append(Opcode::Load, vec![out], inputs);
                }
                HirOpcode::Store => {
                    ed.append(Opcode::Store, vec![], inputs);
                }
                HirOpcode::Branch => {
                    ed.append(Opcode::Branch, vec![], inputs);
                }
                HirOpcode::Jump => {
                    ed.append(Opcode::Jump, vec![], vec![]);
                }
                HirOpcode::Return => {
                    ed.append(Opcode::Ret, vec![], inputs);
                }
                HirOpcode::Phi => unreachable!("phis are emitted separately, ahead of body"),
            }
        }
    }

    lir_fn
}

fn reverse_postorder(f: &HirFunction, entry: HirBlockId) -> Vec<HirBlockId> {
    let mut order = Vec::new();
    let mut visited = HashSet::default();
    fn visit(f: &HirFunction, b: HirBlockId, visited: &mut HashSet<HirBlockId>, order: &mut Vec<HirBlockId>) {
        if !visited.insert(b) {
            return;
        }
        for &s in &f.blocks[b.0].successors {
            visit(f, s, visited, order);
        }
        order.push(b);
    }
    visit(f, entry, &mut visited, &mut order);
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::ValueKind;
    use pretty_assertions::assert_eq;

    /// Two int parameters, returns their sum.
    #[test]
    fn lowers_a_two_parameter_add_function() {
        let mut hir_fn = HirFunction::new("add", vec![TypeRef::Int, TypeRef::Int], TypeRef::Int);
        let entry = hir_fn.append_block();
        hir_fn.entry = Some(entry);

        let p0 = hir_fn.push_value(entry, HirOpcode::Param, vec![], TypeRef::Int);
        let p1 = hir_fn.push_value(entry, HirOpcode::Param, vec![], TypeRef::Int);
        let sum = hir_fn.push_value(entry, HirOpcode::BinAdd, vec![p0, p1], TypeRef::Int);
        hir_fn.push_value(entry, HirOpcode::Return, vec![sum], TypeRef::Void);

        let lir_fn = lower(&hir_fn);
        assert_eq!(lir_fn.params.len(), 2);
        assert!(lir_fn.params.iter().all(|p| p.kind() == ValueKind::Parameter));

        let entry_block = lir_fn.blocks().entry().unwrap();
        let ops: Vec<_> = lir_fn
            .body_of(entry_block)
            .iter()
            .map(|&id| lir_fn.instruction(id).opcode)
            .collect();
        assert_eq!(ops, vec![Opcode::Add, Opcode::Ret]);
    }
}
