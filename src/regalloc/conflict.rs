//! Conflict-map builder (component M): a disjoint-set union over virtual
//! registers recording which ones must not share a physical register.
//! Built from a reverse scan of each block, seeded by liveness (G).

use crate::analysis::liveness::{LivenessRecord, VariableTable};
use crate::dsu::DisjointSetUnion;
use crate::lir::{BlockId, Function, Value, ValueKind};
use crate::zone::ZoneMap;
use rustc_hash::FxHashSet as HashSet;

fn fold_into_one_class(dsu: &mut DisjointSetUnion<Value>, members: &[Value]) {
    if let Some(&first) = members.first() {
        for &m in &members[1..] {
            dsu.union(&first, &m);
        }
    }
}

/// Builds the conflict map for `f`. `vars`/`liveness` must be the same
/// numbering and records the liveness solver (G) produced for `f`.
pub fn build(
    f: &Function,
    vars: &VariableTable<Value>,
    liveness: &ZoneMap<BlockId, LivenessRecord>,
) -> DisjointSetUnion<Value> {
    let mut dsu = DisjointSetUnion::new();

    for block in f.blocks().nodes() {
        let record = liveness
            .get(&block)
            .expect("liveness must have a record for every block");

        let live_out: Vec<Value> = record.out_set.iter().map(|idx| *vars.variable_at(idx)).collect();
        fold_into_one_class(&mut dsu, &live_out);
        let mut live: HashSet<Value> = live_out.into_iter().collect();

        for &instr_id in f.body_of(block).iter().rev() {
            let instr = f.instruction(instr_id);
            for &output in &instr.outputs {
                if output.kind() == ValueKind::VirtualRegister {
                    live.remove(&output);
                }
            }
            for &input in &instr.inputs {
                if input.kind() == ValueKind::VirtualRegister {
                    for &other in &live {
                        dsu.union(&input, &other);
                    }
                    live.insert(input);
                }
            }
        }

        let live_in: Vec<Value> = record.in_set.iter().map(|idx| *vars.variable_at(idx)).collect();
        fold_into_one_class(&mut dsu, &live_in);

        let phi_outputs: Vec<Value> = f
            .phis_of(block)
            .iter()
            .map(|&id| f.instruction(id).outputs[0])
            .collect();
        for &out in &phi_outputs {
            for &member in &live_in {
                dsu.union(&out, &member);
            }
            for &other in &phi_outputs {
                dsu.union(&out, &other);
            }
        }
    }

    dsu
}

pub fn is_conflict(dsu: &mut DisjointSetUnion<Value>, a: Value, b: Value) -> bool {
    dsu.in_same_set(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::Bitset;
    use crate::lir::{Opcode, ValueSize, ValueType};

    #[test]
    fn simultaneously_live_registers_conflict() {
        let mut f = Function::new("f");
        let b0 = f.append_block();
        f.set_entry(b0);
        f.set_exit(b0);
        let r0 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let r1 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let r2 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        {
            let mut ed = f.editor(b0);
            ed.append(Opcode::Lit, vec![r0], vec![Value::immediate(ValueType::Int, ValueSize::S32, 1)]);
            ed.append(Opcode::Lit, vec![r1], vec![Value::immediate(ValueType::Int, ValueSize::S32, 2)]);
            ed.append(Opcode::Add, vec![r2], vec![r0, r1]);
            ed.append(Opcode::Exit, vec![], vec![r2]);
        }

        let mut vars: VariableTable<Value> = VariableTable::new();
        vars.index_of(r0);
        vars.index_of(r1);
        vars.index_of(r2);
        let v = vars.len();

        // r0 and r1 are both live across the Add; LiveOut/LiveIn are empty
        // at function scope for this smoke test.
        let mut kill = crate::zone::ZoneMap::new();
        kill.insert(b0, Bitset::new(v));
        let in_initial = crate::zone::ZoneMap::new();
        let liveness = crate::analysis::liveness::solve(f.blocks(), v, &kill, &in_initial);

        let mut dsu = build(&f, &vars, &liveness);
        // r0 and r1 are both inputs to Add while the other is still live,
        // so they must end up in the same conflict class.
        assert!(is_conflict(&mut dsu, r0, r1));
    }
}
