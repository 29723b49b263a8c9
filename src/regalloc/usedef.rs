//! Use-def list (component N): one `Users` record per virtual register
//! holding every instruction that consumes it

use crate::lir::{Function, InstrId, Value, ValueKind};
use rustc_hash::FxHashMap as HashMap;

#[derive(Default, Clone)]
pub struct Users(Vec<InstrId>);

impl Users {
    pub fn as_slice(&self) -> &[InstrId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-virtual-register user lists for one function, built by scanning
/// every instruction once. Move semantics only: there is no incremental
/// update path, matching ("move semantics permitted").
pub struct UseDefLists {
    users: HashMap<Value, Users>,
}

impl UseDefLists {
    pub fn build(f: &Function) -> Self {
        let mut users: HashMap<Value, Users> = HashMap::default();
        for block in f.blocks().nodes() {
            for instr_id in f.instructions_of(block) {
                let instr = f.instruction(instr_id);
                for &input in &instr.inputs {
                    if input.kind() == ValueKind::VirtualRegister {
                        users.entry(input).or_default().0.push(instr_id);
                    }
                }
            }
        }
        UseDefLists { users }
    }

    pub fn users_of(&self, vreg: Value) -> &[InstrId] {
        self.users.get(&vreg).map(|u| u.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::{Opcode, ValueSize, ValueType};

    #[test]
    fn collects_every_use_across_blocks() {
        let mut f = Function::new("f");
        let b0 = f.append_block();
        let b1 = f.append_block();
        f.connect(b0, b1);

        let r0 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let r1 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        {
            let mut ed = f.editor(b0);
            ed.append(Opcode::Lit, vec![r0], vec![Value::immediate(ValueType::Int, ValueSize::S32, 1)]);
        }
        let (use_a, use_b);
        {
            let mut ed = f.editor(b1);
            use_a = ed.append(Opcode::Mov, vec![r1], vec![r0]);
            use_b = ed.append(Opcode::Use, vec![], vec![r0]);
        }

        let ud = UseDefLists::build(&f);
        assert_eq!(ud.users_of(r0), &[use_a, use_b]);
        assert!(ud.users_of(r1).is_empty());
    }
}
