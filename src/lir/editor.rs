//! Block edit lease (part of component K): scoped acquisition of a
//! basic-block edit lease with guaranteed release on all exit paths.
//! Entering edit mode records the block; dropping the lease runs the
//! validator; a failed validation is a programmer bug and aborts the
//! compilation rather than returning an error a caller could ignore.

use super::{BasicBlockData, BlockId, Function, InstrId, Instruction, Opcode, Value, ValueKind};

fn operands(values: Vec<Value>) -> super::OperandList {
    values.into()
}

pub struct BlockEditLease<'f> {
    function: &'f mut Function,
    block: BlockId,
}

impl<'f> BlockEditLease<'f> {
    pub(super) fn new(function: &'f mut Function, block: BlockId) -> Self {
        BlockEditLease { function, block }
    }

    fn block_data(&mut self) -> &mut BasicBlockData {
        self.function.blocks.node_mut(self.block)
    }

    pub fn append_phi(&mut self, outputs: Vec<Value>, inputs: Vec<Value>) -> InstrId {
        let position = self.block_data().phis.len();
        let block = self.block;
        let id = InstrId(self.function.instructions.alloc(Instruction {
            opcode: Opcode::Phi,
            outputs: operands(outputs),
            inputs: operands(inputs),
            block,
            position,
        }));
        self.block_data().phis.push(id);
        id
    }

    pub fn append(&mut self, opcode: Opcode, outputs: Vec<Value>, inputs: Vec<Value>) -> InstrId {
        debug_assert!(!opcode.is_phi(), "use append_phi for Phi instructions");
        let position = self.block_data().body.len();
        let block = self.block;
        let id = InstrId(self.function.instructions.alloc(Instruction {
            opcode,
            outputs: operands(outputs),
            inputs: operands(inputs),
            block,
            position,
        }));
        self.block_data().body.push(id);
        id
    }

    pub fn insert_before(
        &mut self,
        before: InstrId,
        opcode: Opcode,
        outputs: Vec<Value>,
        inputs: Vec<Value>,
    ) -> InstrId {
        let block = self.block;
        let id = InstrId(self.function.instructions.alloc(Instruction {
            opcode,
            outputs: operands(outputs),
            inputs: operands(inputs),
            block,
            position: 0,
        }));
        let body = &mut self.block_data().body;
        let pos = body
            .iter()
            .position(|&i| i == before)
            .expect("insert_before target must be in this block's body");
        body.insert(pos, id);
        self.renumber();
        id
    }

    pub fn remove(&mut self, id: InstrId) {
        let data = self.block_data();
        data.phis.retain(|&i| i != id);
        data.body.retain(|&i| i != id);
        self.renumber();
    }

    fn renumber(&mut self) {
        let (phis, body) = {
            let data = self.block_data();
            (data.phis.clone(), data.body.clone())
        };
        for (pos, id) in phis.into_iter().enumerate() {
            self.function.instructions[id.0].position = pos;
        }
        for (pos, id) in body.into_iter().enumerate() {
            self.function.instructions[id.0].position = pos;
        }
    }

    /// Runs the commit validator described in Called from
    /// `Drop`, not exposed directly: every exit path releases the lease.
    fn commit(&mut self) {
        let block = self.block;
        let pred_count = self.function.blocks.predecessors(block).len();
        let succ_count = self.function.blocks.successors(block).len();
        let is_exit = self.function.blocks.exit() == Some(block);

        for &phi in &self.function.blocks.node(block).phis.clone() {
            let instr = &self.function.instructions[phi.0];
            assert_eq!(
                instr.inputs.len(),
                pred_count,
                "phi operand count must equal the block's predecessor count"
            );
            assert_eq!(instr.outputs.len(), 1, "phi has exactly one output");
        }

        if is_exit {
            assert_eq!(succ_count, 0, "exit block must have no successors");
        }

        for &id in self.function.body_of(block) {
            let instr = &self.function.instructions[id.0];
            for v in instr.outputs.iter().chain(instr.inputs.iter()) {
                assert_ne!(
                    v.kind(),
                    ValueKind::Void,
                    "Void is not a legal operand outside phi padding"
                );
            }
        }
    }
}

impl<'f> Drop for BlockEditLease<'f> {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Function, Opcode, Value, ValueSize, ValueType};

    #[test]
    fn phi_arity_matches_predecessor_count() {
        let mut f = Function::new("f");
        let entry = f.append_block();
        let a = f.append_block();
        let b = f.append_block();
        let merge = f.append_block();
        f.connect(entry, a);
        f.connect(entry, b);
        f.connect(a, merge);
        f.connect(b, merge);

        let vreg = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        {
            let mut ed = f.editor(merge);
            ed.append_phi(vec![vreg], vec![vreg, vreg]);
        }
    }

    #[test]
    #[should_panic]
    fn phi_arity_mismatch_panics_on_commit() {
        let mut f = Function::new("f");
        let entry = f.append_block();
        let a = f.append_block();
        let b = f.append_block();
        let merge = f.append_block();
        f.connect(entry, a);
        f.connect(entry, b);
        f.connect(a, merge);
        f.connect(b, merge);

        let vreg = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let mut ed = f.editor(merge);
        ed.append_phi(vec![vreg], vec![vreg]); // only one input, two preds
    }

    #[test]
    fn append_and_remove_renumbers_positions() {
        let mut f = Function::new("f");
        let b = f.append_block();
        let r0 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let r1 = f.fresh_virtual_register(ValueType::Int, ValueSize::S64);
        let (i0, i1) = {
            let mut ed = f.editor(b);
            let i0 = ed.append(Opcode::Lit, vec![r0], vec![Value::immediate(ValueType::Int, ValueSize::S32, 1)]);
            let i1 = ed.append(Opcode::Lit, vec![r1], vec![Value::immediate(ValueType::Int, ValueSize::S32, 2)]);
            (i0, i1)
        };
        {
            let mut ed = f.editor(b);
            ed.remove(i0);
        }
        assert_eq!(f.body_of(b), &[i1]);
        assert_eq!(f.instruction(i1).position, 0);
    }
}
