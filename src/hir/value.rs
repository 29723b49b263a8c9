//! SSA value graph (component I): the per-method value/block structure a
//! `Translator` (J) populates and the HIR→LIR factory (part of K) lowers.

use super::TypeRef;
use crate::zone::{zone_handle, Zone};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HirOpcode {
    Param,
    ConstInt(i64),
    ConstFloat(u64), // bit pattern, so the opcode stays Eq+Hash
    BinAdd,
    BinSub,
    BinMul,
    BinDiv,
    Phi,
    Call,
    Load,
    Store,
    Branch,
    Jump,
    Return,
}

zone_handle! { pub struct HirBlockId(HirBlock); }
zone_handle! { pub struct HirValueId(HirValue); }

pub struct HirValue {
    pub opcode: HirOpcode,
    pub operands: Vec<HirValueId>,
    pub ty: TypeRef,
    pub block: HirBlockId,
}

#[derive(Default)]
pub struct HirBlock {
    pub predecessors: Vec<HirBlockId>,
    pub successors: Vec<HirBlockId>,
    pub phis: Vec<HirValueId>,
    pub body: Vec<HirValueId>,
}

/// One translated method body: ordered basic blocks of SSA value nodes.
pub struct Function {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub return_ty: TypeRef,
    pub blocks: Zone<HirBlock>,
    pub values: Zone<HirValue>,
    pub entry: Option<HirBlockId>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<TypeRef>, return_ty: TypeRef) -> Self {
        Function {
            name: name.into(),
            params,
            return_ty,
            blocks: Zone::new(),
            values: Zone::new(),
            entry: None,
        }
    }

    pub fn append_block(&mut self) -> HirBlockId {
        HirBlockId(self.blocks.alloc(HirBlock::default()))
    }

    pub fn connect(&mut self, from: HirBlockId, to: HirBlockId) {
        self.blocks[from.0].successors.push(to);
        self.blocks[to.0].predecessors.push(from);
    }

    pub fn push_value(&mut self, block: HirBlockId, opcode: HirOpcode, operands: Vec<HirValueId>, ty: TypeRef) -> HirValueId {
        let id = HirValueId(self.values.alloc(HirValue { opcode, operands, ty, block }));
        if opcode == HirOpcode::Phi {
            self.blocks[block.0].phis.push(id);
        } else {
            self.blocks[block.0].body.push(id);
        }
        id
    }

    /// Checks the one contract this core relies on: every phi's operand
    /// count matches its block's predecessor count.
    pub fn verify(&self) -> Result<(), String> {
        for (block_id, block) in self.blocks.iter() {
            for &phi in &block.phis {
                let v = &self.values[phi.0];
                if v.operands.len() != block.predecessors.len() {
                    return Err(format!(
                        "phi in block {:?} has {} operands but block has {} predecessors",
                        block_id,
                        v.operands.len(),
                        block.predecessors.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_rejects_phi_arity_mismatch() {
        let mut f = Function::new("f", vec![], TypeRef::Int);
        let entry = f.append_block();
        let a = f.append_block();
        let merge = f.append_block();
        f.entry = Some(entry);
        f.connect(entry, merge);
        f.connect(a, merge);

        let p0 = f.push_value(entry, HirOpcode::ConstInt(1), vec![], TypeRef::Int);
        f.push_value(merge, HirOpcode::Phi, vec![p0], TypeRef::Int);

        let err = f.verify().unwrap_err();
        assert!(err.contains("1 operands but block has 2 predecessors"));
    }

    #[test]
    fn verify_accepts_matching_phi_arity() {
        let mut f = Function::new("f", vec![], TypeRef::Int);
        let entry = f.append_block();
        let a = f.append_block();
        let merge = f.append_block();
        f.entry = Some(entry);
        f.connect(entry, merge);
        f.connect(a, merge);

        let p0 = f.push_value(entry, HirOpcode::ConstInt(1), vec![], TypeRef::Int);
        let p1 = f.push_value(a, HirOpcode::ConstInt(2), vec![], TypeRef::Int);
        f.push_value(merge, HirOpcode::Phi, vec![p0, p1], TypeRef::Int);

        assert!(f.verify().is_ok());
    }
}
