//! LIR (component K): packed `Value`, zone-owned `Literal`s, `Instruction`,
//! `BasicBlock` and `Function`. A `Function` is a
//! `graph::Graph<BasicBlockData>` (component C) so every CFG analysis in
//! `analysis` runs over it unmodified — the same "build the generic graph
//! once, specialize the node payload" move `core_lang`'s own
//! `control_flow_analysis` makes over its `ControlFlowGraph`.

pub mod critical_edge;
pub mod editor;

use crate::graph::{Graph, NodeId};
use crate::zone::{zone_handle, Zone};
use smallvec::SmallVec;

pub type BlockId = NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int = 0,
    Float = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueSize {
    S8 = 0,
    S16 = 1,
    S32 = 2,
    S64 = 3,
}

impl ValueSize {
    pub fn bits(self) -> u32 {
        match self {
            ValueSize::S8 => 8,
            ValueSize::S16 => 16,
            ValueSize::S32 => 32,
            ValueSize::S64 => 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void = 0,
    Immediate = 1,
    Literal = 2,
    Parameter = 3,
    PhysicalRegister = 4,
    VirtualRegister = 5,
    PseudoRegister = 6,
    Argument = 7,
    StackSlot = 8,
    Instruction = 9,
}

const TYPE_SHIFT: u32 = 31;
const SIZE_SHIFT: u32 = 28;
const KIND_SHIFT: u32 = 24;
const PAYLOAD_BITS: u32 = 24;
const PAYLOAD_MASK: u32 = (1 << PAYLOAD_BITS) - 1;
const PAYLOAD_MIN: i32 = -(1 << (PAYLOAD_BITS - 1));
const PAYLOAD_MAX: i32 = (1 << (PAYLOAD_BITS - 1)) - 1;

/// 32-bit tagged union: 1 bit type, 3 bits size, 4 bits kind, 24 bits
/// payload. Equality and hashing compare the raw bit
/// pattern, so two values differing only in an irrelevant field are
/// unequal, matching its "equality is by all four fields".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(u32);

impl Value {
    fn pack(ty: ValueType, size: ValueSize, kind: ValueKind, payload: i32) -> Self {
        assert!(
            (PAYLOAD_MIN..=PAYLOAD_MAX).contains(&payload),
            "LIR value payload {payload} out of 24-bit range; use a Literal instead"
        );
        let bits = ((ty as u32) << TYPE_SHIFT)
            | ((size as u32) << SIZE_SHIFT)
            | ((kind as u32) << KIND_SHIFT)
            | (payload as u32 & PAYLOAD_MASK);
        Value(bits)
    }

    pub fn void() -> Self {
        Value::pack(ValueType::Int, ValueSize::S64, ValueKind::Void, 0)
    }

    pub fn immediate(ty: ValueType, size: ValueSize, v: i32) -> Self {
        Value::pack(ty, size, ValueKind::Immediate, v)
    }

    pub fn literal(ty: ValueType, size: ValueSize, id: LiteralId) -> Self {
        Value::pack(ty, size, ValueKind::Literal, id.raw_index())
    }

    pub fn parameter(size: ValueSize, index: u32) -> Self {
        Value::pack(ValueType::Int, size, ValueKind::Parameter, index as i32)
    }

    pub fn physical_register(ty: ValueType, size: ValueSize, index: u32) -> Self {
        Value::pack(ty, size, ValueKind::PhysicalRegister, index as i32)
    }

    pub fn virtual_register(ty: ValueType, size: ValueSize, number: u32) -> Self {
        Value::pack(ty, size, ValueKind::VirtualRegister, number as i32)
    }

    pub fn pseudo_register(flags: i32) -> Self {
        Value::pack(ValueType::Int, ValueSize::S64, ValueKind::PseudoRegister, flags)
    }

    pub fn argument(slot: u32) -> Self {
        Value::pack(ValueType::Int, ValueSize::S64, ValueKind::Argument, slot as i32)
    }

    pub fn stack_slot(index: u32) -> Self {
        Value::pack(ValueType::Int, ValueSize::S64, ValueKind::StackSlot, index as i32)
    }

    /// References an instruction by a block-local sequence number, used as a
    /// liveness/use-def anchor for instructions with no virtual-register
    /// output (e.g. `Use`, `Store`). Not a stable cross-block handle.
    pub fn instruction_ref(local_seq: u32) -> Self {
        Value::pack(ValueType::Int, ValueSize::S64, ValueKind::Instruction, local_seq as i32)
    }

    pub fn ty(&self) -> ValueType {
        if (self.0 >> TYPE_SHIFT) & 1 == 1 {
            ValueType::Float
        } else {
            ValueType::Int
        }
    }

    pub fn size(&self) -> ValueSize {
        match (self.0 >> SIZE_SHIFT) & 0b111 {
            0 => ValueSize::S8,
            1 => ValueSize::S16,
            2 => ValueSize::S32,
            _ => ValueSize::S64,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match (self.0 >> KIND_SHIFT) & 0b1111 {
            0 => ValueKind::Void,
            1 => ValueKind::Immediate,
            2 => ValueKind::Literal,
            3 => ValueKind::Parameter,
            4 => ValueKind::PhysicalRegister,
            5 => ValueKind::VirtualRegister,
            6 => ValueKind::PseudoRegister,
            7 => ValueKind::Argument,
            8 => ValueKind::StackSlot,
            9 => ValueKind::Instruction,
            other => unreachable!("value kind nibble {other} has no assigned meaning"),
        }
    }

    /// Sign-extends the 24-bit payload field back to an `i32`.
    pub fn payload(&self) -> i32 {
        let raw = self.0 & PAYLOAD_MASK;
        ((raw << 8) as i32) >> 8
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.ty())
            .field("size", &self.size())
            .field("kind", &self.kind())
            .field("payload", &self.payload())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum Literal {
    Float32(f32),
    Float64(f64),
    Int32(i32),
    Int64(i64),
    /// UTF-16 payload: the codegen builder's `SetString` embeds a pointer to
    /// this data, materialized in the data pool at install time.
    Str(String),
}

zone_handle! {
    pub struct LiteralId(Literal);
}

impl LiteralId {
    fn raw_index(&self) -> i32 {
        let (idx, gen) = self.0.into_raw_parts();
        // Collapses generational_arena's (index, generation) pair into the
        // 24-bit payload; fine since a LiteralId never outlives the zone
        // that allocated it and generations only matter across frees, which
        // literal zones never do.
        (idx as i32 ^ ((gen as i32) << 16)) & PAYLOAD_MASK as i32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Opcode {
    Entry,
    Exit,
    Jump,
    Branch,
    Ret,
    Call,
    Load,
    Store,
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Sar,
    Lit,
    Phi,
    ParallelCopy,
    Use,
}

impl Opcode {
    pub fn is_phi(self) -> bool {
        matches!(self, Opcode::Phi)
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Exit | Opcode::Jump | Opcode::Branch | Opcode::Ret)
    }
}

zone_handle! {
    pub struct InstrId(Instruction);
}

/// Most instructions in this core take 0-2 inputs and at most one output
/// (the phi/call exceptions still work, just spilling to the heap), so the
/// common case never allocates.
pub type OperandList = SmallVec<[Value; 2]>;

pub struct Instruction {
    pub opcode: Opcode,
    pub outputs: OperandList,
    pub inputs: OperandList,
    pub block: BlockId,
    pub position: usize,
}

#[derive(Default)]
pub struct BasicBlockData {
    phis: Vec<InstrId>,
    body: Vec<InstrId>,
}

pub struct Function {
    pub name: String,
    pub params: Vec<Value>,
    instructions: Zone<Instruction>,
    literals: Zone<Literal>,
    blocks: Graph<BasicBlockData>,
    next_vreg: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            params: Vec::new(),
            instructions: Zone::new(),
            literals: Zone::new(),
            blocks: Graph::new(),
            next_vreg: 0,
        }
    }

    pub fn blocks(&self) -> &Graph<BasicBlockData> {
        &self.blocks
    }

    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn phis_of(&self, block: BlockId) -> &[InstrId] {
        &self.blocks.node(block).phis
    }

    pub fn body_of(&self, block: BlockId) -> &[InstrId] {
        &self.blocks.node(block).body
    }

    /// All instructions of a block, phis first, in execution order.
    pub fn instructions_of(&self, block: BlockId) -> impl Iterator<Item = InstrId> + '_ {
        self.phis_of(block).iter().chain(self.body_of(block).iter()).copied()
    }

    pub fn add_literal(&mut self, lit: Literal) -> LiteralId {
        LiteralId(self.literals.alloc(lit))
    }

    pub fn literal(&self, id: LiteralId) -> &Literal {
        &self.literals[id.0]
    }

    pub fn fresh_virtual_register(&mut self, ty: ValueType, size: ValueSize) -> Value {
        let n = self.next_vreg;
        self.next_vreg += 1;
        Value::virtual_register(ty, size, n)
    }

    pub fn append_block(&mut self) -> BlockId {
        self.blocks.editor().append_node(BasicBlockData::default())
    }

    pub fn connect(&mut self, from: BlockId, to: BlockId) {
        self.blocks.editor().add_edge(from, to);
    }

    pub fn set_entry(&mut self, block: BlockId) {
        self.blocks.set_entry(block);
    }

    pub fn set_exit(&mut self, block: BlockId) {
        self.blocks.set_exit(block);
    }

    pub fn editor(&mut self, block: BlockId) -> editor::BlockEditLease<'_> {
        editor::BlockEditLease::new(self, block)
    }
}
