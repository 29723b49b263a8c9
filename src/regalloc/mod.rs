//! Register allocation pipeline: use-def lists (N), conflict-map builder
//! (M), parallel-copy expansion (P), and the block-ordered allocator (O)
//! itself

pub mod conflict;
pub mod pcopy;
pub mod usedef;

use crate::graph::sorter;
use crate::lir::{BlockId, Function, InstrId, Opcode, Value, ValueKind};
use either::Either;
use rustc_hash::FxHashMap as HashMap;
use tracing::debug_span;

/// A physical register, identified by a stable target index: a register of
/// a given size and index names the same physical register at any width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysicalRegister {
    pub class: RegisterClass,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Integer,
    Float,
}

/// The target's register file: disjoint integer and float pools.
pub struct RegisterFile {
    pub integer: Vec<u32>,
    pub float: Vec<u32>,
}

impl RegisterFile {
    pub fn pool(&self, class: RegisterClass) -> &[u32] {
        match class {
            RegisterClass::Integer => &self.integer,
            RegisterClass::Float => &self.float,
        }
    }
}

/// Per-vreg or per-(instruction, vreg) physical assignment, or a spill slot
/// when no physical is live at that point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    Physical(PhysicalRegister),
    Spill(u32),
}

/// The allocator's final result (`assignments`).
#[derive(Default)]
pub struct Assignments {
    /// Physical assignment of each vreg at each block's exit.
    pub at_block_exit: HashMap<(BlockId, Value), PhysicalRegister>,
    /// Allocation chosen for each (instruction, vreg) use/def.
    pub at_instruction: HashMap<(InstrId, Value), Allocation>,
    /// The spill slot reserved for a vreg, if it was ever spilled.
    pub spill_slot_of: HashMap<Value, u32>,
    /// Synthetic moves/loads/stores inserted ahead of each instruction to
    /// satisfy register-class and liveness constraints.
    pub before_actions: HashMap<InstrId, Vec<pcopy::Task>>,
}

fn register_class_of(v: Value) -> RegisterClass {
    match v.ty() {
        crate::lir::ValueType::Int => RegisterClass::Integer,
        crate::lir::ValueType::Float => RegisterClass::Float,
    }
}

/// Greedy linear-scan-flavored allocator, block-ordered over
/// reverse-postorder. `liveness` and `conflicts` come from
/// components G and M; this function does not recompute them.
pub struct Allocator<'a> {
    function: &'a Function,
    regfile: &'a RegisterFile,
    physical_map: HashMap<Value, PhysicalRegister>,
    free: HashMap<RegisterClass, Vec<u32>>,
    next_spill_slot: u32,
    assignments: Assignments,
}

impl<'a> Allocator<'a> {
    pub fn new(function: &'a Function, regfile: &'a RegisterFile) -> Self {
        Allocator {
            function,
            regfile,
            physical_map: HashMap::default(),
            free: HashMap::default(),
            next_spill_slot: 0,
            assignments: Assignments::default(),
        }
    }

    fn reset_free_pools(&mut self) {
        self.free.insert(RegisterClass::Integer, self.regfile.integer.clone());
        self.free.insert(RegisterClass::Float, self.regfile.float.clone());
    }

    fn alloc_spill_slot(&mut self, vreg: Value) -> u32 {
        *self.assignments.spill_slot_of.entry(vreg).or_insert_with(|| {
            let slot = self.next_spill_slot;
            self.next_spill_slot += 1;
            slot
        })
    }

    /// A free physical of `class`, or the victim vreg to evict when the pool
    /// is empty. Kept as one `Either` return rather than an `Option` plus a
    /// fallback closure so the free-vs-evict branches stay visibly distinct
    /// at the call site.
    fn free_or_victim(&self, class: RegisterClass) -> Either<u32, Value> {
        if let Some(&index) = self.free.get(&class).and_then(|v| v.last()) {
            return Either::Left(index);
        }
        // No free physical: evict an arbitrary currently-held vreg of the
        // same class. Picking a victim by last-use distance would need a
        // next-use table this allocator doesn't carry yet, so it falls
        // back to the first-held victim of that class.
        let victim = self
            .physical_map
            .iter()
            .find(|(_, p)| p.class == class)
            .map(|(&v, _)| v)
            .expect("register class must have at least one physical or one victim");
        Either::Right(victim)
    }

    fn acquire(&mut self, vreg: Value) -> PhysicalRegister {
        if let Some(&p) = self.physical_map.get(&vreg) {
            return p;
        }
        let class = register_class_of(vreg);
        let index = match self.free_or_victim(class) {
            Either::Left(index) => {
                self.free.get_mut(&class).unwrap().pop();
                index
            }
            Either::Right(victim) => {
                let p = self.physical_map.remove(&victim).unwrap();
                self.alloc_spill_slot(victim);
                p.index
            }
        };
        let p = PhysicalRegister { class, index };
        self.physical_map.insert(vreg, p);
        p
    }

    /// Runs the allocator over every block in RPO, recording per-instruction
    /// allocations. Phi resolution and cross-edge parallel-copy placement
    /// are left to the caller once critical edges have been removed
    /// (component L already guarantees a unique predecessor-jump block to
    /// place them in).
    pub fn run(mut self) -> Assignments {
        let _span = debug_span!("regalloc_run").entered();
        let order = sorter::reverse_post_order(self.function.blocks());
        for block in order.iter().copied() {
            self.reset_free_pools();
            self.physical_map.clear();

            for instr_id in self.function.body_of(block).iter().copied() {
                let instr = self.function.instruction(instr_id);
                if instr.opcode.is_phi() {
                    continue;
                }
                for &input in &instr.inputs {
                    if input.kind() != ValueKind::VirtualRegister {
                        continue;
                    }
                    let p = self.acquire(input);
                    self.assignments
                        .at_instruction
                        .insert((instr_id, input), Allocation::Physical(p));
                }
                for &output in &instr.outputs {
                    if output.kind() != ValueKind::VirtualRegister {
                        continue;
                    }
                    let p = self.acquire(output);
                    self.assignments
                        .at_instruction
                        .insert((instr_id, output), Allocation::Physical(p));
                }
            }

            for (&vreg, &p) in self.physical_map.clone().iter() {
                self.assignments.at_block_exit.insert((block, vreg), p);
            }
        }
        self.assignments
    }
}

pub fn is_call_opcode(op: Opcode) -> bool {
    matches!(op, Opcode::Call)
}
