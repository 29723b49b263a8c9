//! Parallel-copy expander (component P): resolves a "pcopy" pseudo — a set
//! of simultaneous `output <- input` tasks, as produced by phi
//! deconstruction and register-allocation edge merges — into a concrete
//! Mov/Swap/Lit/Load/Store sequence

use super::PhysicalRegister;
use crate::lir::LiteralId;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Physical(PhysicalRegister),
    Memory(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Physical(PhysicalRegister),
    Immediate(i32),
    Literal(LiteralId),
    Memory(u32),
}

#[derive(Clone, Copy, Debug)]
pub struct Task {
    pub output: Location,
    pub input: Source,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Emitted {
    Mov { dst: Location, src: Source },
    Swap(PhysicalRegister, PhysicalRegister),
    Load { dst: PhysicalRegister, mem: u32 },
    Store { mem: u32, src: PhysicalRegister },
    Lit { dst: PhysicalRegister, imm: i32 },
}

fn source_is_location(input: Source, loc: Location) -> bool {
    match (input, loc) {
        (Source::Physical(p), Location::Physical(q)) => p == q,
        (Source::Memory(m), Location::Memory(n)) => m == n,
        _ => false,
    }
}

fn input_as_location(input: Source) -> Option<Location> {
    match input {
        Source::Physical(p) => Some(Location::Physical(p)),
        Source::Memory(m) => Some(Location::Memory(m)),
        _ => None,
    }
}

/// Emits the direct-Mov form of a task with no remaining dependents
/// (step 2's enumerated forms).
fn emit_direct(output: Location, input: Source) -> Emitted {
    match (output, input) {
        (Location::Physical(dst), Source::Physical(src)) => Emitted::Mov {
            dst: Location::Physical(dst),
            src: Source::Physical(src),
        },
        (Location::Physical(dst), Source::Memory(mem)) => Emitted::Load { dst, mem },
        (Location::Memory(mem), Source::Physical(src)) => Emitted::Store { mem, src },
        (Location::Physical(dst), Source::Immediate(imm)) => Emitted::Lit { dst, imm },
        (Location::Physical(dst), Source::Literal(lit)) => Emitted::Mov {
            dst: Location::Physical(dst),
            src: Source::Literal(lit),
        },
        (Location::Memory(_), Source::Immediate(_) | Source::Literal(_)) => {
            unreachable!("memory destination with an immediate/literal source needs a scratch first")
        }
    }
}

fn is_free(pending: &[Task], index: usize) -> bool {
    let output = pending[index].output;
    pending
        .iter()
        .enumerate()
        .all(|(j, t)| j == index || !source_is_location(t.input, output))
}

fn find_cycle(pending: &[Task]) -> Vec<usize> {
    let mut chain = vec![0usize];
    let mut cur = 0usize;
    loop {
        let loc = input_as_location(pending[cur].input)
            .expect("a task with no remaining dependents would already be free");
        let next = pending
            .iter()
            .position(|t| t.output == loc)
            .expect("pure-cycle remainder: every input aliases some pending output");
        if next == chain[0] {
            break;
        }
        chain.push(next);
        cur = next;
    }
    chain
}

/// Breaks one cycle in `chain` (indices into `pending`, in dependency
/// order), emitting instructions and removing the consumed tasks. Returns
/// `false` if no scratch register was available
/// "returns the empty sequence if it cannot proceed without more scratch".
fn break_cycle(
    chain: &[usize],
    pending: &mut Vec<Task>,
    emitted: &mut Vec<Emitted>,
    scratches: &mut Vec<PhysicalRegister>,
) -> bool {
    let tasks: Vec<Task> = chain.iter().map(|&i| pending[i]).collect();

    if tasks.len() == 2 {
        if let (Location::Physical(a), Location::Physical(b)) = (tasks[0].output, tasks[1].output) {
            emitted.push(Emitted::Swap(a, b));
            remove_indices(pending, chain);
            return true;
        }
    }

    let Some(scratch) = scratches.pop() else {
        return false;
    };

    // Stash the first task's original destination value before anything
    // overwrites it.
    match tasks[0].output {
        Location::Physical(p) => emitted.push(Emitted::Mov {
            dst: Location::Physical(scratch),
            src: Source::Physical(p),
        }),
        Location::Memory(m) => emitted.push(Emitted::Load { dst: scratch, mem: m }),
    }

    for t in &tasks[..tasks.len() - 1] {
        emitted.push(emit_direct(t.output, t.input));
    }

    let last = tasks[tasks.len() - 1];
    match last.output {
        Location::Physical(dst) => emitted.push(Emitted::Mov {
            dst: Location::Physical(dst),
            src: Source::Physical(scratch),
        }),
        Location::Memory(mem) => emitted.push(Emitted::Store { mem, src: scratch }),
    }

    scratches.push(scratch);
    remove_indices(pending, chain);
    true
}

fn remove_indices(pending: &mut Vec<Task>, indices: &[usize]) {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    for &i in sorted.iter().rev() {
        pending.remove(i);
    }
}

/// Expands `tasks` into a concrete instruction sequence. Returns the empty
/// vector if the available scratches are insufficient; the caller should
/// retry with a longer `scratches` list.
pub fn expand(tasks: &[Task], scratches: &[PhysicalRegister]) -> Vec<Emitted> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let mut pending: Vec<Task> = tasks.to_vec();
    let mut emitted = Vec::new();
    let mut scratch_pool: Vec<PhysicalRegister> = scratches.to_vec();

    loop {
        let mut progressed = true;
        while progressed {
            progressed = false;
            let mut i = 0;
            while i < pending.len() {
                if is_free(&pending, i) {
                    let t = pending.remove(i);
                    emitted.push(emit_direct(t.output, t.input));
                    progressed = true;
                } else {
                    i += 1;
                }
            }
        }
        if pending.is_empty() {
            return emitted;
        }
        let cycle = find_cycle(&pending);
        trace!(cycle_len = cycle.len(), scratches_left = scratch_pool.len(), "breaking pcopy cycle");
        if !break_cycle(&cycle, &mut pending, &mut emitted, &mut scratch_pool) {
            return Vec::new();
        }
    }
}
