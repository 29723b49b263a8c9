//! End-to-end regression scenarios exercising the crate's public surface
//! top to bottom: CFG construction, dominator/liveness analyses, HIR
//! verification and lowering, critical-edge removal, register allocation,
//! and machine-code assembly.

use rivet_cg::analysis::{dominator, liveness, looptree};
use rivet_cg::codegen::vmem::Protection;
use rivet_cg::graph::Graph;
use rivet_cg::hir::{self, HirOpcode, TypeRef};
use rivet_cg::lir;
use rivet_cg::regalloc::{PhysicalRegister, RegisterClass, RegisterFile};
use rivet_cg::zone::ZoneMap;
use rivet_cg::Compilation;

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Seven-block irreducible-looking CFG shared by several scenarios:
/// 0->1, 0->6, 1->2, 1->4, 2->3, 2->5, 3->2, 3->4, 4->1, 4->6, 5->3.
fn seven_block_cfg() -> (Graph<u32>, Vec<rivet_cg::graph::NodeId>) {
    let mut g = Graph::new();
    let ids;
    {
        let mut ed = g.editor();
        let ns: Vec<_> = (0..7).map(|i| ed.append_node(i)).collect();
        for (a, b) in [
            (0, 1),
            (0, 6),
            (1, 2),
            (1, 4),
            (2, 3),
            (2, 5),
            (3, 2),
            (3, 4),
            (4, 1),
            (4, 6),
            (5, 3),
        ] {
            ed.add_edge(ns[a], ns[b]);
        }
        ids = ns;
    }
    g.set_entry(ids[0]);
    g.set_exit(ids[6]);
    (g, ids)
}

#[test]
fn dominator_tree_and_liveness_agree_on_the_seven_block_cfg() {
    init_tracing();
    let (g, ids) = seven_block_cfg();

    let dt = dominator::build_forward(&g);
    assert_eq!(dt.parent_of(ids[2]), Some(ids[1]));
    assert_eq!(dt.parent_of(ids[3]), Some(ids[2]));

    let empty_kill = ZoneMap::new();
    let empty_init = ZoneMap::new();
    let records = liveness::solve(&g, 0, &empty_kill, &empty_init);
    assert!(records.get(&ids[0]).unwrap().in_set.is_empty());
}

#[test]
fn loop_tree_classifies_the_back_edge_through_node_one() {
    init_tracing();
    let (g, ids) = seven_block_cfg();
    let lt = looptree::build(&g);
    let header_tree = lt.tree_node_of(ids[1]);
    assert_eq!(lt.entry_of(header_tree), Some(ids[1]));
}

#[test]
fn hir_function_rejects_malformed_phi_before_lowering() {
    init_tracing();
    let mut f = hir::Function::new("bad", vec![], TypeRef::Int);
    let entry = f.append_block();
    let a = f.append_block();
    let merge = f.append_block();
    f.entry = Some(entry);
    f.connect(entry, merge);
    f.connect(a, merge);

    let only_operand = f.push_value(entry, HirOpcode::ConstInt(1), vec![], TypeRef::Int);
    f.push_value(merge, HirOpcode::Phi, vec![only_operand], TypeRef::Int);

    assert!(f.verify().is_err());
}

fn add_function() -> hir::Function {
    let mut f = hir::Function::new("add", vec![TypeRef::Int, TypeRef::Int], TypeRef::Int);
    let entry = f.append_block();
    f.entry = Some(entry);
    let p0 = f.push_value(entry, HirOpcode::Param, vec![], TypeRef::Int);
    let p1 = f.push_value(entry, HirOpcode::Param, vec![], TypeRef::Int);
    let sum = f.push_value(entry, HirOpcode::BinAdd, vec![p0, p1], TypeRef::Int);
    f.push_value(entry, HirOpcode::Return, vec![sum], TypeRef::Int);
    f
}

#[test]
fn factory_lowers_a_two_parameter_add_function_to_lir() {
    init_tracing();
    let hir_fn = add_function();
    let lir_fn = hir::factory::lower(&hir_fn);
    assert_eq!(lir_fn.params.len(), 2);
    let entry = lir_fn.blocks().entry().unwrap();
    let ops: Vec<_> = lir_fn
        .body_of(entry)
        .iter()
        .map(|&id| lir_fn.instruction(id).opcode)
        .collect();
    assert_eq!(ops, vec![lir::Opcode::Add, lir::Opcode::Ret]);
}

#[test]
fn critical_edge_removal_gives_every_merge_block_a_unique_predecessor() {
    init_tracing();
    let mut f = lir::Function::new("diamond");
    let entry = f.append_block();
    let left = f.append_block();
    let right = f.append_block();
    let merge = f.append_block();
    f.connect(entry, left);
    f.connect(entry, right);
    f.connect(left, merge);
    f.connect(right, merge);
    f.set_entry(entry);

    lir::critical_edge::remove_critical_edges(&mut f);

    for pred in f.blocks().predecessors(merge) {
        assert_eq!(f.blocks().predecessors(*pred).len(), 1);
    }
}

#[test]
fn register_allocator_assigns_every_virtual_register_a_physical_home() {
    init_tracing();
    let hir_fn = add_function();
    let mut lir_fn = hir::factory::lower(&hir_fn);
    lir::critical_edge::remove_critical_edges(&mut lir_fn);

    let regfile = RegisterFile { integer: vec![0, 1, 2, 3], float: vec![0, 1] };
    let allocator = rivet_cg::regalloc::Allocator::new(&lir_fn, &regfile);
    let assignments = allocator.run();
    assert!(!assignments.at_instruction.is_empty());
}

#[test]
fn parallel_copy_expander_resolves_a_two_register_swap() {
    init_tracing();
    use rivet_cg::regalloc::pcopy::{expand, Location, Source, Task};

    let r0 = PhysicalRegister { class: RegisterClass::Integer, index: 0 };
    let r1 = PhysicalRegister { class: RegisterClass::Integer, index: 1 };
    let tasks = vec![
        Task { output: Location::Physical(r0), input: Source::Physical(r1) },
        Task { output: Location::Physical(r1), input: Source::Physical(r0) },
    ];
    let out = expand(&tasks, &[]);
    assert_eq!(out.len(), 1);
}

#[test]
fn compile_runs_a_verified_function_through_the_whole_pipeline() {
    init_tracing();
    let hir_fn = add_function();
    let regfile = RegisterFile { integer: vec![0, 1, 2, 3], float: vec![0, 1] };
    let mut unit = Compilation::new(regfile);
    let installed = unit.compile(&hir_fn).expect("well-formed function compiles");
    assert_eq!(installed.block_offsets.len(), 1);

    let mut table = rivet_cg::InstalledFunctions::new();
    table.insert("add", installed);
    assert!(table.get("add").is_some());

    // Dropping the pool at end of scope frees the committed pages; nothing
    // else in this core owns that memory.
    drop(unit.code_pool);
    let _ = Protection::ReadWriteExecute;
}
