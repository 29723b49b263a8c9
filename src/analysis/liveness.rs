//! Liveness solver (component G): backward fixed-point data-flow over
//! IN/OUT/KILL bitsets

use crate::bitset::Bitset;
use crate::graph::{sorter, Graph, NodeId};
use crate::zone::ZoneMap;
use rustc_hash::FxHashMap as HashMap;
use std::hash::Hash;
use tracing::{debug_span, trace, warn};

/// Maps variables to a dense `[0, V)` numbering the bitsets are sized to, and
/// back. Built once per function before the solver runs.
pub struct VariableTable<V: Eq + Hash + Clone> {
    index_of: HashMap<V, usize>,
    var_of: Vec<V>,
}

impl<V: Eq + Hash + Clone> VariableTable<V> {
    pub fn new() -> Self {
        VariableTable {
            index_of: HashMap::default(),
            var_of: Vec::new(),
        }
    }

    pub fn index_of(&mut self, v: V) -> usize {
        if let Some(&i) = self.index_of.get(&v) {
            return i;
        }
        let i = self.var_of.len();
        self.var_of.push(v.clone());
        self.index_of.insert(v, i);
        i
    }

    pub fn variable_at(&self, index: usize) -> &V {
        &self.var_of[index]
    }

    pub fn len(&self) -> usize {
        self.var_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.var_of.is_empty()
    }
}

impl<V: Eq + Hash + Clone> Default for VariableTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-node IN/OUT/KILL bitsets, the solver's output (
/// "Liveness record").
#[derive(Clone)]
pub struct LivenessRecord {
    pub in_set: Bitset,
    pub out_set: Bitset,
    pub kill: Bitset,
}

/// A guard against pathological non-terminating inputs, not an algorithmic
/// branch: no decision in the solver depends on this value.
const ITERATION_CAP: usize = 10_000;

/// Runs the backward fixed-point solver to completion. `kill` and
/// `in_initial` default to the empty set for any node absent from their map.
///
/// Panics if, at the fixed point, `graph.entry()`'s IN set is non-empty;
/// that's one of the invariant violations this core asserts rather than
/// recovers from.
pub fn solve<N>(
    graph: &Graph<N>,
    var_count: usize,
    kill: &ZoneMap<NodeId, Bitset>,
    in_initial: &ZoneMap<NodeId, Bitset>,
) -> ZoneMap<NodeId, LivenessRecord> {
    let _span = debug_span!("liveness_solve", var_count).entered();
    let order = sorter::reverse_pre_order(graph);

    let empty = || Bitset::new(var_count);
    let mut in_sets: ZoneMap<NodeId, Bitset> = ZoneMap::new();
    let mut out_sets: ZoneMap<NodeId, Bitset> = ZoneMap::new();
    for n in graph.nodes() {
        in_sets.insert(n, in_initial.get(&n).cloned().unwrap_or_else(empty));
        out_sets.insert(n, empty());
    }

    let mut changed = true;
    let mut iterations = 0usize;
    while changed {
        changed = false;
        iterations += 1;
        if iterations == ITERATION_CAP {
            warn!(iterations, "liveness fixed-point approaching iteration cap");
        }
        assert!(
            iterations <= ITERATION_CAP,
            "liveness fixed-point exceeded iteration cap {ITERATION_CAP}; pathological input"
        );
        trace!(iterations, "liveness pass");

        for &n in order.iter() {
            let mut out_n = empty();
            for &s in graph.successors(n) {
                out_n.union(in_sets.get(&s).expect("every node has an IN set"));
            }

            let mut work = out_n.clone();
            if let Some(k) = kill.get(&n) {
                work.subtract(k);
            }
            if let Some(init) = in_initial.get(&n) {
                work.union(init);
            }

            let cur_in = in_sets.get(&n).expect("every node has an IN set");
            if !work.equals(cur_in) {
                in_sets.insert(n, work);
                changed = true;
            }
            out_sets.insert(n, out_n);
        }
    }

    if let Some(entry) = graph.entry() {
        let entry_in = in_sets.get(&entry).expect("entry has an IN set");
        assert!(
            entry_in.is_empty(),
            "entry IN must be empty at the liveness fixed point"
        );
    }

    let mut result = ZoneMap::new();
    for n in graph.nodes() {
        result.insert(
            n,
            LivenessRecord {
                in_set: in_sets.get(&n).expect("every node has an IN set").clone(),
                out_set: out_sets.get(&n).expect("every node has an OUT set").clone(),
                kill: kill.get(&n).cloned().unwrap_or_else(empty),
            },
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// Same seven-block graph used by the dominator tests.
    #[test]
    fn seven_block_liveness() {
        let mut g: Graph<u32> = Graph::new();
        let ids;
        {
            let mut ed = g.editor();
            let ns: Vec<NodeId> = (0..7).map(|i| ed.append_node(i)).collect();
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

        let mut vars: VariableTable<char> = VariableTable::new();
        let a = vars.index_of('a');
        let b = vars.index_of('b');
        let c = vars.index_of('c');
        let v = vars.len();

        let bits = |items: &[usize]| {
            let mut s = Bitset::new(v);
            for &i in items {
                s.add(i);
            }
            s
        };

        let mut kill = ZoneMap::new();
        kill.insert(ids[0], bits(&[a, b, c]));
        kill.insert(ids[3], bits(&[c]));

        let mut use_sets = ZoneMap::new();
        use_sets.insert(ids[2], bits(&[b]));
        use_sets.insert(ids[4], bits(&[b]));
        use_sets.insert(ids[5], bits(&[c]));
        use_sets.insert(ids[6], bits(&[a]));

        let records = solve(&g, v, &kill, &use_sets);

        let in_of = |n: NodeId| records.get(&n).unwrap().in_set.clone();
        let out_of = |n: NodeId| records.get(&n).unwrap().out_set.clone();

        assert!(in_of(ids[0]).is_empty());
        assert_eq!(out_of(ids[0]), bits(&[a, b, c]));
        assert_eq!(in_of(ids[1]), bits(&[a, b, c]));
        assert_eq!(in_of(ids[2]), bits(&[a, b, c]));
        assert_eq!(in_of(ids[4]), bits(&[a, b, c]));
        assert_eq!(in_of(ids[5]), bits(&[a, b, c]));
        assert_eq!(in_of(ids[3]), bits(&[a, b]));
        assert_eq!(out_of(ids[3]), bits(&[a, b, c]));
        assert_eq!(out_of(ids[5]), bits(&[a, b]));
        assert_eq!(in_of(ids[6]), bits(&[a]));
        assert!(out_of(ids[6]).is_empty());
    }
}
