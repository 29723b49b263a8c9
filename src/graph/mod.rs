//! Directed graph (component C).
//!
//! A `Graph<N>` owns an insertion-ordered sequence of nodes; each node
//! carries a predecessor set and a successor set of other nodes in the same
//! graph. Edge membership is kept consistent by construction: the only way
//! to add or remove an edge is through `GraphEditor`, which updates both
//! sides atomically, mirroring how `core_lang`'s `ir::Block` editor
//! (`ir/block.rs`, `Block::ins`) is the sole mutator of block content, and
//! LIR's own edit lease is the sole mutator of instruction lists.
//!
//! Successor/predecessor order is insertion order, not an unordered-set
//! iteration order: any algorithm whose *result* depends on iteration order
//! must impose an explicit ordering, and the graph sorters (component D)
//! build their traversal on it.
//! top of this order, so fixing it here keeps every downstream pass
//! (dominators, loop tree, liveness) deterministic across runs.

pub mod sorter;

use crate::zone::Zone;

pub type NodeId = generational_arena::Index;

struct NodeEntry<N> {
    value: N,
    preds: Vec<NodeId>,
    succs: Vec<NodeId>,
}

pub struct Graph<N> {
    nodes: Zone<NodeEntry<N>>,
    order: Vec<NodeId>,
    entry: Option<NodeId>,
    exit: Option<NodeId>,
}

impl<N> Graph<N> {
    pub fn new() -> Self {
        Graph {
            nodes: Zone::new(),
            order: Vec::new(),
            entry: None,
            exit: None,
        }
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn exit(&self) -> Option<NodeId> {
        self.exit
    }

    pub fn set_entry(&mut self, id: NodeId) {
        debug_assert!(self.contains(id));
        self.entry = Some(id);
    }

    pub fn set_exit(&mut self, id: NodeId) {
        debug_assert!(self.contains(id));
        self.exit = Some(id);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.try_get(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> &N {
        &self.nodes[id].value
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut N {
        &mut self.nodes[id].value
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].succs
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].preds
    }

    /// Nodes in insertion order, the basis every sorter (component D) walks
    /// from when it needs a deterministic starting point before a DFS.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn editor(&mut self) -> GraphEditor<'_, N> {
        GraphEditor { graph: self }
    }
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The sole mutator of a `Graph`'s node list and edge tables. Scoped to a
/// `&mut Graph` borrow rather than a check-in/check-out lease: there is no
/// cross-graph aliasing to guard against here (every `NodeId` only makes
/// sense against the one `Graph` it came from), unlike the LIR block editor
/// (`lir::editor`) which does need an explicit lease because a `Function`
/// holds many blocks that could otherwise be edited concurrently.
pub struct GraphEditor<'a, N> {
    graph: &'a mut Graph<N>,
}

impl<'a, N> GraphEditor<'a, N> {
    pub fn append_node(&mut self, value: N) -> NodeId {
        let id = self.graph.nodes.alloc(NodeEntry {
            value,
            preds: Vec::new(),
            succs: Vec::new(),
        });
        self.graph.order.push(id);
        id
    }

    /// Inserts a fresh node immediately before `before` in node order. Used
    /// by critical-edge removal (component L) to splice a jump-only block
    /// between a predecessor and a phi-bearing block without disturbing the
    /// rest of the layout.
    pub fn insert_node_before(&mut self, value: N, before: NodeId) -> NodeId {
        debug_assert!(self.graph.contains(before));
        let id = self.graph.nodes.alloc(NodeEntry {
            value,
            preds: Vec::new(),
            succs: Vec::new(),
        });
        let pos = self
            .graph
            .order
            .iter()
            .position(|&n| n == before)
            .expect("before node must be a member of this graph");
        self.graph.order.insert(pos, id);
        id
    }

    /// Removes `id` and every edge touching it. No implicit edge
    /// reattachment: callers that split an edge through a node are
    /// responsible for rewiring around it first (see
    /// `critical_edge::remove_critical_edges`).
    pub fn remove_node(&mut self, id: NodeId) {
        let (preds, succs) = {
            let entry = &self.graph.nodes[id];
            (entry.preds.clone(), entry.succs.clone())
        };
        for p in preds {
            self.remove_edge(p, id);
        }
        for s in succs {
            self.remove_edge(id, s);
        }
        self.graph.order.retain(|&n| n != id);
        if self.graph.entry == Some(id) {
            self.graph.entry = None;
        }
        if self.graph.exit == Some(id) {
            self.graph.exit = None;
        }
        self.graph.nodes.remove_raw(id);
    }

    /// Adds edge `from -> to`, updating both sides atomically. No-op (save
    /// for an assertion) if the edge already exists: forbids
    /// duplicate edges.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        debug_assert!(self.graph.contains(from) && self.graph.contains(to));
        let from_entry = self.graph.nodes.get_mut(from);
        if !from_entry.succs.contains(&to) {
            from_entry.succs.push(to);
        }
        let to_entry = self.graph.nodes.get_mut(to);
        if !to_entry.preds.contains(&from) {
            to_entry.preds.push(from);
        }
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        if let Some(entry) = self.graph.nodes.try_get(from) {
            if entry.succs.contains(&to) {
                self.graph.nodes.get_mut(from).succs.retain(|&n| n != to);
            }
        }
        if let Some(entry) = self.graph.nodes.try_get(to) {
            if entry.preds.contains(&from) {
                self.graph.nodes.get_mut(to).preds.retain(|&n| n != from);
            }
        }
    }

    /// Redirects the `from -> old_to` edge to land on `new_to` instead,
    /// preserving `from`'s position in `new_to`'s predecessor order. Used by
    /// critical-edge removal when a predecessor's successor is retargeted
    /// at the freshly inserted block.
    pub fn retarget_edge(&mut self, from: NodeId, old_to: NodeId, new_to: NodeId) {
        self.remove_edge(from, old_to);
        self.add_edge(from, new_to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_diamond() -> (Graph<&'static str>, Vec<NodeId>) {
        let mut g = Graph::new();
        let ids;
        {
            let mut ed = g.editor();
            let a = ed.append_node("a");
            let b = ed.append_node("b");
            let c = ed.append_node("c");
            let d = ed.append_node("d");
            ed.add_edge(a, b);
            ed.add_edge(a, c);
            ed.add_edge(b, d);
            ed.add_edge(c, d);
            ids = vec![a, b, c, d];
        }
        g.set_entry(ids[0]);
        g.set_exit(ids[3]);
        (g, ids)
    }

    #[test]
    fn edges_are_symmetric() {
        let (g, ids) = build_diamond();
        assert_eq!(g.successors(ids[0]), &[ids[1], ids[2]]);
        assert_eq!(g.predecessors(ids[3]), &[ids[1], ids[2]]);
    }

    #[test]
    fn no_duplicate_edges() {
        let mut g = Graph::new();
        let (a, b) = {
            let mut ed = g.editor();
            let a = ed.append_node(());
            let b = ed.append_node(());
            ed.add_edge(a, b);
            ed.add_edge(a, b);
            (a, b)
        };
        assert_eq!(g.successors(a), &[b]);
        assert_eq!(g.predecessors(b), &[a]);
    }

    #[test]
    fn remove_node_clears_both_sides() {
        let (mut g, ids) = build_diamond();
        g.editor().remove_node(ids[1]);
        assert!(!g.successors(ids[0]).contains(&ids[1]));
        assert!(!g.predecessors(ids[3]).contains(&ids[1]));
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn insert_before_splices_into_order() {
        let mut g = Graph::new();
        let (a, b, x) = {
            let mut ed = g.editor();
            let a = ed.append_node("a");
            let b = ed.append_node("b");
            let x = ed.insert_node_before("x", b);
            (a, b, x)
        };
        let order: Vec<_> = g.nodes().collect();
        assert_eq!(order, vec![a, x, b]);
    }
}
