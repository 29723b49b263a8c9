//! Graph sorters (component D): pre/post/reverse-pre/reverse-post DFS
//! orderings rooted at `graph.entry()`.
//!
//! All four orderings come from one DFS walk; they differ only in whether a
//! node is recorded on entry or exit, and whether the final list is
//! reversed. Successor order within the DFS follows `Graph::successors`,
//! i.e. edge-insertion order (see `graph::mod` docs), so results stay
//! deterministic and reproducible across runs.

use super::{Graph, NodeId};
use crate::zone::ZoneMap;
use rustc_hash::FxHashSet as HashSet;
use std::hash::Hash;

/// A `Vec<NodeId>` plus an O(1) position index: the sorter's output type,
/// an ordered list that also supports O(1) position lookup.
pub struct SortedList {
    order: Vec<NodeId>,
    position: ZoneMap<NodeId, usize>,
}

impl SortedList {
    fn from_order(order: Vec<NodeId>) -> Self {
        let mut position = ZoneMap::new();
        for (i, &n) in order.iter().enumerate() {
            position.insert(n, i);
        }
        SortedList { order, position }
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.order
    }

    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.position.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.order.iter()
    }
}

enum Visit {
    Pre,
    Post,
}

fn dfs<N>(graph: &Graph<N>, order: &mut Vec<NodeId>, visit: Visit) {
    let Some(entry) = graph.entry() else {
        return;
    };
    let mut visited: HashSet<NodeId> = HashSet::default();
    // explicit stack: (node, next successor index to explore)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    visited.insert(entry);
    if let Visit::Pre = visit {
        order.push(entry);
    }
    stack.push((entry, 0));

    while let Some(&mut (node, ref mut next)) = stack.last_mut() {
        let succs = graph.successors(node);
        if *next < succs.len() {
            let child = succs[*next];
            *next += 1;
            if visited.insert(child) {
                if let Visit::Pre = visit {
                    order.push(child);
                }
                stack.push((child, 0));
            }
        } else {
            if let Visit::Post = visit {
                order.push(node);
            }
            stack.pop();
        }
    }
}

/// DFS preorder: a node is recorded the moment it is first discovered.
pub fn pre_order<N>(graph: &Graph<N>) -> SortedList {
    let mut order = Vec::new();
    dfs(graph, &mut order, Visit::Pre);
    SortedList::from_order(order)
}

/// DFS postorder: a node is recorded once all of its successors have been
/// fully explored.
pub fn post_order<N>(graph: &Graph<N>) -> SortedList {
    let mut order = Vec::new();
    dfs(graph, &mut order, Visit::Post);
    SortedList::from_order(order)
}

pub fn reverse_pre_order<N>(graph: &Graph<N>) -> SortedList {
    let mut order: Vec<NodeId> = pre_order(graph).order;
    order.reverse();
    SortedList::from_order(order)
}

/// Reverse postorder (RPO): the ordering every forward analysis in this
/// crate (dominators, liveness) iterates over, since it guarantees each node
/// appears after all of its dominators (the glossary).
pub fn reverse_post_order<N>(graph: &Graph<N>) -> SortedList {
    let mut order: Vec<NodeId> = post_order(graph).order;
    order.reverse();
    SortedList::from_order(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// Builds a seven-block graph:
    /// 0->1, 0->6, 1->2, 1->4, 2->3, 2->5, 3->2, 3->4, 4->1, 4->6, 5->3.
    pub(crate) fn seven_block_graph() -> (Graph<u32>, Vec<NodeId>) {
        let mut g = Graph::new();
        let ids;
        {
            let mut ed = g.editor();
            let ns: Vec<NodeId> = (0..7).map(|i| ed.append_node(i)).collect();
            let e = |a: usize, b: usize, ed: &mut super::super::GraphEditor<'_, u32>| {
                ed.add_edge(ns[a], ns[b])
            };
            e(0, 1, &mut ed);
            e(0, 6, &mut ed);
            e(1, 2, &mut ed);
            e(1, 4, &mut ed);
            e(2, 3, &mut ed);
            e(2, 5, &mut ed);
            e(3, 2, &mut ed);
            e(3, 4, &mut ed);
            e(4, 1, &mut ed);
            e(4, 6, &mut ed);
            e(5, 3, &mut ed);
            ids = ns;
        }
        g.set_entry(ids[0]);
        g.set_exit(ids[6]);
        (g, ids)
    }

    #[test]
    fn rpo_places_entry_first() {
        let (g, ids) = seven_block_graph();
        let rpo = reverse_post_order(&g);
        assert_eq!(rpo.as_slice()[0], ids[0]);
        assert_eq!(rpo.position_of(ids[0]), Some(0));
    }

    #[test]
    fn reverse_pre_is_pre_reversed() {
        let (g, _ids) = seven_block_graph();
        let pre = pre_order(&g);
        let rev = reverse_pre_order(&g);
        let mut expect: Vec<_> = pre.as_slice().to_vec();
        expect.reverse();
        assert_eq!(rev.as_slice(), expect.as_slice());
    }

    #[test]
    fn every_node_visited_once() {
        let (g, ids) = seven_block_graph();
        let rpo = reverse_post_order(&g);
        assert_eq!(rpo.len(), ids.len());
    }
}
