//! Dominator tree (component E): the iterative "Cooper" algorithm, built
//! over either the forward graph (rooted at `entry`, walking successors) or
//! the backward graph (rooted at `exit`, walking predecessors) through one
//! shared `Direction` parameter

use crate::graph::{Graph, NodeId};
use crate::zone::ZoneMap;
use rustc_hash::FxHashSet as HashSet;
use tracing::debug_span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Which edges count as "successors" for traversal purposes under a given
/// `Direction`, and which node is the tree's root. Forward dominators walk
/// the graph as given, rooted at `entry`; post-dominators walk it reversed,
/// rooted at `exit` ("Direction parameter").
struct View<'g, N> {
    graph: &'g Graph<N>,
    direction: Direction,
}

impl<'g, N> View<'g, N> {
    fn root(&self) -> NodeId {
        match self.direction {
            Direction::Forward => self.graph.entry(),
            Direction::Backward => self.graph.exit(),
        }
        .expect("graph must have an entry/exit to build a dominator tree")
    }

    fn succs(&self, n: NodeId) -> &'g [NodeId] {
        match self.direction {
            Direction::Forward => self.graph.successors(n),
            Direction::Backward => self.graph.predecessors(n),
        }
    }

    fn preds(&self, n: NodeId) -> &'g [NodeId] {
        match self.direction {
            Direction::Forward => self.graph.predecessors(n),
            Direction::Backward => self.graph.successors(n),
        }
    }
}

struct DomNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
    rpo: usize,
}

pub struct DominatorTree {
    root: NodeId,
    nodes: ZoneMap<NodeId, DomNode>,
    frontiers: ZoneMap<NodeId, Vec<NodeId>>,
}

impl DominatorTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn parent_of(&self, n: NodeId) -> Option<NodeId> {
        self.nodes.get(&n).and_then(|d| d.parent)
    }

    pub fn children_of(&self, n: NodeId) -> &[NodeId] {
        self.nodes.get(&n).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn depth_of(&self, n: NodeId) -> usize {
        self.nodes.get(&n).map(|d| d.depth).unwrap_or(0)
    }

    /// `a` dominates `b` iff `a` is an ancestor-of-or-equal-to `b` in the
    /// tree.
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.parent_of(cur) {
                Some(p) => cur = p,
                None => return cur == a,
            }
        }
    }

    /// Dominance frontier of `n`, returned in RPO order: result order must
    /// not leak from an unordered container.
    pub fn frontier_of(&self, n: NodeId) -> &[NodeId] {
        self.frontiers.get(&n).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Builds the forward dominator tree, rooted at `graph.entry()`.
pub fn build_forward<N>(graph: &Graph<N>) -> DominatorTree {
    build(graph, Direction::Forward)
}

/// Builds the post-dominator tree by running the same algorithm over the
/// reversed graph, rooted at `graph.exit()`: the post-dominator tree built
/// with the backward direction equals the dominator tree of the reverse
/// graph.
pub fn build_backward<N>(graph: &Graph<N>) -> DominatorTree {
    build(graph, Direction::Backward)
}

fn build<N>(graph: &Graph<N>, direction: Direction) -> DominatorTree {
    let _span = debug_span!("dominator_build", ?direction).entered();
    let view = View { graph, direction };
    let root = view.root();
    let rpo = reverse_postorder(&view);
    let rpo_of: ZoneMap<NodeId, usize> = {
        let mut m = ZoneMap::new();
        for (i, &n) in rpo.iter().enumerate() {
            m.insert(n, i);
        }
        m
    };

    let mut parent: ZoneMap<NodeId, Option<NodeId>> = ZoneMap::new();
    for &n in &rpo {
        parent.insert(n, None);
    }
    parent.insert(root, Some(root)); // sentinel: root is its own parent until finalized

    let mut changed = true;
    while changed {
        changed = false;
        for &n in rpo.iter() {
            if n == root {
                continue;
            }
            let preds = view.preds(n);
            let mut new_idom: Option<NodeId> = None;
            for &p in preds {
                if parent.get(&p).copied().flatten().is_none() {
                    continue; // predecessor not yet processed this pass
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(c) => intersect(c, p, &parent, &rpo_of),
                });
            }
            if let Some(idom) = new_idom {
                if parent.get(&n).copied().flatten() != Some(idom) {
                    parent.insert(n, Some(idom));
                    changed = true;
                }
            }
        }
    }
    parent.insert(root, None);

    let mut nodes: ZoneMap<NodeId, DomNode> = ZoneMap::new();
    for &n in &rpo {
        nodes.insert(
            n,
            DomNode {
                parent: parent.get(&n).copied().flatten(),
                children: Vec::new(),
                depth: 0,
                rpo: rpo_of.get(&n).copied().unwrap(),
            },
        );
    }
    // children lists, single pass over RPO (step 5)
    for &n in &rpo {
        if let Some(p) = nodes.get(&n).unwrap().parent {
            nodes.get_mut(&p).unwrap().children.push(n);
        }
    }
    // depths, root to leaves following RPO (a parent always precedes its child in RPO)
    for &n in &rpo {
        let depth = match nodes.get(&n).unwrap().parent {
            None => 0,
            Some(p) => nodes.get(&p).unwrap().depth + 1,
        };
        nodes.get_mut(&n).unwrap().depth = depth;
    }

    let mut tree = DominatorTree {
        root,
        nodes,
        frontiers: ZoneMap::new(),
    };
    build_frontiers(&view, &rpo, &mut tree);
    tree
}

/// Cooper/Harvey/Kennedy's intersect: walk both fingers up the tree using
/// RPO numbers, stepping whichever finger has the larger (later) RPO
/// position, until they meet (step 3).
fn intersect(
    mut a: NodeId,
    mut b: NodeId,
    parent: &ZoneMap<NodeId, Option<NodeId>>,
    rpo_of: &ZoneMap<NodeId, usize>,
) -> NodeId {
    let pos = |id: NodeId| *rpo_of.get(&id).expect("node must have an RPO position");
    while a != b {
        while pos(a) > pos(b) {
            a = parent.get(&a).copied().flatten().expect("finger walked past root");
        }
        while pos(b) > pos(a) {
            b = parent.get(&b).copied().flatten().expect("finger walked past root");
        }
    }
    a
}

fn build_frontiers<N>(view: &View<'_, N>, rpo: &[NodeId], tree: &mut DominatorTree) {
    for &n in rpo {
        let preds = view.preds(n);
        if preds.len() <= 1 {
            continue;
        }
        let idom = tree.parent_of(n);
        for &p in preds {
            let mut runner = p;
            loop {
                if Some(runner) == idom {
                    break;
                }
                let entry = tree.frontiers.entry_or_insert_with(runner, Vec::new);
                if !entry.contains(&n) {
                    entry.push(n);
                }
                match tree.parent_of(runner) {
                    Some(up) => runner = up,
                    None => break,
                }
            }
        }
    }
    // sort each frontier by RPO position for deterministic, order-independent output
    let rpo_pos = |id: NodeId| rpo.iter().position(|&x| x == id).unwrap_or(usize::MAX);
    for (_, frontier) in tree.frontiers.iter_mut() {
        frontier.sort_by_key(|&n| rpo_pos(n));
    }
}

fn reverse_postorder<N>(view: &View<'_, N>) -> Vec<NodeId> {
    let root = view.root();
    let mut visited = HashSet::default();
    let mut post = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
    visited.insert(root);
    while let Some(&mut (node, ref mut next)) = stack.last_mut() {
        let succs = view.succs(node);
        if *next < succs.len() {
            let child = succs[*next];
            *next += 1;
            if visited.insert(child) {
                stack.push((child, 0));
            }
        } else {
            post.push(node);
            stack.pop();
        }
    }
    post.reverse();
    post
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use pretty_assertions::assert_eq;

    /// Seven-block graph: 0->1, 0->6, 1->2, 1->4, 2->3, 2->5, 3->2,
    /// 3->4, 4->1, 4->6, 5->3.
    fn seven_block_graph() -> (Graph<u32>, Vec<NodeId>) {
        let mut g = Graph::new();
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
        (g, ids)
    }

    #[test]
    fn dominator_parents_and_frontiers() {
        let (g, ids) = seven_block_graph();
        let dt = build_forward(&g);
        assert_eq!(dt.parent_of(ids[1]), Some(ids[0]));
        assert_eq!(dt.parent_of(ids[2]), Some(ids[1]));
        assert_eq!(dt.parent_of(ids[3]), Some(ids[2]));
        assert_eq!(dt.parent_of(ids[4]), Some(ids[1]));
        assert_eq!(dt.parent_of(ids[5]), Some(ids[2]));
        assert_eq!(dt.parent_of(ids[6]), Some(ids[0]));
        assert_eq!(dt.parent_of(ids[0]), None);

        let idx = |n: &[NodeId]| -> Vec<usize> {
            n.iter().map(|&id| ids.iter().position(|&x| x == id).unwrap()).collect()
        };
        assert_eq!(idx(dt.frontier_of(ids[1])), vec![1, 6]);
        assert_eq!(idx(dt.frontier_of(ids[2])), vec![2, 4]);
        assert_eq!(idx(dt.frontier_of(ids[3])), vec![2, 4]);
        assert_eq!(idx(dt.frontier_of(ids[4])), vec![1, 6]);
        assert_eq!(idx(dt.frontier_of(ids[5])), vec![3]);
    }

    #[test]
    fn dominates_is_ancestor_relation() {
        let (g, ids) = seven_block_graph();
        let dt = build_forward(&g);
        assert!(dt.dominates(ids[0], ids[5]));
        assert!(dt.dominates(ids[1], ids[5]));
        assert!(!dt.dominates(ids[4], ids[5]));
        assert!(dt.dominates(ids[5], ids[5]));
    }

    #[test]
    fn backward_tree_roots_at_exit() {
        let (g, ids) = seven_block_graph();
        let pdt = build_backward(&g);
        assert_eq!(pdt.root(), ids[6]);
    }
}
