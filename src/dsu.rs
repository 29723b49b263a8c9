//! Disjoint-set union (component H): union-by-rank with path compression,
//! used by the conflict-map builder (component M) to track which virtual
//! registers must not share a physical register.

use rustc_hash::FxHashMap as HashMap;
use std::hash::Hash;

struct SetEntry {
    parent: usize,
    rank: u32,
}

/// A disjoint-set union over elements of type `T`. Elements are mapped to
/// dense internal indices on first sight via `make_set`, so `T` only needs
/// `Eq + Hash + Clone`, not a pre-known dense numbering (unlike `Bitset`,
/// which does require one).
pub struct DisjointSetUnion<T: Eq + Hash + Clone> {
    index_of: HashMap<T, usize>,
    entries: Vec<SetEntry>,
}

impl<T: Eq + Hash + Clone> DisjointSetUnion<T> {
    pub fn new() -> Self {
        DisjointSetUnion {
            index_of: HashMap::default(),
            entries: Vec::new(),
        }
    }

    pub fn make_set(&mut self, t: T) -> usize {
        if let Some(&idx) = self.index_of.get(&t) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(SetEntry { parent: idx, rank: 0 });
        self.index_of.insert(t, idx);
        idx
    }

    fn find_idx(&mut self, x: usize) -> usize {
        if self.entries[x].parent != x {
            let root = self.find_idx(self.entries[x].parent);
            self.entries[x].parent = root; // path compression
            root
        } else {
            x
        }
    }

    /// Finds the representative of `t`'s set, inserting it as a fresh
    /// singleton set if it has not been seen before.
    pub fn find(&mut self, t: &T) -> usize {
        let idx = self.make_set(t.clone());
        self.find_idx(idx)
    }

    /// Unions the sets containing `a` and `b` (union-by-rank).
    pub fn union(&mut self, a: &T, b: &T) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (ra, rb) = if self.entries[ra].rank < self.entries[rb].rank {
            (rb, ra)
        } else {
            (ra, rb)
        };
        self.entries[rb].parent = ra;
        if self.entries[ra].rank == self.entries[rb].rank {
            self.entries[ra].rank += 1;
        }
    }

    pub fn in_same_set(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    /// Current tree depth from `t` to its root, without path compression.
    /// Test-only: used to assert path compression actually shortens chains.
    #[cfg(test)]
    fn depth_uncompressed(&self, t: &T) -> usize {
        let mut idx = self.index_of[t];
        let mut depth = 0;
        while self.entries[idx].parent != idx {
            idx = self.entries[idx].parent;
            depth += 1;
        }
        depth
    }
}

impl<T: Eq + Hash + Clone> Default for DisjointSetUnion<T> {
    fn default() -> Self {
        Self::new()
    }
}
