//! Arena & collections (component A).
//!
//! `core_lang`'s `Context` owns one `generational_arena::Arena<T>` per node
//! kind and refers to entries by a newtype around `generational_arena::Index`
//! (see `ir/block.rs`, `ir/value.rs`). That is the same move this crate makes
//! for the cyclic object graphs in HIR/LIR: node identifiers (stable indices)
//! instead of pointer cycles, with the arena as sole owner.
//!
//! A `Zone<T>` here *is* that arena: bump-allocated in the sense that nodes
//! are never individually freed or destructed, only reclaimed in bulk when
//! the zone itself (and the `Context`/`Compilation` that owns it) is dropped.
//! `generational_arena` additionally recycles freed slots and stamps a
//! generation, which is strictly safer than raw bump allocation and is the
//! idiomatic Rust rendition of a "destructor-less, zone-owned object" that
//! Design Notes calls for.

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::hash::Hash;

/// A bump-allocated collection of `T`, handed out as stable `Handle<T>`s.
/// Dropping the zone drops every object it allocated; nothing in this crate
/// hands out a destructor for an individual zone member.
#[derive(Debug)]
pub struct Zone<T> {
    arena: generational_arena::Arena<T>,
}

pub type Handle<T> = generational_arena::Index;

impl<T> Zone<T> {
    pub fn new() -> Self {
        Zone {
            arena: generational_arena::Arena::new(),
        }
    }

    pub fn alloc(&mut self, value: T) -> Handle<T> {
        self.arena.insert(value)
    }

    pub fn get(&self, handle: Handle<T>) -> &T {
        &self.arena[handle]
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.arena[handle]
    }

    pub fn try_get(&self, handle: Handle<T>) -> Option<&T> {
        self.arena.get(handle)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.arena.iter()
    }

    /// Drops a single member ahead of the zone's own teardown. `Zone`
    /// otherwise promises every member lives exactly as long as the zone;
    /// `graph::GraphEditor::remove_node` is the one place in this crate that
    /// needs to break that promise, for dead-block pruning and critical-edge
    /// splitting, so the escape hatch is `pub(crate)` rather than part of
    /// `Zone`'s public contract.
    pub(crate) fn remove_raw(&mut self, handle: Handle<T>) -> Option<T> {
        self.arena.remove(handle)
    }
}

impl<T> Default for Zone<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<Handle<T>> for Zone<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &T {
        &self.arena[handle]
    }
}

impl<T> std::ops::IndexMut<Handle<T>> for Zone<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.arena[handle]
    }
}

/// Defines a `Copy`-able newtype wrapping a `Handle<$content>`, the same
/// shape as `core_lang`'s `pub(crate) struct Block(generational_arena::Index)`
/// repeated by hand for `Module`, `Function`, `Block`, `Value`, `Pointer` and
/// `Aggregate`. One declaration site keeps the six call sites here in sync.
macro_rules! zone_handle {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($content:ty);) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        $vis struct $name(pub(crate) $crate::zone::Handle<$content>);
    };
}

pub(crate) use zone_handle;

/// Unordered key -> value mapping scoped to a zone-owner's lifetime.
/// Insertion order is not meaningful, matching "Zone" data
/// model ("mapping K->V (unordered, insertion order irrelevant)").
#[derive(Debug, Clone, Default)]
pub struct ZoneMap<K: Eq + Hash, V>(HashMap<K, V>);

impl<K: Eq + Hash, V> ZoneMap<K, V> {
    pub fn new() -> Self {
        ZoneMap(HashMap::default())
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.0.iter_mut()
    }

    pub fn entry_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> &mut V {
        self.0.entry(key).or_insert_with(f)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unordered set of `T` scoped to a zone-owner's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ZoneSet<T: Eq + Hash>(HashSet<T>);

impl<T: Eq + Hash + Copy> ZoneSet<T> {
    pub fn new() -> Self {
        ZoneSet(HashSet::default())
    }

    pub fn insert(&mut self, value: T) -> bool {
        self.0.insert(value)
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.0.remove(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.0.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Insertion-ordered sequence of `T` with duplicate suppression on insert.
#[derive(Debug, Clone, Default)]
pub struct OrderedList<T> {
    items: Vec<T>,
}

impl<T: Eq> OrderedList<T> {
    pub fn new() -> Self {
        OrderedList { items: Vec::new() }
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        OrderedList { items }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// O(1) position lookup is the point of this type over a bare `Vec`;
    /// backed here by linear search since `T` carries no index of its own.
    /// Callers that need true O(1) lookups build a side `ZoneMap<T, usize>`
    /// (see `graph::sorter`, which does exactly that).
    pub fn position(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> IntoIterator for OrderedList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A type that embeds a zone whose lifetime equals the owner's own.
pub trait ZoneOwner<T> {
    fn zone(&self) -> &Zone<T>;
    fn zone_mut(&mut self) -> &mut Zone<T>;
}
