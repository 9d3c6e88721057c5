//! Fixed-capacity arena of value records.
//!
//! Every record for every instrumentation site lives in one contiguous,
//! pre-sized region. Slots are handed out by a monotonic cursor and are
//! never freed individually; eviction recycles a record in place.
//!
//! The cursor is only reachable through `&mut AllocCursor`, which the store
//! keeps behind its allocation lock, so allocation cannot happen unlocked.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::ArenaError;

/// Largest slot count a region may have; index + 1 must fit in a `NodeLink`.
pub const MAX_NODES: usize = (u32::MAX - 1) as usize;

/// One `(value, count, next)` record.
///
/// `value` and `count` use relaxed loads and stores only. Increments are a
/// plain load followed by a store, so concurrent observers may lose updates
/// but never tear a field. `next` is published with release ordering after
/// the record is initialized.
#[derive(Debug)]
pub struct ValueNode {
    value: AtomicU64,
    count: AtomicU64,
    next: AtomicU32,
}

impl ValueNode {
    /// An unused, zeroed record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
            count: AtomicU64::new(0),
            next: AtomicU32::new(0),
        }
    }

    /// Observed value stored in this record.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Approximate occurrence count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Link to the next record of the same site.
    #[must_use]
    pub fn next(&self) -> NodeLink {
        NodeLink(self.next.load(Ordering::Acquire))
    }

    /// Overwrite the payload. Used on insert and on eviction.
    pub(crate) fn install(&self, value: u64, count: u64) {
        self.value.store(value, Ordering::Relaxed);
        self.count.store(count, Ordering::Relaxed);
    }

    pub(crate) fn set_count(&self, count: u64) {
        self.count.store(count, Ordering::Relaxed);
    }

    /// Unsynchronized saturating increment. Lost updates are accepted.
    pub(crate) fn bump(&self) {
        let count = self.count.load(Ordering::Relaxed);
        self.count.store(count.saturating_add(1), Ordering::Relaxed);
    }

    pub(crate) fn link_next(&self, link: NodeLink) {
        self.next.store(link.0, Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.next.store(0, Ordering::Release);
        self.install(0, 0);
    }
}

impl Default for ValueNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Arena-relative reference to a record. `NodeLink::NONE` ends a list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeLink(u32);

impl NodeLink {
    pub const NONE: Self = Self(0);

    /// Link to slot `index`, if the index is representable.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= MAX_NODES {
            return None;
        }
        Some(Self(index as u32 + 1))
    }

    /// Slot index, or `None` for the terminator.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self.0 {
            0 => None,
            raw => Some(raw as usize - 1),
        }
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) const fn raw(self) -> u32 {
        self.0
    }
}

enum Backing {
    Owned(Box<[ValueNode]>),
    Region(&'static [ValueNode]),
}

/// Pre-sized pool of value records shared by all sites.
pub struct NodeArena {
    backing: Backing,
}

impl NodeArena {
    /// Reserve an owned region of `capacity` records (clamped to `MAX_NODES`).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_NODES);
        let nodes: Vec<ValueNode> = (0..capacity).map(|_| ValueNode::new()).collect();
        Self {
            backing: Backing::Owned(nodes.into_boxed_slice()),
        }
    }

    /// Use a region provided by the embedding environment, e.g. a static
    /// reserved at link time. Slots past `MAX_NODES` are ignored.
    #[must_use]
    pub fn from_region(region: &'static [ValueNode]) -> Self {
        let usable = region.len().min(MAX_NODES);
        Self {
            backing: Backing::Region(&region[..usable]),
        }
    }

    fn nodes(&self) -> &[ValueNode] {
        match &self.backing {
            Backing::Owned(nodes) => &nodes[..],
            Backing::Region(nodes) => &nodes[..],
        }
    }

    /// Number of slots in the region.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.nodes().len()
    }

    /// Bounds-checked dereference of a link.
    #[must_use]
    pub fn get(&self, link: NodeLink) -> Option<&ValueNode> {
        self.nodes().get(link.index()?)
    }

    pub(crate) fn clear_all(&self) {
        for node in self.nodes() {
            node.clear();
        }
    }
}

impl fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backing {
            Backing::Owned(_) => "owned",
            Backing::Region(_) => "region",
        };
        f.debug_struct("NodeArena")
            .field("backing", &kind)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Monotonic allocation cursor into a `NodeArena`.
#[derive(Debug, Default)]
pub struct AllocCursor {
    next: usize,
}

impl AllocCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Slots handed out so far.
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.next
    }

    /// Hand out the next unused slot of `arena`.
    ///
    /// Both the slot itself and the position just past it must lie inside
    /// the region, so a record can never hang off the end of the backing
    /// memory. On failure the cursor does not move.
    pub fn allocate_next(&mut self, arena: &NodeArena) -> Result<NodeLink, ArenaError> {
        let end = arena.capacity();
        let exhausted = ArenaError::Exhausted { capacity: end };
        let slot = self.next;
        let past = slot.checked_add(1).ok_or(exhausted)?;
        if slot >= end || past > end {
            return Err(exhausted);
        }
        let link = NodeLink::from_index(slot).ok_or(exhausted)?;
        self.next = past;
        Ok(link)
    }

    pub(crate) fn rewind(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_encoding_reserves_zero_for_none() {
        assert!(NodeLink::NONE.is_none());
        assert_eq!(NodeLink::NONE.index(), None);
        let link = NodeLink::from_index(0).unwrap();
        assert!(!link.is_none());
        assert_eq!(link.index(), Some(0));
        assert_eq!(NodeLink::from_index(41).unwrap().index(), Some(41));
        assert_eq!(NodeLink::from_index(MAX_NODES), None);
    }

    #[test]
    fn allocates_every_slot_then_reports_exhausted() {
        let arena = NodeArena::with_capacity(4);
        let mut cursor = AllocCursor::new();
        for expected in 0..4 {
            let link = cursor.allocate_next(&arena).expect("slot available");
            assert_eq!(link.index(), Some(expected));
            assert!(arena.get(link).is_some());
        }
        assert_eq!(
            cursor.allocate_next(&arena),
            Err(ArenaError::Exhausted { capacity: 4 })
        );
        assert_eq!(cursor.allocated(), 4, "failed allocation must not move the cursor");
        assert_eq!(
            cursor.allocate_next(&arena),
            Err(ArenaError::Exhausted { capacity: 4 })
        );
    }

    #[test]
    fn empty_arena_is_immediately_exhausted() {
        let arena = NodeArena::with_capacity(0);
        let mut cursor = AllocCursor::new();
        assert!(cursor.allocate_next(&arena).is_err());
        assert_eq!(cursor.allocated(), 0);
    }

    #[test]
    fn get_rejects_links_past_the_region() {
        let arena = NodeArena::with_capacity(2);
        assert!(arena.get(NodeLink::NONE).is_none());
        assert!(arena.get(NodeLink::from_index(1).unwrap()).is_some());
        assert!(arena.get(NodeLink::from_index(2).unwrap()).is_none());
        assert!(arena.get(NodeLink::from_raw(u32::MAX)).is_none());
    }

    #[test]
    fn static_region_backs_the_arena() {
        static REGION: [ValueNode; 3] = [const { ValueNode::new() }; 3];
        let arena = NodeArena::from_region(&REGION);
        assert_eq!(arena.capacity(), 3);
        let mut cursor = AllocCursor::new();
        let link = cursor.allocate_next(&arena).unwrap();
        arena.get(link).unwrap().install(7, 1);
        assert_eq!(REGION[0].value(), 7);
        assert_eq!(REGION[0].count(), 1);
    }

    #[test]
    fn bump_saturates() {
        let node = ValueNode::new();
        node.install(1, u64::MAX - 1);
        node.bump();
        node.bump();
        assert_eq!(node.count(), u64::MAX);
    }

    #[test]
    fn clear_resets_payload_and_link() {
        let arena = NodeArena::with_capacity(2);
        let first = arena.get(NodeLink::from_index(0).unwrap()).unwrap();
        first.install(9, 3);
        first.link_next(NodeLink::from_index(1).unwrap());
        arena.clear_all();
        assert_eq!(first.value(), 0);
        assert_eq!(first.count(), 0);
        assert!(first.next().is_none());
    }
}
