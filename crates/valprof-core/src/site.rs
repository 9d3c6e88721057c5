//! Per-site value lists.
//!
//! Each instrumentation site owns a table of head slots, one per counter
//! index. A head starts a singly-linked chain of arena records. Chains only
//! grow at the tail and records are never unlinked, so a concurrent reader
//! sees either the old tail or the fully initialized new one.
//!
//! A new record is always allocated after every record already in its
//! chain, so links point to strictly increasing slot indices. Traversal
//! stops on any link that breaks this ordering, which bounds every scan by
//! the arena capacity regardless of what a racing reset does.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::arena::{NodeArena, NodeLink, ValueNode};

/// Head of one site's value list.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct HeadSlot(AtomicU32);

impl HeadSlot {
    /// An empty head, usable in `static` tables.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    #[must_use]
    pub fn load(&self) -> NodeLink {
        NodeLink::from_raw(self.0.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load().is_none()
    }

    pub(crate) fn publish(&self, link: NodeLink) {
        self.0.store(link.raw(), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Per-site metadata supplied by the instrumented program.
///
/// `values` is `None` when the site was never set up for value profiling;
/// observations against such a site are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteDescriptor<'a> {
    values: Option<&'a [HeadSlot]>,
}

impl<'a> SiteDescriptor<'a> {
    #[must_use]
    pub const fn new(values: &'a [HeadSlot]) -> Self {
        Self {
            values: Some(values),
        }
    }

    #[must_use]
    pub const fn uninitialized() -> Self {
        Self { values: None }
    }

    #[must_use]
    pub const fn values(&self) -> Option<&'a [HeadSlot]> {
        self.values
    }

    /// Head slot for `index`, if the table exists and covers it.
    #[must_use]
    pub fn head(&self, index: u32) -> Option<&'a HeadSlot> {
        self.values?.get(usize::try_from(index).ok()?)
    }
}

/// Outcome of looking a value up in a list.
#[derive(Debug)]
pub(crate) enum Scan<'a> {
    Hit(&'a ValueNode),
    Miss {
        len: usize,
        /// First record with the smallest count.
        min: Option<&'a ValueNode>,
        tail: Option<&'a ValueNode>,
    },
}

/// View of one site's value list inside the arena.
#[derive(Debug, Clone, Copy)]
pub struct ValueList<'a> {
    arena: &'a NodeArena,
    head: &'a HeadSlot,
}

impl<'a> ValueList<'a> {
    #[must_use]
    pub fn new(arena: &'a NodeArena, head: &'a HeadSlot) -> Self {
        Self { arena, head }
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> Records<'a> {
        Records {
            arena: self.arena,
            cursor: self.head.load(),
            last: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_empty()
    }

    pub(crate) fn scan(&self, value: u64) -> Scan<'a> {
        let mut len = 0;
        let mut min: Option<&'a ValueNode> = None;
        let mut min_count = u64::MAX;
        let mut tail = None;

        for node in self.records() {
            if node.value() == value {
                return Scan::Hit(node);
            }
            let count = node.count();
            if min.is_none() || count < min_count {
                min_count = count;
                min = Some(node);
            }
            tail = Some(node);
            len += 1;
        }

        Scan::Miss { len, min, tail }
    }

    /// Link `link` after `tail`, or make it the head when the list is empty.
    /// Caller holds the allocation lock and has initialized the record.
    pub(crate) fn append(&self, tail: Option<&ValueNode>, link: NodeLink) {
        match tail {
            Some(tail) => tail.link_next(link),
            None => self.head.publish(link),
        }
    }
}

/// Iterator over a value list.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    arena: &'a NodeArena,
    cursor: NodeLink,
    last: Option<usize>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a ValueNode;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor.index()?;
        if self.last.is_some_and(|last| index <= last) {
            return None;
        }
        let node = self.arena.get(self.cursor)?;
        self.last = Some(index);
        self.cursor = node.next();
        Some(node)
    }
}
