//! Handle types for the two arenas the matcher maintains: one for
//! [`NameState`](crate::name_state::NameState) nodes (the name tier) and one
//! for `ByteState` nodes (the value tier, scoped to a single `ByteMachine`).
//!
//! Cyclic references (wildcard self-loops in the value tier, shared
//! next-states in the name tier) are expressed as indices into a `Vec`
//! rather than `Rc`/`Arc` back-edges, per the "arena-allocated nodes
//! referenced by identifier" design note. This is the same shape as the
//! `StateID`-indexed `Vec<State>` arena the original automaton used, split
//! across two cooperating tiers instead of one.

use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel meaning "no such state" (e.g. a transition that goes nowhere).
pub(crate) const NULL: u32 = u32::MAX;

/// Handle into the name-tier arena, shared by the whole [`GenericMachine`](crate::generic_machine::GenericMachine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameStateId(pub(crate) u32);

impl NameStateId {
    #[inline]
    pub(crate) fn to_usize(self) -> usize {
        self.0 as usize
    }
}

/// Handle into one `ByteMachine`'s private value-tier arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ByteStateId(pub(crate) u32);

impl ByteStateId {
    pub(crate) const NULL: ByteStateId = ByteStateId(NULL);

    #[inline]
    pub(crate) fn to_usize(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn is_null(self) -> bool {
        self.0 == NULL
    }
}

/// Monotonic id allocator shared by a single arena. Allocation order carries
/// no meaning beyond uniqueness — ids are never reused, so a stale handle
/// from a deleted state can never collide with a fresh one.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator(AtomicU32);

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub(crate) fn next(&self) -> u32 {
        let id = self.0.fetch_add(1, Ordering::Relaxed);
        assert!(id != NULL, "state id space exhausted");
        id
    }
}
