//! `ByteState`/`ByteTransition`/`ByteMatch`: the value-tier's NFA (spec §3).
//!
//! `ByteMatch` identity is by allocation instance, not by structural
//! equality — two matches on an equal `Pattern` reaching the same next
//! state are still distinct entities if they were installed by separate
//! `add_pattern` calls (spec §3 invariant 1 is what keeps this from
//! happening for *duplicate* adds: a duplicate add reuses the existing
//! match rather than allocating a new one).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::pattern::Pattern;
use crate::state_id::{ByteStateId, NameStateId};

static MATCH_INSTANCE_ALLOC: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub(crate) struct ByteMatch {
    instance: u64,
    pub(crate) pattern: Pattern,
    pub(crate) next_name_state: NameStateId,
}

impl ByteMatch {
    pub(crate) fn new(pattern: Pattern, next_name_state: NameStateId) -> Arc<ByteMatch> {
        Arc::new(ByteMatch {
            instance: MATCH_INSTANCE_ALLOC.fetch_add(1, Ordering::Relaxed),
            pattern,
            next_name_state,
        })
    }
}

impl PartialEq for ByteMatch {
    fn eq(&self, other: &Self) -> bool {
        self.instance == other.instance
    }
}
impl Eq for ByteMatch {}

/// One NFA edge. A single byte can fan out to several of these at once —
/// that's the "NFA" in "byte-level NFA/DFA hybrid".
#[derive(Clone, Debug)]
pub(crate) enum ByteTransition {
    /// Simple advance, no match fires here.
    SingleNextState(ByteStateId),
    /// Advances *and* fires a terminal match at this position — used for a
    /// wildcard immediately followed by the end of the pattern.
    Composite {
        next: ByteStateId,
        terminal: Arc<ByteMatch>,
    },
    /// Elides the remaining intermediate states for an exact/equals-ignore-
    /// case match whose suffix from here on is unique in the machine.
    /// `remaining` is compared against the rest of the input value
    /// wholesale rather than byte-by-byte.
    Shortcut {
        remaining: Vec<u8>,
        terminal: Arc<ByteMatch>,
    },
}

impl ByteTransition {
    /// "A transition may be expanded into its singleton constituents for
    /// uniform iteration" (spec §3). A `Composite` yields both effects: an
    /// advancement and a match. A plain advance yields just itself.
    pub(crate) fn expand(&self) -> (Option<ByteStateId>, Option<&Arc<ByteMatch>>) {
        match self {
            ByteTransition::SingleNextState(next) => (Some(*next), None),
            ByteTransition::Composite { next, terminal } => (Some(*next), Some(terminal)),
            ByteTransition::Shortcut { terminal, .. } => (None, Some(terminal)),
        }
    }
}

/// Sorted-by-byte edge list, binary-searched — same shape as the single
/// automaton's transition table, generalized to hold a *set* of edges per
/// byte instead of one.
#[derive(Clone, Debug, Default)]
pub(crate) struct ByteTransitions(Vec<(u8, Vec<ByteTransition>)>);

impl ByteTransitions {
    pub(crate) fn get(&self, byte: u8) -> &[ByteTransition] {
        match self.0.binary_search_by_key(&byte, |&(b, _)| b) {
            Ok(i) => &self.0[i].1,
            Err(_) => &[],
        }
    }

    pub(crate) fn entry(&mut self, byte: u8) -> &mut Vec<ByteTransition> {
        match self.0.binary_search_by_key(&byte, |&(b, _)| b) {
            Ok(i) => &mut self.0[i].1,
            Err(i) => {
                self.0.insert(i, (byte, Vec::new()));
                &mut self.0[i].1
            }
        }
    }

    pub(crate) fn clear_byte(&mut self, byte: u8) {
        if let Ok(i) = self.0.binary_search_by_key(&byte, |&(b, _)| b) {
            if self.0[i].1.is_empty() {
                self.0.remove(i);
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u8, &ByteTransition)> {
        self.0
            .iter()
            .flat_map(|(b, ts)| ts.iter().map(move |t| (*b, t)))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.iter().all(|(_, ts)| ts.is_empty())
    }
}

/// One node of the value tier.
#[derive(Clone, Debug, Default)]
pub(crate) struct ByteState {
    pub(crate) trans: ByteTransitions,
    /// "all-bytes" transition: entered on any byte, used for wildcard
    /// self-loops.
    pub(crate) all_bytes: Option<Vec<ByteTransition>>,
    /// Fires regardless of how many more bytes remain — the mechanism
    /// behind both a bare `*` (installed on the start state) and a
    /// trailing `*` (installed on the state reached just before it), per
    /// spec §4.1's "second-last character wildcard" rule: both are really
    /// the same thing, "a match that doesn't require consuming the rest
    /// of the value."
    pub(crate) epsilon_match: Option<Arc<ByteMatch>>,
    /// Set the first time `ensure_advance` hands this state out as a reuse
    /// target, i.e. once a second distinct value prefix is known to lead
    /// here. Gates further reuse when this state also carries a wildcard
    /// self-loop (spec §4.1 "next-state reuse rules": indeterminate-prefix
    /// states must not be reused down a path that would converge two
    /// unrelated patterns onto the same self-loop).
    pub(crate) indeterminate_prefix: bool,
}

impl ByteState {
    pub(crate) fn is_empty(&self) -> bool {
        self.trans.is_empty() && self.all_bytes.is_none() && self.epsilon_match.is_none()
    }
}
