//! `NameState`: one node of the name tier (spec §3/§4.2). Each instance
//! owns, per dotted-path key reaching it, an optional `ByteMachine` (value
//! patterns) and an optional `NameMatcher` (the "key must be absent" edge).
//! It also carries the sub-rule bookkeeping for every pattern terminating
//! or passing through it.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use crate::byte_machine::ByteMachine;
use crate::event::Event;
use crate::pattern::Pattern;
use crate::state_id::NameStateId;

/// Identifies one alternative way a rule can be satisfied (spec §3/§4.3).
/// A rule with disjunctive pattern lists compiles into one sub-rule per
/// combination of key→pattern choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubRuleId(u64);

#[derive(Debug, Default)]
pub(crate) struct SubRuleIdAllocator(AtomicU64);

impl SubRuleIdAllocator {
    pub(crate) fn next(&self) -> SubRuleId {
        SubRuleId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// The "key not present" edge (spec §4.2/§4.4): reached when the named key
/// does not appear, with consistent array membership, among an event's
/// fields.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NameMatcher {
    pub(crate) next: NameStateId,
}

/// Per-pattern sub-rule-id bookkeeping, split into terminal (this
/// `NameState` is the last key of the sub-rule) and non-terminal sets
/// (spec §4.2 invariant: "a sub-rule is terminal in exactly one
/// NameState, its last").
#[derive(Debug, Default)]
struct SubRuleIndex {
    terminal: DashMap<Pattern, DashSet<SubRuleId>>,
    non_terminal: DashMap<Pattern, DashSet<SubRuleId>>,
    /// Reverse lookup so `contains_rule`/`delete_sub_rule` don't need to
    /// scan every pattern's set.
    rule_names: DashMap<SubRuleId, String>,
}

pub struct NameState {
    pub(crate) value_transitions: DashMap<String, ByteMachine>,
    pub(crate) must_not_exist_matchers: DashMap<String, NameMatcher>,
    sub_rules: SubRuleIndex,
}

impl Default for NameState {
    fn default() -> Self {
        NameState {
            value_transitions: DashMap::new(),
            must_not_exist_matchers: DashMap::new(),
            sub_rules: SubRuleIndex::default(),
        }
    }
}

impl NameState {
    pub(crate) fn get_transition_on(&self, key: &str) -> Option<dashmap::mapref::one::Ref<'_, String, ByteMachine>> {
        self.value_transitions.get(key)
    }

    pub(crate) fn get_key_transition_on(&self, key: &str) -> Option<NameMatcher> {
        self.must_not_exist_matchers.get(key).map(|m| *m)
    }

    pub(crate) fn add_transition(&self, key: &str) -> dashmap::mapref::one::RefMut<'_, String, ByteMachine> {
        self.value_transitions
            .entry(key.to_string())
            .or_insert_with(ByteMachine::default);
        self.value_transitions.get_mut(key).expect("just inserted")
    }

    pub(crate) fn add_key_transition(&self, key: &str, matcher: NameMatcher) {
        self.must_not_exist_matchers.insert(key.to_string(), matcher);
    }

    pub(crate) fn remove_transition(&self, key: &str) {
        self.value_transitions.remove(key);
    }

    pub(crate) fn remove_key_transition(&self, key: &str) {
        self.must_not_exist_matchers.remove(key);
    }

    pub(crate) fn remove_next_name_state(&self, key: &str) {
        self.remove_transition(key);
        self.remove_key_transition(key);
    }

    pub(crate) fn add_sub_rule(&self, rule_name: &str, id: SubRuleId, pattern: &Pattern, is_terminal: bool) {
        let map = if is_terminal { &self.sub_rules.terminal } else { &self.sub_rules.non_terminal };
        map.entry(pattern.clone()).or_insert_with(DashSet::new).insert(id);
        self.sub_rules.rule_names.insert(id, rule_name.to_string());
    }

    /// Returns true if a deletion occurred (spec §4.2).
    pub(crate) fn delete_sub_rule(&self, id: SubRuleId, pattern: &Pattern, is_terminal: bool) -> bool {
        let map = if is_terminal { &self.sub_rules.terminal } else { &self.sub_rules.non_terminal };
        let removed = map
            .get(pattern)
            .map(|set| set.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            if map.get(pattern).map(|set| set.is_empty()).unwrap_or(false) {
                map.remove(pattern);
            }
            if !self.contains_sub_rule_id(id) {
                self.sub_rules.rule_names.remove(&id);
            }
        }
        removed
    }

    fn contains_sub_rule_id(&self, id: SubRuleId) -> bool {
        self.sub_rules.terminal.iter().any(|e| e.value().contains(&id))
            || self.sub_rules.non_terminal.iter().any(|e| e.value().contains(&id))
    }

    pub(crate) fn terminal_sub_rule_ids_for_pattern(&self, pattern: &Pattern) -> Option<BTreeSet<SubRuleId>> {
        self.sub_rules.terminal.get(pattern).map(|set| set.iter().map(|r| *r).collect())
    }

    pub(crate) fn non_terminal_sub_rule_ids_for_pattern(&self, pattern: &Pattern) -> Option<BTreeSet<SubRuleId>> {
        self.sub_rules.non_terminal.get(pattern).map(|set| set.iter().map(|r| *r).collect())
    }

    pub(crate) fn terminal_patterns(&self) -> Vec<Pattern> {
        self.sub_rules.terminal.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn non_terminal_patterns(&self) -> Vec<Pattern> {
        self.sub_rules.non_terminal.iter().map(|e| e.key().clone()).collect()
    }

    pub(crate) fn contains_rule(&self, rule_name: &str, pattern: &Pattern) -> bool {
        let ids = self
            .sub_rules
            .terminal
            .get(pattern)
            .map(|s| s.iter().map(|r| *r).collect::<Vec<_>>())
            .unwrap_or_default();
        ids.into_iter().any(|id| {
            self.sub_rules
                .rule_names
                .get(&id)
                .map(|n| n.as_str() == rule_name)
                .unwrap_or(false)
        })
    }

    pub(crate) fn rule_name_for(&self, id: SubRuleId) -> Option<String> {
        self.sub_rules.rule_names.get(&id).map(|r| r.clone())
    }

    /// spec §4.2/§4.4: every registered "must not exist" matcher whose key
    /// is absent (with consistent array membership) from `event`'s fields
    /// contributes its next `NameState`.
    pub(crate) fn get_name_transitions(
        &self,
        event: &Event,
        membership_so_far: &crate::event::ArrayMembership,
    ) -> Vec<NameStateId> {
        self.must_not_exist_matchers
            .iter()
            .filter(|entry| !event.has_consistent_field(entry.key(), membership_so_far))
            .map(|entry| entry.value().next)
            .collect()
    }

    pub(crate) fn has_key_transitions(&self) -> bool {
        !self.must_not_exist_matchers.is_empty()
    }

    pub(crate) fn has_transitions(&self) -> bool {
        !self.value_transitions.is_empty() || !self.must_not_exist_matchers.is_empty()
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.has_transitions() && self.sub_rules.terminal.is_empty() && self.sub_rules.non_terminal.is_empty()
    }
}
