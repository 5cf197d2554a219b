//! `GenericMachine<R>`: the incremental, concurrent-safe rule compiler and
//! owner of the name-tier arena (spec §4.3). `R` is the caller's rule-name
//! type — anything `Clone + Display` can stand in for the "any-hashable"
//! rule name the spec describes; internally every rule is addressed by its
//! `to_string()` form, which is also what `NameState`'s sub-rule bookkeeping
//! stores.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::{DuplicateKeyPolicy, MachineConfig};
use crate::error::{Error, Result};
use crate::name_state::{NameMatcher, NameState, SubRuleId, SubRuleIdAllocator};
use crate::pattern::Pattern;
use crate::state_id::NameStateId;
use crate::telemetry;

/// One (key, disjunctive pattern list) step of a rule compilation, in the
/// order the external compiler produced it — may contain duplicate keys,
/// which `MachineConfig::duplicate_key_policy` resolves.
pub type RulePatterns = Vec<(String, Vec<Pattern>)>;

struct NameStateArena {
    states: ArcSwap<Vec<Arc<NameState>>>,
}

impl Default for NameStateArena {
    fn default() -> Self {
        NameStateArena {
            states: ArcSwap::new(Arc::new(vec![Arc::new(NameState::default())])),
        }
    }
}

impl NameStateArena {
    fn get(&self, id: NameStateId) -> Arc<NameState> {
        self.states.load()[id.to_usize()].clone()
    }

    /// Only ever called with the writer mutex held.
    fn alloc(&self) -> NameStateId {
        let current = self.states.load();
        let mut next = (**current).clone();
        let id = NameStateId(next.len() as u32);
        next.push(Arc::new(NameState::default()));
        self.states.store(Arc::new(next));
        id
    }
}

pub struct GenericMachine<R> {
    config: MachineConfig,
    arena: NameStateArena,
    sub_rule_ids: SubRuleIdAllocator,
    write_lock: Mutex<()>,
    field_step_used_refcount: DashMap<String, AtomicUsize>,
    rule_names: DashMap<String, R>,
}

impl<R> Default for GenericMachine<R> {
    fn default() -> Self {
        GenericMachine {
            config: MachineConfig::default(),
            arena: NameStateArena::default(),
            sub_rule_ids: SubRuleIdAllocator::default(),
            write_lock: Mutex::new(()),
            field_step_used_refcount: DashMap::new(),
            rule_names: DashMap::new(),
        }
    }
}

impl<R> GenericMachine<R>
where
    R: Clone + std::fmt::Display,
{
    pub fn new(config: MachineConfig) -> Self {
        GenericMachine {
            config,
            arena: NameStateArena::default(),
            sub_rule_ids: SubRuleIdAllocator::default(),
            write_lock: Mutex::new(()),
            field_step_used_refcount: DashMap::new(),
            rule_names: DashMap::new(),
        }
    }

    pub(crate) fn root(&self) -> NameStateId {
        NameStateId(0)
    }

    pub(crate) fn name_state(&self, id: NameStateId) -> Arc<NameState> {
        self.arena.get(id)
    }

    pub(crate) fn rule_name_for_canonical(&self, canonical: &str) -> Option<R> {
        self.rule_names.get(canonical).map(|r| r.clone())
    }

    pub fn has_field_step(&self, key: &str) -> bool {
        self.field_step_used_refcount.contains_key(key)
    }

    fn normalize_keys(&self, patterns: RulePatterns) -> Result<BTreeMap<String, Vec<Pattern>>> {
        let mut map: BTreeMap<String, Vec<Pattern>> = BTreeMap::new();
        for (key, pats) in patterns {
            if map.contains_key(&key) {
                match self.config.duplicate_key_policy {
                    DuplicateKeyPolicy::RejectDuplicate => {
                        return Err(Error::DuplicateKeyRejected { key });
                    }
                    DuplicateKeyPolicy::LatestWins => {
                        map.insert(key, pats);
                    }
                }
            } else {
                map.insert(key, pats);
            }
        }
        Ok(map)
    }

    fn install_pattern_edge(&self, ns: &NameState, key: &str, pattern: &Pattern) -> NameStateId {
        match pattern {
            Pattern::Absent => {
                if let Some(m) = ns.get_key_transition_on(key) {
                    m.next
                } else {
                    let next = self.arena.alloc();
                    ns.add_key_transition(key, NameMatcher { next });
                    next
                }
            }
            _ => {
                let bm = ns.add_transition(key);
                bm.add_pattern(pattern.clone(), || self.arena.alloc())
            }
        }
    }

    fn find_pattern_edge(&self, ns: &NameState, key: &str, pattern: &Pattern) -> Option<NameStateId> {
        match pattern {
            Pattern::Absent => ns.get_key_transition_on(key).map(|m| m.next),
            _ => ns.get_transition_on(key).and_then(|bm| bm.find_pattern(pattern)),
        }
    }

    fn touch_field_step(&self, key: &str) {
        self.field_step_used_refcount
            .entry(key.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn untouch_field_step(&self, keys: impl Iterator<Item = String>) {
        for key in keys {
            let Some(counter) = self.field_step_used_refcount.get(&key) else {
                continue;
            };
            let prev = counter.fetch_sub(1, Ordering::Relaxed);
            if prev == 1 {
                drop(counter);
                self.field_step_used_refcount.remove(&key);
            }
        }
    }

    /// spec §4.3 "Add algorithm": idempotent on an exact (rule_name,
    /// pattern-set) repeat; a disjunctive pattern list at one key shares a
    /// single `SubRuleId` across every alternative, so any one of them
    /// satisfying the live event is enough for the whole sub-rule to fire.
    pub fn add_pattern_rule(&self, rule_name: R, patterns: RulePatterns) -> Result<()> {
        let canonical = rule_name.to_string();
        let _span = telemetry::add_span(&canonical, patterns.len());
        let normalized = self.normalize_keys(patterns)?;
        if normalized.len() > self.config.max_keys_per_rule {
            return Err(Error::TooManyKeys {
                limit: self.config.max_keys_per_rule,
                found: normalized.len(),
            });
        }

        let _guard = self.write_lock.lock();
        self.rule_names
            .entry(canonical.clone())
            .or_insert_with(|| rule_name.clone());

        let keys: Vec<(&String, &Vec<Pattern>)> = normalized.iter().collect();
        let last_idx = keys.len().saturating_sub(1);

        let mut frontier: Vec<NameStateId> = vec![self.root()];
        let mut visited: Vec<(NameStateId, String, Pattern, NameStateId, bool)> = Vec::new();
        let mut candidate: Option<BTreeSet<SubRuleId>> = None;

        for idx in 0..keys.len() {
            let (key, pats) = keys[idx];
            let is_terminal = idx == last_idx;
            self.touch_field_step(key);
            let mut next_frontier = Vec::new();
            let mut ids_this_key: BTreeSet<SubRuleId> = BTreeSet::new();

            for parent_ns_id in &frontier {
                let ns = self.arena.get(*parent_ns_id);
                for pattern in pats.iter() {
                    let child = self.install_pattern_edge(&ns, key, pattern);
                    visited.push((*parent_ns_id, key.clone(), pattern.clone(), child, is_terminal));
                    next_frontier.push(child);

                    let child_ns = self.arena.get(child);
                    let ids_opt = if is_terminal {
                        child_ns.terminal_sub_rule_ids_for_pattern(pattern)
                    } else {
                        child_ns.non_terminal_sub_rule_ids_for_pattern(pattern)
                    };
                    if let Some(ids) = ids_opt {
                        for id in ids {
                            if child_ns.rule_name_for(id).as_deref() == Some(canonical.as_str()) {
                                ids_this_key.insert(id);
                            }
                        }
                    }
                }
            }

            candidate = Some(match candidate {
                None => ids_this_key,
                Some(prev) => prev.intersection(&ids_this_key).copied().collect(),
            });
            next_frontier.sort_by_key(|s| s.to_usize());
            next_frontier.dedup();
            frontier = next_frontier;
        }

        let sub_rule_id = candidate
            .and_then(|ids| ids.into_iter().next())
            .unwrap_or_else(|| self.sub_rule_ids.next());

        for (_, _, pattern, child, is_terminal) in &visited {
            let child_ns = self.arena.get(*child);
            child_ns.add_sub_rule(&canonical, sub_rule_id, pattern, *is_terminal);
        }

        Ok(())
    }

    /// spec §4.3 "Delete algorithm": removes only sub-rules whose
    /// (rule_name, key→patterns) exactly matches a previously added one;
    /// any unmatched prefix leaves the machine untouched.
    pub fn delete_pattern_rule(&self, rule_name: &R, patterns: RulePatterns) -> Result<()> {
        let canonical = rule_name.to_string();
        let key_count = patterns.len();
        let _span = telemetry::delete_span(&canonical, key_count);
        let normalized = self.normalize_keys(patterns)?;

        let _guard = self.write_lock.lock();

        let keys: Vec<(&String, &Vec<Pattern>)> = normalized.iter().collect();
        let last_idx = keys.len().saturating_sub(1);

        let mut frontier: Vec<NameStateId> = vec![self.root()];
        let mut visited: Vec<(NameStateId, String, Pattern, NameStateId, bool)> = Vec::new();
        let mut candidate: Option<BTreeSet<SubRuleId>> = None;

        for idx in 0..keys.len() {
            let (key, pats) = keys[idx];
            let is_terminal = idx == last_idx;
            let mut next_frontier = Vec::new();
            let mut ids_this_key: BTreeSet<SubRuleId> = BTreeSet::new();

            for parent_ns_id in &frontier {
                let ns = self.arena.get(*parent_ns_id);
                for pattern in pats.iter() {
                    let Some(child) = self.find_pattern_edge(&ns, key, pattern) else {
                        return Ok(()); // unmatched: leave the machine untouched
                    };
                    visited.push((*parent_ns_id, key.clone(), pattern.clone(), child, is_terminal));
                    next_frontier.push(child);

                    let child_ns = self.arena.get(child);
                    let ids_opt = if is_terminal {
                        child_ns.terminal_sub_rule_ids_for_pattern(pattern)
                    } else {
                        child_ns.non_terminal_sub_rule_ids_for_pattern(pattern)
                    };
                    if let Some(ids) = ids_opt {
                        for id in ids {
                            if child_ns.rule_name_for(id).as_deref() == Some(canonical.as_str()) {
                                ids_this_key.insert(id);
                            }
                        }
                    }
                }
            }

            candidate = Some(match candidate {
                None => ids_this_key,
                Some(prev) => prev.intersection(&ids_this_key).copied().collect(),
            });
            if candidate.as_ref().unwrap().is_empty() {
                return Ok(()); // no sub-rule of this rule_name follows this path
            }
            frontier = next_frontier;
        }

        let Some(ids) = candidate else { return Ok(()) };

        for id in ids {
            for (parent_ns_id, key, pattern, child_ns_id, is_terminal) in visited.iter().rev() {
                let child_ns = self.arena.get(*child_ns_id);
                if !child_ns.delete_sub_rule(id, pattern, *is_terminal) {
                    continue;
                }
                let still_referenced = child_ns
                    .terminal_sub_rule_ids_for_pattern(pattern)
                    .map(|s| !s.is_empty())
                    .unwrap_or(false)
                    || child_ns
                        .non_terminal_sub_rule_ids_for_pattern(pattern)
                        .map(|s| !s.is_empty())
                        .unwrap_or(false);
                if still_referenced {
                    continue;
                }
                let parent_ns = self.arena.get(*parent_ns_id);
                match pattern {
                    Pattern::Absent => parent_ns.remove_key_transition(key),
                    _ => {
                        if let Some(bm) = parent_ns.get_transition_on(key) {
                            bm.delete_pattern(pattern);
                            let empty = bm.is_empty();
                            drop(bm);
                            if empty {
                                parent_ns.remove_transition(key);
                            }
                        }
                    }
                }
            }
        }

        self.untouch_field_step(normalized.keys().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> GenericMachine<String> {
        GenericMachine::default()
    }

    #[test]
    fn add_then_delete_round_trips_to_empty() {
        let m = machine();
        let patterns = vec![("detail.state".to_string(), vec![Pattern::exact(b"\"running\"".to_vec())])];
        m.add_pattern_rule("r1".to_string(), patterns.clone()).unwrap();
        assert!(m.has_field_step("detail.state"));
        m.delete_pattern_rule(&"r1".to_string(), patterns).unwrap();
        assert!(!m.has_field_step("detail.state"));
    }

    #[test]
    fn re_adding_identical_rule_is_idempotent() {
        let m = machine();
        let patterns = vec![("x".to_string(), vec![Pattern::exact(b"\"1\"".to_vec())])];
        m.add_pattern_rule("r".to_string(), patterns.clone()).unwrap();
        m.add_pattern_rule("r".to_string(), patterns.clone()).unwrap();
        let root = m.name_state(m.root());
        let bm = root.get_transition_on("x").unwrap();
        // still exactly one distinct pattern installed, not two sub-rules worth of state.
        assert!(bm.find_pattern(&Pattern::exact(b"\"1\"".to_vec())).is_some());
    }

    #[test]
    fn deleting_one_rule_leaves_a_sibling_rule_intact() {
        let m = machine();
        m.add_pattern_rule(
            "r1".to_string(),
            vec![("x".to_string(), vec![Pattern::exact(b"\"a\"".to_vec())])],
        )
        .unwrap();
        m.add_pattern_rule(
            "r2".to_string(),
            vec![("x".to_string(), vec![Pattern::exact(b"\"b\"".to_vec())])],
        )
        .unwrap();
        m.delete_pattern_rule(
            &"r1".to_string(),
            vec![("x".to_string(), vec![Pattern::exact(b"\"a\"".to_vec())])],
        )
        .unwrap();
        let root = m.name_state(m.root());
        let bm = root.get_transition_on("x").unwrap();
        assert!(bm.find_pattern(&Pattern::exact(b"\"b\"".to_vec())).is_some());
        assert!(bm.find_pattern(&Pattern::exact(b"\"a\"".to_vec())).is_none());
    }

    #[test]
    fn too_many_keys_is_rejected() {
        let m = GenericMachine::<String>::new(MachineConfig {
            max_keys_per_rule: 1,
            duplicate_key_policy: DuplicateKeyPolicy::LatestWins,
        });
        let patterns = vec![
            ("a".to_string(), vec![Pattern::Exists]),
            ("b".to_string(), vec![Pattern::Exists]),
        ];
        assert!(matches!(
            m.add_pattern_rule("r".to_string(), patterns),
            Err(Error::TooManyKeys { .. })
        ));
    }

    #[test]
    fn duplicate_key_rejected_policy_errors() {
        let m = GenericMachine::<String>::new(MachineConfig {
            max_keys_per_rule: 256,
            duplicate_key_policy: DuplicateKeyPolicy::RejectDuplicate,
        });
        let patterns = vec![
            ("a".to_string(), vec![Pattern::Exists]),
            ("a".to_string(), vec![Pattern::Exists]),
        ];
        assert!(matches!(
            m.add_pattern_rule("r".to_string(), patterns),
            Err(Error::DuplicateKeyRejected { .. })
        ));
    }

    #[test]
    fn absent_pattern_uses_key_transition() {
        let m = machine();
        m.add_pattern_rule("r".to_string(), vec![("x".to_string(), vec![Pattern::Absent])])
            .unwrap();
        let root = m.name_state(m.root());
        assert!(root.has_key_transitions());
    }
}
