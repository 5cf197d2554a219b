//! `ACFinder`: the array-consistent worklist traversal over a
//! `GenericMachine`'s name tier (spec §4.4, component C4).

use std::collections::{BTreeSet, VecDeque};

use crate::event::{ArrayMembership, Event};
use crate::generic_machine::GenericMachine;
use crate::name_state::{NameState, SubRuleId};
use crate::pattern::Pattern;
use crate::state_id::NameStateId;
use crate::telemetry;

#[derive(Clone, Debug)]
struct Step {
    field_index: usize,
    name_state: NameStateId,
    /// `None` only before the first key of any path has been tried — "no
    /// candidate restriction yet" (spec §4.4 step 2).
    candidate_sub_rule_ids: Option<BTreeSet<SubRuleId>>,
    membership_so_far: ArrayMembership,
}

/// Walk `event` against `machine`'s compiled rules and return every rule
/// name whose pattern set is satisfied by a single array-consistent
/// assignment of the event's fields.
pub fn match_event<R>(machine: &GenericMachine<R>, event: &Event) -> Vec<R>
where
    R: Clone + std::fmt::Display,
{
    let _span = telemetry::query_span(event.fields.len());
    let root_ns = machine.name_state(machine.root());
    if root_ns.is_empty() {
        return Vec::new();
    }

    let mut matched: BTreeSet<String> = BTreeSet::new();
    let mut worklist: VecDeque<Step> = VecDeque::new();
    worklist.push_back(Step {
        field_index: 0,
        name_state: machine.root(),
        candidate_sub_rule_ids: None,
        membership_so_far: ArrayMembership::new(),
    });

    while let Some(step) = worklist.pop_front() {
        let ns = machine.name_state(step.name_state);

        // Must-not-exist transitions never consume a field, so they apply
        // uniformly to whatever name state this step is sitting at —
        // including the root, for rules whose very first sorted key is an
        // absence check.
        for further in ns.get_name_transitions(event, &step.membership_so_far) {
            try_enter(
                &mut worklist,
                &mut matched,
                machine,
                further,
                &step.candidate_sub_rule_ids,
                step.membership_so_far.clone(),
                step.field_index,
                &Pattern::Absent,
            );
        }

        if step.field_index >= event.fields.len() {
            continue;
        }
        let field = &event.fields[step.field_index];
        if let Some(new_membership) = step.membership_so_far.check_consistency(&field.array_membership) {
            if let Some(bm) = ns.get_transition_on(&field.name) {
                for (next_ns, pattern) in bm.transition_on(&field.value) {
                    try_enter(
                        &mut worklist,
                        &mut matched,
                        machine,
                        next_ns,
                        &step.candidate_sub_rule_ids,
                        new_membership.clone(),
                        step.field_index + 1,
                        &pattern,
                    );
                }
            }
        }

        // Rule keys and event field order are independent — this state may
        // still have a transition waiting on a later field.
        worklist.push_back(Step {
            field_index: step.field_index + 1,
            name_state: step.name_state,
            candidate_sub_rule_ids: step.candidate_sub_rule_ids,
            membership_so_far: step.membership_so_far,
        });
    }

    matched
        .into_iter()
        .filter_map(|canonical| machine.rule_name_for_canonical(&canonical))
        .collect()
}

/// Narrow `candidate` by `ns`'s non-terminal ids for `pattern`, emit any
/// rule names whose terminal id survives the same narrowing, and — unless
/// the non-terminal set came up empty — enqueue continuation from `ns`.
fn try_enter<R>(
    worklist: &mut VecDeque<Step>,
    matched: &mut BTreeSet<String>,
    machine: &GenericMachine<R>,
    ns_id: NameStateId,
    candidate: &Option<BTreeSet<SubRuleId>>,
    membership: ArrayMembership,
    next_field_index: usize,
    pattern: &Pattern,
) where
    R: Clone + std::fmt::Display,
{
    let ns: std::sync::Arc<NameState> = machine.name_state(ns_id);

    let non_terminal = ns.non_terminal_sub_rule_ids_for_pattern(pattern).unwrap_or_default();
    let updated: BTreeSet<SubRuleId> = match candidate {
        None => non_terminal,
        Some(prev) => prev.intersection(&non_terminal).copied().collect(),
    };

    let terminal = ns.terminal_sub_rule_ids_for_pattern(pattern).unwrap_or_default();
    let eligible_terminal: BTreeSet<SubRuleId> = match candidate {
        None => terminal,
        Some(prev) => prev.intersection(&terminal).copied().collect(),
    };
    for id in &eligible_terminal {
        if let Some(name) = ns.rule_name_for(*id) {
            matched.insert(name);
        }
    }

    if updated.is_empty() {
        return;
    }
    worklist.push_back(Step {
        field_index: next_field_index,
        name_state: ns_id,
        candidate_sub_rule_ids: Some(updated),
        membership_so_far: membership,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::event::EventField;

    fn string_field(name: &str, value: &str) -> EventField {
        let mut quoted = Vec::with_capacity(value.len() + 2);
        quoted.push(b'"');
        quoted.extend_from_slice(value.as_bytes());
        quoted.push(b'"');
        EventField::new(name, quoted, ArrayMembership::new())
    }

    #[test]
    fn single_key_exact_rule_matches() {
        let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
        m.add_pattern_rule(
            "r1".to_string(),
            vec![("detail.state".to_string(), vec![Pattern::exact(b"\"running\"".to_vec())])],
        )
        .unwrap();
        let event = Event::new(vec![string_field("detail.state", "running")]);
        let matches = match_event(&m, &event);
        assert_eq!(matches, vec!["r1".to_string()]);
    }

    #[test]
    fn two_key_rule_requires_both_keys() {
        let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
        m.add_pattern_rule(
            "r1".to_string(),
            vec![
                ("a".to_string(), vec![Pattern::exact(b"\"1\"".to_vec())]),
                ("b".to_string(), vec![Pattern::exact(b"\"2\"".to_vec())]),
            ],
        )
        .unwrap();
        let full = Event::new(vec![string_field("a", "1"), string_field("b", "2")]);
        assert_eq!(match_event(&m, &full), vec!["r1".to_string()]);

        let partial = Event::new(vec![string_field("a", "1")]);
        assert!(match_event(&m, &partial).is_empty());
    }

    #[test]
    fn field_order_independent_of_key_order() {
        let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
        m.add_pattern_rule(
            "r1".to_string(),
            vec![
                ("a".to_string(), vec![Pattern::exact(b"\"1\"".to_vec())]),
                ("b".to_string(), vec![Pattern::exact(b"\"2\"".to_vec())]),
            ],
        )
        .unwrap();
        let reversed = Event::new(vec![string_field("b", "2"), string_field("a", "1")]);
        assert_eq!(match_event(&m, &reversed), vec!["r1".to_string()]);
    }

    #[test]
    fn absent_key_rule_matches_only_when_key_missing() {
        let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
        m.add_pattern_rule("absent".to_string(), vec![("x".to_string(), vec![Pattern::Absent])])
            .unwrap();
        let without = Event::new(vec![string_field("a", "1")]);
        assert_eq!(match_event(&m, &without), vec!["absent".to_string()]);
        let with = Event::new(vec![string_field("x", "1")]);
        assert!(match_event(&m, &with).is_empty());
    }

    #[test]
    fn deleting_a_sub_rule_stops_it_matching() {
        let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
        let patterns = vec![("a".to_string(), vec![Pattern::exact(b"\"1\"".to_vec())])];
        m.add_pattern_rule("r1".to_string(), patterns.clone()).unwrap();
        m.delete_pattern_rule(&"r1".to_string(), patterns).unwrap();
        let event = Event::new(vec![string_field("a", "1")]);
        assert!(match_event(&m, &event).is_empty());
    }
}
