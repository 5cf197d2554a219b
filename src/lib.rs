//! High-throughput event-matching engine: array-consistent predicate
//! matching over flattened JSON events at scale.
//!
//! A caller compiles rules — each a set of dotted-path keys mapped to
//! disjunctive [`Pattern`] lists — into a [`GenericMachine`], then tests
//! flattened [`Event`]s against it with [`match_event`]. The machine is
//! built from two cooperating tiers: a name tier walking dotted keys
//! (`NameState`, not exported — internal to the write/query path) and a
//! value tier matching byte values against each key's patterns
//! (`ByteMachine`, private to a single `NameState`). Both tiers are safe to
//! query concurrently with in-flight writes; see [`GenericMachine`] for the
//! concurrency contract.

mod ac_finder;
mod byte_machine;
mod comparable_number;
mod config;
mod error;
mod event;
mod generic_machine;
mod ip_encode;
mod name_state;
mod pattern;
mod state_id;
mod telemetry;

pub use ac_finder::match_event;
pub use config::{DuplicateKeyPolicy, MachineConfig};
pub use error::{Error, Result};
pub use event::{ArrayMembership, Event, EventField, FieldName};
pub use generic_machine::{GenericMachine, RulePatterns};
pub use name_state::SubRuleId;
pub use pattern::{Pattern, EXISTS_MARKER, MAX_DIGIT};


/// Property tests for spec §8's "universal invariants" and "round-trip &
/// boundary" properties, which describe the engine's behavior over *any*
/// rule/event rather than one literal scenario — `proptest`'s case.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn quoted(value: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len() + 2);
        out.push(b'"');
        out.extend_from_slice(value.as_bytes());
        out.push(b'"');
        out
    }

    fn string_field(name: &str, value: &str) -> EventField {
        EventField::new(name, quoted(value), ArrayMembership::new())
    }

    fn number_field(name: &str, value: f64) -> EventField {
        let encoded = comparable_number::encode_strict(value).unwrap();
        EventField::new(name, encoded.to_vec(), ArrayMembership::new())
    }

    proptest! {
        /// "add(R); add(R) produces the same match set as add(R)."
        #[test]
        fn add_pattern_rule_is_idempotent(prefix in "[a-z]{1,8}", suffix in "[a-z]{0,8}") {
            let once: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            let twice: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            let rule = vec![("k".to_string(), vec![Pattern::prefix(quoted(&prefix))])];

            once.add_pattern_rule("r".to_string(), rule.clone()).unwrap();
            twice.add_pattern_rule("r".to_string(), rule.clone()).unwrap();
            twice.add_pattern_rule("r".to_string(), rule).unwrap();

            let event = Event::new(vec![string_field("k", &format!("{prefix}{suffix}"))]);
            prop_assert_eq!(match_event(&once, &event), match_event(&twice, &event));
        }

        /// "add(R); delete(R); is_empty() ⇒ true, on an initially empty
        /// machine" — `has_field_step` is this machine's is-empty probe for
        /// a single key, since there's no whole-machine emptiness flag.
        #[test]
        fn add_then_delete_leaves_no_trace_of_the_key(key in "[a-z]{1,8}", value in "[a-z]{0,8}") {
            let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            let rule = vec![(key.clone(), vec![Pattern::exact(quoted(&value))])];

            m.add_pattern_rule("r".to_string(), rule.clone()).unwrap();
            prop_assert!(m.has_field_step(&key));

            m.delete_pattern_rule(&"r".to_string(), rule).unwrap();
            prop_assert!(!m.has_field_step(&key));
        }

        /// "add(R1); add(R2); delete(R1) leaves R2's matches unchanged."
        #[test]
        fn deleting_one_rule_leaves_anothers_matches_unchanged(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
            prop_assume!(a != b);
            let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            let rule_a = vec![("k".to_string(), vec![Pattern::exact(quoted(&a))])];
            let rule_b = vec![("k".to_string(), vec![Pattern::exact(quoted(&b))])];
            m.add_pattern_rule("rule-a".to_string(), rule_a.clone()).unwrap();
            m.add_pattern_rule("rule-b".to_string(), rule_b).unwrap();

            let event_b = Event::new(vec![string_field("k", &b)]);
            let before = match_event(&m, &event_b);

            m.delete_pattern_rule(&"rule-a".to_string(), rule_a).unwrap();
            let after = match_event(&m, &event_b);

            prop_assert_eq!(before, after);
            prop_assert_eq!(match_event(&m, &event_b), vec!["rule-b".to_string()]);
        }

        /// "For any accepted numeric range (a,b): a value v matches iff the
        /// encoded comparable number of v is byte-lexicographically strictly
        /// between the encodings of a and b." Integer-valued endpoints avoid
        /// the six-digit-precision boundary entirely, isolating the
        /// open-range membership property itself.
        #[test]
        fn numeric_range_matches_exactly_the_open_interval(
            base in -900_000i64..900_000,
            gap_lo in 1i64..500,
            gap_hi in 1i64..500,
        ) {
            let bottom = base as f64;
            let mid = (base + gap_lo) as f64;
            let top = (base + gap_lo + gap_hi) as f64;

            let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            m.add_pattern_rule(
                "in-range".to_string(),
                vec![(
                    "value".to_string(),
                    vec![Pattern::NumericRange {
                        bottom: comparable_number::encode_strict(bottom).unwrap().to_vec(),
                        top: comparable_number::encode_strict(top).unwrap().to_vec(),
                        open_bottom: true,
                        open_top: true,
                        is_cidr: false,
                    }],
                )],
            )
            .unwrap();

            let inside = Event::new(vec![number_field("value", mid)]);
            prop_assert_eq!(match_event(&m, &inside), vec!["in-range".to_string()]);

            let at_bottom = Event::new(vec![number_field("value", bottom)]);
            prop_assert!(match_event(&m, &at_bottom).is_empty());

            let at_top = Event::new(vec![number_field("value", top)]);
            prop_assert!(match_event(&m, &at_top).is_empty());
        }

        /// "Wildcard `*` matches the empty string and any non-empty
        /// string."
        #[test]
        fn bare_wildcard_matches_any_string_value(value in "[a-z]{0,10}") {
            let m: GenericMachine<String> = GenericMachine::new(MachineConfig::default());
            m.add_pattern_rule(
                "any-value".to_string(),
                vec![("k".to_string(), vec![Pattern::wildcard(b"\"*\"".to_vec())])],
            )
            .unwrap();

            let event = Event::new(vec![string_field("k", &value)]);
            prop_assert_eq!(match_event(&m, &event), vec!["any-value".to_string()]);
        }
    }
}
