//! `Event`: the normalized, already-flattened representation `ACFinder`
//! walks (spec §4.5, component C5). Producing this from raw JSON is an
//! external collaborator's job (the "JSON flattener"); this module only
//! owns the data shape and the one piece of logic the spec assigns it
//! directly — array-membership consistency checking (spec §3 "Array
//! consistency", §4.4).

use std::collections::BTreeMap;
use std::sync::Arc;

/// A dotted field path, e.g. `detail.state`.
pub type FieldName = Arc<str>;

/// Per-array-id element index a field descended through. Two memberships
/// are "consistent" when they agree on every array id they both mention.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrayMembership(BTreeMap<u32, u32>);

impl ArrayMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// A membership asserting a single array-id/element-index pair.
    pub fn of(array_id: u32, element_index: u32) -> Self {
        let mut m = BTreeMap::new();
        m.insert(array_id, element_index);
        Self(m)
    }

    pub fn insert(&mut self, array_id: u32, element_index: u32) {
        self.0.insert(array_id, element_index);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge two memberships, succeeding only if they agree on every shared
    /// array id (spec §3 `check_consistency`).
    pub fn check_consistency(&self, other: &ArrayMembership) -> Option<ArrayMembership> {
        let mut merged = self.0.clone();
        for (&array_id, &idx) in &other.0 {
            match merged.get(&array_id) {
                Some(&existing) if existing != idx => return None,
                _ => {
                    merged.insert(array_id, idx);
                }
            }
        }
        Some(ArrayMembership(merged))
    }
}

/// One flattened `(name, value, array_membership)` triple.
#[derive(Clone, Debug)]
pub struct EventField {
    pub name: FieldName,
    /// Stringified JSON literal bytes (strings keep their surrounding
    /// quotes, per spec §4.5) or a hex-encoded IP literal.
    pub value: Vec<u8>,
    pub array_membership: ArrayMembership,
}

impl EventField {
    pub fn new(
        name: impl Into<FieldName>,
        value: impl Into<Vec<u8>>,
        array_membership: ArrayMembership,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            array_membership,
        }
    }
}

/// Flattened event: fields sorted by name, used for worklist advancement by
/// index (spec §4.5).
#[derive(Clone, Debug, Default)]
pub struct Event {
    pub fields: Vec<EventField>,
}

impl Event {
    pub fn new(mut fields: Vec<EventField>) -> Self {
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Self { fields }
    }

    /// Does `key` appear among `self.fields` with a membership consistent
    /// with `membership_so_far`? Used by `NameState::get_name_transitions`
    /// to decide whether a "must not exist" matcher fires (spec §4.2/§4.4:
    /// the matcher's next state is only reached when the key is *not*
    /// present in a consistent assignment of the event's fields).
    pub(crate) fn has_consistent_field(&self, key: &str, membership_so_far: &ArrayMembership) -> bool {
        self.fields
            .iter()
            .filter(|f| &*f.name == key)
            .any(|f| membership_so_far.check_consistency(&f.array_membership).is_some())
    }
}
