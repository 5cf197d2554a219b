//! Machine-wide configuration (spec §4.3 "Rule-override policy", §7.2
//! configuration cap).

/// What happens when one rule compilation uses the same dotted key twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateKeyPolicy {
    /// The later occurrence's pattern list replaces the earlier one (default).
    LatestWins,
    /// The add is rejected outright with `Error::DuplicateKeyRejected`.
    RejectDuplicate,
}

impl Default for DuplicateKeyPolicy {
    fn default() -> Self {
        DuplicateKeyPolicy::LatestWins
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Rules using more than this many distinct keys are rejected atomically
    /// at `add_pattern_rule`/`delete_pattern_rule` (spec §7.2).
    pub max_keys_per_rule: usize,
    pub duplicate_key_policy: DuplicateKeyPolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_keys_per_rule: 256,
            duplicate_key_policy: DuplicateKeyPolicy::default(),
        }
    }
}
