//! `Pattern`: the tagged variant at the center of the data model (spec §3).
//! Two patterns are equal exactly when their variant and payload are equal,
//! which is why this derives `PartialEq`/`Eq`/`Hash` structurally rather
//! than by identity — identity belongs to `ByteMatch`, not `Pattern`.
//!
//! Patterns are immutable once built. The constructors below are the
//! "external, but contract fixed" surface from spec §6: a rule compiler
//! (out of scope) calls these to turn parsed JSON pattern syntax into the
//! normalized byte form the value tier expects — reversed bytes for
//! suffixes, lower-cased bytes for ignore-case, and so on.

use std::collections::BTreeSet;

/// Sentinel value installed for `Exists`/`Absent` patterns (spec §6). A
/// bare `N` can never collide with a real JSON string value because string
/// values always carry their surrounding quote bytes (spec §4.5/§6).
pub const EXISTS_MARKER: &[u8] = b"N";

/// Highest byte used by the hex digit alphabet patterns rely on.
pub const MAX_DIGIT: u8 = b'F';

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    Exact(Vec<u8>),
    Prefix(Vec<u8>),
    /// Stored **reversed**: the value tier does a reverse scan for
    /// suffixes, so the pattern bytes must already be in reverse order.
    Suffix(Vec<u8>),
    /// Stored lower-cased (ASCII only, per the ignore-case Non-goal).
    EqualsIgnoreCase(Vec<u8>),
    /// Raw bytes including literal `*` markers.
    Wildcard(Vec<u8>),
    /// Pre-encoded comparable-number bytes (see `comparable_number`).
    NumericEq(Vec<u8>),
    NumericRange {
        bottom: Vec<u8>,
        top: Vec<u8>,
        open_bottom: bool,
        open_top: bool,
        is_cidr: bool,
    },
    AnythingBut {
        values: BTreeSet<Vec<u8>>,
        numeric: bool,
    },
    AnythingButPrefix(Vec<u8>),
    /// Stored reversed, mirroring `Suffix`.
    AnythingButSuffix(Vec<u8>),
    /// Stored lower-cased, mirroring `EqualsIgnoreCase`.
    AnythingButIgnoreCase(BTreeSet<Vec<u8>>),
    Exists,
    Absent,
}

fn ascii_lower(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b.to_ascii_lowercase()).collect()
}

fn reversed(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

impl Pattern {
    pub fn exact(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::Exact(bytes.into())
    }

    pub fn prefix(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::Prefix(bytes.into())
    }

    pub fn suffix(bytes: impl AsRef<[u8]>) -> Self {
        Pattern::Suffix(reversed(bytes.as_ref()))
    }

    pub fn equals_ignore_case(bytes: impl AsRef<[u8]>) -> Self {
        Pattern::EqualsIgnoreCase(ascii_lower(bytes.as_ref()))
    }

    pub fn wildcard(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::Wildcard(bytes.into())
    }

    pub fn anything_but(values: BTreeSet<Vec<u8>>, numeric: bool) -> Self {
        Pattern::AnythingBut { values, numeric }
    }

    pub fn anything_but_prefix(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::AnythingButPrefix(bytes.into())
    }

    pub fn anything_but_suffix(bytes: impl AsRef<[u8]>) -> Self {
        Pattern::AnythingButSuffix(reversed(bytes.as_ref()))
    }

    pub fn anything_but_ignore_case(values: BTreeSet<Vec<u8>>) -> Self {
        Pattern::AnythingButIgnoreCase(values.into_iter().map(|v| ascii_lower(&v)).collect())
    }

    /// Shortcut-eligible types per spec §4.1: only exact-match terminal
    /// chains can skip the intermediate states.
    pub(crate) fn is_shortcut_eligible(&self) -> bool {
        matches!(self, Pattern::Exact(_) | Pattern::EqualsIgnoreCase(_))
    }

    pub(crate) fn is_numeric(&self) -> bool {
        matches!(
            self,
            Pattern::NumericEq(_)
                | Pattern::NumericRange { is_cidr: false, .. }
                | Pattern::AnythingBut { numeric: true, .. }
        )
    }

    pub(crate) fn is_ip(&self) -> bool {
        matches!(self, Pattern::NumericRange { is_cidr: true, .. })
    }

    pub(crate) fn is_suffix_like(&self) -> bool {
        matches!(self, Pattern::Suffix(_) | Pattern::AnythingButSuffix(_))
    }

    pub(crate) fn is_ignore_case_like(&self) -> bool {
        matches!(
            self,
            Pattern::EqualsIgnoreCase(_) | Pattern::AnythingButIgnoreCase(_)
        )
    }
}
