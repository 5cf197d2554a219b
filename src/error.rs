//! Recoverable error taxonomy (spec §7, classes 2–3). Class 1 (input-shape
//! errors on patterns/events) has no variant here because nothing in this
//! crate can produce one: `Pattern`'s constructors and `EventField::new`
//! are infallible by construction — shaping raw JSON into a `Pattern` or
//! `EventField` is the external rule compiler's/flattener's job (spec §6),
//! out of scope for this crate, so a malformed-input error would have
//! nowhere to actually originate. Classes 4 and 5 — structural invariant
//! violations and detected lost updates — are programmer errors and
//! surface as `unreachable!`/`debug_assert!` panics at the point the spec
//! names, not as `Error` variants: the spec calls them "fatal,
//! unrecoverable... indicate a defect", so wrapping them in `Result` would
//! just push the same abort one frame up.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A rule's key count exceeded `MachineConfig::max_keys_per_rule`.
    #[error("rule has {found} keys, limit is {limit}")]
    TooManyKeys { limit: usize, found: usize },

    /// A numeric pattern endpoint fell outside the encodable range
    /// `[-5e9, 5e9]`.
    #[error("numeric value {value} is out of the encodable range")]
    NumericOutOfRange { value: f64 },

    /// A numeric pattern endpoint needed more than six decimal digits of
    /// precision to represent exactly.
    #[error("numeric value {value} exceeds six digits of precision")]
    ExcessPrecision { value: f64 },

    /// The same dotted key appeared twice while compiling one rule and the
    /// machine is configured to reject that rather than let the latest
    /// pattern list win.
    #[error("duplicate key {key:?} rejected by configured duplicate-key policy")]
    DuplicateKeyRejected { key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
