//! Tri-state field wrapper for partial updates
//!
//! JSON cannot distinguish a missing key from an explicit `null` once both
//! land in `Option<T>`. Partial updates need that distinction: a missing key
//! leaves the stored field untouched, an explicit `null` clears it. `Patch<T>`
//! keeps all three states through (de)serialization.
//!
//! Usage on update DTOs:
//!
//! ```ignore
//! #[serde(default, skip_serializing_if = "Patch::is_absent")]
//! pub name: Patch<String>,
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field in a partial-update payload: absent, explicit null, or a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Key was not present in the payload; keep the stored value.
    #[default]
    Absent,
    /// Key was present with `null`; clear the stored value.
    Null,
    /// Key was present with a value; replace the stored value.
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Patch::Null)
    }

    /// The supplied value, if any (`Absent` and `Null` both yield `None`).
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Apply this patch onto a stored optional field.
    ///
    /// Returns `true` when the stored value actually changed, so callers can
    /// build an accurate changed-field set. Re-supplying the current value is
    /// not a change.
    pub fn apply_to(&self, target: &mut Option<T>) -> bool
    where
        T: Clone + PartialEq,
    {
        match self {
            Patch::Absent => false,
            Patch::Null => target.take().is_some(),
            Patch::Value(v) => {
                if target.as_ref() == Some(v) {
                    false
                } else {
                    *target = Some(v.clone());
                    true
                }
            }
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Absent fields are expected to be skipped via `skip_serializing_if`;
        // if one is serialized anyway it degrades to null.
        match self {
            Patch::Absent | Patch::Null => serializer.serialize_none(),
            Patch::Value(v) => serializer.serialize_some(v),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A missing key never reaches this point (serde falls back to the
        // field's `#[serde(default)]`, i.e. `Absent`), so present-but-null
        // and present-with-value are the only cases left.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}
