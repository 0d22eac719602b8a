//! Canonical filter state over the sales dimensions
//!
//! `FilterState` is the single source of truth for what subset of the data
//! the user is looking at. It is a small value type: applying a patch
//! produces a new state, which makes history snapshots trivial.
//!
//! Entry order is preserved from when each dimension was first set. The
//! most recently set or updated dimension is tracked as "last touched" and
//! drives the insight annotation in the UI.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::data::SalesRecord;

/// One of the six filterable attributes of a sales record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Region,
    Product,
    Quarter,
    Status,
    Rep,
    CloseMonth,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Region,
        Dimension::Product,
        Dimension::Quarter,
        Dimension::Status,
        Dimension::Rep,
        Dimension::CloseMonth,
    ];

    /// Wire spelling used in action payloads and serialized filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Region => "region",
            Dimension::Product => "product",
            Dimension::Quarter => "quarter",
            Dimension::Status => "status",
            Dimension::Rep => "rep",
            Dimension::CloseMonth => "closeMonth",
        }
    }

    /// Parse the wire spelling back into a dimension
    pub fn parse(name: &str) -> Option<Dimension> {
        match name {
            "region" => Some(Dimension::Region),
            "product" => Some(Dimension::Product),
            "quarter" => Some(Dimension::Quarter),
            "status" => Some(Dimension::Status),
            "rep" => Some(Dimension::Rep),
            "closeMonth" => Some(Dimension::CloseMonth),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation on a single dimension within a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    Set(String),
    Clear,
}

/// Partial update over the filter dimensions
///
/// Patches carry only the dimensions the agent mentioned. Unmentioned
/// dimensions are untouched when the patch is applied (merge semantics).
/// Operations apply in the order they were listed in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    ops: Vec<(Dimension, PatchOp)>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a set operation. An empty value is a clear, matching the
    /// wire convention where agents send "" to remove a filter.
    pub fn set(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            self.ops.push((dimension, PatchOp::Clear));
        } else {
            self.ops.push((dimension, PatchOp::Set(value)));
        }
        self
    }

    /// Record an explicit clear operation
    pub fn clear(mut self, dimension: Dimension) -> Self {
        self.ops.push((dimension, PatchOp::Clear));
        self
    }

    /// Decode a patch from an action payload
    ///
    /// Known keys with string values become set/clear operations in payload
    /// order. Null clears like the empty string does. Unknown keys and
    /// non-string values are skipped. A non-object payload yields an empty
    /// patch, which applies as a no-op.
    pub fn from_json(payload: &Value) -> FilterPatch {
        let mut patch = FilterPatch::new();
        let Some(object) = payload.as_object() else {
            debug!("Filter payload is not an object, treating as empty patch");
            return patch;
        };
        for (key, value) in object {
            let Some(dimension) = Dimension::parse(key) else {
                debug!("Skipping unknown filter dimension: {}", key);
                continue;
            };
            match value {
                Value::String(s) if s.is_empty() => {
                    patch.ops.push((dimension, PatchOp::Clear));
                }
                Value::String(s) => {
                    patch.ops.push((dimension, PatchOp::Set(s.clone())));
                }
                Value::Null => {
                    patch.ops.push((dimension, PatchOp::Clear));
                }
                other => {
                    debug!(
                        "Skipping non-string value for dimension {}: {}",
                        dimension, other
                    );
                }
            }
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[(Dimension, PatchOp)] {
        &self.ops
    }
}

/// The active dimension constraints
///
/// Entries are kept in first-set order. Setting an already-present
/// dimension updates it in place and marks it as last touched; clearing
/// removes the entry entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    entries: Vec<(Dimension, String)>,
    last_touched: Option<Dimension>,
}

impl FilterState {
    /// State with no active constraints
    pub fn empty() -> Self {
        Self::default()
    }

    /// Active value for a dimension, if any
    pub fn get(&self, dimension: Dimension) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Active entries in first-set order
    pub fn entries(&self) -> &[(Dimension, String)] {
        &self.entries
    }

    /// The dimension most recently set or updated, with its value
    ///
    /// Clearing the last-touched dimension hands the annotation to the
    /// newest surviving entry, so this is `None` only while no filters
    /// are active.
    pub fn last_touched(&self) -> Option<(Dimension, &str)> {
        let dimension = self.last_touched?;
        self.get(dimension).map(|v| (dimension, v))
    }

    /// Apply a patch, producing the next state
    ///
    /// The receiver is untouched; history keeps the old value while the
    /// new one becomes current.
    pub fn apply(&self, patch: &FilterPatch) -> FilterState {
        let mut next = self.clone();
        for (dimension, op) in patch.ops() {
            match op {
                PatchOp::Set(value) => {
                    match next.entries.iter_mut().find(|(d, _)| d == dimension) {
                        Some(entry) => entry.1 = value.clone(),
                        None => next.entries.push((*dimension, value.clone())),
                    }
                    next.last_touched = Some(*dimension);
                }
                PatchOp::Clear => {
                    next.entries.retain(|(d, _)| d != dimension);
                    if next.last_touched == Some(*dimension) {
                        // Annotation falls back to the newest surviving entry
                        next.last_touched = next.entries.last().map(|(d, _)| *d);
                    }
                }
            }
        }
        next
    }

    /// Whether a record satisfies every active constraint
    ///
    /// Matching is exact and case-sensitive. An empty state matches all
    /// records.
    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.entries.iter().all(|(dimension, value)| {
            let field = match dimension {
                Dimension::Region => record.region.as_str(),
                Dimension::Product => record.product.as_str(),
                Dimension::Quarter => record.quarter.as_str(),
                Dimension::Status => record.status.as_str(),
                Dimension::Rep => record.rep.as_str(),
                Dimension::CloseMonth => record.close_month(),
            };
            field == value
        })
    }

    /// Human-readable description, e.g. "region: US-East, product: Pulse CRM"
    pub fn label(&self) -> String {
        self.entries
            .iter()
            .map(|(d, v)| format!("{}: {}", d, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "(no filters)")
        } else {
            write!(f, "{}", self.label())
        }
    }
}

// Serialized as a plain JSON object in entry order so two states with the
// same constraints set in the same order always produce identical text.
// The sync scheduler relies on this for its dedup comparison.
impl Serialize for FilterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (dimension, value) in &self.entries {
            map.serialize_entry(dimension.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FilterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FilterStateVisitor;

        impl<'de> Visitor<'de> for FilterStateVisitor {
            type Value = FilterState;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of dimension names to filter values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut state = FilterState::empty();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    if let Some(dimension) = Dimension::parse(&key) {
                        if !value.is_empty() {
                            state.entries.push((dimension, value));
                        }
                    }
                }
                state.last_touched = state.entries.last().map(|(d, _)| *d);
                Ok(state)
            }
        }

        deserializer.deserialize_map(FilterStateVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_dimension_wire_names_roundtrip() {
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::parse(dimension.as_str()), Some(dimension));
        }
        assert_eq!(Dimension::parse("closemonth"), None);
        assert_eq!(Dimension::parse(""), None);
    }

    #[test]
    fn test_apply_merges_without_touching_other_dimensions() {
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, "US-East"))
            .apply(&FilterPatch::new().set(Dimension::Product, "Pulse CRM"));

        let next = state.apply(&FilterPatch::new().set(Dimension::Region, "APAC"));
        assert_eq!(next.get(Dimension::Region), Some("APAC"));
        assert_eq!(next.get(Dimension::Product), Some("Pulse CRM"));
        // Updated in place, original position kept
        assert_eq!(next.entries()[0].0, Dimension::Region);
    }

    #[test]
    fn test_apply_does_not_mutate_receiver() {
        let state = FilterState::empty().apply(&FilterPatch::new().set(Dimension::Region, "APAC"));
        let _next = state.apply(&FilterPatch::new().clear(Dimension::Region));
        assert_eq!(state.get(Dimension::Region), Some("APAC"));
    }

    #[test]
    fn test_empty_string_clears_dimension() {
        let state = FilterState::empty().apply(&FilterPatch::new().set(Dimension::Rep, "Dana Reyes"));
        let next = state.apply(&FilterPatch::new().set(Dimension::Rep, ""));
        assert!(next.is_empty());
    }

    #[test]
    fn test_clear_absent_dimension_is_noop() {
        let state = FilterState::empty().apply(&FilterPatch::new().clear(Dimension::Quarter));
        assert!(state.is_empty());
    }

    #[test]
    fn test_last_touched_tracks_updates() {
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, "US-East"))
            .apply(&FilterPatch::new().set(Dimension::Quarter, "Q3"));
        assert_eq!(state.last_touched(), Some((Dimension::Quarter, "Q3")));

        // Updating an existing dimension marks it as last touched again
        let state = state.apply(&FilterPatch::new().set(Dimension::Region, "APAC"));
        assert_eq!(state.last_touched(), Some((Dimension::Region, "APAC")));

        // Clearing the last-touched dimension falls back to the survivor
        let state = state.apply(&FilterPatch::new().clear(Dimension::Region));
        assert_eq!(state.last_touched(), Some((Dimension::Quarter, "Q3")));
    }

    #[test]
    fn test_clear_last_touched_falls_back_to_surviving_entry() {
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, "US-East"))
            .apply(&FilterPatch::new().set(Dimension::Product, "Pulse CRM"))
            .apply(&FilterPatch::new().set(Dimension::Product, ""));

        assert_eq!(state.len(), 1);
        assert_eq!(state.last_touched(), Some((Dimension::Region, "US-East")));

        // Clearing the final entry leaves nothing to annotate
        let state = state.apply(&FilterPatch::new().clear(Dimension::Region));
        assert_eq!(state.last_touched(), None);
    }

    #[test]
    fn test_from_json_respects_payload_order_and_skips_junk() {
        let payload = json!({
            "product": "Orion Suite",
            "region": "US-West",
            "revenue": 12345,
            "mood": "optimistic",
            "quarter": null
        });
        let patch = FilterPatch::from_json(&payload);
        assert_eq!(
            patch.ops(),
            &[
                (Dimension::Product, PatchOp::Set("Orion Suite".to_string())),
                (Dimension::Region, PatchOp::Set("US-West".to_string())),
                (Dimension::Quarter, PatchOp::Clear),
            ]
        );
    }

    #[test]
    fn test_from_json_non_object_payload_is_empty_patch() {
        assert!(FilterPatch::from_json(&json!("region")).is_empty());
        assert!(FilterPatch::from_json(&json!(null)).is_empty());
        assert!(FilterPatch::from_json(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_matches_is_exact_and_case_sensitive() {
        let dataset = Dataset::demo();
        let record = &dataset.records()[0];

        let state =
            FilterState::empty().apply(&FilterPatch::new().set(Dimension::Region, record.region.clone()));
        assert!(state.matches(record));

        let lower = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, record.region.to_lowercase()));
        assert!(!lower.matches(record));
    }

    #[test]
    fn test_matches_close_month() {
        let dataset = Dataset::demo();
        let record = &dataset.records()[0];
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::CloseMonth, record.close_month()));
        assert!(state.matches(record));
    }

    #[test]
    fn test_empty_state_matches_everything() {
        let dataset = Dataset::demo();
        let state = FilterState::empty();
        assert!(dataset.records().iter().all(|r| state.matches(r)));
    }

    #[test]
    fn test_serialization_is_stable_in_entry_order() {
        let a = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, "US-East"))
            .apply(&FilterPatch::new().set(Dimension::Product, "Pulse CRM"));
        let b = FilterState::empty().apply(
            &FilterPatch::new()
                .set(Dimension::Region, "US-East")
                .set(Dimension::Product, "Pulse CRM"),
        );
        let json_a = serde_json::to_string(&a).unwrap();
        let json_b = serde_json::to_string(&b).unwrap();
        assert_eq!(json_a, json_b);
        assert_eq!(json_a, r#"{"region":"US-East","product":"Pulse CRM"}"#);
    }

    #[test]
    fn test_deserialize_roundtrip() {
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Quarter, "Q2"))
            .apply(&FilterPatch::new().set(Dimension::Status, "good"));
        let json = serde_json::to_string(&state).unwrap();
        let back: FilterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries(), state.entries());
        assert_eq!(back.last_touched(), Some((Dimension::Status, "good")));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(FilterState::empty().to_string(), "(no filters)");
        let state = FilterState::empty()
            .apply(&FilterPatch::new().set(Dimension::Region, "EU-Central"))
            .apply(&FilterPatch::new().set(Dimension::CloseMonth, "March"));
        assert_eq!(state.to_string(), "region: EU-Central, closeMonth: March");
    }
}
