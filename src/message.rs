//! Wire protocol for the agent control topic
//!
//! The voice agent and the engine exchange JSON envelopes over a single
//! reliable data topic. Inbound envelopes are classified into recognized
//! actions here; everything else degrades safely to a drop with a log
//! line. Outbound traffic is the serialized context summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::filter::FilterPatch;
use crate::summary::ContextSummary;

/// Data topic carrying structured action messages in both directions
pub const CONTROL_TOPIC: &str = "control";

/// Envelope type tag for action messages
pub const ACTION_TYPE: &str = "action";

/// Outbound action name carrying a serialized context summary
pub const DATA_CONTEXT_ACTION: &str = "data_context";

/// Discriminated envelope exchanged on the control topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEnvelope {
    /// Discriminator; only "action" envelopes are understood
    #[serde(rename = "type")]
    pub kind: String,
    /// Action name, e.g. "set_filter"
    pub action: String,
    /// Action-specific payload, absent for parameterless actions
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Correlation id, set on outbound messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl ControlEnvelope {
    /// Build an action envelope, mainly for tests and scenario scripts
    pub fn action(name: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: ACTION_TYPE.to_string(),
            action: name.into(),
            payload,
            id: None,
        }
    }

    /// Wrap a context summary for the outbound push
    pub fn context_update(summary: &ContextSummary) -> Result<Self> {
        let payload = serde_json::to_value(summary)
            .map_err(|e| EngineError::TransportError(format!("summary encode failed: {}", e)))?;
        Ok(Self {
            kind: ACTION_TYPE.to_string(),
            action: DATA_CONTEXT_ACTION.to_string(),
            payload,
            id: Some(Uuid::new_v4()),
        })
    }

    /// Wrap an already-serialized summary, as handed back by the sync
    /// scheduler, without re-aggregating
    pub fn context_update_raw(serialized: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(serialized)
            .map_err(|e| EngineError::TransportError(format!("summary payload corrupt: {}", e)))?;
        Ok(Self {
            kind: ACTION_TYPE.to_string(),
            action: DATA_CONTEXT_ACTION.to_string(),
            payload,
            id: Some(Uuid::new_v4()),
        })
    }

    /// Decode raw topic bytes into an envelope
    ///
    /// Anything that is not valid JSON, not an object in envelope shape,
    /// or not tagged as an action is malformed and gets dropped upstream.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let envelope: ControlEnvelope = serde_json::from_slice(data)
            .map_err(|e| EngineError::MalformedMessage(e.to_string()))?;
        if envelope.kind != ACTION_TYPE {
            return Err(EngineError::MalformedMessage(format!(
                "unexpected envelope type: {}",
                envelope.kind
            )));
        }
        Ok(envelope)
    }

    /// Encode for publishing
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| EngineError::TransportError(format!("envelope encode failed: {}", e)))
    }
}

/// Dimension a comparison can be requested over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareKind {
    Region,
    Product,
    Quarter,
    Rep,
}

impl CompareKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareKind::Region => "region",
            CompareKind::Product => "product",
            CompareKind::Quarter => "quarter",
            CompareKind::Rep => "rep",
        }
    }

    pub fn parse(name: &str) -> Option<CompareKind> {
        match name {
            "region" => Some(CompareKind::Region),
            "product" => Some(CompareKind::Product),
            "quarter" => Some(CompareKind::Quarter),
            "rep" => Some(CompareKind::Rep),
            _ => None,
        }
    }
}

/// A side-by-side comparison the agent asked for
///
/// Comparisons are transient view events. They do not touch the filter
/// state or history; the UI renders them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRequest {
    pub id: Uuid,
    pub kind: CompareKind,
    pub item1: String,
    pub item2: String,
}

/// A recognized, validated inbound action
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    /// Merge a partial filter update into the current state
    SetFilter(FilterPatch),
    /// Reset every dimension
    ClearFilters,
    /// Step back one history entry
    Undo,
    /// Show two items side by side without changing state
    Compare(ComparisonRequest),
}

/// Outcome of classifying an inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// A recognized action, ready for dispatch
    Action(AgentAction),
    /// Unknown action name; logged and skipped, not an error
    Unrecognized(String),
    /// Recognized action with an unusable payload
    Dropped(&'static str),
}

/// Classify a decoded envelope into an action
pub fn classify(envelope: &ControlEnvelope) -> Classified {
    match envelope.action.as_str() {
        "set_filter" => {
            // An empty patch still dispatches; the resulting no-op apply
            // records a history entry like any other spoken command.
            Classified::Action(AgentAction::SetFilter(FilterPatch::from_json(
                &envelope.payload,
            )))
        }
        "clear_filters" => Classified::Action(AgentAction::ClearFilters),
        "undo" => Classified::Action(AgentAction::Undo),
        "compare" => match compare_request(&envelope.payload) {
            Some(request) => Classified::Action(AgentAction::Compare(request)),
            None => Classified::Dropped("compare payload incomplete"),
        },
        other if other.is_empty() => Classified::Dropped("empty action name"),
        other => Classified::Unrecognized(other.to_string()),
    }
}

/// Extract a comparison request, requiring both items and a known kind
fn compare_request(payload: &Value) -> Option<ComparisonRequest> {
    let object = payload.as_object()?;
    let item1 = non_empty_str(object.get("item1")?)?;
    let item2 = non_empty_str(object.get("item2")?)?;
    let kind = CompareKind::parse(non_empty_str(object.get("dimension")?)?)?;
    Some(ComparisonRequest {
        id: Uuid::new_v4(),
        kind,
        item1: item1.to_string(),
        item2: item2.to_string(),
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Dimension, PatchOp};
    use serde_json::json;

    #[test]
    fn test_decode_set_filter_envelope() {
        let raw = br#"{"type":"action","action":"set_filter","payload":{"region":"US-East"}}"#;
        let envelope = ControlEnvelope::decode(raw).unwrap();
        assert_eq!(envelope.action, "set_filter");

        let Classified::Action(AgentAction::SetFilter(patch)) = classify(&envelope) else {
            panic!("expected set_filter action");
        };
        assert_eq!(
            patch.ops(),
            &[(Dimension::Region, PatchOp::Set("US-East".to_string()))]
        );
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = ControlEnvelope::decode(b"definitely not json").unwrap_err();
        assert!(matches!(err, EngineError::MalformedMessage(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_type_tag() {
        let raw = br#"{"type":"telemetry","action":"set_filter"}"#;
        let err = ControlEnvelope::decode(raw).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMessage(_)));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let err = ControlEnvelope::decode(br#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, EngineError::MalformedMessage(_)));
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let raw = br#"{"type":"action","action":"undo"}"#;
        let envelope = ControlEnvelope::decode(raw).unwrap();
        assert!(envelope.payload.is_null());
        assert_eq!(classify(&envelope), Classified::Action(AgentAction::Undo));
    }

    #[test]
    fn test_classify_clear_filters() {
        let envelope = ControlEnvelope::action("clear_filters", Value::Null);
        assert_eq!(
            classify(&envelope),
            Classified::Action(AgentAction::ClearFilters)
        );
    }

    #[test]
    fn test_classify_unrecognized_action() {
        let envelope = ControlEnvelope::action("export_pdf", Value::Null);
        assert_eq!(
            classify(&envelope),
            Classified::Unrecognized("export_pdf".to_string())
        );
    }

    #[test]
    fn test_classify_compare() {
        let envelope = ControlEnvelope::action(
            "compare",
            json!({"item1": "US-East", "item2": "US-West", "dimension": "region"}),
        );
        let Classified::Action(AgentAction::Compare(request)) = classify(&envelope) else {
            panic!("expected compare action");
        };
        assert_eq!(request.kind, CompareKind::Region);
        assert_eq!(request.item1, "US-East");
        assert_eq!(request.item2, "US-West");
    }

    #[test]
    fn test_compare_missing_item_is_dropped() {
        let envelope =
            ControlEnvelope::action("compare", json!({"item1": "US-East", "dimension": "region"}));
        assert!(matches!(classify(&envelope), Classified::Dropped(_)));
    }

    #[test]
    fn test_compare_empty_item_is_dropped() {
        let envelope = ControlEnvelope::action(
            "compare",
            json!({"item1": "US-East", "item2": "", "dimension": "region"}),
        );
        assert!(matches!(classify(&envelope), Classified::Dropped(_)));
    }

    #[test]
    fn test_compare_unknown_dimension_is_dropped() {
        let envelope = ControlEnvelope::action(
            "compare",
            json!({"item1": "a", "item2": "b", "dimension": "mood"}),
        );
        assert!(matches!(classify(&envelope), Classified::Dropped(_)));
    }

    #[test]
    fn test_context_update_envelope_shape() {
        let summary = crate::summary::summarize(
            crate::data::Dataset::demo().records(),
            &crate::filter::FilterState::empty(),
            &crate::history::HistoryStack::new(),
        );
        let envelope = ControlEnvelope::context_update(&summary).unwrap();
        assert_eq!(envelope.kind, ACTION_TYPE);
        assert_eq!(envelope.action, DATA_CONTEXT_ACTION);
        assert!(envelope.id.is_some());

        let bytes = envelope.encode().unwrap();
        let back = ControlEnvelope::decode(&bytes).unwrap();
        assert_eq!(back.action, DATA_CONTEXT_ACTION);
        assert!(back.payload.get("recordCount").is_some());
    }

    #[test]
    fn test_context_update_raw_carries_payload_verbatim() {
        let envelope = ControlEnvelope::context_update_raw(r#"{"recordCount":3}"#).unwrap();
        assert_eq!(envelope.action, DATA_CONTEXT_ACTION);
        assert_eq!(envelope.payload, json!({"recordCount": 3}));

        let err = ControlEnvelope::context_update_raw("{broken").unwrap_err();
        assert!(matches!(err, EngineError::TransportError(_)));
    }

    #[test]
    fn test_set_filter_with_non_object_payload_yields_empty_patch() {
        let envelope = ControlEnvelope::action("set_filter", json!(42));
        let Classified::Action(AgentAction::SetFilter(patch)) = classify(&envelope) else {
            panic!("expected set_filter action");
        };
        assert!(patch.is_empty());
    }
}
