//! End-to-end engine tests over the in-memory transport
//!
//! Each test starts a real engine thread, plays the agent through the
//! transport handle and polls the shared state, mirroring how a UI
//! would observe it.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use voxboard::engine::EngineEvent;
use voxboard::transport::MemoryTransportHandle;
use voxboard::{
    ConnectionState, ControlEnvelope, Dataset, Dimension, Engine, EngineConfig, EngineHandle,
    MemoryTransport, CONTROL_TOPIC,
};

const QUIET: Duration = Duration::from_millis(60);

struct TestRig {
    handle: EngineHandle,
    transport: MemoryTransportHandle,
    dataset: Dataset,
    join: thread::JoinHandle<()>,
}

impl TestRig {
    fn start() -> Self {
        let dataset = Dataset::demo();
        let (transport, transport_handle, transport_events) = MemoryTransport::new(64);
        let config = EngineConfig::new()
            .with_sync_quiet(QUIET)
            .with_transcript_fade(Duration::from_millis(100));
        let (engine, handle) = Engine::new(
            config,
            dataset.clone(),
            Box::new(transport),
            transport_events,
        );
        let join = engine.start();
        Self {
            handle,
            transport: transport_handle,
            dataset,
            join,
        }
    }

    /// Connect and wait for the initial context push to settle
    fn start_connected() -> Self {
        let rig = Self::start();
        rig.transport.connect();
        assert!(
            rig.wait_until(|rig| rig.transport.sent_count() >= 1),
            "initial context push never arrived"
        );
        rig
    }

    fn wait_until<F: Fn(&TestRig) -> bool>(&self, condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition(self)
    }

    /// Drain events until one matches, or give up after the timeout
    fn wait_for_event<F: Fn(&EngineEvent) -> bool>(&self, matches: F) -> Option<EngineEvent> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(event) = self.handle.recv_event_timeout(Duration::from_millis(20)) {
                if matches(&event) {
                    return Some(event);
                }
            }
        }
        None
    }

    fn deliver_set_filter(&self, payload: serde_json::Value) {
        self.transport
            .deliver_action(&ControlEnvelope::action("set_filter", payload))
            .unwrap();
    }

    fn shutdown(self) {
        self.handle.shutdown().unwrap();
        self.join.join().unwrap();
    }
}

#[test]
fn test_remote_set_filter_updates_view() {
    let rig = TestRig::start_connected();

    rig.deliver_set_filter(json!({"region": "US-East"}));

    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("US-East")
    }));
    let snapshot = rig.handle.snapshot();
    assert!(snapshot.can_undo);
    assert_eq!(snapshot.history_depth, 2);
    assert_eq!(
        snapshot.insight.as_ref().map(|i| i.value.as_str()),
        Some("US-East")
    );

    rig.shutdown();
}

#[test]
fn test_rapid_changes_collapse_to_one_push() {
    let rig = TestRig::start_connected();
    let before = rig.transport.sent_count();

    rig.deliver_set_filter(json!({"region": "US-East"}));
    thread::sleep(Duration::from_millis(10));
    rig.deliver_set_filter(json!({"quarter": "Q1"}));
    thread::sleep(Duration::from_millis(10));
    rig.deliver_set_filter(json!({"status": "good"}));

    // Wait well past the quiet interval, then confirm a single push
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == before + 1));
    thread::sleep(QUIET * 3);
    assert_eq!(rig.transport.sent_count(), before + 1);

    let envelope = rig.transport.last_sent_envelope().unwrap();
    assert_eq!(envelope.action, "data_context");
    let filters = &envelope.payload["activeFilters"];
    assert_eq!(filters["region"], "US-East");
    assert_eq!(filters["quarter"], "Q1");
    assert_eq!(filters["status"], "good");

    rig.shutdown();
}

#[test]
fn test_pushed_summary_matches_filtered_view() {
    let rig = TestRig::start_connected();

    rig.deliver_set_filter(json!({"region": "US-East"}));
    assert!(rig.wait_until(|rig| rig.transport.sent_count() >= 2));

    let expected: i64 = rig
        .dataset
        .records()
        .iter()
        .filter(|r| r.region == "US-East")
        .map(|r| r.revenue)
        .sum();
    let expected_count = rig
        .dataset
        .records()
        .iter()
        .filter(|r| r.region == "US-East")
        .count();

    let envelope = rig.transport.last_sent_envelope().unwrap();
    assert_eq!(envelope.payload["totalRevenue"], json!(expected));
    assert_eq!(envelope.payload["recordCount"], json!(expected_count));
    assert_eq!(envelope.payload["canUndo"], json!(true));

    rig.shutdown();
}

#[test]
fn test_unchanged_summary_is_not_pushed_again() {
    let rig = TestRig::start_connected();

    rig.deliver_set_filter(json!({"region": "US-East"}));
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == 2));

    // An empty patch re-applies the same state; only history depth grows,
    // which the serialized summary does not carry
    rig.deliver_set_filter(json!({}));
    thread::sleep(QUIET * 3);
    assert_eq!(rig.transport.sent_count(), 2);

    rig.shutdown();
}

#[test]
fn test_disconnect_abandons_pending_push() {
    let rig = TestRig::start_connected();
    let before = rig.transport.sent_count();

    rig.deliver_set_filter(json!({"region": "APAC"}));
    // Drop the session before the quiet interval can elapse
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("APAC")
    }));
    rig.transport.disconnect(Some("network lost".into()));

    assert!(rig.wait_until(|rig| !rig.handle.is_connected()));
    thread::sleep(QUIET * 3);
    assert_eq!(rig.transport.sent_count(), before);

    rig.shutdown();
}

#[test]
fn test_reconnect_pushes_even_when_unchanged() {
    let rig = TestRig::start_connected();
    assert_eq!(rig.transport.sent_count(), 1);

    rig.transport.disconnect(None);
    assert!(rig.wait_until(|rig| !rig.handle.is_connected()));

    // Nothing changed while offline; the baseline reset still forces a
    // fresh push on reconnect
    rig.transport.connect();
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == 2));

    let first = ControlEnvelope::decode(&rig.transport.sent()[0]).unwrap();
    let second = rig.transport.last_sent_envelope().unwrap();
    assert_eq!(first.payload, second.payload);

    rig.shutdown();
}

#[test]
fn test_foreign_topic_and_malformed_bytes_are_ignored() {
    let rig = TestRig::start_connected();
    let before = rig.transport.sent_count();

    rig.transport.deliver("weather", b"{\"temp\": 21}".to_vec());
    rig.transport.deliver(CONTROL_TOPIC, b"\x00\x01garbage".to_vec());
    rig.transport
        .deliver(CONTROL_TOPIC, br#"{"type":"telemetry","action":"x"}"#.to_vec());

    // The engine keeps serving; a valid action still lands afterwards
    rig.deliver_set_filter(json!({"product": "Pulse CRM"}));
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Product) == Some("Pulse CRM")
    }));
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == before + 1));
    assert_eq!(rig.handle.snapshot().history_depth, 2);

    rig.shutdown();
}

#[test]
fn test_unrecognized_action_is_skipped() {
    let rig = TestRig::start_connected();

    rig.transport
        .deliver_action(&ControlEnvelope::action("export_pdf", json!({})))
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    let snapshot = rig.handle.snapshot();
    assert!(snapshot.filter.is_empty());
    assert_eq!(snapshot.history_depth, 1);

    rig.shutdown();
}

#[test]
fn test_compare_emits_event_without_touching_state() {
    let rig = TestRig::start_connected();

    rig.transport
        .deliver_action(&ControlEnvelope::action(
            "compare",
            json!({"item1": "US-East", "item2": "US-West", "dimension": "region"}),
        ))
        .unwrap();

    let event = rig.wait_for_event(|e| matches!(e, EngineEvent::Comparison(_)));
    let Some(EngineEvent::Comparison(request)) = event else {
        panic!("no comparison event arrived");
    };
    assert_eq!(request.item1, "US-East");
    assert_eq!(request.item2, "US-West");

    let snapshot = rig.handle.snapshot();
    assert!(snapshot.filter.is_empty());
    assert_eq!(snapshot.history_depth, 1);

    rig.shutdown();
}

#[test]
fn test_incomplete_compare_is_dropped() {
    let rig = TestRig::start_connected();

    rig.transport
        .deliver_action(&ControlEnvelope::action(
            "compare",
            json!({"item1": "US-East", "dimension": "region"}),
        ))
        .unwrap();

    let event = rig.wait_for_event(|e| matches!(e, EngineEvent::Comparison(_)));
    assert!(event.is_none(), "incomplete compare must not surface");
    assert_eq!(rig.handle.snapshot().history_depth, 1);

    rig.shutdown();
}

#[test]
fn test_undo_remote_round_trip() {
    let rig = TestRig::start_connected();

    rig.deliver_set_filter(json!({"region": "US-East"}));
    rig.deliver_set_filter(json!({"region": "US-West"}));
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("US-West")
    }));

    rig.transport
        .deliver_action(&ControlEnvelope::action("undo", json!(null)))
        .unwrap();
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("US-East")
    }));

    // Undo all the way to the floor, then once more
    rig.transport
        .deliver_action(&ControlEnvelope::action("undo", json!(null)))
        .unwrap();
    assert!(rig.wait_until(|rig| rig.handle.state().filter().is_empty()));
    rig.transport
        .deliver_action(&ControlEnvelope::action("undo", json!(null)))
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(rig.handle.state().filter().is_empty());
    assert!(!rig.handle.can_undo());

    rig.shutdown();
}

#[test]
fn test_send_failure_keeps_state_committed() {
    let rig = TestRig::start_connected();

    rig.transport.set_failing(true);
    rig.deliver_set_filter(json!({"region": "EU-Central"}));
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("EU-Central")
    }));
    thread::sleep(QUIET * 3);
    // Push was dropped, nothing recorded
    assert_eq!(rig.transport.sent_count(), 1);

    // The next change goes out once sends work again
    rig.transport.set_failing(false);
    rig.deliver_set_filter(json!({"quarter": "Q2"}));
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == 2));
    let filters = &rig.transport.last_sent_envelope().unwrap().payload["activeFilters"];
    assert_eq!(filters["region"], "EU-Central");
    assert_eq!(filters["quarter"], "Q2");

    rig.shutdown();
}

#[test]
fn test_connect_failure_then_successful_session() {
    let rig = TestRig::start();

    rig.handle.connect_failed("identity service unreachable").unwrap();
    assert!(rig.wait_until(|rig| {
        matches!(rig.handle.state().connection(), ConnectionState::Failed(_))
    }));

    // A later successful session replaces the failure
    rig.transport.connect();
    assert!(rig.wait_until(|rig| rig.handle.is_connected()));
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == 1));

    rig.shutdown();
}

#[test]
fn test_actions_apply_while_disconnected_without_pushes() {
    let rig = TestRig::start();

    rig.deliver_set_filter(json!({"region": "US-East"}));
    assert!(rig.wait_until(|rig| {
        rig.handle.state().filter().get(Dimension::Region) == Some("US-East")
    }));
    thread::sleep(QUIET * 3);
    assert_eq!(rig.transport.sent_count(), 0);

    // Connecting later pushes the state built up offline
    rig.transport.connect();
    assert!(rig.wait_until(|rig| rig.transport.sent_count() == 1));
    let filters = &rig.transport.last_sent_envelope().unwrap().payload["activeFilters"];
    assert_eq!(filters["region"], "US-East");

    rig.shutdown();
}
