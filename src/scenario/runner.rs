//! Scenario runner
//!
//! Drives a running engine through the in-memory transport, step by
//! step. Assertions poll the shared state until they pass or a settle
//! window expires, since the engine applies actions asynchronously.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{Scenario, StepAction, StepAssert};
use crate::data::Dataset;
use crate::engine::EngineHandle;
use crate::filter::Dimension;
use crate::message::{ControlEnvelope, CONTROL_TOPIC};
use crate::summary::performance_pct;
use crate::transport::MemoryTransportHandle;

/// Result of one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub index: usize,
    pub time_ms: u64,
    pub detail: String,
    pub passed: bool,
}

/// Result of a whole scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub outcomes: Vec<StepOutcome>,
    pub elapsed: Duration,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }

    /// One-line result, e.g. "east drill-down: 4/4 steps passed in 0.31s"
    pub fn summary(&self) -> String {
        let passed = self.outcomes.iter().filter(|o| o.passed).count();
        format!(
            "{}: {}/{} steps passed in {:.2}s",
            self.name,
            passed,
            self.outcomes.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Executes scenario steps against a live engine
pub struct ScenarioRunner {
    scenario: Scenario,
    settle: Duration,
}

impl ScenarioRunner {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            settle: Duration::from_millis(300),
        }
    }

    /// How long an assertion may poll before counting as failed
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run every step to completion and report
    ///
    /// The engine must already be started. `transport` is the handle side
    /// of the same in-memory transport the engine was built on, and
    /// `dataset` the records it serves.
    pub fn run(
        &self,
        handle: &EngineHandle,
        transport: &MemoryTransportHandle,
        dataset: &Dataset,
    ) -> ScenarioReport {
        info!(
            "Running scenario '{}' ({} steps)",
            self.scenario.scenario.name,
            self.scenario.steps.len()
        );
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(self.scenario.steps.len());

        for (index, step) in self.scenario.steps.iter().enumerate() {
            let target = Duration::from_millis(step.time_ms);
            if let Some(wait) = target.checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
            debug!("Step {} at {}ms: {}", index, step.time_ms, step.action.describe());
            self.execute(&step.action, transport);

            let outcome = match &step.assert {
                Some(assert) => match self.check(assert, handle, transport, dataset) {
                    Ok(()) => StepOutcome {
                        index,
                        time_ms: step.time_ms,
                        detail: step.action.describe(),
                        passed: true,
                    },
                    Err(reason) => {
                        warn!("Step {} assertion failed: {}", index, reason);
                        StepOutcome {
                            index,
                            time_ms: step.time_ms,
                            detail: format!("{}: {}", step.action.describe(), reason),
                            passed: false,
                        }
                    }
                },
                None => StepOutcome {
                    index,
                    time_ms: step.time_ms,
                    detail: step.action.describe(),
                    passed: true,
                },
            };
            outcomes.push(outcome);
        }

        let report = ScenarioReport {
            name: self.scenario.scenario.name.clone(),
            outcomes,
            elapsed: started.elapsed(),
        };
        info!("{}", report.summary());
        report
    }

    fn execute(&self, action: &StepAction, transport: &MemoryTransportHandle) {
        match action {
            StepAction::Connect => transport.connect(),
            StepAction::Disconnect { reason } => transport.disconnect(reason.clone()),
            StepAction::SetFilter {
                region,
                product,
                quarter,
                status,
                rep,
                close_month,
            } => {
                let mut payload = Map::new();
                let fields = [
                    ("region", region),
                    ("product", product),
                    ("quarter", quarter),
                    ("status", status),
                    ("rep", rep),
                    ("closeMonth", close_month),
                ];
                for (key, value) in fields {
                    if let Some(value) = value {
                        payload.insert(key.to_string(), Value::String(value.clone()));
                    }
                }
                self.deliver(transport, ControlEnvelope::action("set_filter", Value::Object(payload)));
            }
            StepAction::ClearFilters => {
                self.deliver(transport, ControlEnvelope::action("clear_filters", Value::Null));
            }
            StepAction::Undo => {
                self.deliver(transport, ControlEnvelope::action("undo", Value::Null));
            }
            StepAction::Compare {
                item1,
                item2,
                dimension,
            } => {
                let payload = serde_json::json!({
                    "item1": item1,
                    "item2": item2,
                    "dimension": dimension,
                });
                self.deliver(transport, ControlEnvelope::action("compare", payload));
            }
            StepAction::Transcribe { text } => transport.transcribe(text.clone()),
            StepAction::Raw { topic, json } => {
                let topic = topic.as_deref().unwrap_or(CONTROL_TOPIC);
                transport.deliver(topic, json.clone().into_bytes());
            }
            StepAction::Log { message } => info!("[scenario] {}", message),
        }
    }

    fn deliver(&self, transport: &MemoryTransportHandle, envelope: ControlEnvelope) {
        if let Err(e) = transport.deliver_action(&envelope) {
            warn!("Scenario step delivery failed: {}", e);
        }
    }

    /// Poll an assertion until it passes or the settle window runs out
    fn check(
        &self,
        assert: &StepAssert,
        handle: &EngineHandle,
        transport: &MemoryTransportHandle,
        dataset: &Dataset,
    ) -> Result<(), String> {
        let deadline = Instant::now() + self.settle;
        loop {
            let result = evaluate(assert, handle, transport, dataset);
            match result {
                Ok(()) => return Ok(()),
                Err(reason) if Instant::now() >= deadline => return Err(reason),
                Err(_) => thread::sleep(Duration::from_millis(5)),
            }
        }
    }
}

fn evaluate(
    assert: &StepAssert,
    handle: &EngineHandle,
    transport: &MemoryTransportHandle,
    dataset: &Dataset,
) -> Result<(), String> {
    let snapshot = handle.snapshot();
    match assert {
        StepAssert::RecordCount { expected } => {
            let count = dataset
                .records()
                .iter()
                .filter(|r| snapshot.filter.matches(r))
                .count();
            expect_eq("record count", count, *expected)
        }
        StepAssert::TotalRevenue { expected } => {
            let revenue: i64 = dataset
                .records()
                .iter()
                .filter(|r| snapshot.filter.matches(r))
                .map(|r| r.revenue)
                .sum();
            expect_eq("total revenue", revenue, *expected)
        }
        StepAssert::PerformancePct { expected } => {
            let matched: Vec<_> = dataset
                .records()
                .iter()
                .filter(|r| snapshot.filter.matches(r))
                .collect();
            let revenue: i64 = matched.iter().map(|r| r.revenue).sum();
            let target: i64 = matched.iter().map(|r| r.target).sum();
            expect_eq("performance pct", performance_pct(revenue, target), *expected)
        }
        StepAssert::FilterActive { dimension, value } => {
            let dim = parse_dimension(dimension)
                .ok_or_else(|| format!("unknown dimension '{}'", dimension))?;
            match snapshot.filter.get(dim) {
                Some(active) if active == value => Ok(()),
                Some(active) => Err(format!(
                    "dimension {} is '{}', expected '{}'",
                    dimension, active, value
                )),
                None => Err(format!("dimension {} is not active", dimension)),
            }
        }
        StepAssert::FilterEmpty => {
            if snapshot.filter.is_empty() {
                Ok(())
            } else {
                Err(format!("filters still active: {}", snapshot.filter))
            }
        }
        StepAssert::CanUndo { expected } => expect_eq("can_undo", snapshot.can_undo, *expected),
        StepAssert::HistoryDepth { expected } => {
            expect_eq("history depth", snapshot.history_depth, *expected)
        }
        StepAssert::InsightPresent { expected } => {
            expect_eq("insight present", snapshot.insight.is_some(), *expected)
        }
        StepAssert::Connected { expected } => {
            expect_eq("connected", snapshot.connection.is_connected(), *expected)
        }
        StepAssert::PushesAtLeast { min } => {
            let sent = transport.sent_count();
            if sent >= *min {
                Ok(())
            } else {
                Err(format!("only {} pushes, expected at least {}", sent, min))
            }
        }
        StepAssert::PushesExactly { expected } => {
            expect_eq("push count", transport.sent_count(), *expected)
        }
    }
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(
    what: &str,
    actual: T,
    expected: T,
) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{} is {:?}, expected {:?}", what, actual, expected))
    }
}

/// Accepts the wire spelling plus a snake_case alias for closeMonth,
/// since scenario files lean snake_case
fn parse_dimension(name: &str) -> Option<Dimension> {
    Dimension::parse(name).or(match name {
        "close_month" => Some(Dimension::CloseMonth),
        _ => None,
    })
}
