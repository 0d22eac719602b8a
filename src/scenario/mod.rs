//! Scripted scenarios for exercising the engine end to end
//!
//! A scenario is a TOML file describing timed steps: transport events,
//! agent actions and assertions over the resulting view state. The demo
//! binary runs one against the in-memory transport, which makes whole
//! engine flows reproducible without a voice session.
//!
//! Example:
//!
//! ```toml
//! [scenario]
//! name = "east region drill-down"
//!
//! [[steps]]
//! time_ms = 0
//! type = "connect"
//!
//! [[steps]]
//! time_ms = 100
//! type = "set_filter"
//! region = "US-East"
//! assert = { type = "filter_active", dimension = "region", value = "US-East" }
//! ```

mod runner;

pub use runner::{ScenarioReport, ScenarioRunner, StepOutcome};

use std::path::Path;

use serde::Deserialize;

/// A parsed scenario file
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub scenario: ScenarioMeta,
    pub steps: Vec<ScenarioStep>,
}

/// The `[scenario]` header table
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One timed step
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Milliseconds from scenario start when the step fires
    pub time_ms: u64,
    #[serde(flatten)]
    pub action: StepAction,
    /// Optional check evaluated after the action settles
    #[serde(default)]
    pub assert: Option<StepAssert>,
}

/// What a step does
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Raise the transport connected event
    Connect,
    /// Raise the transport disconnected event
    Disconnect {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Deliver a set_filter action; unset fields are left untouched,
    /// empty strings clear their dimension
    SetFilter {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        product: Option<String>,
        #[serde(default)]
        quarter: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        rep: Option<String>,
        #[serde(default)]
        close_month: Option<String>,
    },
    /// Deliver a clear_filters action
    ClearFilters,
    /// Deliver an undo action
    Undo,
    /// Deliver a compare action
    Compare {
        item1: String,
        item2: String,
        dimension: String,
    },
    /// Deliver an agent transcription event
    Transcribe { text: String },
    /// Deliver raw bytes, optionally on a different topic; exercises the
    /// malformed-message and foreign-topic paths
    Raw {
        #[serde(default)]
        topic: Option<String>,
        json: String,
    },
    /// Log a marker line
    Log { message: String },
}

impl StepAction {
    /// Short description for reports
    pub fn describe(&self) -> String {
        match self {
            StepAction::Connect => "connect".to_string(),
            StepAction::Disconnect { .. } => "disconnect".to_string(),
            StepAction::SetFilter { .. } => "set_filter".to_string(),
            StepAction::ClearFilters => "clear_filters".to_string(),
            StepAction::Undo => "undo".to_string(),
            StepAction::Compare { item1, item2, .. } => {
                format!("compare {} vs {}", item1, item2)
            }
            StepAction::Transcribe { .. } => "transcribe".to_string(),
            StepAction::Raw { .. } => "raw delivery".to_string(),
            StepAction::Log { message } => format!("log: {}", message),
        }
    }

    fn sets_any_dimension(&self) -> bool {
        match self {
            StepAction::SetFilter {
                region,
                product,
                quarter,
                status,
                rep,
                close_month,
            } => [region, product, quarter, status, rep, close_month]
                .iter()
                .any(|field| field.is_some()),
            _ => true,
        }
    }
}

/// Check evaluated against the live engine after a step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAssert {
    /// Records matching the active filters
    RecordCount { expected: usize },
    /// Revenue total over the filtered view
    TotalRevenue { expected: i64 },
    /// Rounded attainment percentage over the filtered view
    PerformancePct { expected: u32 },
    /// A dimension holds a specific value
    FilterActive { dimension: String, value: String },
    /// No filters active
    FilterEmpty,
    CanUndo { expected: bool },
    /// Snapshot depth including the initial empty state
    HistoryDepth { expected: usize },
    InsightPresent { expected: bool },
    Connected { expected: bool },
    /// At least this many context pushes have gone out
    PushesAtLeast { min: usize },
    /// Exactly this many context pushes have gone out
    PushesExactly { expected: usize },
}

/// Scenario loading and validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    FileNotFound(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "Scenario file not found: {}", path)
            }
            ScenarioError::ParseError(msg) => write!(f, "Failed to parse scenario: {}", msg),
            ScenarioError::ValidationError(msg) => write!(f, "Invalid scenario: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioError {}

impl Scenario {
    /// Load and validate a scenario from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ScenarioError::FileNotFound(path.display().to_string()))?;
        Self::parse(&raw)
    }

    /// Parse and validate scenario TOML
    pub fn parse(raw: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario =
            toml::from_str(raw).map_err(|e| ScenarioError::ParseError(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check structural rules: a name, at least one step, chronological
    /// order, no empty set_filter steps
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.scenario.name.trim().is_empty() {
            return Err(ScenarioError::ValidationError(
                "scenario name must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::ValidationError(
                "scenario has no steps".to_string(),
            ));
        }
        let mut last_time = 0u64;
        for (index, step) in self.steps.iter().enumerate() {
            if step.time_ms < last_time {
                return Err(ScenarioError::ValidationError(format!(
                    "step {} at {}ms is earlier than its predecessor at {}ms",
                    index, step.time_ms, last_time
                )));
            }
            last_time = step.time_ms;
            if !step.action.sets_any_dimension() {
                return Err(ScenarioError::ValidationError(format!(
                    "step {} is a set_filter with no dimensions",
                    index
                )));
            }
            if let StepAction::Raw { json, .. } = &step.action {
                if json.is_empty() {
                    return Err(ScenarioError::ValidationError(format!(
                        "step {} delivers empty raw bytes",
                        index
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total scripted duration
    pub fn duration_ms(&self) -> u64 {
        self.steps.last().map(|s| s.time_ms).unwrap_or(0)
    }
}
