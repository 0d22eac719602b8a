use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxboard::scenario::{Scenario, ScenarioRunner};
use voxboard::transport::CredentialProvider;
use voxboard::{Dataset, Engine, EngineConfig, MemoryTransport, StaticCredentialProvider};

/// Played when no scenario file is given on the command line
///
/// Step spacing stays clear of the 500ms debounce so each settled state
/// actually goes out before the next change lands.
const DEMO_SCENARIO: &str = r#"
[scenario]
name = "built-in demo"
description = "connect, drill into US-East, compare, undo back out"

[[steps]]
time_ms = 0
type = "connect"
assert = { type = "connected", expected = true }

[[steps]]
time_ms = 150
type = "transcribe"
text = "Let's look at the East region first."

[[steps]]
time_ms = 300
type = "set_filter"
region = "US-East"
assert = { type = "filter_active", dimension = "region", value = "US-East" }

[[steps]]
time_ms = 900
type = "set_filter"
quarter = "Q1"
assert = { type = "history_depth", expected = 3 }

[[steps]]
time_ms = 1000
type = "compare"
item1 = "US-East"
item2 = "US-West"
dimension = "region"

[[steps]]
time_ms = 1600
type = "log"
message = "context pushes flowing"
assert = { type = "pushes_at_least", min = 2 }

[[steps]]
time_ms = 1700
type = "undo"
assert = { type = "filter_active", dimension = "region", value = "US-East" }

[[steps]]
time_ms = 2400
type = "clear_filters"
assert = { type = "filter_empty" }

[[steps]]
time_ms = 3100
type = "disconnect"
assert = { type = "connected", expected = false }
"#;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxboard=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Voxboard");

    let mut args = std::env::args().skip(1);
    let scenario_path = args.next();
    let dataset_path = args.next();

    let dataset = match &dataset_path {
        Some(path) => Dataset::from_json_file(path)
            .with_context(|| format!("loading dataset from {}", path))?,
        None => Dataset::demo(),
    };
    info!("Dataset loaded: {} records", dataset.len());

    let scenario = match &scenario_path {
        Some(path) => Scenario::load_from_file(path)
            .with_context(|| format!("loading scenario from {}", path))?,
        None => Scenario::parse(DEMO_SCENARIO).context("parsing built-in demo scenario")?,
    };

    let config = EngineConfig::default();
    let (transport, transport_handle, transport_events) =
        MemoryTransport::new(config.channel_buffer_size);
    let (engine, handle) = Engine::new(config, dataset.clone(), Box::new(transport), transport_events);
    let engine_thread = engine.start();

    // The in-memory session still walks the credential boundary so the
    // failure path stays honest end to end
    let provider = StaticCredentialProvider::new("memory://local", "demo-token");
    match provider.fetch() {
        Ok(credentials) => {
            info!("Session credentials issued for {}", credentials.url);
        }
        Err(e) => {
            warn!("Credential exchange failed: {}", e);
            handle
                .connect_failed(e.user_message())
                .context("recording connection failure")?;
        }
    }

    let report = ScenarioRunner::new(scenario)
        .with_settle(Duration::from_millis(400))
        .run(&handle, &transport_handle, &dataset);

    for failure in report.failures() {
        warn!(
            "Step {} ({}ms) failed: {}",
            failure.index, failure.time_ms, failure.detail
        );
    }
    info!(
        "Context pushes sent: {}",
        transport_handle.sent_count()
    );

    handle.shutdown().ok();
    if engine_thread.join().is_err() {
        bail!("engine thread panicked");
    }

    if !report.passed() {
        bail!("scenario failed: {}", report.summary());
    }
    info!("{}", report.summary());
    Ok(())
}
