//! CLI command implementations

use std::sync::Arc;
use std::time::Duration;

use console::style;
use serde::Serialize;

use marquee_core::{
    bridge::{ControllerSignal, SurfaceEvent},
    engine::EngineEvent,
    mock::{MockEngineFactory, MockSurface},
    resolve,
    session::PlaybackSession,
    strategy::{self, StrategyKind},
    telemetry::TelemetryRow,
    types::{ControllerConfig, DeliveryKind, MediaSource},
};

use crate::output::{to_json, OutputFormat};

#[derive(Serialize)]
struct ClassifyReport<'a> {
    url: &'a str,
    kind: DeliveryKind,
}

/// Classify a URL into its delivery kind
pub fn classify(url: &str, format: &str) -> anyhow::Result<()> {
    let kind = resolve::classify(url);

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&ClassifyReport { url, kind })),
        OutputFormat::Text => {
            println!("{}: {}", url, style(kind).cyan());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct PlanReport<'a> {
    url: &'a str,
    kind: DeliveryKind,
    engine_supported: bool,
    strategy: Option<StrategyKind>,
    error: Option<String>,
}

/// Resolve the delivery strategy a session would pick for this URL
pub fn plan(
    url: &str,
    engine_supported: bool,
    native_hls: bool,
    native_dash: bool,
    format: &str,
) -> anyhow::Result<()> {
    let kind = resolve::classify(url);
    let choice = strategy::choose(kind, engine_supported, |k| match k {
        DeliveryKind::Progressive => true,
        DeliveryKind::Hls => native_hls,
        DeliveryKind::Dash => native_dash,
    });

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let report = PlanReport {
                url,
                kind,
                engine_supported,
                strategy: choice.as_ref().ok().copied(),
                error: choice.as_ref().err().map(|e| e.to_string()),
            };
            println!("{}", to_json(&report));
        }
        OutputFormat::Text => {
            println!("URL:      {}", url);
            println!("Kind:     {}", style(kind).cyan());
            match choice {
                Ok(strategy) => println!("Strategy: {}", style(strategy).green()),
                Err(err) => {
                    println!("Strategy: {}", style(&err).red());
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct SimulateReport<'a> {
    url: &'a str,
    strategy: Option<StrategyKind>,
    signals: Vec<ControllerSignal>,
    telemetry: Vec<TelemetryRow>,
}

/// Run a full load against in-memory doubles and report everything the
/// controller emitted. Useful for eyeballing the signal sequence a host
/// integration should expect.
pub async fn simulate(url: &str, engine_supported: bool, format: &str) -> anyhow::Result<()> {
    let surface = Arc::new(MockSurface::new());
    surface.set_duration(Some(600.0));
    let factory = Arc::new(MockEngineFactory::new(engine_supported));
    let (session, mut signals) = PlaybackSession::new(
        surface.clone(),
        factory.clone(),
        ControllerConfig::default(),
    );

    let source = MediaSource::new(url::Url::parse(url)?, "simulated");
    let load_result = session.load(source).await;

    if load_result.is_ok() {
        // Engine-backed playback needs a manifest before anything moves
        if let Some(engine) = factory.last_engine() {
            engine.emit(EngineEvent::ManifestParsed);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        session.on_surface_event(SurfaceEvent::Playing).await;
    }

    let mut emitted = Vec::new();
    while let Ok(signal) = signals.try_recv() {
        emitted.push(signal);
    }
    let telemetry = session.snapshot().await;
    let strategy = session.strategy_kind().await;
    session.teardown().await;

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            let report = SimulateReport {
                url,
                strategy,
                signals: emitted,
                telemetry,
            };
            println!("{}", to_json(&report));
        }
        OutputFormat::Text => {
            println!("URL:      {}", url);
            match strategy {
                Some(strategy) => println!("Strategy: {}", style(strategy).green()),
                None => println!("Strategy: {}", style("none (load failed)").red()),
            }
            println!("\nSignals:");
            for signal in &emitted {
                println!("  {:?}", signal);
            }
            println!("\nTelemetry:");
            for row in &telemetry {
                match row {
                    TelemetryRow::Entry { label, value } => {
                        println!("  {:<16} {}", format!("{label}:"), value)
                    }
                    TelemetryRow::Divider => println!("  {}", style("----").dim()),
                }
            }
        }
    }

    if load_result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
