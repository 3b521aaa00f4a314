use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};
use engine::SimulationRegistry;
use shared::SimProperties;
use sim::{observe, DayListener};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runner=info,engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let props = load_props()?;
    tracing::info!(
        "starting run {:?} on a {}x{} grid",
        props.run_name,
        props.width,
        props.height
    );

    let mut listeners: Vec<DayListener> = vec![Box::new(|sim| {
        let stats = observe::day_stats(sim);
        tracing::info!(
            "day {}: {} animals, {} plants, avg energy {:.1}",
            stats.day,
            stats.live_animals,
            stats.plants,
            stats.avg_energy
        );
    })];

    if props.save_statistics {
        listeners.push(statistics_listener(&props)?);
    }

    let run_name = props.run_name.clone();
    let mut registry = SimulationRegistry::new();
    registry.launch(props, listeners)?;

    // Block until the population dies out, then tear the pipeline down.
    if let Some(handle) = registry.get(&run_name) {
        handle.engine.wait_until_finished();
        let sim = handle.engine.simulation();
        let sim = sim.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let stats = observe::day_stats(&sim);
        tracing::info!(
            "run {:?} finished after {} days; {} animals lived",
            run_name,
            stats.day,
            stats.live_animals + stats.dead_animals
        );
    }
    registry.stop_all();

    Ok(())
}

/// Read the configuration from the path given on the command line, or fall
/// back to the defaults.
fn load_props() -> Result<SimProperties> {
    match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("invalid config in {path}"))
        }
        None => Ok(SimProperties::default()),
    }
}

/// Append one JSON line of statistics per completed day. Write failures are
/// logged and swallowed; telemetry must never take the simulation down.
fn statistics_listener(props: &SimProperties) -> Result<DayListener> {
    let path = format!("{}_stats.jsonl", props.run_name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {path}"))?;
    tracing::info!("appending day statistics to {path}");

    let sink = Mutex::new(file);
    Ok(Box::new(move |sim| {
        let stats = observe::day_stats(sim);
        let mut file = match sink.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        match serde_json::to_string(&stats) {
            Ok(line) => {
                if let Err(error) = writeln!(file, "{line}") {
                    tracing::warn!("could not append statistics: {error}");
                }
            }
            Err(error) => tracing::warn!("could not encode statistics: {error}"),
        }
    }))
}
