//! `benchmon watch`: poll until Ctrl+C, optionally persisting state.

use std::path::Path;
use std::time::Duration;

use benchmon_core::{CycleSummary, Tracker, store};
use tokio_util::sync::CancellationToken;

use super::{ApiArgs, format_timestamp, make_engine, resolve_metrics, runtime};

pub fn run(
    api: &ApiArgs,
    app: Option<&str>,
    metric_specs: &[String],
    interval_secs: u64,
    state_file: Option<&str>,
) {
    let config = api.engine_config();
    let engine = make_engine(&config);
    let rt = runtime();
    let metrics = rt.block_on(resolve_metrics(&engine, app, metric_specs));
    let state_path = state_file.map(Path::new);

    let mut tracker = Tracker::new(engine, metrics, config.load_options(None));
    if let Some(path) = state_path {
        match store::load(path) {
            Ok(Some(states)) => {
                println!(
                    "Resuming {} metrics from {} (newest sample {})",
                    states.len(),
                    path.display(),
                    format_timestamp(store::resume_reference(&states))
                );
                tracker = tracker.resume(states);
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || stop.cancel()) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!("Watching {} metrics", tracker.metrics().len());
    println!("  API:       {}", config.api_base);
    println!("  Interval:  {interval_secs}s");
    match state_path {
        Some(p) => println!("  State:     {}", p.display()),
        None => println!("  State:     not persisted"),
    }
    println!("  Press Ctrl+C to stop");
    println!();

    let interval = Duration::from_secs(interval_secs.max(1));
    let mut save_failed = false;
    rt.block_on(tracker.run(interval, &shutdown, |summary, tracker| {
        print_cycle(summary);
        if let Some(path) = state_path {
            if let Err(e) = store::save(path, tracker.states()) {
                eprintln!("Warning: could not save state to {}: {e}", path.display());
                save_failed = true;
            }
        }
    }));

    let snapshot = tracker.snapshot();
    println!();
    println!(
        "Stopped after {} poll cycles, {} metrics tracked",
        snapshot.cycles,
        snapshot.states.len()
    );
    if save_failed {
        std::process::exit(1);
    }
}

fn print_cycle(summary: &CycleSummary) {
    let label = if summary.cycle == 0 {
        "load".to_string()
    } else {
        format!("#{}", summary.cycle)
    };
    let mut line = format!(
        "{label:>6}  +{:<6} samples  {} metrics updated",
        summary.new_samples,
        summary.updated.len()
    );
    if !summary.failed.is_empty() {
        line.push_str(&format!("  failed: {}", summary.failed.join(", ")));
    }
    println!("{line}");
}
