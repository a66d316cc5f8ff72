//! `benchmon load`: one initial load, printed as a table.

use std::path::Path;

use benchmon_core::{BatchReport, LoadOptions};
use tokio_util::sync::CancellationToken;

use super::{ApiArgs, format_timestamp, make_engine, resolve_metrics, runtime};

pub fn run(
    api: &ApiArgs,
    app: Option<&str>,
    metric_specs: &[String],
    reference: Option<i64>,
    full_history: bool,
    output: Option<&str>,
) {
    let config = api.engine_config();
    let engine = make_engine(&config);
    let rt = runtime();

    let metrics = rt.block_on(resolve_metrics(&engine, app, metric_specs));
    let options = LoadOptions {
        realtime: !full_history,
        ..config.load_options(reference)
    };

    let report = match rt.block_on(engine.load_initial(&metrics, &options, &CancellationToken::new())) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    print_report(&report);

    if let Some(path) = output {
        write_report(Path::new(path), &report);
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
}

fn print_report(report: &BatchReport) {
    println!(
        "{:<10} {:<10} {:>8} {:>14}  {:<8} Title",
        "ID", "Kind", "Points", "Last sample", "Status"
    );
    println!("{}", "-".repeat(72));
    for state in &report.states {
        let failed = report.failures.iter().any(|f| f.id == state.id());
        println!(
            "{:<10} {:<10} {:>8} {:>14}  {:<8} {}",
            state.id(),
            state.descriptor.kind,
            state.series_len(),
            format_timestamp(state.last_timestamp),
            if failed { "FAILED" } else { "ok" },
            state.descriptor.title
        );
    }
    for failure in &report.failures {
        eprintln!("  {}: {}", failure.id, failure.error);
    }
    println!();
    println!(
        "{} metrics, {} failed",
        report.states.len(),
        report.failures.len()
    );
}

fn write_report(path: &Path, report: &BatchReport) {
    let json = match serde_json::to_string_pretty(report) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing report: {e}");
            std::process::exit(1);
        }
    };
    match std::fs::write(path, json) {
        Ok(()) => println!("Report written to {}", path.display()),
        Err(e) => {
            eprintln!("Error writing {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}
