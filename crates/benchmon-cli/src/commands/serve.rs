use std::time::Duration;

use super::{ApiArgs, make_engine, resolve_metrics, runtime};

pub fn run(
    api: &ApiArgs,
    app: Option<&str>,
    metric_specs: &[String],
    interval_secs: u64,
    host: &str,
    port: u16,
) {
    let mut config = api.engine_config();
    config.poll_interval = Duration::from_secs(interval_secs.max(1));

    let rt = runtime();
    let metrics = {
        let engine = make_engine(&config);
        rt.block_on(resolve_metrics(&engine, app, metric_specs))
    };

    let base = format!("http://{host}:{port}");
    println!("benchmon server v{}", benchmon_core::VERSION);
    println!("   {base}");
    println!("   {} metrics, polled every {interval_secs}s", metrics.len());
    println!();
    println!("   Endpoints:");
    println!("     GET /                 API index (try: curl {base})");
    println!("     GET /health           Tracker health check");
    println!("     GET /metrics          All metric states");
    println!("     GET /metrics/<id>     One metric state");
    println!();

    if let Err(e) = rt.block_on(benchmon_server::run_server(config, metrics, host, port)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
