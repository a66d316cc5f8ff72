pub mod catalog;
pub mod load;
pub mod serve;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use benchmon_core::{
    DEFAULT_API_BASE, DEFAULT_HISTORY_LIMIT, DEFAULT_TIME_RANGE_SECS, EngineConfig, MetricCatalog,
    MetricDescriptor, MetricEngine, MetricKind,
};

/// API connection and window flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct ApiArgs {
    /// Base URL of the gobench API
    #[arg(long, global = true, default_value = DEFAULT_API_BASE)]
    pub api: String,

    /// Bearer token for the API
    #[arg(long, global = true, env = "BENCHMON_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Realtime look-back window in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIME_RANGE_SECS)]
    pub time_range: u64,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,

    /// Maximum samples kept from one fetch (0 = unlimited)
    #[arg(long, global = true, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,
}

impl ApiArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            api_base: self.api.clone(),
            token: self.token.clone(),
            time_range_secs: self.time_range,
            request_timeout: Duration::from_secs(self.timeout),
            history_limit: history_limit(self.history_limit),
            ..EngineConfig::default()
        }
    }
}

/// `0` disables the cap.
pub fn history_limit(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

/// Build a tokio runtime, exiting on failure.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// Build the metric engine, exiting on failure.
pub fn make_engine(config: &EngineConfig) -> Arc<MetricEngine> {
    match MetricEngine::from_config(config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse `id:kind[:title]`. The title defaults to the id.
pub fn parse_metric(spec: &str) -> Result<MetricDescriptor, String> {
    let mut parts = spec.splitn(3, ':');
    let id = parts.next().unwrap_or_default().trim();
    if id.is_empty() {
        return Err(format!("metric '{spec}' has no id (expected id:kind[:title])"));
    }
    let Some(kind) = parts.next().map(str::trim).filter(|k| !k.is_empty()) else {
        return Err(format!("metric '{spec}' has no kind (expected id:kind[:title])"));
    };
    let kind: MetricKind = kind.parse().unwrap_or_default();
    let title = parts
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(id);
    Ok(MetricDescriptor::new(id, kind, title))
}

/// Metrics to track: explicit `--metric` flags plus, when `app` is given,
/// everything in that application's catalog. Exits when nothing resolves.
pub async fn resolve_metrics(
    engine: &MetricEngine,
    app: Option<&str>,
    specs: &[String],
) -> Vec<MetricDescriptor> {
    let mut metrics = Vec::new();
    for spec in specs {
        match parse_metric(spec) {
            Ok(m) => metrics.push(m),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }

    if let Some(app) = app {
        match MetricCatalog::new(engine.transport()).descriptors(app).await {
            Ok(found) => metrics.extend(found),
            Err(e) => {
                eprintln!("Error reading metrics of application {app}: {e}");
                std::process::exit(1);
            }
        }
    }

    if metrics.is_empty() {
        eprintln!("Error: no metrics to track (use --app or --metric)");
        std::process::exit(1);
    }
    metrics
}

/// Milliseconds as `HH:MM:SS.mmm` UTC, or `-` when absent.
pub fn format_timestamp(ms: Option<i64>) -> String {
    let Some(ms) = ms else {
        return "-".to_string();
    };
    let day_ms = ms.rem_euclid(86_400_000);
    let (h, rest) = (day_ms / 3_600_000, day_ms % 3_600_000);
    let (m, rest) = (rest / 60_000, rest % 60_000);
    format!("{h:02}:{m:02}:{:02}.{:03}", rest / 1000, rest % 1000)
}
