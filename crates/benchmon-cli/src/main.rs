//! CLI for benchmon: live metrics for gobench benchmark runs.

mod commands;

use clap::{Parser, Subcommand};

use commands::ApiArgs;

#[derive(Parser)]
#[command(name = "benchmon")]
#[command(about = "benchmon: fetch, watch, and serve gobench benchmark metrics")]
#[command(version = benchmon_core::VERSION)]
struct Cli {
    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List applications, or the metrics of one application
    Catalog {
        /// Application id. Without it, applications are listed.
        #[arg(long)]
        app: Option<String>,

        /// Filter applications by keyword
        #[arg(long, default_value = "")]
        keyword: String,
    },

    /// Run one initial load and print what came back
    Load {
        /// Load every metric of this application
        #[arg(long)]
        app: Option<String>,

        /// Explicit metric as id:kind[:title] (repeatable)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Resume point in unix milliseconds
        #[arg(long)]
        reference: Option<i64>,

        /// Ignore the realtime window and fetch the full history
        #[arg(long)]
        full_history: bool,

        /// Write the batch report as JSON to this path
        #[arg(long)]
        output: Option<String>,
    },

    /// Load, then poll until Ctrl+C, printing per-cycle deltas
    Watch {
        #[arg(long)]
        app: Option<String>,

        /// Explicit metric as id:kind[:title] (repeatable)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Seconds between polls
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Resume from and persist states to this JSON file
        #[arg(long)]
        state_file: Option<String>,
    },

    /// Serve continuously polled metric states over HTTP
    Serve {
        #[arg(long)]
        app: Option<String>,

        /// Explicit metric as id:kind[:title] (repeatable)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Seconds between polls
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port
        #[arg(long, default_value = "8042")]
        port: u16,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let api = cli.api;

    match cli.command {
        Commands::Catalog { app, keyword } => commands::catalog::run(&api, app.as_deref(), &keyword),
        Commands::Load {
            app,
            metrics,
            reference,
            full_history,
            output,
        } => commands::load::run(
            &api,
            app.as_deref(),
            &metrics,
            reference,
            full_history,
            output.as_deref(),
        ),
        Commands::Watch {
            app,
            metrics,
            interval,
            state_file,
        } => commands::watch::run(&api, app.as_deref(), &metrics, interval, state_file.as_deref()),
        Commands::Serve {
            app,
            metrics,
            interval,
            host,
            port,
        } => commands::serve::run(&api, app.as_deref(), &metrics, interval, &host, port),
    }
}
