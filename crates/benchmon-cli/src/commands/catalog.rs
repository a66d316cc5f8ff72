//! `benchmon catalog`: browse applications and their metrics.

use benchmon_core::{ApplicationQuery, MetricCatalog};

use super::{ApiArgs, make_engine, runtime};

pub fn run(api: &ApiArgs, app: Option<&str>, keyword: &str) {
    let engine = make_engine(&api.engine_config());
    let catalog = MetricCatalog::new(engine.transport());
    let rt = runtime();

    match app {
        Some(app) => {
            let detail = match rt.block_on(catalog.application(app)) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("Error reading application {app}: {e}");
                    std::process::exit(1);
                }
            };
            let metrics = match rt.block_on(catalog.descriptors(app)) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Error reading metrics of application {app}: {e}");
                    std::process::exit(1);
                }
            };
            println!(
                "Application {} ({}): {} metrics",
                detail.name,
                if detail.status.is_empty() { "-" } else { detail.status.as_str() },
                metrics.len()
            );
            println!();
            println!("{:<10} {:<10} Title", "ID", "Kind");
            println!("{}", "-".repeat(48));
            for m in &metrics {
                println!("{:<10} {:<10} {}", m.id, m.kind, m.title);
            }
        }
        None => {
            let query = ApplicationQuery {
                keyword: keyword.to_string(),
                ..ApplicationQuery::default()
            };
            let apps = match rt.block_on(catalog.list_applications(&query)) {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("Error listing applications: {e}");
                    std::process::exit(1);
                }
            };
            println!("{:<8} {:<12} {:<24} Name", "ID", "Status", "Created");
            println!("{}", "-".repeat(64));
            for a in &apps {
                println!(
                    "{:<8} {:<12} {:<24} {}",
                    a.id,
                    a.status,
                    a.created_at.as_deref().unwrap_or("-"),
                    a.name
                );
            }
            println!();
            println!("{} applications", apps.len());
        }
    }
}
