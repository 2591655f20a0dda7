//! Caches command - list physical caches in storage

use crate::cache::CacheStorage;
use crate::cli::args::{CachesArgs, OutputFormat};
use crate::config::Config;
use crate::error::ReadThroughResult;
use crate::factory::create_storage;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// One row of the cache listing
#[derive(Debug, Serialize)]
struct CacheRow {
    name: String,
    /// Logical name when the registry references this cache
    logical: Option<String>,
    entries: usize,
}

/// Execute the caches command
pub async fn execute(args: CachesArgs, config: &Config) -> ReadThroughResult<()> {
    let storage = create_storage(config);
    let rows = collect_rows(storage.as_ref(), &config.cache.registry()).await?;

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

async fn collect_rows(
    storage: &dyn CacheStorage,
    registry: &crate::cache::CacheRegistry,
) -> ReadThroughResult<Vec<CacheRow>> {
    let current: Vec<(&str, String)> = registry.entries().collect();
    let mut rows = Vec::new();

    for name in storage.keys().await? {
        let entries = storage.open(&name).await?.entries().await?.len();
        let logical = current
            .iter()
            .find(|(_, physical)| *physical == name)
            .map(|(logical, _)| logical.to_string());
        rows.push(CacheRow {
            name,
            logical,
            entries,
        });
    }

    Ok(rows)
}

fn print_table(rows: &[CacheRow]) {
    let ctx = UiContext::detect();

    if rows.is_empty() {
        ui::step_info(&ctx, "No caches");
        return;
    }

    println!(
        "{:<32} {:<16} {:>8}",
        style("NAME").bold(),
        style("CURRENT").bold(),
        style("ENTRIES").bold()
    );
    println!("{}", "-".repeat(58));

    for row in rows {
        let current = match &row.logical {
            Some(logical) => style(logical.clone()).green(),
            None => style("stale".to_string()).yellow(),
        };
        println!("{:<32} {:<16} {:>8}", row.name, current, row.entries);
    }

    println!();
    println!("{} cache(s)", rows.len());
}
