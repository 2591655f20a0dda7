//! Activate command - purge stale caches and start serving

use crate::cli::commands::WorkerHandle;
use crate::config::Config;
use crate::error::ReadThroughResult;
use crate::manager::ActivateReport;
use crate::ui::{self, UiContext};

/// Execute the activate command
pub async fn execute(config: &Config) -> ReadThroughResult<()> {
    let handle = WorkerHandle::open(config).await?;
    let ctx = UiContext::detect();

    run_activate(&ctx, &handle).await?;
    ui::outro_success(&ctx, "Activated");
    Ok(())
}

/// Activate, report deletions, persist the resulting phase either way
pub(crate) async fn run_activate(
    ctx: &UiContext,
    handle: &WorkerHandle,
) -> ReadThroughResult<ActivateReport> {
    let result = handle.worker.activate().await;
    handle.persist().await?;
    let report = result?;

    for name in &report.kept {
        ui::step_ok(ctx, &format!("Keeping {}", name));
    }
    for name in &report.deleted {
        ui::step_info(ctx, &format!("Deleted out of date cache {}", name));
    }
    if report.deleted.is_empty() {
        ui::step_info(ctx, "No stale caches");
    }

    Ok(report)
}
