//! Install command - precache the manifest

use crate::cli::commands::WorkerHandle;
use crate::config::Config;
use crate::error::ReadThroughResult;
use crate::manager::InstallReport;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the install command
pub async fn execute(config: &Config) -> ReadThroughResult<()> {
    let handle = WorkerHandle::open(config).await?;
    let ctx = UiContext::detect();

    run_install(&ctx, &handle, config).await?;
    ui::outro_success(&ctx, "Installed. Run `readthrough activate` to start serving");
    Ok(())
}

/// Install with a spinner, persisting the resulting phase either way
pub(crate) async fn run_install(
    ctx: &UiContext,
    handle: &WorkerHandle,
    config: &Config,
) -> ReadThroughResult<InstallReport> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!(
        "Precaching {} resource(s) for version {}",
        config.cache.manifest.len(),
        config.cache.version
    ));

    let result = handle.worker.install().await;
    handle.persist().await?;

    match result {
        Ok(report) => {
            spinner.stop(&format!(
                "Stored {} resource(s) in {}",
                report.stored, report.cache_name
            ));
            Ok(report)
        }
        Err(e) => {
            spinner.stop_error(&format!(
                "Install failed; nothing stored for version {}",
                config.cache.version
            ));
            Err(e)
        }
    }
}
