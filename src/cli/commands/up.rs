//! Up command - install, activate, then serve

use crate::cli::args::UpArgs;
use crate::cli::commands::activate::run_activate;
use crate::cli::commands::fetch::serve_and_print;
use crate::cli::commands::install::run_install;
use crate::cli::commands::WorkerHandle;
use crate::config::Config;
use crate::error::ReadThroughResult;
use crate::http::Request;
use crate::ui::{self, UiContext};

/// Execute the up command
pub async fn execute(args: UpArgs, config: &Config) -> ReadThroughResult<()> {
    let handle = WorkerHandle::open(config).await?;
    let ctx = UiContext::detect();

    ui::intro(&ctx, &format!("readthrough v{}", config.cache.version));

    let installed = run_install(&ctx, &handle, config).await?;
    run_activate(&ctx, &handle).await?;

    let phase = handle.worker.phase().await;
    ui::key_value(&ctx, "cache", &installed.cache_name);
    ui::key_value_status(&ctx, "phase", &phase.to_string(), phase.can_serve());

    for url in &args.urls {
        serve_and_print(&handle.worker, &Request::get(url.as_str()), false).await?;
    }

    ui::outro_success(&ctx, "Serving");
    Ok(())
}
