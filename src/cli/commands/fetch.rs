//! Fetch command - serve requests through the cache

use crate::cli::args::FetchArgs;
use crate::cli::commands::WorkerHandle;
use crate::config::Config;
use crate::error::{ReadThroughError, ReadThroughResult};
use crate::http::Request;
use crate::lifecycle::ServiceWorker;
use crate::manager::{ResponseSource, Served};
use console::style;
use std::io::Write;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ReadThroughResult<()> {
    let handle = WorkerHandle::open(config).await?;

    let mut template = Request::new(&args.method, String::new());
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        template = template.with_header(name, value);
    }

    for url in &args.urls {
        let request = Request {
            url: url.clone(),
            ..template.clone()
        };
        serve_and_print(handle.serving().await, &request, args.body).await?;
    }

    Ok(())
}

/// Serve one request and print its outcome
pub(crate) async fn serve_and_print(
    worker: &ServiceWorker,
    request: &Request,
    body: bool,
) -> ReadThroughResult<Served> {
    let served = worker.handle_fetch(request).await?;

    let status = served.response.status;
    let status_styled = if served.response.is_ok() {
        style(status).green()
    } else if status >= 400 {
        style(status).red()
    } else {
        style(status).yellow()
    };
    let source_styled = match served.source {
        ResponseSource::Cache => style("cache").cyan(),
        ResponseSource::Network => style("network").dim(),
    };

    println!("{} {:<7} {}", status_styled, source_styled, request.url);

    if body {
        std::io::stdout()
            .write_all(&served.response.body)
            .map_err(|e| ReadThroughError::io("writing response body", e))?;
        println!();
    }

    Ok(served)
}

/// Parse a `name:value` header argument
fn parse_header(raw: &str) -> ReadThroughResult<(&str, &str)> {
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        ReadThroughError::User(format!("Invalid header '{}'. Expected name:value", raw))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ReadThroughError::User(format!(
            "Empty header name in '{}'",
            raw
        )));
    }

    Ok((name, value.trim()))
}
