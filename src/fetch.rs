//! Network fetch for cache misses and precaching
//!
//! `HttpFetcher` issues blocking ureq calls on the tokio blocking pool.
//! HTTP error statuses come back as ordinary responses; only transport
//! failures become errors.

use crate::error::{ReadThroughError, ReadThroughResult};
use crate::http::{Headers, Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Network fetch primitive
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network
    async fn fetch(&self, request: Request) -> ReadThroughResult<Response>;
}

fn is_absolute(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Canonical spelling of a locator, used as its cache identity.
///
/// Absolute URLs pass through. Relative locators (`styles/main.css`,
/// `./styles/main.css`, `/styles/main.css`) are joined onto the origin with
/// exactly one slash, or reduced to a rooted path when no origin is set.
pub fn canonical_url(origin: Option<&str>, locator: &str) -> String {
    if is_absolute(locator) {
        return locator.to_string();
    }

    let path = locator.trim_start_matches("./").trim_start_matches('/');
    match origin {
        Some(origin) => format!("{}/{}", origin.trim_end_matches('/'), path),
        None => format!("/{}", path),
    }
}

/// Resolve a locator to a fetchable URL. Relative locators need an origin.
pub fn resolve_url(origin: Option<&str>, locator: &str) -> ReadThroughResult<String> {
    if origin.is_none() && !is_absolute(locator) {
        return Err(ReadThroughError::network(
            locator,
            "relative URL with no origin configured (set network.origin)",
        ));
    }
    Ok(canonical_url(origin, locator))
}

/// Fetcher backed by a ureq agent
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    origin: Option<String>,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with a global timeout and user agent
    pub fn new(origin: Option<String>, timeout: Duration, user_agent: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            origin,
            user_agent: user_agent.to_string(),
        }
    }

    fn fetch_blocking(
        agent: &ureq::Agent,
        url: &str,
        request: &Request,
    ) -> ReadThroughResult<Response> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .body(())
            .map_err(|e| ReadThroughError::network(url, e))?;

        let mut http_response = agent
            .run(http_request)
            .map_err(|e| ReadThroughError::network(url, e))?;

        let headers: Headers = http_response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let status = http_response.status().as_u16();
        let body = http_response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ReadThroughError::network(url, e))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, mut request: Request) -> ReadThroughResult<Response> {
        request
            .headers
            .entry("user-agent".to_string())
            .or_insert_with(|| self.user_agent.clone());
        let url = resolve_url(self.origin.as_deref(), &request.url)?;
        let agent = self.agent.clone();

        debug!("Fetching {} {}", request.method, url);
        let task_url = url.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &task_url, &request))
            .await
            .map_err(|e| ReadThroughError::network(url, e))?
    }
}
