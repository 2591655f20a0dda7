//! Minimal request/response model
//!
//! Only the fields the cache policy needs: method, URL and headers for a
//! request; status, headers and body for a response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Header map with lowercase names
pub type Headers = BTreeMap<String, String>;

/// An outgoing or intercepted resource request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method, uppercase
    pub method: String,

    /// Resource locator, absolute or relative to the configured origin
    pub url: String,

    /// Request headers
    #[serde(default)]
    pub headers: Headers,
}

impl Request {
    /// Create a request with the given method
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            headers: Headers::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Identity under which this request is stored in a cache.
    ///
    /// Headers do not take part in the key.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Whether the request is a plain GET
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response from the network or from a cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: Headers,

    /// Response body
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with an empty header map
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// True for 2xx statuses
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}
