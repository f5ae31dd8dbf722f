//! Configuration for the HTTP transport.

use std::time::Duration;

/// Configuration for [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL that relative locations are resolved against.
    pub base_url: String,
    /// Request timeout handed to the client.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Headers added to every request.
    pub default_headers: Vec<(String, String)>,
}

impl TransportConfig {
    /// Creates a new transport configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("graphsync/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: Vec::new(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Resolves a location against the base URL.
    ///
    /// Absolute `http(s)://` locations are returned unchanged.
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        match (self.base_url.ends_with('/'), location.starts_with('/')) {
            (true, true) => format!("{}{}", self.base_url, &location[1..]),
            (false, false) if !location.is_empty() => format!("{}/{}", self.base_url, location),
            _ => format!("{}{}", self.base_url, location),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new("")
    }
}
