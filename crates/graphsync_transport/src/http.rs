//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport. The actual HTTP client
//! is abstracted via a trait to allow different implementations
//! (reqwest, hyper, ureq, etc.).

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::message::{Method, RequestOptions, Response};
use crate::transport::Transport;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// A fully rendered HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP verb.
    pub method: &'static str,
    /// Absolute URL.
    pub url: String,
    /// Header pairs, including `Authorization` when credentials are set.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
    /// Timeout the client should honor.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP exchange.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<Response, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based transport.
pub struct HttpTransport<C: HttpClient> {
    config: TransportConfig,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(config: TransportConfig, client: C) -> Self {
        Self {
            config,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Marks the transport as closed.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn render(
        &self,
        method: Method,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> HttpRequest {
        let mut headers = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        headers.extend(self.config.default_headers.iter().cloned());
        headers.extend(options.to_headers());
        if let Some(credentials) = &options.credentials {
            headers.push((
                "Authorization".to_string(),
                credentials.authorization_header(),
            ));
        }

        HttpRequest {
            method: method.as_http(),
            url: self.config.resolve(location),
            headers,
            body,
            timeout: self.config.timeout,
        }
    }

    fn exchange(
        &self,
        method: Method,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let request = self.render(method, location, body, options);
        debug!(method = %method, url = %request.url, "sending request");

        let response = self.client.send(request).map_err(|e| {
            warn!(method = %method, error = %e, "request failed");
            *self.last_error.write() = Some(e.clone());
            self.connected.store(false, Ordering::SeqCst);
            TransportError::transport_retryable(e)
        })?;

        *self.last_error.write() = None;

        if response.status() == 401 {
            return Err(TransportError::AuthenticationFailed(format!(
                "{method} {location} was refused"
            )));
        }
        Ok(response)
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn get(&self, location: &str, options: &RequestOptions) -> TransportResult<Response> {
        self.exchange(Method::Get, location, Vec::new(), options)
    }

    fn head(&self, location: &str, options: &RequestOptions) -> TransportResult<Response> {
        self.exchange(Method::Head, location, Vec::new(), options)
    }

    fn put(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.exchange(Method::Put, location, body, options)
    }

    fn post(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.exchange(Method::Post, location, body, options)
    }

    fn patch(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.exchange(Method::Patch, location, body, options)
    }

    fn describe(
        &self,
        location: &str,
        body: Vec<u8>,
        options: &RequestOptions,
    ) -> TransportResult<Response> {
        self.exchange(Method::Describe, location, body, options)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }
}

/// A loopback HTTP client that routes requests directly to an in-process server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request and returns the response.
    fn handle(&self, request: &HttpRequest) -> Result<Response, String>;
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn send(&self, request: HttpRequest) -> Result<Response, String> {
        self.server.handle(&request)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
