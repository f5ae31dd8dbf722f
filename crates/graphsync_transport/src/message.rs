//! Request options and responses exchanged with the remote service.

use crate::auth::Credentials;
use std::fmt;

/// Remote operation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Fetch a document.
    Get,
    /// Fetch headers only.
    Head,
    /// Replace a document.
    Put,
    /// Submit a document.
    Post,
    /// Apply a patch.
    Patch,
    /// Query by example.
    Describe,
}

impl Method {
    /// Returns the HTTP verb used on the wire.
    ///
    /// `Describe` is sent as a `POST` carrying the prototype body.
    pub fn as_http(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post | Method::Describe => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Describe => f.write_str("DESCRIBE"),
            other => f.write_str(other.as_http()),
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Expected response media type.
    pub accept: Option<String>,
    /// Media type of the request body.
    pub content_type: Option<String>,
    /// Revision tag sent as `ETag`.
    pub etag: Option<String>,
    /// Precondition sent as `If-Match`.
    pub if_match: Option<String>,
    /// Replication route sent as `Content-Disposition: replicate=<name>`.
    pub disposition: Option<String>,
    /// Credentials folded into `Authorization` by the transport.
    pub credentials: Option<Credentials>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `Accept` media type.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Sets the body media type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the revision tag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the `If-Match` precondition.
    pub fn with_if_match(mut self, revision: impl Into<String>) -> Self {
        self.if_match = Some(revision.into());
        self
    }

    /// Sets the replication route.
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Some(disposition.into());
        self
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Adds an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Renders every option as a header pair, excluding credentials.
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 5);
        if let Some(accept) = &self.accept {
            headers.push(("Accept".to_string(), accept.clone()));
        }
        if let Some(content_type) = &self.content_type {
            headers.push(("Content-Type".to_string(), content_type.clone()));
        }
        if let Some(etag) = &self.etag {
            headers.push(("ETag".to_string(), etag.clone()));
        }
        if let Some(if_match) = &self.if_match {
            headers.push(("If-Match".to_string(), if_match.clone()));
        }
        if let Some(disposition) = &self.disposition {
            headers.push((
                "Content-Disposition".to_string(),
                format!("replicate={disposition}"),
            ));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }
}

/// A response from the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    /// Creates a response with the given status and no headers or body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a `200 OK` response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `ETag` header.
    #[must_use]
    pub fn with_etag(self, etag: impl Into<String>) -> Self {
        self.with_header("ETag", etag)
    }

    /// Sets the body and its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.headers.push(("Content-Type".to_string(), content_type.into()));
        self.body = body;
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the `ETag` header with surrounding quotes removed.
    pub fn etag(&self) -> Option<&str> {
        self.header("ETag").map(|tag| {
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            tag.trim_matches('"')
        })
    }

    /// Returns the `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Returns the body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response, returning the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Returns the body as UTF-8 text, if it is valid.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let response = Response::ok().with_header("etag", "\"r1\"");
        assert_eq!(response.header("ETag"), Some("\"r1\""));
        assert_eq!(response.etag(), Some("r1"));
    }

    #[test]
    fn weak_etags_are_unwrapped() {
        let response = Response::ok().with_etag("W/\"r2\"");
        assert_eq!(response.etag(), Some("r2"));
    }

    #[test]
    fn success_range() {
        assert!(Response::new(204).is_success());
        assert!(!Response::new(304).is_success());
        assert!(!Response::new(412).is_success());
    }

    #[test]
    fn body_accessors() {
        let response = Response::ok().with_body("application/json", b"[]".to_vec());
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.text(), Some("[]"));
        assert_eq!(response.into_body(), b"[]".to_vec());
    }

    #[test]
    fn options_render_headers() {
        let options = RequestOptions::new()
            .with_accept("application/json")
            .with_etag("rev-2")
            .with_if_match("rev-1")
            .with_disposition("people")
            .with_header("X-Extra", "1");

        let headers = options.to_headers();
        assert!(headers.contains(&("Accept".into(), "application/json".into())));
        assert!(headers.contains(&("ETag".into(), "rev-2".into())));
        assert!(headers.contains(&("If-Match".into(), "rev-1".into())));
        assert!(headers.contains(&("Content-Disposition".into(), "replicate=people".into())));
        assert_eq!(headers.last(), Some(&("X-Extra".into(), "1".into())));
    }

    #[test]
    fn describe_travels_as_post() {
        assert_eq!(Method::Describe.as_http(), "POST");
        assert_eq!(Method::Describe.to_string(), "DESCRIBE");
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
