//! In-memory graph service.
//!
//! [`GraphServer`] answers the requests a session makes through
//! [`HttpTransport`] over a [`LoopbackClient`]: documents are read with
//! `GET`, queried with a `POST`ed prototype, replaced with `PUT` and
//! changed with `PATCH`. Revisions follow the `ETag` / `If-Match`
//! protocol, so stale commits are refused with `412`.

use graphsync_codec::{Codec, Graph, JsonCodec, Patch, Statement, JSON_CONTENT_TYPE};
use graphsync_transport::{
    HttpRequest, HttpTransport, LoopbackClient, LoopbackServer, Response, TransportConfig,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Revision the server starts at.
pub const INITIAL_REVISION: &str = "r0";

/// A cheap-clone handle to an in-memory graph service.
#[derive(Clone)]
pub struct GraphServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    base_url: String,
    state: RwLock<ServerState>,
}

struct ServerState {
    statements: Vec<Statement>,
    revision: String,
    commits: u64,
    requests: Vec<HttpRequest>,
    fail_next: Option<u16>,
}

impl GraphServer {
    /// Creates an empty graph served under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                state: RwLock::new(ServerState {
                    statements: Vec::new(),
                    revision: INITIAL_REVISION.to_string(),
                    commits: 0,
                    requests: Vec::new(),
                    fail_next: None,
                }),
            }),
        }
    }

    /// Creates a transport that talks to this server.
    pub fn transport(&self) -> HttpTransport<LoopbackClient<GraphServer>> {
        HttpTransport::new(
            TransportConfig::new(self.inner.base_url.clone()),
            LoopbackClient::new(self.clone()),
        )
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Adds statements without creating a revision.
    pub fn seed(&self, statements: impl IntoIterator<Item = Statement>) {
        self.inner.state.write().statements.extend(statements);
    }

    /// Returns every stored statement.
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.state.read().statements.clone()
    }

    /// Returns the statements about one subject.
    pub fn subject(&self, id: &str) -> Vec<Statement> {
        self.inner
            .state
            .read()
            .statements
            .iter()
            .filter(|st| st.subject() == id)
            .cloned()
            .collect()
    }

    /// Returns the current revision tag.
    pub fn revision(&self) -> String {
        self.inner.state.read().revision.clone()
    }

    /// Returns the number of accepted patches.
    pub fn commits(&self) -> u64 {
        self.inner.state.read().commits
    }

    /// Returns every request received, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.state.read().requests.clone()
    }

    /// Makes the next request fail with the given status.
    pub fn fail_next(&self, status: u16) {
        self.inner.state.write().fail_next = Some(status);
    }

    fn subject_of(&self, url: &str) -> Option<String> {
        let path = url
            .strip_prefix(self.inner.base_url.as_str())
            .map_or(url, |rest| rest.trim_start_matches('/'));
        (!path.is_empty()).then(|| path.to_string())
    }

    fn route(&self, request: &HttpRequest) -> Response {
        match request.method {
            "GET" => self.read(request),
            "HEAD" => Response::ok().with_etag(self.revision()),
            "PUT" => self.replace(request),
            "PATCH" => self.apply(request, true),
            "POST" if is_patch(&request.body) => self.apply(request, false),
            "POST" => self.describe(request),
            _ => text(405, "method not allowed"),
        }
    }

    fn read(&self, request: &HttpRequest) -> Response {
        let statements = match self.subject_of(&request.url) {
            Some(id) => self.subject(&id),
            None => self.statements(),
        };
        if statements.is_empty() && self.subject_of(&request.url).is_some() {
            return text(404, "not found");
        }
        document(&Graph::from_statements(statements))
    }

    fn describe(&self, request: &HttpRequest) -> Response {
        let prototype = match JsonCodec.decode_prototype(&request.body) {
            Ok(prototype) => prototype,
            Err(err) => return text(400, &err.to_string()),
        };
        let graph = Graph::from_statements(self.statements());
        let matching: Vec<String> = graph
            .deltas(Some(&prototype))
            .into_iter()
            .map(|(subject, _)| subject)
            .collect();
        let found: Graph = graph
            .into_iter()
            .filter(|st| matching.iter().any(|id| id == st.subject()))
            .collect();
        document(&found)
    }

    fn replace(&self, request: &HttpRequest) -> Response {
        let graph = match JsonCodec.decode(&request.body, JSON_CONTENT_TYPE) {
            Ok(graph) => graph,
            Err(err) => return text(400, &err.to_string()),
        };
        let mut state = self.inner.state.write();
        state.statements = graph.into_iter().collect();
        state.commits += 1;
        state.revision = format!("r{}", state.commits);
        Response::new(204).with_etag(state.revision.clone())
    }

    fn apply(&self, request: &HttpRequest, versioned: bool) -> Response {
        let patch = match JsonCodec.decode_patch(&request.body) {
            Ok(patch) => patch,
            Err(err) => return text(400, &err.to_string()),
        };

        let mut state = self.inner.state.write();
        if versioned {
            if let Some(expected) = request.header("If-Match") {
                if expected != state.revision {
                    debug!(expected, current = %state.revision, "stale patch refused");
                    return text(412, "revision mismatch");
                }
            }
        }

        merge(&mut state.statements, patch);
        if !versioned {
            return Response::new(204);
        }
        state.commits += 1;
        let commits = state.commits;
        state.revision = request
            .header("ETag")
            .map_or_else(|| format!("r{commits}"), str::to_string);
        Response::new(204).with_etag(state.revision.clone())
    }
}

impl LoopbackServer for GraphServer {
    fn handle(&self, request: &HttpRequest) -> Result<Response, String> {
        let failure = {
            let mut state = self.inner.state.write();
            state.requests.push(request.clone());
            state.fail_next.take()
        };
        if let Some(status) = failure {
            return Ok(text(status, "injected failure"));
        }
        let response = self.route(request);
        debug!(method = request.method, url = %request.url, status = response.status(), "served");
        Ok(response)
    }
}

fn merge(statements: &mut Vec<Statement>, patch: Patch) {
    for retracted in &patch.delete {
        if let Some(index) = statements.iter().position(|st| st == retracted) {
            statements.remove(index);
        }
    }
    for replacing in &patch.put {
        statements.retain(|st| {
            st.subject() != replacing.subject() || st.property() != replacing.property()
        });
    }
    for asserted in patch.post.into_iter().chain(patch.put) {
        if !statements.contains(&asserted) {
            statements.push(asserted);
        }
    }
}

fn is_patch(body: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => ["post", "put", "delete"]
            .iter()
            .any(|key| map.contains_key(*key)),
        _ => false,
    }
}

fn document(graph: &Graph) -> Response {
    match JsonCodec.encode_graph(graph) {
        Ok(body) => Response::ok().with_body(JSON_CONTENT_TYPE, body),
        Err(err) => text(500, &err.to_string()),
    }
}

fn text(status: u16, message: &str) -> Response {
    Response::new(status).with_body("text/plain", message.as_bytes().to_vec())
}
