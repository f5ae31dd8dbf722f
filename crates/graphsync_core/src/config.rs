//! Session configuration.

use graphsync_transport::Credentials;

/// What a write to an undeclared property does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPropertyPolicy {
    /// The write is silently dropped.
    #[default]
    Ignore,
    /// The write fails with a data error.
    Reject,
}

/// Configuration for opening a database session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Location of the remote graph, resolved by the transport.
    pub location: String,

    /// Credentials sent with every remote operation.
    pub credentials: Option<Credentials>,

    /// Handling of writes outside an object's managed property set.
    pub unknown_properties: UnknownPropertyPolicy,

    /// Whether a request on a store without a transaction opens a
    /// one-shot read-write transaction instead of failing.
    pub implicit_transactions: bool,

    /// Routing label used when a transaction does not name one.
    pub default_disposition: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: String::new(),
            credentials: None,
            unknown_properties: UnknownPropertyPolicy::Ignore,
            implicit_transactions: false,
            default_disposition: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote location.
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the unknown property policy.
    #[must_use]
    pub const fn unknown_properties(mut self, policy: UnknownPropertyPolicy) -> Self {
        self.unknown_properties = policy;
        self
    }

    /// Sets whether requests may open implicit transactions.
    #[must_use]
    pub const fn implicit_transactions(mut self, value: bool) -> Self {
        self.implicit_transactions = value;
        self
    }

    /// Sets the default disposition.
    #[must_use]
    pub fn default_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.default_disposition = Some(disposition.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.location.is_empty());
        assert!(config.credentials.is_none());
        assert_eq!(config.unknown_properties, UnknownPropertyPolicy::Ignore);
        assert!(!config.implicit_transactions);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .location("https://graph.example.com/db")
            .credentials(Credentials::basic("ada", "secret"))
            .unknown_properties(UnknownPropertyPolicy::Reject)
            .implicit_transactions(true)
            .default_disposition("people");

        assert_eq!(config.location, "https://graph.example.com/db");
        assert!(config.credentials.is_some());
        assert_eq!(config.unknown_properties, UnknownPropertyPolicy::Reject);
        assert!(config.implicit_transactions);
        assert_eq!(config.default_disposition.as_deref(), Some("people"));
    }
}
