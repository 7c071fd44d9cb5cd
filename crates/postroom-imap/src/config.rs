//! Session configuration.

use std::time::Duration;

/// Default port for implicit-TLS IMAP.
pub const DEFAULT_TLS_PORT: u16 = 993;

/// Configuration for an IMAP session.
///
/// Immutable once handed to a [`Session`](crate::Session); it is the only
/// state shared between independent sessions pointing at the same
/// account.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 993 for TLS).
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Deadline for establishing and authenticating a connection.
    pub connect_timeout: Duration,
    /// Deadline for a single protocol exchange.
    pub command_timeout: Duration,
}

impl SessionConfig {
    /// Creates a configuration with implicit TLS defaults: port 993,
    /// 30 second connect deadline, 60 second command deadline.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TLS_PORT,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(host)
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Returns the `{host:port}` account reference the server roots its
    /// folder hierarchy at.
    #[must_use]
    pub fn server_ref(&self) -> String {
        format!("{{{}:{}}}", self.host, self.port)
    }
}

/// Builder for a session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    host: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SessionConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TLS_PORT,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the connect deadline.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command deadline.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        }
    }
}
