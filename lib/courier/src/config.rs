//! Client and dispatcher configuration types.

use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for a whole round trip when the request carries none.
    pub timeout: Duration,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the default request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}

/// Configuration of a [`Dispatcher`](crate::Dispatcher).
///
/// The base URL is used verbatim: paths are concatenated to it without adding
/// or removing slashes.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Prefix of every context-bound call.
    pub base_url: String,
    /// Headers applied to every context-bound call.
    pub headers: HashMap<String, String>,
    /// Deadline of each context-bound call.
    pub timeout: Duration,
    /// Transport settings.
    pub client: ClientConfig,
}

impl DispatcherConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> DispatcherConfigBuilder {
        DispatcherConfigBuilder {
            base_url: base_url.into(),
            ..DispatcherConfigBuilder::default()
        }
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    base_url: String,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
    client: Option<ClientConfig>,
}

impl DispatcherConfigBuilder {
    /// Add a default header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Replace the default headers.
    #[must_use]
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the per-call timeout. A zero duration leaves the transport timeout
    /// in charge.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the transport configuration.
    #[must_use]
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the configuration.
    ///
    /// Without a non-zero per-call timeout, the transport timeout is used.
    #[must_use]
    pub fn build(self) -> DispatcherConfig {
        let client = self.client.unwrap_or_default();
        DispatcherConfig {
            base_url: self.base_url,
            headers: self.headers,
            timeout: self
                .timeout
                .filter(|timeout| !timeout.is_zero())
                .unwrap_or(client.timeout),
            client,
        }
    }
}
