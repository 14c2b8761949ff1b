//! Transport configuration.
//!
//! [`TransportConfig::build`] validates an open key/value option set against a
//! fixed allow-list and turns it into typed settings plus the resolved
//! [`RetryPolicy`]. Keys match case-insensitively and ignore `-`/`_`, so
//! `ConnectionTimeout`, `connection-timeout` and `connection_timeout` are the
//! same option.
//!
//! | Key | Value | SDK setting |
//! |-----|-------|-------------|
//! | `ConnectionTimeout` | milliseconds | connect timeout |
//! | `SocketTimeout` | milliseconds | read timeout |
//! | `RequestTimeout` | milliseconds | operation attempt timeout |
//! | `ClientExecutionTimeout` | milliseconds | operation timeout |
//! | `UserAgent` | string | app name appended to the user agent |
//! | `UseFips` | boolean | FIPS endpoints |
//! | `UseDualStack` | boolean | dual-stack endpoints |
//! | `MaxConnections` | count | idle pooled connections kept per host |
//! | `ProxyHost` | host name | proxy for all traffic |
//! | `ProxyPort` | port | proxy port, requires `ProxyHost` |
//! | `ProxyUsername` | string | proxy basic auth user, requires `ProxyHost` |
//! | `ProxyPassword` | string | proxy basic auth password |
//! | `NonProxyHosts` | `\|`- or `,`-separated hosts | hosts that bypass the proxy |
//!
//! Pool and proxy options replace the SDK's default HTTP client with one built
//! from them; without them the default client is kept.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use aws_config::AppName;
use aws_config::timeout::TimeoutConfig;
use aws_smithy_http_client::proxy::ProxyConfig;
use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode};
use aws_smithy_http_client::{Builder as HttpClientBuilder, Connector};
use aws_smithy_runtime_api::client::http::SharedHttpClient;
use tracing::warn;

use crate::error::{ConnectionError, ConnectionResult};
use crate::retry::RetryPolicy;

/// Retry-related keys; the retry policy is configured separately, so these
/// are skipped rather than rejected.
const RETRY_KEYS: &[&str] = &["retry", "retrypolicy", "maxerrorretry", "usethrottleretries"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportOption {
    ConnectionTimeout,
    SocketTimeout,
    RequestTimeout,
    ClientExecutionTimeout,
    UserAgent,
    UseFips,
    UseDualStack,
    MaxConnections,
    ProxyHost,
    ProxyPort,
    ProxyUsername,
    ProxyPassword,
    NonProxyHosts,
}

impl TransportOption {
    const ALL: [(&'static str, Self); 13] = [
        ("ConnectionTimeout", Self::ConnectionTimeout),
        ("SocketTimeout", Self::SocketTimeout),
        ("RequestTimeout", Self::RequestTimeout),
        ("ClientExecutionTimeout", Self::ClientExecutionTimeout),
        ("UserAgent", Self::UserAgent),
        ("UseFips", Self::UseFips),
        ("UseDualStack", Self::UseDualStack),
        ("MaxConnections", Self::MaxConnections),
        ("ProxyHost", Self::ProxyHost),
        ("ProxyPort", Self::ProxyPort),
        ("ProxyUsername", Self::ProxyUsername),
        ("ProxyPassword", Self::ProxyPassword),
        ("NonProxyHosts", Self::NonProxyHosts),
    ];

    fn lookup(normalized: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(name, _)| normalize_key(name) == normalized)
            .map(|(_, option)| *option)
    }

    fn apply(self, config: &mut TransportConfig, key: &str, value: &str) -> ConnectionResult<()> {
        match self {
            Self::ConnectionTimeout => config.connect_timeout = Some(parse_millis(key, value)?),
            Self::SocketTimeout => config.read_timeout = Some(parse_millis(key, value)?),
            Self::RequestTimeout => {
                config.operation_attempt_timeout = Some(parse_millis(key, value)?);
            }
            Self::ClientExecutionTimeout => {
                config.operation_timeout = Some(parse_millis(key, value)?);
            }
            Self::UserAgent => {
                let app_name = AppName::new(value.trim().to_owned()).map_err(|e| {
                    ConnectionError::Configuration(format!("invalid value for '{key}': {e}"))
                })?;
                config.app_name = Some(app_name);
            }
            Self::UseFips => config.use_fips = Some(parse_flag(key, value)?),
            Self::UseDualStack => config.use_dual_stack = Some(parse_flag(key, value)?),
            Self::MaxConnections => config.max_connections = Some(parse_count(key, value)?),
            Self::ProxyHost => config.proxy.host = Some(non_blank(key, value)?),
            Self::ProxyPort => {
                let port = value.trim().parse::<u16>().ok().filter(|p| *p > 0);
                config.proxy.port = Some(port.ok_or_else(|| {
                    ConnectionError::Configuration(format!(
                        "'{key}' expects a port number, got '{value}'"
                    ))
                })?);
            }
            Self::ProxyUsername => config.proxy.username = Some(non_blank(key, value)?),
            Self::ProxyPassword => config.proxy.password = Some(value.to_owned()),
            Self::NonProxyHosts => {
                let hosts: Vec<&str> = value
                    .split(['|', ','])
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .collect();
                config.proxy.non_proxy_hosts = Some(hosts.join(","));
            }
        }
        Ok(())
    }
}

/// Raw proxy settings; turned into a [`ProxyConfig`] when the client is built.
#[derive(Clone, PartialEq, Eq, Default)]
struct ProxySettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    non_proxy_hosts: Option<String>,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("non_proxy_hosts", &self.non_proxy_hosts)
            .finish()
    }
}

impl ProxySettings {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let base = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{host}")
        };
        Some(match self.port {
            Some(port) => format!("{base}:{port}"),
            None => base,
        })
    }

    fn to_proxy_config(&self) -> ConnectionResult<Option<ProxyConfig>> {
        let Some(url) = self.url() else {
            if self.is_empty() {
                return Ok(None);
            }
            return Err(ConnectionError::Configuration(
                "ProxyPort, ProxyUsername, ProxyPassword and NonProxyHosts require ProxyHost"
                    .to_owned(),
            ));
        };

        let mut proxy = ProxyConfig::all(url.as_str()).map_err(|e| {
            ConnectionError::Configuration(format!("invalid proxy '{url}': {e}"))
        })?;
        if let Some(username) = &self.username {
            proxy = proxy.with_basic_auth(username, self.password.clone().unwrap_or_default());
        } else if self.password.is_some() {
            return Err(ConnectionError::Configuration(
                "ProxyPassword requires ProxyUsername".to_owned(),
            ));
        }
        if let Some(hosts) = &self.non_proxy_hosts {
            proxy = proxy.no_proxy(hosts);
        }
        Ok(Some(proxy))
    }
}

/// Validated transport settings plus the retry policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportConfig {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    operation_attempt_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
    app_name: Option<AppName>,
    use_fips: Option<bool>,
    use_dual_stack: Option<bool>,
    max_connections: Option<usize>,
    proxy: ProxySettings,
    retry_policy: RetryPolicy,
}

impl TransportConfig {
    /// Validate `raw` and attach `retry_policy`.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] naming the offending key if a
    /// key is not a known transport option or its value does not parse.
    pub fn build(
        raw: &BTreeMap<String, String>,
        retry_policy: RetryPolicy,
    ) -> ConnectionResult<Self> {
        let mut config = Self {
            retry_policy,
            ..Self::default()
        };

        for (key, value) in raw {
            let normalized = normalize_key(key);
            if RETRY_KEYS.contains(&normalized.as_str()) {
                warn!(
                    key = %key,
                    "ignoring retry option in client configuration, use the retry policy instead"
                );
                continue;
            }
            let option = TransportOption::lookup(&normalized).ok_or_else(|| {
                ConnectionError::Configuration(format!(
                    "unknown client configuration key '{key}'; expected one of {}",
                    Self::known_keys().collect::<Vec<_>>().join(", ")
                ))
            })?;
            option.apply(&mut config, key, value)?;
        }
        config.proxy.to_proxy_config()?;

        Ok(config)
    }

    /// The transport option names accepted by [`TransportConfig::build`].
    pub fn known_keys() -> impl Iterator<Item = &'static str> {
        TransportOption::ALL.iter().map(|(name, _)| *name)
    }

    /// SDK timeout configuration for the configured timeouts.
    #[must_use]
    pub fn timeout_config(&self) -> TimeoutConfig {
        let mut builder = TimeoutConfig::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(timeout) = self.operation_attempt_timeout {
            builder = builder.operation_attempt_timeout(timeout);
        }
        if let Some(timeout) = self.operation_timeout {
            builder = builder.operation_timeout(timeout);
        }
        builder.build()
    }

    /// Connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Read (socket) timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn operation_attempt_timeout(&self) -> Option<Duration> {
        self.operation_attempt_timeout
    }

    /// Whole-operation timeout, retries included.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// App name added to the user agent.
    #[must_use]
    pub fn app_name(&self) -> Option<&AppName> {
        self.app_name.as_ref()
    }

    /// FIPS endpoint override.
    #[must_use]
    pub fn use_fips(&self) -> Option<bool> {
        self.use_fips
    }

    /// Dual-stack endpoint override.
    #[must_use]
    pub fn use_dual_stack(&self) -> Option<bool> {
        self.use_dual_stack
    }

    /// Idle pooled connections kept per host.
    #[must_use]
    pub fn max_connections(&self) -> Option<usize> {
        self.max_connections
    }

    /// Proxy URL all traffic is routed through, if any.
    #[must_use]
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy.url()
    }

    /// The retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// HTTP client carrying the pool and proxy options, or `None` when neither
    /// is set and the SDK default client should be used.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] if the proxy settings are
    /// incomplete or the proxy URL is invalid.
    pub fn http_client(&self) -> ConnectionResult<Option<SharedHttpClient>> {
        let proxy = self.proxy.to_proxy_config()?;
        if proxy.is_none() && self.max_connections.is_none() {
            return Ok(None);
        }

        let max_connections = self.max_connections;
        let client = HttpClientBuilder::new().build_with_connector_fn(
            move |settings, components| {
                let mut builder = Connector::builder();
                builder.set_connector_settings(settings.cloned());
                builder.set_sleep_impl(components.and_then(|c| c.sleep_impl()));
                builder.set_proxy_config(proxy.clone());
                builder.set_pool_max_idle_per_host(max_connections);
                builder
                    .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc))
                    .build()
            },
        );
        Ok(Some(client))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn parse_millis(key: &str, value: &str) -> ConnectionResult<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConnectionError::Configuration(format!(
            "'{key}' must be greater than zero"
        ))),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(ConnectionError::Configuration(format!(
            "'{key}' expects a duration in milliseconds, got '{value}'"
        ))),
    }
}

fn parse_count(key: &str, value: &str) -> ConnectionResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ConnectionError::Configuration(format!(
            "'{key}' expects a positive count, got '{value}'"
        ))),
        Ok(count) => Ok(count),
    }
}

fn non_blank(key: &str, value: &str) -> ConnectionResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConnectionError::Configuration(format!(
            "'{key}' must not be blank"
        )));
    }
    Ok(value.to_owned())
}

fn parse_flag(key: &str, value: &str) -> ConnectionResult<bool> {
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConnectionError::Configuration(format!(
            "'{key}' expects true or false, got '{value}'"
        )))
    }
}
