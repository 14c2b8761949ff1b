//! Connection configuration.
//!
//! [`ConnectionConfig`] is plain data: it is deserialized (or built, or read
//! from the environment) up front, and only turned into credentials, a retry
//! policy and a transport configuration when the connection is initialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::auth::{Authentication, KeysAuthentication};
use crate::endpoint::{CustomEndpoint, EndpointBuilder, RegionOnly};
use crate::error::{ConnectionError, ConnectionResult};
use crate::retry::RetryPolicyFactory;
use crate::types::{AwsRegion, is_blank};

/// Configuration for one service connection.
///
/// # Examples
///
/// ```
/// use awslink_core::{Authentication, ConnectionConfig};
///
/// let config: ConnectionConfig = serde_json::from_str(
///     r#"{
///         "region": "eu-central-1",
///         "authentication": {"type": "keys", "accessKey": "AKID", "secretKey": "secret"},
///         "clientConfiguration": {"SocketTimeout": "30000"}
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(config.region.as_deref(), Some("eu-central-1"));
/// assert!(matches!(config.authentication, Authentication::Keys(_)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Target region. Falls back to the SDK region provider chain when unset.
    #[builder(default, setter(strip_option, into))]
    pub region: Option<String>,

    /// How credentials are obtained.
    #[builder(default)]
    pub authentication: Authentication,

    /// Raw transport options, validated at `init`.
    #[builder(default)]
    pub client_configuration: BTreeMap<String, String>,

    /// How the retry policy is chosen.
    #[builder(default)]
    pub retry_policy: RetryPolicyFactory,

    /// Explicit endpoint; takes precedence over `region` when configured.
    #[builder(default, setter(strip_option))]
    pub custom_endpoint: Option<CustomEndpoint>,
}

impl ConnectionConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `AWSLINK_REGION` | target region |
    /// | `AWSLINK_ACCESS_KEY` | access key id; selects keys authentication |
    /// | `AWSLINK_SECRET_KEY` | secret access key |
    /// | `AWSLINK_SESSION_TOKEN` | optional session token |
    /// | `AWSLINK_ENDPOINT_URL` | custom service endpoint |
    /// | `AWSLINK_SIGNING_REGION` | signing region for the custom endpoint (defaults to `AWSLINK_REGION`) |
    ///
    /// Unset variables keep the defaults: ambient credentials and SDK endpoint
    /// resolution.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] if the result fails
    /// [`ConnectionConfig::validate`].
    pub fn from_env() -> ConnectionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConnectionResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !is_blank(v));
        let mut config = Self {
            region: var("AWSLINK_REGION"),
            ..Self::default()
        };

        if let Some(access_key) = var("AWSLINK_ACCESS_KEY") {
            let secret_key = var("AWSLINK_SECRET_KEY").unwrap_or_default();
            let mut keys = KeysAuthentication::new(access_key, secret_key);
            if let Some(token) = var("AWSLINK_SESSION_TOKEN") {
                keys = keys.with_session_token(token);
            }
            config.authentication = Authentication::Keys(keys);
        }

        if let Some(endpoint) = var("AWSLINK_ENDPOINT_URL") {
            let signing_region = var("AWSLINK_SIGNING_REGION")
                .or_else(|| config.region.clone())
                .unwrap_or_default();
            config.custom_endpoint = Some(CustomEndpoint::new(endpoint, signing_region));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration's shape without resolving anything.
    ///
    /// Runs first during `init`. Credentials, transport options and the retry
    /// policy are checked by their own builders; the endpoint URL is checked
    /// when it is applied to the client.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] for a malformed region or
    /// signing region, or a custom endpoint missing one of its two fields.
    pub fn validate(&self) -> ConnectionResult<()> {
        if let Some(region) = self.region.as_deref().filter(|r| !is_blank(r)) {
            AwsRegion::new(region.trim())?;
        }
        if let Some(endpoint) = &self.custom_endpoint {
            if !endpoint.is_configured() {
                return Err(ConnectionError::Configuration(
                    "customEndpoint requires both serviceEndpoint and signingRegion".to_owned(),
                ));
            }
            AwsRegion::new(endpoint.signing_region.trim())?;
        }
        Ok(())
    }

    /// The endpoint builder `init` applies: the custom endpoint when one is
    /// configured, otherwise the region.
    #[must_use]
    pub fn endpoint_builder(&self) -> Box<dyn EndpointBuilder> {
        match &self.custom_endpoint {
            Some(endpoint) if endpoint.is_configured() => Box::new(endpoint.clone()),
            _ => Box::new(RegionOnly::new(self.region.clone())),
        }
    }
}

/// Parse a boolean from an environment variable value.
///
/// Accepts `"1"`, `"true"` (case-insensitive) as `true`; everything else is `false`.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
