//! Service-independent client builder.
//!
//! Every client factory starts from a [`ClientBuilder`] holding the resolved
//! credentials and transport settings, lets the connection's
//! [`EndpointBuilder`] rewrite its target, and then loads an [`SdkConfig`] that
//! any AWS SDK service client can be constructed from.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

use crate::auth::Credentials;
use crate::endpoint::EndpointBuilder;
use crate::error::{ConnectionError, ConnectionResult};
use crate::transport::TransportConfig;

/// In-progress client configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    credentials: Credentials,
    transport: TransportConfig,
    region: Option<Region>,
    endpoint_url: Option<String>,
}

impl ClientBuilder {
    /// Start a builder from resolved credentials and transport settings.
    #[must_use]
    pub fn new(credentials: Credentials, transport: &TransportConfig) -> Self {
        Self {
            credentials,
            transport: transport.clone(),
            region: None,
            endpoint_url: None,
        }
    }

    /// Target (and signing) region.
    #[must_use]
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Set the target region.
    pub fn set_region(&mut self, region: Region) {
        self.region = Some(region);
    }

    /// Explicit service endpoint, if any.
    #[must_use]
    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    /// Send requests to `url` instead of the resolved regional endpoint.
    pub fn set_endpoint_url(&mut self, url: impl Into<String>) {
        self.endpoint_url = Some(url.into());
    }

    /// Credentials the client will sign with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Transport settings.
    #[must_use]
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Let `endpoint` rewrite this builder.
    ///
    /// # Errors
    /// Propagates the endpoint builder's failure unchanged.
    pub fn rebuild_with(self, endpoint: &dyn EndpointBuilder) -> ConnectionResult<Self> {
        endpoint.rebuild(self)
    }

    /// Resolve the final SDK configuration.
    ///
    /// Settings left unset here (ambient credentials, a missing region) are
    /// filled in by the SDK default provider chains.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Configuration`] for unusable proxy settings
    /// and [`ConnectionError::Construction`] if no region could be resolved
    /// from configuration, environment or profile.
    pub async fn into_sdk_config(self) -> ConnectionResult<SdkConfig> {
        let transport = &self.transport;
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(transport.retry_policy().to_retry_config())
            .timeout_config(transport.timeout_config());

        if let Some(region) = self.region {
            loader = loader.region(region);
        }
        if let Some(url) = self.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        if let Credentials::Explicit(credentials) = self.credentials {
            loader = loader.credentials_provider(credentials);
        }
        if let Some(app_name) = transport.app_name() {
            loader = loader.app_name(app_name.clone());
        }
        if let Some(use_fips) = transport.use_fips() {
            loader = loader.use_fips(use_fips);
        }
        if let Some(use_dual_stack) = transport.use_dual_stack() {
            loader = loader.use_dual_stack(use_dual_stack);
        }
        if let Some(http_client) = transport.http_client()? {
            loader = loader.http_client(http_client);
        }

        let config = loader.load().await;
        if config.region().is_none() {
            return Err(ConnectionError::Construction(
                "no region could be resolved from configuration, environment or profile"
                    .to_owned(),
            ));
        }

        debug!(
            region = ?config.region(),
            endpoint = ?config.endpoint_url(),
            "resolved client configuration"
        );
        Ok(config)
    }
}
