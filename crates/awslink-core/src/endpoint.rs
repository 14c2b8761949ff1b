//! Endpoint builders.
//!
//! An [`EndpointBuilder`] rewrites a [`ClientBuilder`] to target a region or an
//! explicit endpoint. Connections use [`CustomEndpoint`] when it is configured
//! and fall back to [`RegionOnly`] otherwise.

use std::fmt;

use aws_config::Region;
use http::Uri;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::client::ClientBuilder;
use crate::error::{ConnectionError, ConnectionResult};
use crate::types::is_blank;

/// Rewrites the target of an in-progress client configuration.
pub trait EndpointBuilder: Send + Sync + fmt::Debug {
    /// Apply this endpoint to `builder`.
    ///
    /// # Errors
    /// Returns an error if the endpoint cannot be applied; `init` reports it as
    /// a construction failure.
    fn rebuild(&self, builder: ClientBuilder) -> ConnectionResult<ClientBuilder>;
}

/// Targets a region; endpoint resolution is left to the SDK.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionOnly {
    region: Option<String>,
}

impl RegionOnly {
    /// Create a region-only endpoint builder.
    #[must_use]
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

impl EndpointBuilder for RegionOnly {
    fn rebuild(&self, mut builder: ClientBuilder) -> ConnectionResult<ClientBuilder> {
        if let Some(region) = self.region.as_deref().filter(|r| !is_blank(r)) {
            trace!(region = %region, "setting region");
            builder.set_region(Region::new(region.trim().to_owned()));
        }
        Ok(builder)
    }
}

/// An explicit service endpoint and signing region, e.g. a local emulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomEndpoint {
    /// Absolute `http`/`https` URL of the service endpoint.
    pub service_endpoint: String,
    /// Region used to sign requests.
    pub signing_region: String,
}

impl CustomEndpoint {
    /// Create a custom endpoint.
    pub fn new(service_endpoint: impl Into<String>, signing_region: impl Into<String>) -> Self {
        Self {
            service_endpoint: service_endpoint.into(),
            signing_region: signing_region.into(),
        }
    }

    /// Whether both the endpoint URL and the signing region are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !is_blank(&self.service_endpoint) && !is_blank(&self.signing_region)
    }

    /// Parse and check the endpoint URL.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Construction`] unless the endpoint is an
    /// absolute `http` or `https` URL with a host.
    pub fn parse_endpoint(&self) -> ConnectionResult<Uri> {
        let endpoint = self.service_endpoint.trim();
        let uri: Uri = endpoint.parse().map_err(|e| {
            ConnectionError::Construction(format!("invalid service endpoint '{endpoint}': {e}"))
        })?;
        let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
        if !scheme_ok || uri.host().is_none() {
            return Err(ConnectionError::Construction(format!(
                "invalid service endpoint '{endpoint}': expected an absolute http(s) URL"
            )));
        }
        Ok(uri)
    }
}

impl EndpointBuilder for CustomEndpoint {
    fn rebuild(&self, mut builder: ClientBuilder) -> ConnectionResult<ClientBuilder> {
        if !self.is_configured() {
            return Err(ConnectionError::Construction(
                "custom endpoint requires both serviceEndpoint and signingRegion".to_owned(),
            ));
        }
        self.parse_endpoint()?;
        trace!(
            endpoint = %self.service_endpoint,
            signing_region = %self.signing_region,
            "setting custom endpoint"
        );
        builder.set_endpoint_url(self.service_endpoint.trim());
        builder.set_region(Region::new(self.signing_region.trim().to_owned()));
        Ok(builder)
    }
}
