//! Pluggable client construction.

use std::fmt;

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::endpoint::EndpointBuilder;
use crate::error::{ConnectionResult, ShutdownError};
use crate::transport::TransportConfig;

/// Builds (and tears down) the client handle for one AWS service.
///
/// Implementations usually start from
/// [`ClientBuilder`](crate::client::ClientBuilder), apply `endpoint`, load the
/// SDK configuration and construct the service client from it. Failures are
/// reported, not retried: request-level retries belong to the client itself.
#[async_trait]
pub trait ClientFactory: Send + Sync + fmt::Debug + 'static {
    /// The client handle this factory produces.
    type Client: Send + Sync + 'static;

    /// Short service name used in logs and errors (e.g. `"s3"`).
    const SERVICE: &'static str;

    /// Construct a new client handle.
    async fn create_client(
        &self,
        credentials: Credentials,
        transport: &TransportConfig,
        endpoint: &dyn EndpointBuilder,
    ) -> ConnectionResult<Self::Client>;

    /// Release resources held by `client` (flush buffers, stop background
    /// tasks). The connection discards the handle whatever this returns.
    async fn shutdown_client(&self, _client: &Self::Client) -> Result<(), ShutdownError> {
        Ok(())
    }
}
