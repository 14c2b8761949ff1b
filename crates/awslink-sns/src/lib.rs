//! SNS bindings for awslink.
//!
//! [`SnsConnection`] is a [`Connection`](awslink_core::Connection) whose handle
//! is an [`aws_sdk_sns::Client`].

use async_trait::async_trait;
use aws_sdk_sns::Client;
use awslink_core::{
    ClientBuilder, ClientFactory, ConnectionResult, Credentials, EndpointBuilder, TransportConfig,
};
use tracing::debug;

/// Builds [`aws_sdk_sns::Client`] handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnsClientFactory;

#[async_trait]
impl ClientFactory for SnsClientFactory {
    type Client = Client;

    const SERVICE: &'static str = "sns";

    async fn create_client(
        &self,
        credentials: Credentials,
        transport: &TransportConfig,
        endpoint: &dyn EndpointBuilder,
    ) -> ConnectionResult<Client> {
        let sdk_config = ClientBuilder::new(credentials, transport)
            .rebuild_with(endpoint)?
            .into_sdk_config()
            .await?;
        debug!(region = ?sdk_config.region(), "built sns client");
        Ok(Client::new(&sdk_config))
    }
}

/// A lifecycle-managed SNS client.
pub type SnsConnection = awslink_core::Connection<SnsClientFactory>;
