//! SQS client factory.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use awslink_core::{
    ClientBuilder, ClientFactory, ConnectionResult, Credentials, EndpointBuilder, ShutdownError,
    TransportConfig,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::{BufferConfig, SendBuffer};
use crate::handle::SqsHandle;

/// Builds [`SqsHandle`]s, optionally with client-side batching.
///
/// Deserializes from `{"type": "unbuffered"}` or
/// `{"type": "buffered", "maxBatchSize": 10, "maxBatchOpenMs": 200}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SqsClientFactory {
    /// Every call goes straight to SQS.
    #[default]
    Unbuffered,
    /// Sends and deletes are batched.
    Buffered(BufferConfig),
}

#[async_trait]
impl ClientFactory for SqsClientFactory {
    type Client = SqsHandle;

    const SERVICE: &'static str = "sqs";

    async fn create_client(
        &self,
        credentials: Credentials,
        transport: &TransportConfig,
        endpoint: &dyn EndpointBuilder,
    ) -> ConnectionResult<SqsHandle> {
        if let Self::Buffered(config) = self {
            config.validate()?;
        }
        let sdk_config = ClientBuilder::new(credentials, transport)
            .rebuild_with(endpoint)?
            .into_sdk_config()
            .await?;
        let client = Client::new(&sdk_config);
        debug!(
            region = ?sdk_config.region(),
            buffered = matches!(self, Self::Buffered(_)),
            "built sqs client"
        );

        Ok(match self {
            Self::Unbuffered => SqsHandle::unbuffered(client),
            Self::Buffered(config) => {
                let buffer = SendBuffer::spawn(client.clone(), *config);
                SqsHandle::buffered(client, buffer)
            }
        })
    }

    async fn shutdown_client(&self, client: &SqsHandle) -> Result<(), ShutdownError> {
        client.shutdown().await
    }
}
