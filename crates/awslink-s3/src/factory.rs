//! S3 client factory.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use awslink_core::{
    ClientBuilder, ClientFactory, ConnectionResult, Credentials, EndpointBuilder, TransportConfig,
    parse_bool,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Builds [`aws_sdk_s3::Client`] handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3ClientFactory {
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    /// Most local emulators need this.
    pub force_path_style: bool,
}

impl S3ClientFactory {
    /// A factory using path-style addressing.
    #[must_use]
    pub fn path_style() -> Self {
        Self {
            force_path_style: true,
        }
    }

    /// Read `AWSLINK_S3_FORCE_PATH_STYLE` (default `false`).
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            force_path_style: lookup("AWSLINK_S3_FORCE_PATH_STYLE")
                .is_some_and(|v| parse_bool(v.trim())),
        }
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    type Client = Client;

    const SERVICE: &'static str = "s3";

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
        let config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .build();
        debug!(
            force_path_style = self.force_path_style,
            region = ?config.region(),
            "built s3 client"
        );
        Ok(Client::from_conf(config))
    }
}
