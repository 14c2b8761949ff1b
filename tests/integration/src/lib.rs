//! Integration tests for awslink connections.
//!
//! These tests require an AWS-compatible server (e.g. LocalStack) at
//! `AWSLINK_ENDPOINT_URL`, defaulting to `http://localhost:4566`. They are
//! marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p awslink-integration -- --ignored
//! ```

use std::sync::Once;

use awslink_core::{Authentication, ClientFactory, Connection, ConnectionConfig, CustomEndpoint};
use awslink_s3::{S3ClientFactory, S3Connection};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("AWSLINK_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Connection configuration pointing at the local server.
#[must_use]
pub fn local_config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .authentication(Authentication::keys("test", "test"))
        .custom_endpoint(CustomEndpoint::new(endpoint_url(), "us-east-1"))
        .build()
}

/// Create and start a connection against the local server.
pub async fn started<F: ClientFactory>(factory: F) -> anyhow::Result<Connection<F>> {
    init_tracing();
    let connection = Connection::new(local_config(), factory);
    awslink_core::init_and_start(&connection).await?;
    Ok(connection)
}

/// A started path-style S3 connection.
pub async fn s3_connection() -> anyhow::Result<S3Connection> {
    started(S3ClientFactory::path_style()).await
}

/// Generate a unique resource name for a test.
#[must_use]
pub fn test_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket and return its name. Caller is responsible for cleanup.
pub async fn create_test_bucket(
    connection: &S3Connection,
    prefix: &str,
) -> anyhow::Result<String> {
    let name = test_name(prefix);
    connection
        .client()?
        .create_bucket()
        .bucket(&name)
        .send()
        .await?;
    Ok(name)
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(connection: &S3Connection, bucket: &str) {
    let Ok(client) = connection.client() else {
        return;
    };
    if let Ok(resp) = client.list_objects_v2().bucket(bucket).send().await {
        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                let _ = client.delete_object().bucket(bucket).key(key).send().await;
            }
        }
    }
    let _ = client.delete_bucket().bucket(bucket).send().await;
}

mod test_lifecycle;
mod test_s3;
mod test_sns;
mod test_sqs;
