//! S3 bindings for awslink.
//!
//! [`S3Connection`] is a [`Connection`](awslink_core::Connection) whose handle is
//! an [`aws_sdk_s3::Client`]. [`S3Upload`] uploads an object through it, switching
//! to a multipart upload for payloads larger than one part.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use awslink_core::{ConnectionConfig, CustomEndpoint};
//! use awslink_s3::{S3ClientFactory, S3Connection};
//!
//! let config = ConnectionConfig::builder()
//!     .custom_endpoint(CustomEndpoint::new("http://localhost:4566", "us-east-1"))
//!     .build();
//! let connection = S3Connection::new(config, S3ClientFactory::path_style());
//! connection.init().await?;
//! let buckets = connection.client()?.list_buckets().send().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod upload;

pub use error::UploadError;
pub use factory::S3ClientFactory;
pub use upload::{DEFAULT_PART_SIZE, MAX_PARTS, MIN_PART_SIZE, S3Upload, UploadOutcome};

/// A lifecycle-managed S3 client.
pub type S3Connection = awslink_core::Connection<S3ClientFactory>;
