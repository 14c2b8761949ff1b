//! S3 upload errors.

use awslink_core::ConnectionError;

/// Failure of an [`S3Upload`](crate::S3Upload).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The connection could not provide a client.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The upload parameters are unusable.
    #[error("invalid upload: {0}")]
    InvalidRequest(String),

    /// An S3 call failed.
    #[error("{operation} failed for s3://{bucket}/{key}: {message}")]
    Sdk {
        /// The S3 operation that failed.
        operation: &'static str,
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// Error details from the SDK.
        message: String,
    },
}
