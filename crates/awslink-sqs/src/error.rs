//! SQS call errors.

/// Failure of an SQS call made through an [`SqsHandle`](crate::SqsHandle).
///
/// `Clone` because one failed batch request is reported to every caller whose
/// message was in the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqsError {
    /// The request failed as a whole.
    #[error("{operation} failed: {message}")]
    Sdk {
        /// The SQS operation that failed.
        operation: &'static str,
        /// Error details from the SDK.
        message: String,
    },

    /// One entry of a batch request was rejected.
    #[error("batch entry {id} failed ({code}): {message}")]
    BatchEntry {
        /// Batch-local entry id.
        id: String,
        /// SQS error code.
        code: String,
        /// SQS error message.
        message: String,
        /// Whether the caller is at fault.
        sender_fault: bool,
    },

    /// The send buffer has been shut down.
    #[error("send buffer is closed")]
    BufferClosed,

    /// The send buffer's background task failed.
    #[error("send buffer worker failed: {0}")]
    Worker(String),
}
