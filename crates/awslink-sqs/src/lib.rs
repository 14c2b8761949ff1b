//! SQS bindings for awslink.
//!
//! [`SqsConnection`] hands out an [`SqsHandle`]: the raw SDK client plus
//! `send_message`/`delete_message` calls that are batched client-side when the
//! connection uses [`SqsClientFactory::Buffered`]. Stopping or closing the
//! connection flushes whatever is still buffered.

mod buffer;
mod error;
mod factory;
mod handle;

pub use buffer::{
    BatchDispatcher, BatchEntry, BatchResults, BufferConfig, MAX_BATCH_SIZE, SendBuffer,
};
pub use error::SqsError;
pub use factory::SqsClientFactory;
pub use handle::SqsHandle;

/// A lifecycle-managed SQS client.
pub type SqsConnection = awslink_core::Connection<SqsClientFactory>;
