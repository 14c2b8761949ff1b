//! The SQS client handle.

use aws_sdk_sqs::Client;
use awslink_core::ShutdownError;

use crate::buffer::{SendBuffer, sdk_error};
use crate::error::SqsError;

/// What an [`SqsConnection`](crate::SqsConnection) hands out.
///
/// `send_message` and `delete_message` go through the send buffer when the
/// connection was built with [`SqsClientFactory::Buffered`](crate::SqsClientFactory::Buffered)
/// and straight to SQS otherwise. Everything else is available on the raw
/// client returned by [`SqsHandle::sdk`].
#[derive(Debug)]
pub struct SqsHandle {
    client: Client,
    buffer: Option<SendBuffer>,
}

impl SqsHandle {
    /// A handle calling SQS directly.
    #[must_use]
    pub fn unbuffered(client: Client) -> Self {
        Self {
            client,
            buffer: None,
        }
    }

    /// A handle batching sends and deletes through `buffer`.
    #[must_use]
    pub fn buffered(client: Client, buffer: SendBuffer) -> Self {
        Self {
            client,
            buffer: Some(buffer),
        }
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn sdk(&self) -> &Client {
        &self.client
    }

    /// Whether sends and deletes are batched.
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }

    /// Send a message; returns its message id.
    ///
    /// # Errors
    /// Returns [`SqsError`] if the call, or the batch entry, fails.
    pub async fn send_message(
        &self,
        queue_url: &str,
        body: impl Into<String>,
    ) -> Result<String, SqsError> {
        let body = body.into();
        if let Some(buffer) = &self.buffer {
            return buffer.send_message(queue_url, body).await;
        }
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| sdk_error("SendMessage", &e))?;
        Ok(output.message_id().unwrap_or_default().to_owned())
    }

    /// Delete a received message.
    ///
    /// # Errors
    /// Returns [`SqsError`] if the call, or the batch entry, fails.
    pub async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: impl Into<String>,
    ) -> Result<(), SqsError> {
        let receipt_handle = receipt_handle.into();
        if let Some(buffer) = &self.buffer {
            return buffer.delete_message(queue_url, receipt_handle).await;
        }
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteMessage", &e))?;
        Ok(())
    }

    /// Flush and stop the send buffer, if any.
    ///
    /// # Errors
    /// Returns [`ShutdownError`] if the buffer's background task failed.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        match &self.buffer {
            Some(buffer) => buffer
                .shutdown()
                .await
                .map_err(|e| ShutdownError::new("sqs", e.to_string())),
            None => Ok(()),
        }
    }
}
