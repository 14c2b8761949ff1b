//! Single-shot and multipart object upload.
//!
//! Payloads up to one part are sent with `PutObject`; larger ones go through
//! `CreateMultipartUpload`, one `UploadPart` per part and
//! `CompleteMultipartUpload`. A failed multipart upload is aborted so no
//! orphaned parts are left behind. Progress is logged while the upload runs.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use awslink_core::{DEFAULT_PROGRESS_INTERVAL, ProgressMonitor, TransferProgress};
use bytes::Bytes;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::S3Connection;
use crate::error::UploadError;

/// Smallest part S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default part size.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Most parts one multipart upload may have.
pub const MAX_PARTS: usize = 10_000;

/// Upload of one object.
///
/// # Examples
///
/// ```no_run
/// # async fn example(connection: &awslink_s3::S3Connection) -> Result<(), awslink_s3::UploadError> {
/// use awslink_s3::S3Upload;
/// use bytes::Bytes;
///
/// let upload = S3Upload::builder().bucket("reports").key("2024/q1.csv").build();
/// let outcome = upload.execute(connection, Bytes::from_static(b"a,b\n1,2\n")).await?;
/// assert_eq!(outcome.part_count, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct S3Upload {
    /// Target bucket.
    #[builder(setter(into))]
    pub bucket: String,

    /// Target key.
    #[builder(setter(into))]
    pub key: String,

    /// Part size for multipart uploads; at least [`MIN_PART_SIZE`].
    #[builder(default = DEFAULT_PART_SIZE)]
    pub part_size: usize,

    /// How often progress is logged.
    #[builder(default = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: Duration,

    /// Optional `Content-Type` of the object.
    #[builder(default, setter(strip_option, into))]
    pub content_type: Option<String>,
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// ETag of the stored object, when S3 returned one.
    pub e_tag: Option<String>,
    /// Number of parts sent; 1 for a single `PutObject`.
    pub part_count: usize,
    /// Bytes uploaded.
    pub size: u64,
}

impl S3Upload {
    /// Upload `body` through `connection`'s current client.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidRequest`] for an unusable part size,
    /// [`UploadError::Connection`] if the connection is not initialized and
    /// [`UploadError::Sdk`] if an S3 call fails.
    pub async fn execute(
        &self,
        connection: &S3Connection,
        body: Bytes,
    ) -> Result<UploadOutcome, UploadError> {
        let parts = plan_parts(body.len(), self.part_size)?;
        let client = connection.client()?;

        let size = body.len() as u64;
        let progress = Arc::new(TransferProgress::new(size));
        let monitor = ProgressMonitor::spawn(
            format!("s3://{}/{}", self.bucket, self.key),
            Arc::clone(&progress),
            self.progress_interval,
        );

        let result = if parts.len() <= 1 {
            self.put(&client, body, &progress).await
        } else {
            self.multipart(&client, &body, &parts, &progress).await
        };
        progress.finish();
        monitor.join().await;

        let e_tag = result?;
        info!(
            bucket = %self.bucket,
            key = %self.key,
            size,
            parts = parts.len(),
            "upload complete"
        );
        Ok(UploadOutcome {
            e_tag,
            part_count: parts.len().max(1),
            size,
        })
    }

    async fn put(
        &self,
        client: &Client,
        body: Bytes,
        progress: &TransferProgress,
    ) -> Result<Option<String>, UploadError> {
        let len = body.len() as u64;
        let output = client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_content_type(self.content_type.clone())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| self.sdk_error("PutObject", &e))?;
        progress.add(len);
        Ok(output.e_tag().map(ToOwned::to_owned))
    }

    async fn multipart(
        &self,
        client: &Client,
        body: &Bytes,
        parts: &[Range<usize>],
        progress: &TransferProgress,
    ) -> Result<Option<String>, UploadError> {
        let created = client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .set_content_type(self.content_type.clone())
            .send()
            .await
            .map_err(|e| self.sdk_error("CreateMultipartUpload", &e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| UploadError::Sdk {
                operation: "CreateMultipartUpload",
                bucket: self.bucket.clone(),
                key: self.key.clone(),
                message: "response carried no upload id".to_owned(),
            })?
            .to_owned();
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %upload_id,
            parts = parts.len(),
            "multipart upload created"
        );

        match self.upload_parts(client, &upload_id, body, parts, progress).await {
            Ok(e_tag) => Ok(e_tag),
            Err(e) => {
                self.abort(client, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        client: &Client,
        upload_id: &str,
        body: &Bytes,
        parts: &[Range<usize>],
        progress: &TransferProgress,
    ) -> Result<Option<String>, UploadError> {
        let mut completed = Vec::with_capacity(parts.len());
        for (index, range) in parts.iter().enumerate() {
            // Bounded by MAX_PARTS.
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let part_number = index as i32 + 1;
            let chunk = body.slice(range.clone());
            let len = chunk.len() as u64;
            let output = client
                .upload_part()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| self.sdk_error("UploadPart", &e))?;
            progress.add(len);
            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(output.e_tag().map(ToOwned::to_owned))
                    .build(),
            );
        }

        let output = client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| self.sdk_error("CompleteMultipartUpload", &e))?;
        Ok(output.e_tag().map(ToOwned::to_owned))
    }

    async fn abort(&self, client: &Client, upload_id: &str) {
        let aborted = client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .send()
            .await;
        match aborted {
            Ok(_) => debug!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id,
                "multipart upload aborted"
            ),
            Err(e) => warn!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id,
                error = %DisplayErrorContext(&e),
                "failed to abort multipart upload"
            ),
        }
    }

    fn sdk_error<E: std::error::Error>(&self, operation: &'static str, err: &E) -> UploadError {
        UploadError::Sdk {
            operation,
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

/// Split `len` bytes into consecutive ranges of at most `part_size` bytes.
///
/// An empty payload yields no ranges and is uploaded with a single `PutObject`.
fn plan_parts(len: usize, part_size: usize) -> Result<Vec<Range<usize>>, UploadError> {
    if part_size < MIN_PART_SIZE {
        return Err(UploadError::InvalidRequest(format!(
            "part size {part_size} is below the S3 minimum of {MIN_PART_SIZE} bytes"
        )));
    }
    let count = len.div_ceil(part_size);
    if count > MAX_PARTS {
        return Err(UploadError::InvalidRequest(format!(
            "{len} bytes need {count} parts of {part_size} bytes, more than the {MAX_PARTS} allowed"
        )));
    }
    Ok((0..count)
        .map(|i| i * part_size..((i + 1) * part_size).min(len))
        .collect())
}
