//! S3 integration tests.

#[cfg(test)]
mod tests {
    use awslink_s3::{MIN_PART_SIZE, S3Upload};
    use bytes::Bytes;

    use crate::{cleanup_bucket, create_test_bucket, s3_connection};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_small_object_with_put() {
        let connection = s3_connection().await.expect("s3 connection");
        let bucket = create_test_bucket(&connection, "put").await.expect("bucket");

        let outcome = S3Upload::builder()
            .bucket(&bucket)
            .key("small.txt")
            .content_type("text/plain")
            .build()
            .execute(&connection, Bytes::from_static(b"hello awslink"))
            .await
            .expect("upload");
        assert_eq!(outcome.part_count, 1);
        assert_eq!(outcome.size, 13);

        let object = connection
            .client()
            .expect("client")
            .get_object()
            .bucket(&bucket)
            .key("small.txt")
            .send()
            .await
            .expect("get_object");
        let body = object.body.collect().await.expect("body").into_bytes();
        assert_eq!(body.as_ref(), b"hello awslink");

        cleanup_bucket(&connection, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_large_object_in_parts() {
        let connection = s3_connection().await.expect("s3 connection");
        let bucket = create_test_bucket(&connection, "mpu").await.expect("bucket");
        let payload = Bytes::from(vec![0xAB_u8; 2 * MIN_PART_SIZE + 1024]);

        let outcome = S3Upload::builder()
            .bucket(&bucket)
            .key("large.bin")
            .part_size(MIN_PART_SIZE)
            .build()
            .execute(&connection, payload.clone())
            .await
            .expect("multipart upload");
        assert_eq!(outcome.part_count, 3);

        let head = connection
            .client()
            .expect("client")
            .head_object()
            .bucket(&bucket)
            .key("large.bin")
            .send()
            .await
            .expect("head_object");
        assert_eq!(head.content_length(), i64::try_from(payload.len()).ok());

        cleanup_bucket(&connection, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_bucket() {
        let connection = s3_connection().await.expect("s3 connection");
        let err = S3Upload::builder()
            .bucket(crate::test_name("missing"))
            .key("k")
            .build()
            .execute(&connection, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            awslink_s3::UploadError::Sdk { operation: "PutObject", .. }
        ));
    }
}
