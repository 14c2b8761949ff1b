//! Connection lifecycle against a live server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use awslink_core::{ConnectionState, init_and_start, stop_and_close};

    use crate::s3_connection;

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_requests_after_reinit() {
        let connection = s3_connection().await.expect("s3 connection");
        let first = connection.client().expect("client");
        first.list_buckets().send().await.expect("list_buckets");

        stop_and_close(&connection).await;
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.client().is_err());

        init_and_start(&connection).await.expect("re-init");
        let second = connection.client().expect("client");
        assert!(!Arc::ptr_eq(&first, &second));
        second.list_buckets().send().await.expect("list_buckets");
    }
}
