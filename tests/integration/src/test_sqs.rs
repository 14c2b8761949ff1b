//! SQS integration tests.

#[cfg(test)]
mod tests {
    use awslink_sqs::{BufferConfig, SqsClientFactory, SqsConnection};

    use crate::{started, test_name};

    async fn create_queue(connection: &SqsConnection) -> String {
        connection
            .client()
            .expect("client")
            .sdk()
            .create_queue()
            .queue_name(test_name("queue"))
            .send()
            .await
            .expect("create_queue")
            .queue_url()
            .expect("queue url")
            .to_owned()
    }

    async fn receive_all(
        connection: &SqsConnection,
        queue_url: &str,
        expected: usize,
    ) -> Vec<String> {
        let client = connection.client().expect("client");
        let mut bodies = Vec::new();
        for _ in 0..10 {
            let received = client
                .sdk()
                .receive_message()
                .queue_url(queue_url)
                .max_number_of_messages(10)
                .wait_time_seconds(1)
                .send()
                .await
                .expect("receive_message");
            for message in received.messages() {
                bodies.extend(message.body().map(ToOwned::to_owned));
                if let Some(receipt) = message.receipt_handle() {
                    client
                        .delete_message(queue_url, receipt)
                        .await
                        .expect("delete_message");
                }
            }
            if bodies.len() >= expected {
                break;
            }
        }
        bodies
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_send_and_receive_unbuffered() {
        let connection = started(SqsClientFactory::Unbuffered).await.expect("sqs connection");
        let queue_url = create_queue(&connection).await;

        let id = connection
            .client()
            .expect("client")
            .send_message(&queue_url, "plain")
            .await
            .expect("send_message");
        assert!(!id.is_empty());

        assert_eq!(receive_all(&connection, &queue_url, 1).await, ["plain"]);
        awslink_core::stop_and_close(&connection).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_batch_buffered_sends() {
        let factory = SqsClientFactory::Buffered(BufferConfig {
            max_batch_size: 5,
            max_batch_open_ms: 100,
            ..BufferConfig::default()
        });
        let connection = started(factory).await.expect("sqs connection");
        let queue_url = create_queue(&connection).await;
        let handle = connection.client().expect("client");

        let sends = (0..12).map(|i| handle.send_message(&queue_url, format!("m{i}")));
        let ids = futures::future::try_join_all(sends).await.expect("buffered sends");
        assert_eq!(ids.len(), 12);

        let mut bodies = receive_all(&connection, &queue_url, 12).await;
        bodies.sort();
        assert_eq!(bodies.len(), 12);

        awslink_core::stop_and_close(&connection).await;
    }
}
