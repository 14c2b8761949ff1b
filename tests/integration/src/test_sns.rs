//! SNS integration tests.

#[cfg(test)]
mod tests {
    use awslink_sns::SnsClientFactory;

    use crate::{started, test_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_topic_and_publish() {
        let connection = started(SnsClientFactory).await.expect("sns connection");
        let client = connection.client().expect("client");

        let topic = client
            .create_topic()
            .name(test_name("topic"))
            .send()
            .await
            .expect("create_topic");
        let topic_arn = topic.topic_arn().expect("topic arn");

        let published = client
            .publish()
            .topic_arn(topic_arn)
            .message("hello")
            .send()
            .await
            .expect("publish");
        assert!(published.message_id().is_some());

        let _ = client.delete_topic().topic_arn(topic_arn).send().await;
        awslink_core::stop_and_close(&connection).await;
    }
}
