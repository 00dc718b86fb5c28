//! Amazon SQS over the JSON protocol.

use reqwest::Url;
use serde_json::{json, Value};

use super::traits::QueueClient;
use super::types::{decode_body, encode_body, Message};
use crate::aws::{AwsClient, AwsConfig};
use crate::error::{BackplaneError, Result};

const SERVICE: &str = "SQS";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: AwsClient,
    queue_url: String,
    endpoint: String,
}

impl SqsQueue {
    /// Requests go to the origin of `queue_url`.
    pub fn new(queue_url: impl Into<String>, aws: AwsConfig) -> Result<Self> {
        let queue_url = queue_url.into();
        let parsed = Url::parse(&queue_url)
            .map_err(|e| BackplaneError::Config(format!("Invalid queue_url: {}", e)))?;
        let endpoint = format!("{}/", parsed.origin().ascii_serialization());
        let client = AwsClient::new(aws, "sqs", SERVICE)?;
        tracing::info!(queue_url = %queue_url, "SQS queue initialised");
        Ok(SqsQueue {
            client,
            queue_url,
            endpoint,
        })
    }

    fn call(&self, action: &str, mut payload: Value) -> Result<Value> {
        payload["QueueUrl"] = Value::String(self.queue_url.clone());
        let target = format!("AmazonSQS.{}", action);
        self.client
            .json_call(&self.endpoint, CONTENT_TYPE, &target, &payload)
    }
}

impl QueueClient for SqsQueue {
    fn name(&self) -> &'static str {
        "sqs"
    }

    fn send_message(&self, body: Value) -> Result<()> {
        let response = self.call("SendMessage", json!({ "MessageBody": encode_body(&body)? }))?;
        tracing::debug!(message_id = ?response.get("MessageId"), "SQS message sent");
        Ok(())
    }

    fn receive_message(&self) -> Result<Option<Message>> {
        let response = self.call(
            "ReceiveMessage",
            json!({ "MaxNumberOfMessages": 1, "WaitTimeSeconds": 0 }),
        )?;
        let Some(first) = response
            .get("Messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.first())
        else {
            return Ok(None);
        };

        let handle = first
            .get("ReceiptHandle")
            .and_then(Value::as_str)
            .ok_or_else(|| BackplaneError::Queue("SQS message without ReceiptHandle".to_string()))?;
        let body = first
            .get("Body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Some(Message {
            handle: handle.to_string(),
            body: decode_body(body),
        }))
    }

    fn delete_message(&self, handle: &str) -> Result<()> {
        self.call("DeleteMessage", json!({ "ReceiptHandle": handle }))?;
        Ok(())
    }

    fn get_message_count(&self) -> Result<usize> {
        let response = self.call(
            "GetQueueAttributes",
            json!({ "AttributeNames": ["ApproximateNumberOfMessages"] }),
        )?;
        let raw = response
            .pointer("/Attributes/ApproximateNumberOfMessages")
            .and_then(Value::as_str)
            .unwrap_or("0");
        raw.parse().map_err(|_| {
            BackplaneError::Queue(format!("Invalid ApproximateNumberOfMessages: {}", raw))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_queue_origin() {
        let queue = SqsQueue::new(
            "https://sqs.eu-west-1.amazonaws.com/123456789012/jobs",
            AwsConfig::default(),
        )
        .unwrap();
        assert_eq!(queue.endpoint, "https://sqs.eu-west-1.amazonaws.com/");
    }

    #[test]
    fn test_invalid_queue_url() {
        let err = SqsQueue::new("not a url", AwsConfig::default()).unwrap_err();
        assert!(matches!(err, BackplaneError::Config(_)));
    }
}
