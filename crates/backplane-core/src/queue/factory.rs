//! Queue backend construction.

use std::sync::Arc;

use super::azure::AzureQueue;
use super::local::LocalQueue;
use super::noop::NoopQueue;
use super::sqs::SqsQueue;
use super::traits::QueueClient;
use crate::aws::AwsConfig;
use crate::error::{BackplaneError, Result};

/// Backend-specific parameters for [`build_queue_client`].
#[derive(Debug, Clone, Default)]
pub struct QueueParams {
    pub aws: AwsConfig,
    /// SQS queue URL.
    pub queue_url: Option<String>,
    /// Azure storage connection string.
    pub connection_string: Option<String>,
    /// Azure queue name.
    pub queue_name: Option<String>,
}

fn required<'a>(value: &'a Option<String>, queue_type: &str, key: &str) -> Result<&'a str> {
    value.as_deref().filter(|v| !v.is_empty()).ok_or_else(|| {
        BackplaneError::Config(format!("queue_type '{}' requires {}", queue_type, key))
    })
}

/// Construct a fresh queue client of `queue_type` (`local | noop | sqs | azure`).
///
/// # Errors
///
/// Returns `BackplaneError::Config` for an unknown type or a missing parameter.
pub fn build_queue_client(queue_type: &str, params: &QueueParams) -> Result<Arc<dyn QueueClient>> {
    let client: Arc<dyn QueueClient> = match queue_type.trim().to_ascii_lowercase().as_str() {
        "local" => Arc::new(LocalQueue::new()),
        "noop" => Arc::new(NoopQueue),
        "sqs" => Arc::new(SqsQueue::new(
            required(&params.queue_url, "sqs", "queue_url")?,
            params.aws.clone(),
        )?),
        "azure" => Arc::new(AzureQueue::new(
            required(&params.connection_string, "azure", "connection_string")?,
            required(&params.queue_name, "azure", "queue_name")?,
        )?),
        other => {
            return Err(BackplaneError::Config(format!(
                "Invalid queue type: {}",
                other
            )))
        }
    };
    Ok(client)
}
