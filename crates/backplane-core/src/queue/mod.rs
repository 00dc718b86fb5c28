//! Queue abstraction for Backplane.
//!
//! `QueueClient` is a minimal send/receive/delete/count contract with four
//! backends (`local`, `noop`, `sqs`, `azure`). Handles are built by
//! [`build_queue_client`] and shared by logical name through a
//! [`QueueRegistry`] owned by the application.
//!
//! Delivery guarantees are the backend's: the local queue is strict FIFO
//! with no redelivery, SQS and Azure redeliver unacknowledged messages after
//! their visibility timeout.

pub mod azure;
pub mod factory;
pub mod listener;
pub mod local;
pub mod noop;
pub mod registry;
pub mod sqs;
pub mod traits;
pub mod types;

// Re-export public types
pub use azure::AzureQueue;
pub use factory::{build_queue_client, QueueParams};
pub use listener::{ListenerStats, QueueListener, DEFAULT_POLL_INTERVAL};
pub use local::LocalQueue;
pub use noop::NoopQueue;
pub use registry::QueueRegistry;
pub use sqs::SqsQueue;
pub use traits::QueueClient;
pub use types::{Envelope, Message, MessageKind};
