//! Command handlers, one module per command group.

pub mod auth;
pub mod init;
pub mod invoke;
pub mod misc;
pub mod queue;
pub mod records;
