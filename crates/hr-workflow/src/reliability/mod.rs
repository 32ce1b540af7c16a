//! Reliability patterns for engine callers
//!
//! - [`RetryPolicy`]: bounded, jittered retry of concurrent-modification conflicts

mod retry;

pub use retry::RetryPolicy;
