//! Scheduler layer for the runner
//!
//! Waits for the signal that ends a running runner: a matching completion
//! message or the approach of the invocation deadline.

pub mod poller;

pub use poller::{CompletionPoller, PollSettings};
