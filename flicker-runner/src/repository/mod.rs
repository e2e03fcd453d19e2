//! Repository layer
//!
//! Repositories are thin adapters over the external systems the runner
//! talks to: the control-plane API and the completion queue. They hold no
//! lifecycle logic.
//!
//! All repositories are trait-based so the lifecycle can be tested with fakes.

mod queue;
mod tokens;

// Re-export traits
pub use queue::{CompletionQueue, QueueError, ReceiveOptions};
pub use tokens::TokenRepository;

// Re-export implementations
pub use queue::SqsCompletionQueue;
pub use tokens::HttpTokenRepository;
