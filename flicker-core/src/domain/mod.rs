//! Core domain types
//!
//! These types describe a single runner invocation from request to teardown.
//! They are shared between the control-plane client and the runner binary.

pub mod invocation;
pub mod runner;
pub mod sensitive;
pub mod signal;
