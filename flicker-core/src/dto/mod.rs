//! Data Transfer Objects
//!
//! Lightweight representations of control-plane payloads, kept separate from
//! the domain types they are converted into.

pub mod registration;
