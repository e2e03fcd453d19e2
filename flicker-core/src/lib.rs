//! Flicker Core
//!
//! Core types for the Flicker ephemeral runner.
//!
//! This crate contains:
//! - Domain types: invocation requests, runner identity and state, queue signals
//! - DTOs: wire representations of control-plane responses

pub mod domain;
pub mod dto;
