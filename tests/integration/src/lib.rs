//! Integration test utilities for the realtime trigger
//!
//! This crate provides a scripted realtime client for driving the trigger
//! on a paused clock, plus helpers for the optional tests against Redis.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
