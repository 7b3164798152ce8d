//! Shared fixtures for the validation integration tests

#![allow(dead_code)]

pub mod memory_sink;
pub mod simulated_pipeline;
