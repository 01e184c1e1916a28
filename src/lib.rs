//! Lookout - streaming telemetry client for remote job-execution services
//!
//! This library provides the ingestion engine behind the `lookout` status-bar
//! client: a supervised event-stream pipeline for live job logs and metrics,
//! plus roster polling with stage-change diffing.

pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod roster;
pub mod stream;
