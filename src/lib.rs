//! Zero-downtime reload and lifecycle core for long-lived workers.
//!
//! A worker process serves many requests sequentially inside one OS process;
//! between requests, files on disk may change because a deploy happened.
//! This crate decides, without interrupting in-flight work, whether the
//! process keeps serving, hot-swaps configuration, rebinds a service
//! definition in place, or drains and restarts. Coordination with deploy
//! tooling happens through a single JSON signal file.

pub mod config;
pub mod detector;
pub mod error;
pub mod fs;
pub mod manager;
pub mod models;
pub mod rebind;
