//! Fetcharr - Automated series download service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod history;
pub mod item;
pub mod metadata;
pub mod monitor;
pub mod naming;
pub mod persist;
pub mod queue;
pub mod scheduler;
pub mod service;
