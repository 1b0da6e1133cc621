//! sql-gate - a human approval gate between AI-proposed SQL and a live database.
//!
//! This library exposes the core modules for use by the CLI and integration
//! tests.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod persistence;
pub mod query;
pub mod service;
pub mod session;
