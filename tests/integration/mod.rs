//! Integration tests for sql-gate.

pub mod approval_test;
pub mod cache_test;
pub mod persistence_test;
pub mod service_test;
pub mod visibility_test;
