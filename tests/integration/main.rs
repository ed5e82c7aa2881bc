//! Integration tests for tube-harvest
//!
//! Service tests use wiremock to stand in for the YouTube, translation and
//! webhook endpoints; batch tests drive the runner with in-process adapters.

mod batch_tests;
mod common;
mod service_tests;
mod session_tests;
