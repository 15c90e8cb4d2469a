//! Unit tests for the restful client
//!
//! This module contains tests that exercise several components together.

pub mod config_tests;
pub mod http_tests;
