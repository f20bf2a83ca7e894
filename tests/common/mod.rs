//! Common test utilities for cueplan CLI tests.
//!
//! This module provides:
//! - `TestEnv`: Isolated test environment with temp directories
//! - Assertion macros: `assert_written!`, `assert_output_contains!`, etc.
//! - Fixtures: Reusable input files

#![allow(dead_code, unused_imports)]

pub mod assertions;
pub mod env;
pub mod fixtures;

pub use assertions::*;
pub use env::*;
pub use fixtures::*;
