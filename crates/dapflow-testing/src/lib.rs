//! Testing infrastructure for dapflow integration tests.
//!
//! This crate provides utilities for writing scenario tests without a real
//! debug adapter:
//! - `FakeHost`: scripted in-process host and adapter
//! - `FakeProgram`: line-by-line script of a debuggee
//! - `TestWorld`: temp directory holding debuggee source files
//! - `fixtures`: configurations with test-friendly timings
//! - `assertions`: checks on navigation results

pub mod assertions;
pub mod fixtures;
pub mod host;
pub mod program;
pub mod world;

pub use host::{FakeHost, FakeOptions};
pub use program::FakeProgram;
pub use world::TestWorld;
