//! Tests for the script interpreter
//!
//! Organized by feature area

mod helpers;
mod try_tests;
