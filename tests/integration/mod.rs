//! Integration test suite for relay.
//!
//! These tests exercise the full path from plan documents to a persisted,
//! scheduled status file and through job lifecycle transitions.
//!
//! # Test Categories
//!
//! - `lifecycle`: end-to-end init, transitions, queries, completion
//! - `scheduling`: topological ordering across parsed plan files
//! - `recovery`: crash safety, backups, legacy upgrades
//!
//! All tests run against temporary directories and touch nothing outside
//! them.

mod fixtures;

mod lifecycle;
mod recovery;
