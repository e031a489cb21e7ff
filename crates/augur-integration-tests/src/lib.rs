//! Integration test crate for Augur.
//!
//! This crate has no library code. It only contains integration tests
//! that drive tasks end to end across the parameter store, collateral
//! pool, task engine, codec and database crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p augur-integration-tests
//! ```
