//! Delivery worker service library.
//!
//! `main.rs` is a thin binary wrapper around these modules; integration
//! tests drive `worker::run` directly in-process instead of spawning the
//! compiled binary.

pub mod config;
pub mod delivery;
pub mod metrics;
pub mod worker;
