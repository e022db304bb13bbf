//! # PharmaGuard Core
//!
//! Shared, I/O-free logic for PharmaGuard: report models, the field
//! precedence adapter, the retry policy, degraded-response synthesis,
//! and the log store abstraction.
//!
//! This crate contains no HTTP, filesystem, or runtime dependencies.
//! Everything that touches the network or disk lives in the
//! `pharmaguard` crate.

pub mod degraded;
pub mod lenient;
pub mod models;
pub mod normalize;
pub mod retry;
pub mod store;
