//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the core domain types for ticker price streaming
//! with no I/O. Everything here is plain Rust plus the decimal and lock
//! primitives shared by the whole crate.

/// Price streaming types (prices, updates, dispatch outcomes).
pub mod streaming;

/// Subscription identifiers and the handler registry.
pub mod subscription;
