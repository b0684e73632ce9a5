//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the streaming transport.

/// Port interfaces for the transport (frame sink, command sender, dispatcher).
pub mod ports;

/// Application services for subscription routing.
pub mod services;
