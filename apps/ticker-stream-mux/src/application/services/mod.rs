//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SubscriptionRouter`: turns subscribe/unsubscribe calls into feed
//!   commands and demultiplexes price updates to handlers

mod router;

pub use router::SubscriptionRouter;
