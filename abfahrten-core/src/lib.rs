//! Core types and aggregation for the abfahrten departure board.

/// Merging of per-source departures into one ordered board.
pub mod aggregate;
/// Board configuration as plain data.
pub mod config;
/// Delay and cancellation policy.
pub mod delay;
/// Per-source exclusion rules.
pub mod filter;
/// Canonical departure model shared by all feeds.
pub mod model;
/// Label normalization shared by all feed adapters.
pub mod normalize;
/// Registry of backend providers.
pub mod plugin;
/// Traits describing feed adapters and fetch backends.
pub mod ports;
/// High-level service producing a board from configured sources.
pub mod service;

pub use aggregate::*;
pub use config::*;
pub use delay::*;
pub use filter::*;
pub use model::*;
pub use normalize::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
