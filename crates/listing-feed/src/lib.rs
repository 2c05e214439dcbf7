//! Property feed export engine.
//!
//! Turns a snapshot of the internal property catalog into the marketplace XML
//! feed, publishes it under a predictable public path and coordinates manual
//! and catalog-driven regeneration.

pub mod config;
pub mod error;
pub mod feed;
pub mod telemetry;
