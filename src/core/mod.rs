//! Sync engine
//!
//! Data model, capability traits and the orchestration that moves records
//! from sources to sinks. Nothing in here knows about a concrete platform.

pub mod data;
pub mod filter;
pub mod orchestrator;
pub mod plan;
pub mod report;
pub mod scope;
pub mod traits;
