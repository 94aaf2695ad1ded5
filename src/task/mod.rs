//! Kanban task workflow.
//!
//! Tasks move across the board columns `backlog`, `todo`, `developing`,
//! `review` and `complete` under a fixed transition table. Writes are
//! re-read-before-write and run through the resilience layer, so transient
//! storage failures are retried and concurrent writers to one task settle
//! on exactly one of their targets. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
