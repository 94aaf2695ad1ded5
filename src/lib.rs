//! Taskflow: a resilient kanban workflow engine.
//!
//! This crate validates and applies status changes to kanban tasks, keeps
//! concurrent writers from clobbering each other, and retries transient
//! storage failures behind per-operation circuit breakers.
//!
//! # Architecture
//!
//! Taskflow follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: Concrete implementations of ports (in-memory storage)
//!
//! # Modules
//!
//! - [`task`]: Task model, transition policy and mutation services
//! - [`resilience`]: Retry, circuit breaking and cancellation
//! - [`config`]: Resilience configuration loading

pub mod config;
pub mod resilience;
pub mod task;
