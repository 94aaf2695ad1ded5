//! Step definitions for kanban task workflow scenarios.

mod given;
mod when;
pub mod world;
