//! Unit tests for the resilience controls.
