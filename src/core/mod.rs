//! Deterministic, pure decision logic.
//!
//! Core modules are free of I/O: they operate on name listings and clock
//! values passed in by the orchestration layer and return plans for it to
//! execute, which keeps every retention decision testable in isolation.

pub mod chains;
pub mod planner;
pub mod types;
