//! Rotating PostgreSQL base-backup chains: monthly fulls, daily
//! incrementals, and retention pruning over a single backup directory.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure decision logic (set naming, chain partitioning,
//!   the full-vs-incremental choice, retention classification). No I/O,
//!   fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (environment-backed
//!   configuration, the backup directory, subprocess execution,
//!   `pg_basebackup`).
//!
//! Orchestration modules ([`plan`], [`run`], [`prune`]) coordinate core
//! logic with I/O to implement the CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod prune;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
