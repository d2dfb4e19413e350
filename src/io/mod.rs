//! Side-effecting collaborators: environment, filesystem, subprocess.

pub mod config;
pub mod executor;
pub mod process;
pub mod store;
