//! wait-cli library: the pieces behind the `wait-for-nodes` binary.
//!
//! Exposed as a library so integration tests can drive a launch check
//! without spawning the binary.

pub mod check;
pub mod config;
pub mod launcher;

pub use check::{CheckMode, Report, run_check};
pub use config::LaunchConfig;
pub use launcher::{Launched, ParticipantSpec, launch};
