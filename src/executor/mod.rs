//! Command executor module.
//!
//! Handles safe subprocess spawning, execution timeouts, and elevated
//! filesystem operations.

mod output;
mod privileged;
mod subprocess;

pub use output::sanitize_output;
pub use privileged::{Ownership, PrivilegedFs};
pub use subprocess::{SubprocessBuilder, SubprocessResult};
