//! Service manager integration.
//!
//! Contains the service control interface and its systemd implementation.

#[cfg(test)]
pub(crate) mod fake;
mod systemctl;
mod traits;

pub use systemctl::Systemctl;
pub use traits::ServiceControl;
