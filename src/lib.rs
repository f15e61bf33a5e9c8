//! swup - network switch firmware upgrade over SSH/SCP.
//!
//! Pushes a firmware image to a switch, triggers the installation and polls
//! until the switch reports the target version:
//! - SCP upload with progress
//! - Model-specific install and version commands
//! - Bounded, delayed verification after reboot
//! - Optional running-config backup and current-version check

pub mod backup;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod request;
pub mod transport;
