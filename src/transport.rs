//! Remote session abstraction used by the orchestrator.

pub mod ssh;

use std::future::Future;
use std::path::Path;

use crate::error::TransportError;

pub use ssh::SshTransport;

/// Output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Remote session and file transfer primitives for one device.
pub trait Transport: Send {
    /// Open the session and authenticate.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Copy a local file to the given remote path. Returns bytes sent.
    fn upload_file(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> impl Future<Output = Result<u64, TransportError>> + Send;

    /// Run one command and collect its stdout.
    fn execute_command(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<CommandOutput, TransportError>> + Send;

    /// True once a session object exists, even if it never finished the
    /// handshake.
    fn has_session(&self) -> bool;

    /// Tear the session down. Never fails; errors are only logged.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
