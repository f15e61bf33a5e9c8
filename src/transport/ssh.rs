//! libssh2-backed transport.
//!
//! libssh2 is blocking, so every call runs on the tokio blocking pool with a
//! cloned handle to the shared session.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use ssh2::Session;
use tracing::{debug, warn};

use super::{CommandOutput, Transport};
use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::output;
use crate::request::UpgradeRequest;

/// File mode applied to uploaded firmware.
const UPLOAD_MODE: i32 = 0o644;

pub struct SshTransport {
    address: String,
    port: u16,
    credentials: Arc<Credentials>,
    timeout: Duration,
    show_progress: bool,
    session: Option<Session>,
}

impl SshTransport {
    pub fn new(address: &str, port: u16, credentials: Credentials, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            port,
            credentials: Arc::new(credentials),
            timeout,
            show_progress: false,
            session: None,
        }
    }

    /// Draw a progress bar during uploads.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Transport for the device described by `request`.
    pub fn for_request(request: &UpgradeRequest) -> Self {
        let creds = request.credentials();
        Self::new(
            request.address(),
            request.port(),
            Credentials::new(
                creds.username.clone(),
                SecretString::from(creds.password()),
            ),
            request.connect_timeout(),
        )
    }

    fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    fn live_session(&self) -> Result<Session, TransportError> {
        self.session.clone().ok_or(TransportError::NotConnected)
    }
}

/// Run a blocking libssh2 call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, TransportError>
where
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::Io(std::io::Error::other(e)))?
}

fn open_tcp(target: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let connect_err = |details: String| TransportError::Connect {
        address: target.to_string(),
        details,
    };

    let addrs = target
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect failed");
                last_err = Some(e);
            }
        }
    }

    Err(connect_err(
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "address did not resolve".to_string()),
    ))
}

impl Transport for SshTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let target = self.target();
        let timeout = self.timeout;
        debug!(target = %target, "Opening TCP connection");

        let stream = {
            let target = target.clone();
            blocking(move || open_tcp(&target, timeout)).await?
        };

        let mut session = Session::new().map_err(|e| TransportError::Connect {
            address: target.clone(),
            details: e.to_string(),
        })?;
        session.set_tcp_stream(stream);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));

        // From here on the session exists and must be closed by the caller.
        self.session = Some(session.clone());

        let credentials = Arc::clone(&self.credentials);
        blocking(move || {
            session.handshake().map_err(|e| TransportError::Connect {
                address: target,
                details: format!("SSH handshake failed: {}", e),
            })?;

            session
                .userauth_password(&credentials.username, credentials.password())
                .map_err(|e| TransportError::Auth {
                    username: credentials.username.clone(),
                    details: e.message().to_string(),
                })?;

            if !session.authenticated() {
                return Err(TransportError::Auth {
                    username: credentials.username.clone(),
                    details: "server rejected credentials".to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn upload_file(&mut self, local: &Path, remote: &str) -> Result<u64, TransportError> {
        let session = self.live_session()?;
        let local = local.to_path_buf();
        let remote = remote.to_string();
        let show_progress = self.show_progress;

        blocking(move || {
            let transfer_err = |details: String| TransportError::Transfer {
                path: remote.clone(),
                details,
            };

            let mut file = std::fs::File::open(&local)?;
            let size = file.metadata()?.len();

            let mut channel = session
                .scp_send(Path::new(&remote), UPLOAD_MODE, size, None)
                .map_err(|e| transfer_err(e.to_string()))?;

            let pb = output::transfer_progress(size, &remote, show_progress);
            let sent = std::io::copy(&mut file, &mut pb.wrap_write(&mut channel))
                .map_err(|e| transfer_err(e.to_string()))?;
            pb.finish_and_clear();

            let finish = |channel: &mut ssh2::Channel| -> Result<(), ssh2::Error> {
                channel.send_eof()?;
                channel.wait_eof()?;
                channel.close()?;
                channel.wait_close()
            };
            finish(&mut channel).map_err(|e| transfer_err(e.to_string()))?;

            if sent != size {
                return Err(transfer_err(format!(
                    "sent {} of {} bytes",
                    sent, size
                )));
            }
            Ok(sent)
        })
        .await
    }

    async fn execute_command(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let session = self.live_session()?;
        let command = command.to_string();

        blocking(move || {
            let command_err = |details: String| TransportError::Command {
                command: command.clone(),
                details,
            };

            let mut channel = session
                .channel_session()
                .map_err(|e| command_err(e.to_string()))?;
            channel
                .exec(&command)
                .map_err(|e| command_err(e.to_string()))?;

            let mut stdout = String::new();
            channel
                .read_to_string(&mut stdout)
                .map_err(|e| command_err(e.to_string()))?;
            channel
                .wait_close()
                .map_err(|e| command_err(e.to_string()))?;
            let exit_status = channel
                .exit_status()
                .map_err(|e| command_err(e.to_string()))?;

            Ok(CommandOutput {
                stdout,
                exit_status,
            })
        })
        .await
    }

    fn has_session(&self) -> bool {
        self.session.is_some()
    }

    async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let result = blocking(move || {
            session
                .disconnect(None, "swup done", None)
                .map_err(|e| TransportError::Io(std::io::Error::other(e)))
        })
        .await;

        if let Err(e) = result {
            warn!(error = %e, "SSH disconnect did not complete cleanly");
        }
    }
}
