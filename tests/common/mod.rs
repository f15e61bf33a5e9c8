//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use swup::credentials::Credentials;
use swup::error::TransportError;
use swup::request::UpgradeRequest;
use swup::transport::{CommandOutput, Transport};
use tempfile::TempDir;
use tokio::time::Instant;

pub const VERSION_COMMAND: &str = "show version";

/// Calls observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Upload { local: PathBuf, remote: String },
    Exec(String),
    Close,
}

/// How a `connect()` call behaves.
#[derive(Debug, Clone, Copy)]
pub enum ConnectStep {
    Ok,
    /// Fails before any session object exists (e.g. TCP refused).
    Refused,
    /// Session object created, then the handshake or auth fails.
    AuthFailed,
}

/// How the install command behaves.
#[derive(Debug, Clone, Copy)]
pub enum InstallStep {
    Ok,
    NonZero,
    SessionDropped,
}

pub struct MockTransport {
    pub calls: Vec<Call>,
    pub version_query_times: Vec<Instant>,
    connects: VecDeque<ConnectStep>,
    versions: VecDeque<Option<String>>,
    last_version: Option<String>,
    install: InstallStep,
    upload_fails: bool,
    running_config: String,
    session: bool,
}

impl MockTransport {
    /// Device reports these versions on successive queries; `None` is a
    /// failed query. The last entry repeats once the list runs out.
    pub fn with_versions(versions: &[Option<&str>]) -> Self {
        Self {
            calls: Vec::new(),
            version_query_times: Vec::new(),
            connects: VecDeque::new(),
            versions: versions.iter().map(|v| v.map(String::from)).collect(),
            last_version: None,
            install: InstallStep::Ok,
            upload_fails: false,
            running_config: "hostname sw-test\n!\nend\n".to_string(),
            session: false,
        }
    }

    pub fn always(version: &str) -> Self {
        Self::with_versions(&[Some(version)])
    }

    pub fn connects(mut self, steps: &[ConnectStep]) -> Self {
        self.connects = steps.iter().copied().collect();
        self
    }

    pub fn install(mut self, step: InstallStep) -> Self {
        self.install = step;
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.upload_fails = true;
        self
    }

    pub fn version_queries(&self) -> usize {
        self.version_query_times.len()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn executed(&self, prefix: &str) -> bool {
        self.calls
            .iter()
            .any(|c| matches!(c, Call::Exec(cmd) if cmd.starts_with(prefix)))
    }

    fn next_version(&mut self) -> Option<String> {
        if let Some(v) = self.versions.pop_front() {
            self.last_version = v;
        }
        self.last_version.clone()
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.calls.push(Call::Connect);
        match self.connects.pop_front().unwrap_or(ConnectStep::Ok) {
            ConnectStep::Ok => {
                self.session = true;
                Ok(())
            }
            ConnectStep::Refused => Err(TransportError::Connect {
                address: "192.0.2.1:22".to_string(),
                details: "connection refused".to_string(),
            }),
            ConnectStep::AuthFailed => {
                self.session = true;
                Err(TransportError::Auth {
                    username: "admin".to_string(),
                    details: "bad password".to_string(),
                })
            }
        }
    }

    async fn upload_file(&mut self, local: &Path, remote: &str) -> Result<u64, TransportError> {
        self.calls.push(Call::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        if !self.session {
            return Err(TransportError::NotConnected);
        }
        if self.upload_fails {
            return Err(TransportError::Transfer {
                path: remote.to_string(),
                details: "no space left on device".to_string(),
            });
        }
        Ok(std::fs::metadata(local)?.len())
    }

    async fn execute_command(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        self.calls.push(Call::Exec(command.to_string()));
        if !self.session {
            return Err(TransportError::NotConnected);
        }

        if command == VERSION_COMMAND {
            self.version_query_times.push(Instant::now());
            return match self.next_version() {
                Some(v) => Ok(CommandOutput {
                    stdout: format!("Switch Software, Version {}, RELEASE\nuptime is 1 minute\n", v),
                    exit_status: 0,
                }),
                None => Err(TransportError::Command {
                    command: command.to_string(),
                    details: "channel closed".to_string(),
                }),
            };
        }

        if command.starts_with("install") {
            return match self.install {
                InstallStep::Ok => Ok(CommandOutput {
                    stdout: "Installing...\n".to_string(),
                    exit_status: 0,
                }),
                InstallStep::NonZero => Ok(CommandOutput {
                    stdout: "% Device is rebooting\n".to_string(),
                    exit_status: 1,
                }),
                InstallStep::SessionDropped => Err(TransportError::Command {
                    command: command.to_string(),
                    details: "connection reset by peer".to_string(),
                }),
            };
        }

        Ok(CommandOutput {
            stdout: self.running_config.clone(),
            exit_status: 0,
        })
    }

    fn has_session(&self) -> bool {
        self.session
    }

    async fn close(&mut self) {
        self.calls.push(Call::Close);
        self.session = false;
    }
}

/// Temp directory holding a small firmware image.
pub struct Fixture {
    pub dir: TempDir,
    pub firmware: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let firmware = dir.path().join("switch-fw-2.1.bin");
        std::fs::write(&firmware, vec![0xA5u8; 4096]).expect("Failed to write firmware");
        Self { dir, firmware }
    }

    /// Request with no reboot wait so attempt timing is easy to assert.
    pub fn request(&self, target: &str, retry_count: u32, retry_delay_secs: u64) -> UpgradeRequest {
        UpgradeRequest::builder()
            .hostname("sw-test-01")
            .address("192.0.2.1")
            .credentials(Credentials::new("admin", SecretString::from("pw")))
            .model("generic")
            .firmware(&self.firmware)
            .target_version(target)
            .retry_count(retry_count)
            .retry_delay(Duration::from_secs(retry_delay_secs))
            .reboot_wait(Duration::ZERO)
            .build()
            .expect("Failed to build request")
    }
}
