//! Upgrade orchestration.
//!
//! One run walks `Connecting → Uploading → Installing → Verifying` and ends
//! in a terminal [`Outcome`]. The session is closed on every exit path.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backup;
use crate::device::CommandSet;
use crate::error::{SwupError, UNKNOWN_VERSION};
use crate::output;
use crate::request::{UpgradeRequest, check_firmware};
use crate::transport::Transport;

/// Phase a run was in when it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Connecting,
    Preflight,
    Backup,
    Uploading,
    Installing,
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "Validating"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Preflight => write!(f, "Preflight"),
            Self::Backup => write!(f, "Backup"),
            Self::Uploading => write!(f, "Uploading"),
            Self::Installing => write!(f, "Installing"),
            Self::Verifying => write!(f, "Verifying"),
        }
    }
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum Outcome {
    Succeeded { version: String, attempts: u32 },
    AlreadyAtTarget { version: String },
    Failed { phase: Phase, error: SwupError },
}

impl Outcome {
    fn failed(phase: Phase, error: SwupError) -> Self {
        Self::Failed { phase, error }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Process exit code: 0 on success, the error class code otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Succeeded { .. } | Self::AlreadyAtTarget { .. } => 0,
            Self::Failed { error, .. } => error.exit_code(),
        }
    }
}

/// Result of a single verification attempt.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Matched(String),
    Mismatch(String),
    /// Device unreachable, query failed, or output had no version line.
    NoVersion,
}

/// Drives one [`UpgradeRequest`] against a [`Transport`].
#[derive(Debug, Default)]
pub struct UpgradeOrchestrator {
    show_progress: bool,
}

impl UpgradeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show spinners while waiting between attempts.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Execute the upgrade and report the terminal outcome.
    ///
    /// The transport must not be connected yet. It is closed before this
    /// returns whenever a session object was created.
    pub async fn run<T: Transport>(&self, request: &UpgradeRequest, transport: &mut T) -> Outcome {
        info!(
            hostname = request.hostname(),
            address = request.address(),
            model = request.model(),
            target_version = request.target_version(),
            "Starting firmware upgrade"
        );

        // The file may have vanished since the request was validated.
        if let Err(e) = check_firmware(request.firmware()) {
            return self.finish(request, Outcome::failed(Phase::Validating, e));
        }

        let outcome = self.drive(request, transport).await;

        if transport.has_session() {
            transport.close().await;
        }

        self.finish(request, outcome)
    }

    fn finish(&self, request: &UpgradeRequest, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Succeeded { version, attempts } => info!(
                hostname = request.hostname(),
                version = %version,
                attempts = attempts,
                "Upgrade successful"
            ),
            Outcome::AlreadyAtTarget { version } => info!(
                hostname = request.hostname(),
                version = %version,
                "Device already runs the target version"
            ),
            Outcome::Failed { phase, error } => error!(
                hostname = request.hostname(),
                phase = %phase,
                reason = error.reason(),
                error = %error,
                "Upgrade failed"
            ),
        }
        outcome
    }

    async fn drive<T: Transport>(&self, request: &UpgradeRequest, transport: &mut T) -> Outcome {
        let commands = CommandSet::for_model(request.model());
        debug!(family = commands.family, "Selected command set");

        // Connecting
        if let Err(e) = transport.connect().await {
            return Outcome::failed(Phase::Connecting, SwupError::Connection(e.to_string()));
        }
        info!(hostname = request.hostname(), "Connected");

        if request.check_current() {
            match self.preflight(commands, transport).await {
                Ok(Some(current)) if current == request.target_version() => {
                    return Outcome::AlreadyAtTarget { version: current };
                }
                Ok(_) => {}
                Err(e) => return Outcome::failed(Phase::Preflight, e),
            }
        }

        if let Some(dir) = request.backup_dir() {
            let result = match transport
                .execute_command(commands.running_config_command)
                .await
            {
                Ok(out) => backup::write_backup(dir, request.hostname(), &out.stdout),
                Err(e) => Err(SwupError::Backup(e.to_string())),
            };
            if let Err(e) = result {
                return Outcome::failed(Phase::Backup, e);
            }
        }

        // Uploading
        let remote_file = request.remote_file();
        match transport.upload_file(request.firmware(), &remote_file).await {
            Ok(bytes) => info!(remote_file = %remote_file, bytes = bytes, "Firmware transferred"),
            Err(e) => {
                return Outcome::failed(Phase::Uploading, SwupError::Transfer(e.to_string()));
            }
        }

        // Installing
        self.install(commands, &remote_file, transport).await;

        // Verifying
        self.verify(request, commands, transport).await
    }

    /// Query the running version before touching the device.
    ///
    /// A failed query may have taken the session down with it, so the
    /// session is replaced before the upgrade continues. Only a failed
    /// reconnect is an error.
    async fn preflight<T: Transport>(
        &self,
        commands: &CommandSet,
        transport: &mut T,
    ) -> Result<Option<String>, SwupError> {
        match transport.execute_command(commands.version_command).await {
            Ok(out) => {
                let version = commands.parse_version(&out.stdout);
                match version {
                    Some(ref v) => info!(current_version = %v, "Current version"),
                    None => warn!("Could not determine current version, continuing"),
                }
                Ok(version)
            }
            Err(e) => {
                warn!(error = %e, "Version query failed, reconnecting and continuing");
                transport.close().await;
                transport
                    .connect()
                    .await
                    .map_err(|e| SwupError::Connection(e.to_string()))?;
                Ok(None)
            }
        }
    }

    /// Issue the install command.
    ///
    /// Devices often reboot before acknowledging, so neither a non-zero exit
    /// status nor a dropped session is treated as a failure here. This is
    /// the only phase where a transport error is tolerated.
    async fn install<T: Transport>(&self, commands: &CommandSet, remote_file: &str, transport: &mut T) {
        let command = commands.install_command(remote_file);
        info!(command = %command, "Initiating firmware installation");

        match transport.execute_command(&command).await {
            Ok(out) if out.success() => {
                info!("Firmware installation initiated");
                debug!(output = %out.stdout.trim(), "Installation output");
            }
            Ok(out) => warn!(
                exit_status = out.exit_status,
                output = %out.stdout.trim(),
                "Install command returned non-zero status, verifying anyway"
            ),
            Err(e) => info!(
                error = %e,
                "Session dropped during install, expected while the device reboots"
            ),
        }

        // The device is going down; verification opens a fresh session.
        if transport.has_session() {
            transport.close().await;
        }
    }

    /// Poll the device for the target version.
    ///
    /// Exactly `retry_count` attempt slots, `retry_delay` apart. Every slot
    /// counts, including those where the device was unreachable.
    async fn verify<T: Transport>(
        &self,
        request: &UpgradeRequest,
        commands: &CommandSet,
        transport: &mut T,
    ) -> Outcome {
        let target = request.target_version();
        let total = request.retry_count();

        self.pause(
            request.reboot_wait(),
            format!("Waiting for {} to reboot", request.hostname()),
        )
        .await;

        let mut last_observed: Option<String> = None;

        for attempt in 1..=total {
            if attempt > 1 {
                self.pause(
                    request.retry_delay(),
                    format!("Retry {}/{} in {}s", attempt, total, request.retry_delay().as_secs()),
                )
                .await;
            }

            debug!(attempt = attempt, total = total, "Verification attempt");

            match self.verify_attempt(commands, target, transport).await {
                Verdict::Matched(version) => {
                    return Outcome::Succeeded {
                        version,
                        attempts: attempt,
                    };
                }
                Verdict::Mismatch(version) => {
                    warn!(
                        attempt = attempt,
                        total = total,
                        expected = target,
                        found = %version,
                        "Version mismatch"
                    );
                    last_observed = Some(version);
                }
                Verdict::NoVersion => {
                    warn!(attempt = attempt, total = total, "No version reported");
                }
            }
        }

        Outcome::failed(
            Phase::Verifying,
            SwupError::VerificationTimeout {
                attempts: total,
                last_observed: last_observed.unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            },
        )
    }

    async fn verify_attempt<T: Transport>(
        &self,
        commands: &CommandSet,
        target: &str,
        transport: &mut T,
    ) -> Verdict {
        if !transport.has_session()
            && let Err(e) = transport.connect().await
        {
            debug!(error = %e, "Device not reachable yet");
            if transport.has_session() {
                transport.close().await;
            }
            return Verdict::NoVersion;
        }

        let output = match transport.execute_command(commands.version_command).await {
            Ok(out) => out,
            Err(e) => {
                debug!(error = %e, "Version query failed, dropping session");
                transport.close().await;
                return Verdict::NoVersion;
            }
        };

        match commands.parse_version(&output.stdout) {
            Some(version) if version == target => Verdict::Matched(version),
            Some(version) => Verdict::Mismatch(version),
            None => Verdict::NoVersion,
        }
    }

    async fn pause(&self, delay: Duration, message: String) {
        if delay.is_zero() {
            return;
        }
        info!(seconds = delay.as_secs(), "{}", message);

        let spinner = self.show_progress.then(|| output::wait_spinner(message));
        tokio::time::sleep(delay).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
    }
}
