//! Validated, immutable description of one upgrade run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{Result, SwupError};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_REMOTE_PATH: &str = "/flash/";
pub const DEFAULT_RETRY_COUNT: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_REBOOT_WAIT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Everything the orchestrator needs for one device.
///
/// Only [`UpgradeRequestBuilder::build`] creates values of this type, so a
/// request in hand always satisfies its invariants.
#[derive(Debug)]
pub struct UpgradeRequest {
    hostname: String,
    address: String,
    port: u16,
    credentials: Credentials,
    model: String,
    firmware: PathBuf,
    remote_path: String,
    target_version: String,
    retry_count: u32,
    retry_delay: Duration,
    reboot_wait: Duration,
    connect_timeout: Duration,
    check_current: bool,
    backup_dir: Option<PathBuf>,
}

impl UpgradeRequest {
    pub fn builder() -> UpgradeRequestBuilder {
        UpgradeRequestBuilder::default()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn firmware(&self) -> &Path {
        &self.firmware
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn reboot_wait(&self) -> Duration {
        self.reboot_wait
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn check_current(&self) -> bool {
        self.check_current
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.backup_dir.as_deref()
    }

    /// Full remote path of the uploaded firmware.
    pub fn remote_file(&self) -> String {
        let name = self
            .firmware
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        join_remote(&self.remote_path, &name)
    }
}

/// Join a remote directory and a file name.
///
/// Directories ending in `/` or `:` (as in `flash:`) are used as-is.
fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') || dir.ends_with(':') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Check that the firmware is an existing, non-empty regular file.
///
/// Returns its size in bytes.
pub fn check_firmware(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path).map_err(|e| {
        SwupError::Validation(format!("firmware file {}: {}", path.display(), e))
    })?;

    if !meta.is_file() {
        return Err(SwupError::Validation(format!(
            "firmware path {} is not a regular file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(SwupError::Validation(format!(
            "firmware file {} is empty",
            path.display()
        )));
    }

    Ok(meta.len())
}

/// Builder for [`UpgradeRequest`].
#[derive(Debug)]
pub struct UpgradeRequestBuilder {
    hostname: String,
    address: String,
    port: u16,
    credentials: Option<Credentials>,
    model: String,
    firmware: PathBuf,
    remote_path: String,
    target_version: String,
    retry_count: u32,
    retry_delay: Duration,
    reboot_wait: Duration,
    connect_timeout: Duration,
    check_current: bool,
    backup_dir: Option<PathBuf>,
}

impl Default for UpgradeRequestBuilder {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            address: String::new(),
            port: DEFAULT_PORT,
            credentials: None,
            model: String::new(),
            firmware: PathBuf::new(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            target_version: String::new(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            reboot_wait: Duration::from_secs(DEFAULT_REBOOT_WAIT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            check_current: false,
            backup_dir: None,
        }
    }
}

impl UpgradeRequestBuilder {
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn firmware(mut self, firmware: impl Into<PathBuf>) -> Self {
        self.firmware = firmware.into();
        self
    }

    pub fn remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = remote_path.into();
        self
    }

    pub fn target_version(mut self, target_version: impl Into<String>) -> Self {
        self.target_version = target_version.into();
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn reboot_wait(mut self, reboot_wait: Duration) -> Self {
        self.reboot_wait = reboot_wait;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn check_current(mut self, check_current: bool) -> Self {
        self.check_current = check_current;
        self
    }

    pub fn backup_dir(mut self, backup_dir: Option<PathBuf>) -> Self {
        self.backup_dir = backup_dir;
        self
    }

    /// Validate and freeze the request.
    ///
    /// Touches only the local filesystem, never the network.
    pub fn build(self) -> Result<UpgradeRequest> {
        require_non_empty("hostname", &self.hostname)?;
        require_non_empty("ip", &self.address)?;
        require_non_empty("model", &self.model)?;
        require_non_empty("target-version", &self.target_version)?;
        // Compared verbatim against what the device reports.
        if self.target_version.trim() != self.target_version {
            return Err(SwupError::Validation(format!(
                "--target-version {:?} has leading or trailing whitespace",
                self.target_version
            )));
        }

        let credentials = self
            .credentials
            .ok_or_else(|| SwupError::Validation("credentials are required".to_string()))?;
        require_non_empty("username", &credentials.username)?;

        if self.retry_count == 0 {
            return Err(SwupError::Validation(
                "retry-count must be at least 1".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(SwupError::Validation("port must not be 0".to_string()));
        }

        check_firmware(&self.firmware)?;

        if let Some(ref dir) = self.backup_dir
            && !dir.is_dir()
        {
            return Err(SwupError::Validation(format!(
                "backup directory {} does not exist",
                dir.display()
            )));
        }

        Ok(UpgradeRequest {
            hostname: self.hostname.trim().to_string(),
            address: self.address.trim().to_string(),
            port: self.port,
            credentials,
            model: self.model.trim().to_string(),
            firmware: self.firmware,
            remote_path: self.remote_path,
            target_version: self.target_version,
            retry_count: self.retry_count,
            retry_delay: self.retry_delay,
            reboot_wait: self.reboot_wait,
            connect_timeout: self.connect_timeout,
            check_current: self.check_current,
            backup_dir: self.backup_dir,
        })
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SwupError::Validation(format!("--{} must not be empty", field)));
    }
    Ok(())
}
