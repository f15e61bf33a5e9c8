//! CLI configuration and argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;

use crate::credentials::{self, CredentialSupplier, PromptSecret, ProvidedSecret};
use crate::error::Result;
use crate::request::{self, UpgradeRequest};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Network switch firmware upgrade tool.
///
/// Copies a firmware image to the switch over SCP, starts the installation,
/// and polls until the switch reports the target version.
#[derive(Parser, Clone)]
#[command(name = "swup")]
#[command(about = "Network switch firmware upgrade CLI over SSH/SCP")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Switch hostname (used in logs and backup file names)
    #[arg(long)]
    pub hostname: String,

    /// Switch IP address or DNS name
    #[arg(long)]
    pub ip: String,

    /// SSH port
    #[arg(long, default_value_t = request::DEFAULT_PORT)]
    pub port: u16,

    /// SSH username
    #[arg(short, long)]
    pub username: String,

    /// SSH password (prompted without echo if not provided)
    #[arg(long, env = "SWUP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Switch model (selects command templates, e.g. C9300-48P, EX4300)
    #[arg(short, long)]
    pub model: String,

    /// Path to the firmware image
    #[arg(short, long)]
    pub firmware: PathBuf,

    /// Firmware version the switch must report after the upgrade
    #[arg(short, long)]
    pub target_version: String,

    /// Remote directory to store the firmware
    #[arg(long, default_value = request::DEFAULT_REMOTE_PATH)]
    pub remote_path: String,

    /// Max verification attempts
    #[arg(long, default_value_t = request::DEFAULT_RETRY_COUNT,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_count: u32,

    /// Seconds between verification attempts
    #[arg(long, default_value_t = request::DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// Seconds to wait for the reboot before the first verification attempt
    #[arg(long, default_value_t = request::DEFAULT_REBOOT_WAIT_SECS)]
    pub reboot_wait: u64,

    /// SSH connect and command timeout in seconds
    #[arg(long, default_value_t = request::DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Skip the upgrade if the switch already runs the target version
    #[arg(long, default_value = "false")]
    pub check_current: bool,

    /// Save the running configuration into this directory before uploading
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SWUP_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: pretty or json
    #[arg(long, default_value = "pretty", env = "SWUP_LOG_FORMAT")]
    pub log_format: String,

    /// Also append logs to this file (a directory gets swup_<host>_<timestamp>.log)
    #[arg(long, value_name = "PATH", env = "SWUP_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Application configuration derived from CLI args.
#[derive(Debug)]
pub struct Config {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
    pub model: String,
    pub firmware: PathBuf,
    pub target_version: String,
    pub remote_path: String,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub reboot_wait: Duration,
    pub connect_timeout: Duration,
    pub check_current: bool,
    pub backup_dir: Option<PathBuf>,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Create config from CLI arguments.
    pub fn from_args(args: Args) -> Self {
        Self {
            hostname: args.hostname,
            ip: args.ip,
            port: args.port,
            username: args.username,
            password: args
                .password
                .filter(|p| !p.is_empty())
                .map(SecretString::from),
            model: args.model,
            firmware: args.firmware,
            target_version: args.target_version,
            remote_path: args.remote_path,
            retry_count: args.retry_count,
            retry_delay: Duration::from_secs(args.retry_delay),
            reboot_wait: Duration::from_secs(args.reboot_wait),
            connect_timeout: Duration::from_secs(args.connect_timeout),
            check_current: args.check_current,
            backup_dir: args.backup_dir,
            log_level: args.log_level,
            log_format: args.log_format,
            log_file: args.log_file,
        }
    }

    /// Where the SSH secret comes from.
    pub fn credential_supplier(&self) -> Box<dyn CredentialSupplier> {
        match self.password {
            Some(ref secret) => Box::new(ProvidedSecret::new(secret.clone())),
            None => Box::new(PromptSecret),
        }
    }

    /// Validate the configuration and resolve the secret.
    ///
    /// The firmware file is checked before the supplier runs so a bad path
    /// fails without prompting.
    pub fn build_request(&self, supplier: &dyn CredentialSupplier) -> Result<UpgradeRequest> {
        request::check_firmware(&self.firmware)?;

        let credentials = credentials::resolve(supplier, &self.username, &self.ip)?;

        UpgradeRequest::builder()
            .hostname(&self.hostname)
            .address(&self.ip)
            .port(self.port)
            .credentials(credentials)
            .model(&self.model)
            .firmware(&self.firmware)
            .remote_path(&self.remote_path)
            .target_version(&self.target_version)
            .retry_count(self.retry_count)
            .retry_delay(self.retry_delay)
            .reboot_wait(self.reboot_wait)
            .connect_timeout(self.connect_timeout)
            .check_current(self.check_current)
            .backup_dir(self.backup_dir.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwupError;
    use std::cell::Cell;

    const REQUIRED: &[&str] = &[
        "swup",
        "--hostname",
        "sw-core-01",
        "--ip",
        "10.0.0.1",
        "--username",
        "admin",
        "--model",
        "C9300-48P",
        "--firmware",
        "fw.bin",
        "--target-version",
        "17.9.4",
    ];

    fn parse(extra: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(REQUIRED.iter().chain(extra.iter()))
    }

    struct CountingSupplier(Cell<u32>);

    impl CredentialSupplier for CountingSupplier {
        fn secret(&self, _username: &str, _address: &str) -> Result<SecretString> {
            self.0.set(self.0.get() + 1);
            Ok(SecretString::from("pw"))
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(parse(&[]).unwrap());
        assert_eq!(config.remote_path, "/flash/");
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(60));
        assert_eq!(config.port, 22);
        assert!(config.password.is_none());
        assert!(!config.check_current);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_log_file_flag() {
        let config = Config::from_args(parse(&["--log-file", "/var/log/swup"]).unwrap());
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/swup")));
    }

    #[test]
    fn test_provided_password_reaches_supplier() {
        let config = Config::from_args(parse(&["--password", "hunter2"]).unwrap());
        let secret = config
            .credential_supplier()
            .secret("admin", "10.0.0.1")
            .unwrap();
        assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "hunter2");
    }

    #[test]
    fn test_missing_required_flag() {
        let err = Args::try_parse_from(["swup", "--hostname", "sw1"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_retry_count_zero_rejected() {
        assert!(parse(&["--retry-count", "0"]).is_err());
        assert_eq!(parse(&["--retry-count", "3"]).unwrap().retry_count, 3);
    }

    #[test]
    fn test_empty_password_falls_back_to_prompt() {
        let config = Config::from_args(parse(&["--password", ""]).unwrap());
        assert!(config.password.is_none());
    }

    #[test]
    fn test_config_debug_hides_password() {
        let config = Config::from_args(parse(&["--password", "hunter2"]).unwrap());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_build_request_missing_firmware_skips_supplier() {
        let config = Config::from_args(parse(&[]).unwrap());
        let supplier = CountingSupplier(Cell::new(0));

        let err = config.build_request(&supplier).unwrap_err();
        assert!(matches!(err, SwupError::Validation(_)));
        assert_eq!(supplier.0.get(), 0);
    }

    #[test]
    fn test_build_request_resolves_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("fw.bin");
        std::fs::write(&fw, b"image").unwrap();

        let mut config = Config::from_args(parse(&[]).unwrap());
        config.firmware = fw;
        let supplier = CountingSupplier(Cell::new(0));

        let request = config.build_request(&supplier).unwrap();
        assert_eq!(supplier.0.get(), 1);
        assert_eq!(request.credentials().username, "admin");
        assert_eq!(request.target_version(), "17.9.4");
    }
}
