//! Terminal output: progress bars and the final summary.

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::orchestrator::Outcome;
use crate::request::UpgradeRequest;

/// Byte progress bar for the firmware upload. Hidden unless `visible`.
pub fn transfer_progress(total_bytes: u64, remote: &str, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(remote.to_string());
    pb
}

/// Spinner shown while waiting for the device between attempts.
pub fn wait_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_secs(1));
    pb
}

/// Print the plan before any remote contact.
pub fn print_plan(request: &UpgradeRequest) {
    println!();
    println!(
        "{}",
        format!(
            "Upgrade Plan: {} ({}) -> {}",
            request.hostname(),
            request.address(),
            request.target_version()
        )
        .bold()
    );
    println!("{}", "=".repeat(60));
    println!("  Model:        {}", request.model());
    println!("  Firmware:     {}", request.firmware().display());
    println!("  Remote file:  {}", request.remote_file());
    println!(
        "  Verification: {} attempts, {}s apart, after {}s reboot wait",
        request.retry_count(),
        request.retry_delay().as_secs(),
        request.reboot_wait().as_secs()
    );
    println!();
}

/// Print the terminal outcome.
pub fn print_outcome(hostname: &str, outcome: &Outcome) {
    println!("{}", "=".repeat(60));
    match outcome {
        Outcome::Succeeded { version, attempts } => {
            let attempt_word = if *attempts == 1 { "attempt" } else { "attempts" };
            println!(
                "{} {} is running {} (verified after {} {})",
                "✓".green(),
                hostname.bold(),
                version.green().bold(),
                attempts,
                attempt_word
            );
        }
        Outcome::AlreadyAtTarget { version } => {
            println!(
                "{} {} already runs {}. Nothing to upgrade.",
                "→".cyan(),
                hostname.bold(),
                version.green().bold()
            );
        }
        Outcome::Failed { phase, error } => {
            println!(
                "{} {} failed during {}: {}",
                "✗".red(),
                hostname.bold(),
                phase.to_string().yellow(),
                error.to_string().red()
            );
        }
    }
}
