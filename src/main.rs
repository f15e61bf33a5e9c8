use clap::Parser;
use colored::Colorize;
use tracing::{debug, info, warn};

use swup::config::{Args, Config};
use swup::logging;
use swup::orchestrator::UpgradeOrchestrator;
use swup::output;
use swup::transport::{SshTransport, Transport};

/// Exit code used when the run is interrupted with Ctrl+C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = Config::from_args(args);

    if let Err(e) = logging::init(
        &config.log_format,
        &config.log_level,
        config.log_file.as_deref(),
        &config.hostname,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(
        version = swup::config::VERSION,
        commit = swup::config::COMMIT,
        build_date = swup::config::BUILD_DATE,
        "swup starting"
    );

    let code = run(&config).await;
    std::process::exit(code);
}

/// Main application logic. Returns the process exit code.
async fn run(config: &Config) -> i32 {
    let supplier = config.credential_supplier();
    let request = match config.build_request(supplier.as_ref()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return e.exit_code();
        }
    };
    debug!(request = ?request, "Resolved upgrade request");

    let pretty = !config.log_format.eq_ignore_ascii_case("json");
    if pretty {
        output::print_plan(&request);
    }

    let orchestrator = UpgradeOrchestrator::new().with_progress(pretty);
    let mut transport = SshTransport::for_request(&request).with_progress(pretty);

    let outcome = tokio::select! {
        outcome = orchestrator.run(&request, &mut transport) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(outcome) => {
            if pretty {
                output::print_outcome(request.hostname(), &outcome);
            }
            outcome.exit_code()
        }
        None => {
            warn!(hostname = request.hostname(), "Interrupted, closing session");
            if transport.has_session() {
                transport.close().await;
            }
            EXIT_INTERRUPTED
        }
    }
}
