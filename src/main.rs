//! Lumo Deploy - installs or upgrades the Lumo agent binary and its systemd unit.

use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lumo_deploy::config::{Settings, DEFAULT_CONFIG_PATH};
use lumo_deploy::deploy::Orchestrator;
use lumo_deploy::error::DeployError;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    // An explicit config must exist; the default one is optional.
    let loaded = get_config_path(&args).and_then(|path| match path {
        Some(path) => Settings::load(&path).map(|s| (s, path)),
        None => Settings::load_or_default(DEFAULT_CONFIG_PATH)
            .map(|s| (s, DEFAULT_CONFIG_PATH.to_string())),
    });
    let (settings, config_path) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration: {}", config_path);
    info!(
        "Deploying '{}' from {}",
        settings.service.name, settings.artifact.url
    );

    let service = settings.service.name.clone();
    let orchestrator = match Orchestrator::from_settings(settings) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "Failed to initialize deployment");
            eprintln!("deployment failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = orchestrator.run_report();

    println!("{}", report.summary());
    if report.needs_log_inspection() {
        eprintln!("Inspect the service logs with: journalctl -u {}", service);
    }

    ExitCode::from(report.exit_code())
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Install or upgrade the Lumo agent as a systemd service, rolling back
automatically when an upgraded binary fails to start.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}, built-in defaults if absent]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Get the configuration file path given on the command line, if any.
fn get_config_path(args: &[String]) -> Result<Option<String>, DeployError> {
    let missing = |flag: &str| DeployError::Config {
        message: format!("{} requires a path", flag),
    };

    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" || arg == "-c" {
            return match args.get(i + 1) {
                Some(path) if !path.is_empty() && !path.starts_with('-') => Ok(Some(path.clone())),
                _ => Err(missing(arg.as_str())),
            };
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            if path.is_empty() {
                return Err(missing("--config"));
            }
            return Ok(Some(path.to_string()));
        }
    }
    Ok(None)
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    // Logs go to stderr; stdout carries only the final status line.
    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
