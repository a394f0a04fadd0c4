//! Config validation CLI tool
//!
//! Validates a hayaokid configuration file and prints the effective settings.

use hayaoki_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a hayaokid configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match hayaoki_config::load_config(&config_path) {
        Ok(settings) => {
            let attendance = &settings.attendance;
            let report = &settings.report;

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", hayaoki_config::CURRENT_CONFIG_VERSION);
            println!("  Local zone: UTC{}", attendance.zone);
            println!(
                "  Check-in window: {} - {}",
                attendance.check_in_window.start, attendance.check_in_window.end
            );
            println!("  Year roll time: {}", attendance.year_roll_time);
            println!("  Report channel: {}", report.channel);
            println!("  Name suffix: {:?}", report.name_suffix);
            match report.schedule {
                Some(at) => println!("  Report schedule: daily at {}", at),
                None => println!("  Report schedule: external trigger only"),
            }
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!(
                "  Storage timeout: {} ms",
                settings.service.storage_timeout.as_millis()
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                hayaoki_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                hayaoki_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                hayaoki_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                hayaoki_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        hayaoki_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
