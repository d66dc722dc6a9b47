//! Connection probe.
//!
//! # Responsibility
//! - Print the core version.
//! - Given a JSON connection config, print its DSN and try to open a handle
//!   for every operation role.
//!
//! Set `MODELLAYER_LOG_DIR` (absolute) to also write the core's log file.

use log::info;
use modellayer_core::{ConnectionRouter, DbConfig, Role};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("modellayer_core version={}", modellayer_core::core_version());

    if let Ok(dir) = std::env::var("MODELLAYER_LOG_DIR") {
        let settings =
            modellayer_core::LogSettings::new(modellayer_core::default_log_level(), dir);
        if let Err(err) = modellayer_core::init_logging(&settings) {
            eprintln!("logging disabled: {err}");
        }
    }

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let config = match DbConfig::from_file(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cannot load `{path}`: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("dsn={}", config.dsn());

    let router = match ConnectionRouter::new(config) {
        Ok(router) => router,
        Err(err) => {
            eprintln!("invalid config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut failures = 0;
    for role in Role::ALL {
        match router.acquire(role) {
            Ok(handle) => println!("role={role} status=ok handle={}", handle.id()),
            Err(err) => {
                failures += 1;
                println!("role={role} status=error error={err}");
            }
        }
    }
    info!(
        "event=cli_probe module=cli status={} failures={}",
        if failures == 0 { "ok" } else { "error" },
        failures
    );

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
