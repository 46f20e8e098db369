mod core_cli;
mod core_log;

use crate::core_cli::{execute, Cli};
use anyhow::{bail, Result};
use clap::Parser;
use colored::*;
use log::{debug, error};
use rouilleftpc::config::{load_config, log_config, ClientConfig};
use rouilleftpc::constants::{DEFAULT_CONFIG_PATH, OPTION_AUTOSEEK};
use rouilleftpc::{FtpSession, SuppaEngine};
use std::io;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Cli::parse();

    core_log::logger::init_logger(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<()> {
    // An explicit --config must exist, the system-wide one is optional
    let mut config = if !args.config.is_empty() {
        load_config(&args.config)?.client
    } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(DEFAULT_CONFIG_PATH)?.client
    } else {
        debug!("No configuration file, using defaults");
        ClientConfig::default()
    };

    let start_dir = args.apply_to(&mut config)?;
    if config.host.is_empty() {
        bail!("No server given, use --host, --url or a configuration file");
    }
    if args.verbose {
        log_config(&config);
    }

    let mut session = FtpSession::with_engine(SuppaEngine::new(config.tls_accept_invalid_certs));
    session
        .connect(&config.host, config.tls, config.port, config.timeout_sec)?
        .login(&config.username, &config.password)?
        .passive(config.passive)?
        .set_option(OPTION_AUTOSEEK, config.autoseek)?;
    if let Some(dir) = &start_dir {
        session.change_directory(dir)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = execute(&mut session, &args.action, config.transfer_mode(), &mut out);

    if let Err(e) = session.close() {
        error!("{}", e);
    }
    outcome
}
