use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use std::process::ExitCode;

mod chain;
mod cli;
mod config;
mod probe;
mod report;
mod truststore;
mod verify;

use crate::cli::Cli;
use crate::config::ProbeConfig;
use crate::probe::{Outcome, Target};

const EXIT_UNTRUSTED: u8 = 1;
const EXIT_UNRESOLVED: u8 = 2;
const EXIT_FAILURE: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose());

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            // Unanticipated failures keep the full error chain for debugging.
            eprintln!("error: {err:?}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = ProbeConfig::from_env();
    let target = Target::from_url(&cli.url)?;
    let anchors = truststore::build(&config)?;
    info!("trust store ready with {} anchor(s)", anchors.len());

    match probe::connect(&target, &anchors) {
        Outcome::Trusted(chain) => {
            report::print(&chain, false)?;
            report::print_trusted()?;
            Ok(ExitCode::SUCCESS)
        }
        Outcome::HostUnresolved { host } => {
            println!("Unable to find host {host}, check DNS, network, or VPN.");
            Ok(ExitCode::from(EXIT_UNRESOLVED))
        }
        Outcome::Untrusted { reason } => {
            report::print_untrusted(&reason)?;
            info!("attempting to capture the presented certificate chain for diagnostics");
            match probe::capture_chain(&target) {
                Some(chain) => {
                    debug!("captured {} certificate(s) from {}", chain.len(), target.host);
                    report::print(&chain, true)?;
                }
                None => println!("Could not capture the certificate chain from {}.", target.host),
            }
            Ok(ExitCode::from(EXIT_UNTRUSTED))
        }
        Outcome::Failed { message } => {
            println!("An error occurred: {message}");
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}
