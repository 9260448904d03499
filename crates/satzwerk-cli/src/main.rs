// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Satzwerk: layout-preserving PDF translation.
//
// Entry point. Initialises logging, loads configuration, builds the shared
// services and translates each input file in turn.
//
// Exit codes: 0 when every document was written, 1 when a document, the
// JSON report or the service setup failed, 2 for invalid configuration or
// arguments.

mod args;
mod services;
mod summary;

use std::process::ExitCode;

use clap::Parser;
use satzwerk_core::config::{AppConfig, default_config_path};
use satzwerk_core::error::{Result, SatzwerkError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::Cli;
use services::AppServices;

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Satzwerk starting");

    let services = match setup(&cli) {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprint!("{}", summary::render_error("satzwerk", &e));
            return ExitCode::from(exit_code_for(&e));
        }
    };

    let mut failed = 0usize;
    let mut reports = Vec::with_capacity(cli.files.len());
    for file in &cli.files {
        match services.translate(file).await {
            Ok(report) => {
                if report.failed_runs() > 0 {
                    info!(document = %file.display(), failed = report.failed_runs(), "document written with untranslated runs");
                }
                print!("{}", summary::render_report(&report));
                reports.push(report);
            }
            Err(e) => {
                failed += 1;
                error!(document = %file.display(), error = %e, "document failed");
                eprint!("{}", summary::render_error(&file.display().to_string(), &e));
            }
        }
    }

    if let Some(path) = &cli.report
        && let Err(e) = summary::write_json(path, &reports)
    {
        failed += 1;
        error!(path = %path.display(), error = %e, "report not written");
        eprint!("{}", summary::render_error(&path.display().to_string(), &e));
    }

    info!(documents = cli.files.len(), failed, "Satzwerk finished");
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    }
}

fn setup(cli: &Cli) -> Result<AppServices> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;

    let task = cli.task(&config)?;
    AppServices::init(cli, &config, task)
}

fn exit_code_for(err: &SatzwerkError) -> u8 {
    match err {
        SatzwerkError::Configuration { .. } => EXIT_CONFIG,
        _ => EXIT_FAILED,
    }
}
