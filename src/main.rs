// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod evaluation;
mod kubernetes;
mod output;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use cli::Args;
use config::Config;
use evaluation::{EvaluationOutcome, Evaluator};
use kubernetes::KubeFetcher;
use output::CheckReport;

/// Initialize logging with file output and optional stderr
///
/// Returns the guard of the background file writer; dropping it flushes
/// pending log lines.
fn init_logging(verbose: bool) -> Option<impl Sized> {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return None;
    }

    // File appender with size-based rotation:
    // - Max 10MB per file
    // - Keep up to 5 files (total max ~50MB)
    // - Also rotate daily
    let log_path = log_dir.join("kube-workload-check.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024); // 10MB

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = file_appender.get_non_blocking_appender();

    let filter = if verbose {
        "kube_workload_check=debug"
    } else {
        "kube_workload_check=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // File layer (always enabled)
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    // Stdout carries the check result, so diagnostics go to stderr
    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    Some(guard)
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (aws-lc-rs); a second install is harmless
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = Args::parse();
    let guard = init_logging(args.verbose);

    let mode = args.command.mode();
    let outcome = run(&args).await;
    let report = CheckReport::new(mode.check_name(), outcome);

    info!(
        check = %report.check,
        status = %report.status,
        evaluated = report.evaluated.len(),
        failed = report.failed.len(),
        "Check complete"
    );

    println!("{}", report.format(&args.output));

    drop(guard);
    std::process::exit(report.exit_code());
}

/// Load configuration, connect and run the check
async fn run(args: &Args) -> EvaluationOutcome {
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load configuration");
            return EvaluationOutcome::unknown(format!("Invalid configuration: {:#}", e));
        }
    };

    let evaluator = Evaluator::new(args.evaluation_config(&config));

    let fetcher = match KubeFetcher::connect(&args.connection).await {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!(error = %e, "Failed to connect to Kubernetes");
            return EvaluationOutcome::from_fetch_error(&e);
        }
    };

    evaluation::check(&fetcher, &evaluator, args.command.mode(), Utc::now()).await
}
