// src/main.rs

mod analyzer;
mod cli;
mod error;
mod model;
mod naming;
mod orchestrator;
mod store;
mod telemetry;
mod vcs;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use orchestrator::{Orchestrator, RunSummary};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, Level};

fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.json, if args.verbose { Level::DEBUG } else { Level::INFO });
    let start_time = Instant::now();

    let code = match run(args) {
        Ok(summary) => {
            let failed = summary.failures().count();
            println!(
                "Processed {} report(s), {} failed.",
                summary.outcomes.len(),
                failed
            );
            for outcome in summary.failures() {
                if let Err(e) = &outcome.result {
                    eprintln!("  {} ({}): {}", outcome.identifier, outcome.reference, e);
                }
            }
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!("{:#}", e);
            let usage = e
                .downcast_ref::<error::Error>()
                .is_some_and(error::Error::is_usage);
            ExitCode::from(if usage { 2 } else { 1 })
        }
    };

    println!("Total time: {:.2?}", start_time.elapsed());
    code
}

fn run(args: Args) -> anyhow::Result<RunSummary> {
    let base = std::env::current_dir().context("cannot determine current directory")?;
    let config = args.into_config(&base)?;

    let scm = vcs::GitClient;
    let analyzer = analyzer::ToolAnalyzer::new(&config.tool, config.format);
    let summary = Orchestrator::new(&config, &scm, &analyzer).run()?;
    Ok(summary)
}
