use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use log::{error, info};

use mergr::MergrError;
use mergr::cli::Cli;
use mergr::{descriptor, orchestrator, report};

fn setup_logging(level: log::LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.log_level);

    fs::create_dir_all(&cli.logs_dir).context("Failed to create logs-dir")?;
    fs::create_dir_all(&cli.repos_dir).context("Failed to create repos-dir")?;

    let config = Arc::new(cli.run_config());

    // Fail fast on any configuration problem, reporting all violations at
    // once; no task starts when the input is bad.
    let mut violations = config.validate();
    let descriptors = match descriptor::build_descriptors(&cli.repos_data, &config) {
        Ok(descriptors) => descriptors,
        Err(MergrError::Config(errors)) => {
            violations.extend(errors);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    if !violations.is_empty() {
        for violation in &violations {
            error!("{}", violation);
        }
        return Ok(ExitCode::from(1));
    }

    info!(
        "Merging {} repos with up to {} concurrent tasks",
        descriptors.len(),
        config.jobs
    );

    let summary = orchestrator::execute_all(descriptors, &config).await;

    println!("{}", report::text_table(&summary.descriptors));
    println!("{}", report::summary_line(&summary.descriptors));

    let report_path = config.logs_dir.join("report.html");
    fs::write(&report_path, report::html_table(&summary.descriptors))
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    info!("Report written to {}", report_path.display());

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
