mod backend;
mod cli;
mod config;
mod error;
mod orchestrator;
mod tracker;
mod ui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use backend::{BackendClient, JobBackend, JobId, ProcessedFile, Upload};
use cli::{Cli, Command};
use config::TrackerConfig;
use error::OrderflowError;
use orchestrator::JobOrchestrator;
use tracker::{Job, Outcome};
use ui::JobProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so they never interleave with the progress bar on stdout.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("orderflow=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(token) = cli.token {
        config.token = Some(token);
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }

    let client = BackendClient::new(&config.api_base_url, config.session(), config.timeouts())?;
    let orchestrator = JobOrchestrator::new(client, config.upload_policy());
    tracing::debug!(
        api = %orchestrator.backend().base_url(),
        authenticated = config.session().is_authenticated(),
        "Backend client ready"
    );

    match cli.command {
        Command::Upload { file, no_wait } => {
            let upload = Upload::from_path(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let job = match orchestrator.submit(&upload).await {
                Ok(job) => job,
                Err(e) => {
                    if e.is_unauthorized() {
                        eprintln!("Session token rejected. Log in again and pass the new token with --token.");
                    }
                    return Err(e.into());
                }
            };

            if no_wait {
                println!("Uploaded {} as job #{}; processing started.", upload.file_name, job.id);
                return Ok(ExitCode::SUCCESS);
            }
            track(&orchestrator, job, &config, cli.json).await
        }
        Command::Watch { id } => {
            let job = Job::new(JobId::new(id), None);
            track(&orchestrator, job, &config, cli.json).await
        }
        Command::Status { id } => {
            let status = orchestrator.backend().fetch_status(&JobId::new(&id)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", ui::status_line(&id, &status));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Download { id, output } => {
            let id = JobId::new(id);
            let client = orchestrator.backend();
            let file = client
                .processed_file(&id)
                .await?
                .ok_or_else(|| OrderflowError::NoProcessedFile(id.clone()))?;
            let bytes = client.download(&file.id).await?;

            let path = output.unwrap_or_else(|| download_target(&file));
            std::fs::write(&path, &bytes).map_err(OrderflowError::Io)?;
            println!("Saved {} ({} bytes)", path.display(), bytes.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Poll a submitted job to its end, rendering progress and the final outcome.
async fn track(
    orchestrator: &JobOrchestrator<BackendClient>,
    mut job: Job,
    config: &TrackerConfig,
    json: bool,
) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping the poll loop");
            on_ctrl_c.cancel();
        }
    });

    let mut progress = if json {
        JobProgress::hidden()
    } else {
        JobProgress::start(&job.label())
    };

    let report = orchestrator
        .run(&mut job, &config.poll_config(), &mut progress, &cancel)
        .await?;
    progress.complete(&report.outcome);

    if matches!(report.outcome, Outcome::Completed(_)) {
        match orchestrator.backend().processed_file(&job.id).await {
            Ok(Some(file)) => progress.processed_file(&file),
            Ok(None) => {
                tracing::warn!(job_id = %job.id, "Job processed but no processed file is listed yet")
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Processed file lookup failed")
            }
        }
    }

    if json {
        progress.print_report(&report);
    }
    Ok(ExitCode::from(exit_code(&report.outcome)))
}

fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Completed(_) => 0,
        Outcome::Failed(_) => 1,
        Outcome::TimedOut(_) => 2,
        Outcome::Cancelled(_) => 130,
    }
}

/// Local file name for a download: the backend's name stripped to its last
/// component, or a name derived from the chat file id.
fn download_target(file: &ProcessedFile) -> PathBuf {
    Path::new(&file.file_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("orders_{}.xlsx", file.chatfile)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(name: &str) -> ProcessedFile {
        ProcessedFile {
            id: JobId::new("2"),
            chatfile: JobId::new("7"),
            file_name: name.to_string(),
            total_messages: None,
            total_orders: None,
        }
    }

    #[test]
    fn download_target_strips_directories() {
        assert_eq!(
            download_target(&processed("../../etc/orders.xlsx")),
            PathBuf::from("orders.xlsx")
        );
        assert_eq!(download_target(&processed("")), PathBuf::from("orders_7.xlsx"));
    }

    #[test]
    fn exit_codes_distinguish_outcomes() {
        assert_eq!(exit_code(&Outcome::Failed("x".into())), 1);
        assert_eq!(exit_code(&Outcome::TimedOut(60)), 2);
        assert_eq!(exit_code(&Outcome::Cancelled(3)), 130);
    }
}
