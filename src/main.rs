use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

use pims_sync::utils::conf_helper::load_job_config;
use pims_sync::{BatchOrchestrator, EnvCredentials, Outcome, ReqwestTransport};

const DEFAULT_JOB_FILE: &str = "pims.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let job_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_JOB_FILE));

    let job = load_job_config(&job_path)
        .await
        .with_context(|| format!("loading job {}", job_path.display()))?;

    let level: Level = job
        .log_level
        .parse()
        .with_context(|| format!("invalid log_level {:?}", job.log_level))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Job loaded from {}: {} tag(s) on {}",
        job_path.display(),
        job.tags.len(),
        job.client.server
    );

    let transport = Arc::new(ReqwestTransport::new(job.client.timeout())?);
    let orchestrator = BatchOrchestrator::new(transport, &job.client)?;
    let provider = EnvCredentials::new(
        &job.credentials.username_var,
        &job.credentials.password_var,
    );

    info!(
        "Extracting {} tag(s) from {} [{} .. {}]",
        job.tags.len(),
        job.client.server,
        job.window.start,
        job.window.stop
    );

    let results = orchestrator
        .fetch_many_tag_histories(&job.tags, &job.client.data_source, &job.window, &provider)
        .await?;

    for result in &results {
        match &result.report.outcome {
            Outcome::PartialDueToError(e) => warn!(
                "{}: partial, {} samples kept ({})",
                result.tag,
                result.report.series.len(),
                e
            ),
            outcome => info!(
                "{}: {:?}, {} samples",
                result.tag,
                outcome,
                result.report.series.len()
            ),
        }
    }

    let json = serde_json::to_string_pretty(&results)?;
    match &job.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
