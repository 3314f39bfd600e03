use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sessionforge::config::Config;
use sessionforge::dataset::GeneratedLog;
use sessionforge::error::GenerationError;
use sessionforge::export::{self, RunManifest};
use sessionforge::pipeline::GenerationPipeline;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=debug for more detail)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("Session generator starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        users = config.generation.n_users,
        days = config.generation.n_days,
        sessions_per_day = config.generation.sessions_per_user_per_day,
        classes = config.classes.len(),
        fraud_models = config.fraud.models.len(),
        "Configuration loaded from {}",
        config_path
    );

    // All models are validated here, before any session is simulated
    let pipeline = Arc::new(GenerationPipeline::from_config(&config)?);
    tracing::info!(actions = pipeline.vocabulary.len(), "Transition models validated");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, stopping generation...");
                shutdown.cancel();
            }
        });
    }

    let result = if config.generation.workers > 1 {
        pipeline
            .generate_parallel(config.generation.workers, &shutdown)
            .await
    } else {
        let worker = pipeline.clone();
        let token = shutdown.clone();
        tokio::task::spawn_blocking(move || worker.generate(&token))
            .await
            .map_err(|e| eyre::eyre!("Generation task failed: {}", e))?
    };

    finish(&config, &pipeline, result)
}

fn finish(
    config: &Config,
    pipeline: &GenerationPipeline,
    result: Result<GeneratedLog, GenerationError>,
) -> eyre::Result<()> {
    let log = match result {
        Ok(log) => log,
        Err(GenerationError::Cancelled) => {
            tracing::warn!("Generation cancelled, no output written");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    export::write_log(&config.output.path, config.output.format, &log)?;

    if let Some(ref path) = config.output.vocabulary_path {
        export::write_vocabulary(path, &pipeline.vocabulary, &config.vocabulary.pad_token)?;
    }

    if let Some(ref path) = config.output.failures_path {
        export::write_failures(path, &log)?;
    }

    if let Some(ref path) = config.output.manifest_path {
        let manifest = RunManifest {
            generated_at: chrono::Utc::now(),
            seed: pipeline.seed(),
            n_users: pipeline.n_users(),
            n_days: config.generation.n_days,
            sessions_per_user_per_day: config.generation.sessions_per_user_per_day,
            classes: config.classes.iter().map(|c| c.name.clone()).collect(),
            fraud_models: config.fraud.models.iter().map(|m| m.name.clone()).collect(),
            summary: log.summary(),
        };
        export::write_manifest(path, &manifest)?;
    }

    tracing::info!(records = log.len(), "Session generator finished");
    Ok(())
}
