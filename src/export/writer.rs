use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::OutputFormat;
use crate::dataset::{GeneratedLog, LogSummary};
use crate::markov::ActionVocabulary;

const CSV_HEADER: [&str; 7] = [
    "user_id",
    "day",
    "session_index",
    "session_activity",
    "user_role",
    "potential_fraudster",
    "fraudulent_activity",
];

/// Run-level metadata written next to the dataset.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub n_users: u64,
    pub n_days: u32,
    pub sessions_per_user_per_day: u32,
    pub classes: Vec<String>,
    pub fraud_models: Vec<String>,
    pub summary: LogSummary,
}

fn create(path: &str) -> eyre::Result<BufWriter<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| eyre::eyre!("Failed to create directory for '{}': {}", path, e))?;
        }
    }
    let file =
        File::create(path).map_err(|e| eyre::eyre!("Failed to create '{}': {}", path, e))?;
    Ok(BufWriter::new(file))
}

/// Write the dataset in the configured format.
pub fn write_log(path: &str, format: OutputFormat, log: &GeneratedLog) -> eyre::Result<()> {
    let writer = create(path)?;
    match format {
        OutputFormat::Csv => write_csv_to(writer, log)?,
        OutputFormat::Jsonl => write_jsonl_to(writer, log)?,
    }
    tracing::info!(path, records = log.len(), "Session log written");
    Ok(())
}

/// CSV with the session tokens joined by single spaces.
pub fn write_csv_to<W: Write>(writer: W, log: &GeneratedLog) -> eyre::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for record in &log.records {
        csv.write_record([
            record.user_id.to_string(),
            record.day.to_string(),
            record.session_index.to_string(),
            record.session_activity.join(" "),
            record.user_role.clone(),
            record.potential_fraudster.to_string(),
            record.fraudulent_activity.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// One JSON object per line.
pub fn write_jsonl_to<W: Write>(mut writer: W, log: &GeneratedLog) -> eyre::Result<()> {
    for record in &log.records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Token → index mapping with the pad token at 0.
pub fn write_vocabulary(
    path: &str,
    vocabulary: &ActionVocabulary,
    pad_token: &str,
) -> eyre::Result<()> {
    let writer = create(path)?;
    write_vocabulary_to(writer, vocabulary, pad_token)?;
    tracing::info!(path, tokens = vocabulary.len() + 1, "Vocabulary written");
    Ok(())
}

pub fn write_vocabulary_to<W: Write>(
    mut writer: W,
    vocabulary: &ActionVocabulary,
    pad_token: &str,
) -> eyre::Result<()> {
    let index: BTreeMap<String, usize> = vocabulary.padded_index(pad_token).into_iter().collect();
    serde_json::to_writer_pretty(&mut writer, &index)?;
    writer.flush()?;
    Ok(())
}

pub fn write_manifest(path: &str, manifest: &RunManifest) -> eyre::Result<()> {
    let writer = create(path)?;
    write_manifest_to(writer, manifest)?;
    tracing::info!(path, "Run manifest written");
    Ok(())
}

pub fn write_manifest_to<W: Write>(mut writer: W, manifest: &RunManifest) -> eyre::Result<()> {
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer.flush()?;
    Ok(())
}

/// Failed slots as JSON Lines.
pub fn write_failures(path: &str, log: &GeneratedLog) -> eyre::Result<()> {
    let writer = create(path)?;
    write_failures_to(writer, log)?;
    tracing::info!(path, failures = log.failures.len(), "Session failures written");
    Ok(())
}

pub fn write_failures_to<W: Write>(mut writer: W, log: &GeneratedLog) -> eyre::Result<()> {
    for failure in &log.failures {
        serde_json::to_writer(&mut writer, failure)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
