//! Offline data pipeline: import, process, save, split, sample.
//!
//! Needs no API key; every step is local.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::data::{DataProcessor, DatasetKind};
use crate::error::{DataError, Result};
use crate::text::{PreprocessResult, TextPreprocessor};

/// Characters of cleaned sample text shown in the log.
const LOG_PREVIEW_CHARS: usize = 50;

/// Per-dataset outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// What a data pipeline run did.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Raw files copied in from the source directory.
    pub imported: Vec<String>,
    pub datasets: Vec<DatasetSummary>,
    /// Every file written, in order.
    pub written: Vec<PathBuf>,
}

/// Run the whole offline pipeline against `config.data_dir`.
pub fn run_data_pipeline(config: &AppConfig, source_dir: Option<&Path>) -> Result<PipelineReport> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(%run_id, data_dir = %config.data_dir.display(), "Starting data pipeline");

    let processed_dir = config.processed_dir();
    fs::create_dir_all(&processed_dir).map_err(DataError::from)?;

    let mut processor = DataProcessor::new(&config.data_dir);
    let imported = match source_dir {
        Some(dir) => processor.import_raw_files(dir)?,
        None => Vec::new(),
    };

    processor.process_all_data()?;
    if processor.processed().is_empty() {
        warn!(data_dir = %config.data_dir.display(), "No raw datasets found");
    }

    let mut written = processor.save_processed_data(Some(&processed_dir))?;
    let splits = processor.prepare_training_data();
    written.extend(processor.save_training_data(&splits, Some(&processed_dir))?);

    let text = TextPreprocessor::new();
    let mut datasets = Vec::with_capacity(splits.len());
    for (kind, table) in processor.processed() {
        let (train, test) = &splits[kind];
        datasets.push(DatasetSummary {
            dataset: kind.key().to_string(),
            rows: table.len(),
            train_rows: train.len(),
            test_rows: test.len(),
        });

        let Some(sample) = table.get(0, kind.sample_column()) else {
            continue;
        };
        let result = text.preprocess_pipeline(sample, true);
        let preview: String = result.cleaned.chars().take(LOG_PREVIEW_CHARS).collect();
        info!(dataset = %kind, "Processed sample: {preview}...");

        let path = processed_dir.join(format!("sample_{}_processed.txt", kind.sample_stem()));
        fs::write(&path, render_sample(&result)).map_err(DataError::from)?;
        written.push(path);
    }

    let finished_at = Utc::now();
    info!(
        %run_id,
        datasets = datasets.len(),
        files = written.len(),
        elapsed_ms = (finished_at - started_at).num_milliseconds(),
        "Data pipeline complete"
    );

    Ok(PipelineReport {
        run_id,
        started_at,
        finished_at,
        imported,
        datasets,
        written,
    })
}

impl PipelineReport {
    /// Summary for one dataset, if it was processed.
    pub fn dataset(&self, kind: DatasetKind) -> Option<&DatasetSummary> {
        self.datasets.iter().find(|d| d.dataset == kind.key())
    }
}

fn render_sample(result: &PreprocessResult) -> String {
    let entities = result
        .entities
        .iter()
        .map(|e| format!("{} ({})", e.text, e.label))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Original: {}\nCleaned: {}\nTokens: {}\nEntities: {}\nSentiment: {} ({:.3})\n",
        result.original,
        result.cleaned,
        result.tokens.join(", "),
        entities,
        result.sentiment.label,
        result.sentiment.score,
    )
}
