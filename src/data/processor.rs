//! Dataset processor: raw CSVs in, cleaned tables and splits out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::data::{DatasetKind, Table};
use crate::error::DataError;

/// Fraction of each table that goes into the training split.
pub const TRAIN_RATIO: f64 = 0.8;

/// Loads the raw datasets from a data directory and keeps the processed
/// tables for saving and splitting.
pub struct DataProcessor {
    data_dir: PathBuf,
    processed: BTreeMap<DatasetKind, Table>,
}

impl DataProcessor {
    /// Processor over the raw CSVs in `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            processed: BTreeMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Tables produced by the last `process_all_data`.
    pub fn processed(&self) -> &BTreeMap<DatasetKind, Table> {
        &self.processed
    }

    /// Read `<data_dir>/<file_name>`.
    pub fn load_csv_data(&self, file_name: &str) -> Result<Table, DataError> {
        let path = self.data_dir.join(file_name);
        let table = Table::read_csv(&path).map_err(|e| {
            if !matches!(e, DataError::NotFound(_)) {
                tracing::error!(file = file_name, error = %e, "Failed to load data");
            }
            e
        })?;
        if table.skipped_rows() > 0 {
            warn!(
                file = file_name,
                skipped = table.skipped_rows(),
                "Malformed rows were skipped"
            );
        }
        info!(file = file_name, rows = table.len(), "Loaded data");
        Ok(table)
    }

    /// Dedupe, fill `Subject`/`Email_Body`/`Category`, add length columns, normalize `Category`.
    pub fn preprocess_email_data(&self, table: Table) -> Result<Table, DataError> {
        preprocess(DatasetKind::Email, table)
    }

    /// Dedupe, fill `User_Input`/`AI_Response`, add length columns.
    pub fn preprocess_chatbot_data(&self, table: Table) -> Result<Table, DataError> {
        preprocess(DatasetKind::Chatbot, table)
    }

    /// Dedupe, fill `Report_Type`/`Summary`/`Key_Findings`, add length columns, normalize `Report_Type`.
    pub fn preprocess_business_report_data(&self, table: Table) -> Result<Table, DataError> {
        preprocess(DatasetKind::Report, table)
    }

    /// Load and preprocess every dataset present in the data directory.
    ///
    /// A missing raw file skips that dataset; any other failure aborts.
    pub fn process_all_data(&mut self) -> Result<&BTreeMap<DatasetKind, Table>, DataError> {
        for kind in DatasetKind::ALL {
            let raw = match self.load_csv_data(kind.file_name()) {
                Ok(table) => table,
                Err(DataError::NotFound(path)) => {
                    warn!(dataset = %kind, path = %path.display(), "Raw dataset missing, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let processed = match kind {
                DatasetKind::Email => self.preprocess_email_data(raw)?,
                DatasetKind::Chatbot => self.preprocess_chatbot_data(raw)?,
                DatasetKind::Report => self.preprocess_business_report_data(raw)?,
            };
            self.processed.insert(kind, processed);
        }
        info!(datasets = self.processed.len(), "Data processing complete");
        Ok(&self.processed)
    }

    /// Write `processed_<key>_data.csv` for each processed table.
    ///
    /// Defaults to `<data_dir>/processed`.
    pub fn save_processed_data(&self, output_dir: Option<&Path>) -> Result<Vec<PathBuf>, DataError> {
        let dir = self.output_dir(output_dir);
        fs::create_dir_all(&dir)?;

        let mut written = Vec::with_capacity(self.processed.len());
        for (kind, table) in &self.processed {
            let path = dir.join(format!("processed_{}_data.csv", kind.key()));
            table.write_csv(&path)?;
            info!(dataset = %kind, path = %path.display(), "Saved processed data");
            written.push(path);
        }
        Ok(written)
    }

    /// Ordered train/test split of each processed table.
    pub fn prepare_training_data(&self) -> BTreeMap<DatasetKind, (Table, Table)> {
        self.processed
            .iter()
            .map(|(kind, table)| {
                let (train, test) = table.split_at_ratio(TRAIN_RATIO);
                info!(dataset = %kind, train = train.len(), test = test.len(), "Prepared split");
                (*kind, (train, test))
            })
            .collect()
    }

    /// Write `train_<key>_data.csv` and `test_<key>_data.csv` for each split.
    pub fn save_training_data(
        &self,
        splits: &BTreeMap<DatasetKind, (Table, Table)>,
        output_dir: Option<&Path>,
    ) -> Result<Vec<PathBuf>, DataError> {
        let dir = self.output_dir(output_dir);
        fs::create_dir_all(&dir)?;

        let mut written = Vec::with_capacity(splits.len() * 2);
        for (kind, (train, test)) in splits {
            let train_path = dir.join(format!("train_{}_data.csv", kind.key()));
            let test_path = dir.join(format!("test_{}_data.csv", kind.key()));
            train.write_csv(&train_path)?;
            test.write_csv(&test_path)?;
            written.push(train_path);
            written.push(test_path);
        }
        Ok(written)
    }

    /// Copy raw datasets missing from the data directory out of `source_dir`.
    /// Returns the names of the files copied.
    pub fn import_raw_files(&self, source_dir: &Path) -> Result<Vec<String>, DataError> {
        fs::create_dir_all(&self.data_dir)?;
        let mut copied = Vec::new();
        for kind in DatasetKind::ALL {
            let dest = self.data_dir.join(kind.file_name());
            let src = source_dir.join(kind.file_name());
            if dest.exists() || !src.exists() {
                continue;
            }
            fs::copy(&src, &dest)?;
            info!(file = kind.file_name(), from = %source_dir.display(), "Copied raw dataset");
            copied.push(kind.file_name().to_string());
        }
        Ok(copied)
    }

    fn output_dir(&self, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.join("processed"))
    }
}

/// Dedupe, fill, derive lengths, normalize.
fn preprocess(kind: DatasetKind, mut table: Table) -> Result<Table, DataError> {
    let removed = table.drop_duplicates();
    let filled = table.fill_missing(kind.fill_defaults())?;
    for (source, target) in kind.length_columns() {
        table.derive_length(source, target)?;
    }
    if let Some(column) = kind.normalized_column() {
        table.capitalize_column(column)?;
    }
    info!(
        dataset = %kind,
        rows = table.len(),
        duplicates_removed = removed,
        cells_filled = filled,
        "Preprocessed dataset"
    );
    Ok(table)
}
