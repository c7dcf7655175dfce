//! CSV collaborator: writes each category's result set into a per-run folder.

use crate::error::OutputError;
use crate::models::{Category, ResultSet};
use chrono::{DateTime, TimeZone};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SAMPLE_WIDTH: usize = 100;

/// `<base>/run-YYYY-MM-DD_HH-MM-SS`, created on construction.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    pub fn create<Tz>(base: &Path, started: DateTime<Tz>) -> Result<Self, OutputError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let path = base.join(format!("run-{}", started.format("%Y-%m-%d_%H-%M-%S")));
        fs::create_dir_all(&path)?;
        info!("Created run directory: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one category's listings. Returns `None` when there was nothing
    /// to write; no file is created in that case.
    pub fn write_category(&self, category: Category, results: &ResultSet) -> Result<Option<PathBuf>, OutputError> {
        if results.is_empty() {
            info!("No listings to save for {}", category.file_name());
            return Ok(None);
        }
        let path = self.path.join(category.file_name());
        let written = write_csv(results, &path)?;
        info!("Saved {} listings to {}", written, path.display());
        log_sample(category, results);
        Ok(Some(path))
    }
}

/// Header row plus one line per listing, fields in backend order.
pub fn write_csv(results: &ResultSet, path: &Path) -> Result<usize, OutputError> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(results.columns())?;
    let mut written = 0;
    for record in results.rows() {
        writer.write_record(record.to_csv_fields())?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn log_sample(category: Category, results: &ResultSet) {
    let Some(sample) = results.rows().next() else {
        return;
    };
    info!("Sample listing from {}:", category.file_name());
    for (column, value) in results.columns().iter().zip(sample.to_csv_fields()) {
        let shown: String = value.chars().take(SAMPLE_WIDTH).collect();
        info!("  {}: {}", column, shown);
    }
}
