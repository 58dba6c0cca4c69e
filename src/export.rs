//! Writing datasets to flat files.

use crate::dataset::Dataset;
use crate::error::{Result, ResultExt as _};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write `frame` as CSV with a header, creating parent directories.
pub fn write_csv(frame: &mut DataFrame, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(frame)
        .with_context(|| format!("Failed to write CSV file {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Export a transformed dataset, index first, as CSV.
pub fn export_features(dataset: &Dataset, path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut frame = dataset.clone().reset_index()?.into_frame();
    let path = write_csv(&mut frame, path)?;
    info!(
        "Exported {} rows x {} columns to {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(path)
}
