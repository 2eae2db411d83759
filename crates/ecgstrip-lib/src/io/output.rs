use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::MetricsRecord;

/// Default folder for analysis results.
pub const DEFAULT_OUTPUT_DIR: &str = "Analysis";

/// Name of the result file for an input strip: the input file stem with a `.json` suffix.
pub fn result_file_name(input: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "strip".into());
    name.push(".json");
    PathBuf::from(name)
}

/// Write `record` as JSON next to other results in `out_dir`, creating the folder if needed.
///
/// An empty `out_dir` writes into the working directory.
pub fn write_metrics(input: &Path, record: &MetricsRecord, out_dir: &Path) -> Result<PathBuf> {
    if !out_dir.as_os_str().is_empty() {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating output folder {}", out_dir.display()))?;
    }
    let path = out_dir.join(result_file_name(input));
    let js = serde_json::to_string(record)?;
    fs::write(&path, js).with_context(|| format!("writing {}", path.display()))?;
    info!("saved the result in {}", path.display());
    Ok(path)
}
