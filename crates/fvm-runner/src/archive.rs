//! Archival of previous artifacts and result-history rotation.

use crate::error::{Result, RunnerError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const PREVIOUS_EXECUTIONS_DIR: &str = "previous_executions";
pub const RESULTS_DIR: &str = "fvm_results";
pub const HISTORY_DIR: &str = "fvm_history";
pub const REPORT_DIR: &str = "fvm_report";

/// Directory-safe ISO-8601 timestamp with microseconds.
pub fn archive_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.6fZ").to_string()
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|e| RunnerError::io(to, e))?;
    let entries = fs::read_dir(from).map_err(|e| RunnerError::io(from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RunnerError::io(from, e))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| RunnerError::io(&src, e))?;
        if file_type.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst).map_err(|e| RunnerError::io(&src, e))?;
        }
    }
    Ok(())
}

/// Copy `outdir/<key_dir>/` into `previous_executions/` and clear its
/// subdirectories. Returns the archive path, or `None` if there was
/// nothing to archive.
pub fn archive_design_dir(outdir: &Path, key_dir: &str, stamp: &str) -> Result<Option<PathBuf>> {
    let current = outdir.join(key_dir);
    if !current.is_dir() {
        return Ok(None);
    }

    let target = outdir
        .join(PREVIOUS_EXECUTIONS_DIR)
        .join(format!("{key_dir}_{stamp}"));
    copy_tree(&current, &target)?;

    let entries = fs::read_dir(&current).map_err(|e| RunnerError::io(&current, e))?;
    for entry in entries {
        let path = entry.map_err(|e| RunnerError::io(&current, e))?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| RunnerError::io(&path, e))?;
        }
    }

    tracing::info!(
        design = %key_dir,
        archive = %target.display(),
        "previous artifacts archived"
    );
    Ok(Some(target))
}

/// Move the previous results into `fvm_history/<stamp>/`, then carry the
/// dashboard's `history/` into the fresh results directory.
pub fn rotate_results(outdir: &Path, stamp: &str) -> Result<PathBuf> {
    let results = outdir.join(RESULTS_DIR);

    if results.exists() {
        let history_root = outdir.join(HISTORY_DIR);
        fs::create_dir_all(&history_root).map_err(|e| RunnerError::io(&history_root, e))?;
        let dest = history_root.join(stamp);
        fs::rename(&results, &dest).map_err(|e| RunnerError::io(&results, e))?;
        tracing::debug!(to = %dest.display(), "previous results rotated");
    }
    fs::create_dir_all(&results).map_err(|e| RunnerError::io(&results, e))?;

    let report_history = outdir.join(REPORT_DIR).join("history");
    if report_history.is_dir() {
        let dest = results.join("history");
        fs::rename(&report_history, &dest).map_err(|e| RunnerError::io(&report_history, e))?;
        tracing::debug!("dashboard history carried into results");
    }

    Ok(results)
}
