//! Flat `key,value` metrics export.
//!
//! A finished session is written as one row per metric:
//!
//! | key | example value |
//! |---|---|
//! | `session` | `20261018_143005_6f1c…` (date-stamped identifier) |
//! | `started_at` | RFC-3339 UTC timestamp |
//! | `elapsed_s` | `93.250` |
//! | `min_angle_deg` … `trajectory_intercept` | running metrics |
//! | `branch.<id>.cut` | `true` / `false` |
//!
//! The file is opened in append mode and the `key,value` header is only
//! written when the file is new, so several sessions can share one file.
//! Fields are quoted by the `csv` writer whenever they contain a separator,
//! a quote or a line break.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use harvest_types::{HarvestError, MetricsReport};
use tracing::info;

const HEADER: [&str; 2] = ["key", "value"];

/// Date-stamped identifier of the session in `report`.
pub fn session_label(report: &MetricsReport) -> String {
    format!(
        "{}_{}",
        report.started_at.format("%Y%m%d_%H%M%S"),
        report.session_id
    )
}

/// Flatten `report` into ordered `(key, value)` rows.
pub fn metrics_rows(report: &MetricsReport) -> Vec<(String, String)> {
    let m = &report.metrics;
    let mut rows = vec![
        ("session".to_string(), session_label(report)),
        ("started_at".to_string(), report.started_at.to_rfc3339()),
        (
            "elapsed_s".to_string(),
            format!("{:.3}", report.elapsed.as_secs_f64()),
        ),
        ("min_angle_deg".to_string(), m.min_angle_deg.to_string()),
        ("max_angle_deg".to_string(), m.max_angle_deg.to_string()),
        ("min_distance".to_string(), m.min_distance.to_string()),
        ("max_distance".to_string(), m.max_distance.to_string()),
        ("sample_count".to_string(), m.sample_count.to_string()),
        ("trajectory_slope".to_string(), m.trajectory_slope.to_string()),
        (
            "trajectory_intercept".to_string(),
            m.trajectory_intercept.to_string(),
        ),
    ];
    rows.extend(
        report
            .branches
            .iter()
            .map(|b| (format!("branch.{}.cut", b.id), b.cut.to_string())),
    );
    rows
}

/// Append the rows of `report` to `path`.
///
/// When `path` is an existing directory a file named
/// `metrics_<YYYYmmdd_HHMMSS>.csv` is created inside it. Returns the path
/// that was written.
pub fn export_metrics(report: &MetricsReport, path: &Path) -> Result<PathBuf, HarvestError> {
    let target = if path.is_dir() {
        path.join(format!(
            "metrics_{}.csv",
            report.started_at.format("%Y%m%d_%H%M%S")
        ))
    } else {
        path.to_path_buf()
    };
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            HarvestError::Export(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let is_new = fs::metadata(&target).map(|m| m.len() == 0).unwrap_or(true);
    let write_err = |e: &dyn std::fmt::Display| {
        HarvestError::Export(format!("failed to write {}: {e}", target.display()))
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&target)
        .map_err(|e| write_err(&e))?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        wtr.write_record(HEADER).map_err(|e| write_err(&e))?;
    }
    for (key, value) in metrics_rows(report) {
        wtr.write_record([key, value]).map_err(|e| write_err(&e))?;
    }
    wtr.flush().map_err(|e| write_err(&e))?;

    info!(path = %target.display(), "metrics exported");
    Ok(target)
}
