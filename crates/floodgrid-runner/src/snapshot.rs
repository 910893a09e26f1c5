//! Point and snapshot files.
//!
//! Points are read from a JSON array of raw point records. Cluster snapshots are
//! JSON documents written to a temporary sibling file and renamed into place,
//! so a concurrent reader sees either the old or the new snapshot in full.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use floodgrid_cluster::{ClusterSnapshot, RawPoint};
use tracing::{debug, info};

use crate::error::RunnerError;
use crate::Result;

/// Read a JSON array of raw points.
pub fn load_points(path: &Path) -> Result<Vec<RawPoint>> {
    let contents = fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    let points: Vec<RawPoint> = serde_json::from_str(&contents).map_err(|e| RunnerError::json(path, e))?;
    debug!(path = %path.display(), points = points.len(), "Loaded points");
    Ok(points)
}

/// Read a cluster snapshot. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<ClusterSnapshot> {
    if !path.exists() {
        debug!(path = %path.display(), "No snapshot yet; starting empty");
        return Ok(ClusterSnapshot::default());
    }
    let contents = fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| RunnerError::json(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` to `path` atomically.
pub fn save_snapshot(path: &Path, snapshot: &ClusterSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RunnerError::io(parent, e))?;
    }
    let tmp = temp_path(path);
    let json = serde_json::to_vec_pretty(snapshot)?;
    {
        let mut file = fs::File::create(&tmp).map_err(|e| RunnerError::io(&tmp, e))?;
        file.write_all(&json).map_err(|e| RunnerError::io(&tmp, e))?;
        file.sync_all().map_err(|e| RunnerError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| RunnerError::io(path, e))?;
    info!(
        path = %path.display(),
        dates = snapshot.dates.len(),
        clusters = snapshot.cluster_count(),
        "Wrote cluster snapshot"
    );
    Ok(())
}
