//! On-disk persistence of metric states between sessions.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::model::MetricState;

/// Write `states` to `path` as pretty JSON.
///
/// The file is written next to `path` and renamed over it, so a reader
/// never sees a half-written file.
pub fn save(path: &Path, states: &[MetricState]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, states)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    log::debug!("saved {} metric states to {}", states.len(), path.display());
    Ok(())
}

/// Read states saved by [`save`]. A missing file is `Ok(None)`.
pub fn load(path: &Path) -> Result<Option<Vec<MetricState>>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Newest watermark across `states`, to resume an initial load from.
pub fn resume_reference(states: &[MetricState]) -> Option<i64> {
    states.iter().filter_map(|s| s.last_timestamp).max()
}
