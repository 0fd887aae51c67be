//! Flat-file persistence of performance and cost aggregates.
//!
//! Only the [`PerformanceRecord`] map and the cost ledger aggregates
//! survive restarts — pool and instance state never does. Writes go to a
//! temporary sibling file followed by an atomic rename, so a crash can
//! never leave a partially written state file behind. Loading tolerates a
//! missing or corrupt file by starting fresh, with a warning for the
//! corrupt case.

use crate::selection::ledger::LedgerAggregates;
use crate::selection::performance::PerformanceRecord;
use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the scheduler persists across restarts.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Per-(model, role) performance records.
    #[serde(default)]
    pub performance: Vec<PerformanceRecord>,
    /// Cost ledger aggregates.
    pub ledger: LedgerAggregates,
}

/// Load persisted state from `path`.
///
/// # Returns
///
/// - `Ok(Some(state))` when a valid state file exists
/// - `Ok(None)` when the file is missing, or exists but cannot be decoded
///   (the corrupt file is kept in place and a warning is logged)
///
/// # Errors
///
/// Returns [`SchedulerError::Io`] for filesystem errors other than
/// not-found.
///
/// # Panics
///
/// This function never panics.
pub fn load(path: &Path) -> Result<Option<PersistedState>, SchedulerError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SchedulerError::Io(e)),
    };

    match serde_json::from_str(&content) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt state file, starting fresh");
            Ok(None)
        }
    }
}

/// Write persisted state to `path` atomically.
///
/// The state is encoded to a `.tmp` sibling first and renamed into place,
/// so readers never observe a partial file.
///
/// # Errors
///
/// Returns [`SchedulerError::Persist`] if encoding fails and
/// [`SchedulerError::Io`] for filesystem errors.
///
/// # Panics
///
/// This function never panics.
pub fn save(path: &Path, state: &PersistedState) -> Result<(), SchedulerError> {
    let encoded = serde_json::to_string_pretty(state)
        .map_err(|e| SchedulerError::Persist(format!("state encode failed: {e}")))?;

    let tmp_path = temp_sibling(path);
    std::fs::write(&tmp_path, encoded)?;
    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), "persisted scheduler state");
    Ok(())
}

/// The `.tmp` sibling used for the write-then-rename dance.
fn temp_sibling(path: &Path) -> std::path::PathBuf {
    let mut file_name = path.file_name().unwrap_or_default().to_os_string();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

// ── Tests ──────────────────────────────────────────────────────────────
