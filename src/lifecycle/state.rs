//! Worker phase and its persisted record

use crate::cache::CacheVersion;
use crate::error::{ReadThroughError, ReadThroughResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Lifecycle phase of one worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    /// Not yet installed
    Parsed,
    Installing,
    /// Installed, waiting to activate
    Installed,
    Activating,
    /// Serving requests
    Activated,
    /// Install failed; this version will never activate
    Redundant,
}

impl WorkerPhase {
    /// Whether an install may start from this phase
    pub fn can_install(&self) -> bool {
        !matches!(self, Self::Installing | Self::Activating)
    }

    /// Whether an activate may start from this phase
    pub fn can_activate(&self) -> bool {
        matches!(self, Self::Installed | Self::Activated)
    }

    /// Whether requests may be served in this phase
    pub fn can_serve(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", s)
    }
}

/// Persisted worker state, so separate invocations observe lifecycle ordering.
///
/// The version in control and the version being installed are tracked
/// separately: nothing that happens to a pending version takes control away
/// from the active one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Version currently in control, if any has activated
    pub active: Option<CacheVersion>,

    /// Version installing or waiting to activate
    pub pending: Option<PendingWorker>,

    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

/// A version that has not taken control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorker {
    pub version: CacheVersion,
    pub phase: WorkerPhase,
}

impl Default for WorkerRecord {
    fn default() -> Self {
        Self {
            active: None,
            pending: None,
            updated_at: Utc::now(),
        }
    }
}

impl WorkerRecord {
    /// Phase of `version` according to this record
    pub fn phase_for(&self, version: CacheVersion) -> WorkerPhase {
        if self.active == Some(version) {
            return WorkerPhase::Activated;
        }
        match self.pending {
            Some(pending) if pending.version == version => pending.phase,
            _ => WorkerPhase::Parsed,
        }
    }

    /// Fold the phase `version` has reached into the record.
    ///
    /// Activation hands control to `version`. Any other phase is recorded
    /// as pending, except for the active version, which is never demoted.
    pub fn record(&mut self, version: CacheVersion, phase: WorkerPhase) {
        if phase == WorkerPhase::Activated {
            self.active = Some(version);
            if self.pending.is_some_and(|p| p.version == version) {
                self.pending = None;
            }
        } else if self.active != Some(version) {
            self.pending = Some(PendingWorker { version, phase });
        }
        self.updated_at = Utc::now();
    }

    /// Load a record from file
    pub async fn load(path: &Path) -> ReadThroughResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            ReadThroughError::io(format!("reading worker state {}", path.display()), e)
        })?;

        let record: WorkerRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// Save record to file
    pub async fn save(&self, path: &Path) -> ReadThroughResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ReadThroughError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            ReadThroughError::io(format!("writing worker state {}", path.display()), e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn phase_guards() {
        assert!(WorkerPhase::Parsed.can_install());
        assert!(WorkerPhase::Redundant.can_install());
        assert!(!WorkerPhase::Installing.can_install());

        assert!(WorkerPhase::Installed.can_activate());
        assert!(!WorkerPhase::Parsed.can_activate());
        assert!(!WorkerPhase::Redundant.can_activate());

        assert!(WorkerPhase::Activated.can_serve());
        assert!(!WorkerPhase::Installed.can_serve());
    }

    #[test]
    fn unknown_version_reads_as_parsed() {
        let mut record = WorkerRecord::default();
        assert_eq!(record.phase_for(CacheVersion(1)), WorkerPhase::Parsed);

        record.record(CacheVersion(1), WorkerPhase::Activated);
        assert_eq!(record.phase_for(CacheVersion(1)), WorkerPhase::Activated);
        assert_eq!(record.phase_for(CacheVersion(2)), WorkerPhase::Parsed);
    }

    #[test]
    fn failed_install_of_next_version_keeps_active() {
        let mut record = WorkerRecord::default();
        record.record(CacheVersion(1), WorkerPhase::Activated);
        record.record(CacheVersion(2), WorkerPhase::Redundant);

        assert_eq!(record.active, Some(CacheVersion(1)));
        assert_eq!(record.phase_for(CacheVersion(1)), WorkerPhase::Activated);
        assert_eq!(record.phase_for(CacheVersion(2)), WorkerPhase::Redundant);
    }

    #[test]
    fn active_version_is_never_demoted() {
        let mut record = WorkerRecord::default();
        record.record(CacheVersion(1), WorkerPhase::Activated);
        record.record(CacheVersion(1), WorkerPhase::Redundant);
        record.record(CacheVersion(1), WorkerPhase::Installed);

        assert_eq!(record.phase_for(CacheVersion(1)), WorkerPhase::Activated);
        assert!(record.pending.is_none());
    }

    #[test]
    fn activation_hands_over_control() {
        let mut record = WorkerRecord::default();
        record.record(CacheVersion(1), WorkerPhase::Activated);
        record.record(CacheVersion(2), WorkerPhase::Installed);
        record.record(CacheVersion(2), WorkerPhase::Activated);

        assert_eq!(record.active, Some(CacheVersion(2)));
        assert!(record.pending.is_none());
        assert_eq!(record.phase_for(CacheVersion(1)), WorkerPhase::Parsed);
    }

    #[tokio::test]
    async fn save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("worker.json");

        assert!(WorkerRecord::load(&path).await.unwrap().is_none());

        let mut record = WorkerRecord::default();
        record.record(CacheVersion(2), WorkerPhase::Activated);
        record.record(CacheVersion(3), WorkerPhase::Installed);
        record.save(&path).await.unwrap();

        let loaded = WorkerRecord::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.active, Some(CacheVersion(2)));
        assert_eq!(loaded.phase_for(CacheVersion(3)), WorkerPhase::Installed);

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"installed\""));
    }
}
