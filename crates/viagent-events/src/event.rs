//! Event types for the sync event bus.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Source component that published the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// How a sync pass treats container entries that no longer exist locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Copy everything local into the container, leave extra entries alone.
    #[default]
    Incremental,
    /// Copy everything and delete container entries absent locally.
    Full,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown sync mode '{other}'")),
        }
    }
}

/// UI-facing state of the sync manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No pass running.
    #[default]
    Idle,
    /// A pass is in flight.
    Syncing,
    /// The last pass failed structurally.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Running counters of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Items in the plan.
    pub total_files: usize,
    /// Items processed successfully so far.
    pub synced_files: usize,
    /// Path of the item just processed.
    pub current_file: String,
    /// Integer completion percentage, 0 to 100. Counts every processed
    /// item, failed ones included, so a finished pass reaches 100.
    pub percentage: u8,
}

impl SyncProgress {
    /// Build a progress snapshot, computing the percentage.
    #[must_use]
    pub fn new(total_files: usize, synced_files: usize, current_file: impl Into<String>) -> Self {
        Self {
            total_files,
            synced_files,
            current_file: current_file.into(),
            percentage: percentage(synced_files, total_files),
        }
    }

    /// Recompute the percentage from `processed` items, which may exceed
    /// `synced_files` when earlier items failed.
    #[must_use]
    pub fn with_processed(mut self, processed: usize) -> Self {
        self.percentage = percentage(processed.max(self.synced_files), self.total_files);
        self
    }
}

/// `done / total` as a whole percentage; an empty total counts as complete.
#[must_use]
pub fn percentage(done: usize, total: usize) -> u8 {
    let pct = done
        .min(total)
        .saturating_mul(100)
        .checked_div(total)
        .unwrap_or(100);
    u8::try_from(pct).unwrap_or(100)
}

/// Summary of one completed sync pass.
///
/// `success` is false only for structural failures; per-file failures are
/// listed in `failed_files` and leave `success` true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Whether the pass ran to completion.
    pub success: bool,
    /// Items applied successfully.
    pub synced_files: usize,
    /// Paths whose operation failed.
    pub failed_files: Vec<String>,
    /// Wall-clock duration of the pass.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl SyncResult {
    /// True when the pass completed but some items failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed_files.is_empty()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Events emitted by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A pass started.
    Started {
        /// Name of the local directory being synced.
        source_root: String,
        /// Mode of the pass.
        mode: SyncMode,
    },

    /// One plan item was applied.
    Progress(SyncProgress),

    /// A pass or one of its items failed.
    Error {
        /// Error message.
        error: String,
        /// Offending path, absent for structural failures.
        file: Option<String>,
    },

    /// A pass finished.
    Completed(SyncResult),

    /// A single file was pushed into the container.
    FileModified {
        /// Relative path.
        path: String,
    },

    /// A single entry was removed from the container.
    FileDeleted {
        /// Relative path.
        path: String,
    },

    /// The manager changed status.
    StatusChanged {
        /// New status.
        status: SyncStatus,
    },
}

impl SyncEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "sync:started",
            Self::Progress(_) => "sync:progress",
            Self::Error { .. } => "sync:error",
            Self::Completed(_) => "sync:completed",
            Self::FileModified { .. } => "file:modified",
            Self::FileDeleted { .. } => "file:deleted",
            Self::StatusChanged { .. } => "sync:status",
        }
    }
}

/// A published event with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The event.
    pub event: SyncEvent,
}

impl EventEnvelope {
    /// Wire name of the wrapped event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 100);
        assert_eq!(percentage(0, 4), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(5, 3), 100);
    }

    #[test]
    fn test_progress_counts_processed_items() {
        let progress = SyncProgress::new(4, 3, "d.ts").with_processed(4);
        assert_eq!(progress.synced_files, 3);
        assert_eq!(progress.percentage, 100);
        assert_eq!(SyncProgress::new(4, 2, "b.ts").with_processed(1).percentage, 50);
    }

    #[test]
    fn test_sync_mode_parse() {
        assert_eq!("Full".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!(" incremental ".parse::<SyncMode>().unwrap(), SyncMode::Incremental);
        assert!("mirror".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_event_types() {
        assert_eq!(
            SyncEvent::Progress(SyncProgress::new(2, 1, "a.ts")).event_type(),
            "sync:progress"
        );
        assert_eq!(
            SyncEvent::FileDeleted { path: "a".into() }.event_type(),
            "file:deleted"
        );
    }

    #[test]
    fn test_result_serializes_duration_as_millis() {
        let result = SyncResult {
            success: true,
            synced_files: 2,
            failed_files: vec!["bad.ts".into()],
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], 1500);
        assert!(result.has_failures());

        let back: SyncResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_event_tagging() {
        let json = serde_json::to_value(SyncEvent::Error {
            error: "boom".into(),
            file: Some("x.ts".into()),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["file"], "x.ts");
    }
}
