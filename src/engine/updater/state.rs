//! Update State Machine
//!
//! States, steps and events of the update lifecycle. Transitions happen
//! only inside [`UpdateController`](super::controller::UpdateController).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::download::DownloadProgress;
use super::error::UpdateError;
use super::manifest::UpdateItem;

/// Lifecycle state of one engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    #[default]
    Idle,
    Checking,
    UpdateAvailable,
    Downloading,
    VerifyingChecksum,
    Extracting,
    CleaningUp,
    Restarting,
    /// Held only while the failure is being reported, then back to Idle
    Failed,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::UpdateAvailable => "update available",
            Self::Downloading => "downloading",
            Self::VerifyingChecksum => "verifying checksum",
            Self::Extracting => "extracting",
            Self::CleaningUp => "cleaning up",
            Self::Restarting => "restarting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Apply stage reported with progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStep {
    Downloading,
    VerifyingChecksum,
    Extracting,
    CleaningUp,
    Restarting,
}

/// Notification published to subscribers
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    Progress {
        step: UpdateStep,
        processed: u64,
        total: Option<u64>,
        percent: Option<f64>,
    },
    UpdateAvailable {
        version: String,
        changelog_url: Option<String>,
    },
    UpdateStarted {
        version: String,
    },
    NoUpdateAvailable,
    Failure {
        error: Arc<UpdateError>,
    },
}

impl UpdateEvent {
    pub(crate) fn progress(step: UpdateStep, processed: u64, total: Option<u64>) -> Self {
        Self::from_download(step, DownloadProgress::new(processed, total))
    }

    pub(crate) fn from_download(step: UpdateStep, progress: DownloadProgress) -> Self {
        Self::Progress {
            step,
            processed: progress.processed,
            total: progress.total,
            percent: progress.percent,
        }
    }
}

/// Update selected by a check and not yet applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpdate {
    pub item: UpdateItem,
    /// Item URL resolved against the manifest location
    pub download_url: String,
    pub changelog_url: Option<String>,
}

/// Point-in-time view of a controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateStatus {
    pub state: UpdateState,
    pub pending_version: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}
