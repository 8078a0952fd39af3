//! Self-Update Engine
//!
//! Replaces the files of a running application with a newer build and
//! relaunches it.
//!
//! Components:
//! - `manifest` - Remote manifest parsing and platform selection
//! - `version` - Four-component versions and comparison
//! - `download` - Streaming HTTP download with progress
//! - `verify` - Content-hash checks
//! - `install` - Quarantine-rename extraction and cleanup
//! - `relaunch` - Detached restart of the installed executable
//! - `state` - Lifecycle states and events
//! - `controller` - Single-flight state machine tying the above together

pub mod controller;
pub mod download;
pub mod error;
pub mod install;
pub mod manifest;
pub mod relaunch;
pub mod state;
pub mod verify;
pub mod version;

pub use controller::{ApplyOutcome, CheckOutcome, UpdateController};
pub use download::{DownloadProgress, Downloader, TransportOptions};
pub use error::{ErrorKind, Result, UpdateError};
pub use install::{cleanup_old_files, extract, QUARANTINE_MARKER};
pub use manifest::{Checksum, Manifest, UpdateItem};
pub use relaunch::{Launcher, ProcessLauncher};
pub use state::{PendingUpdate, UpdateEvent, UpdateState, UpdateStatus, UpdateStep};
pub use verify::HashAlgorithm;
pub use version::{compare_versions, Version, VersionOrdering};
