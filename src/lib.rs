//! Autoupdater - In-place self-update engine for desktop applications
//!
//! A host embeds an [`UpdateController`], subscribes to its events and
//! calls [`UpdateController::start`]; the controller checks a remote
//! manifest, and on request downloads, verifies and installs the new
//! build over the running one before relaunching it.
//!
//! ```no_run
//! use autoupdater::{UpdateController, UpdateEvent, UpdaterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UpdaterConfig::new("https://example.com/app/manifest.json", "1.0.0.0");
//! let controller = UpdateController::new(&config)?;
//! let mut events = controller.subscribe();
//! controller.start();
//!
//! while let Some(event) = events.recv().await {
//!     if let UpdateEvent::UpdateAvailable { .. } = event {
//!         controller.apply().await;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::config::{ConfigError, UpdaterConfig};
pub use engine::platform::{Arch, Os};
pub use engine::updater::{
    ApplyOutcome, CheckOutcome, Launcher, UpdateController, UpdateError, UpdateEvent, UpdateState,
    UpdateStatus, UpdateStep,
};
