//! Update Controller
//!
//! Owns the update lifecycle for one application instance: periodic
//! checks, the single-flight guard, and the ordered apply sequence
//! download → verify → extract → cleanup → relaunch.
//!
//! Every error raised inside a sequence is caught here, published once as
//! [`UpdateEvent::Failure`], and the controller returns to
//! [`UpdateState::Idle`] with the guard released.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::download::Downloader;
use super::error::{Result, UpdateError};
use super::install;
use super::manifest::{resolve_url, Manifest};
use super::relaunch::{current_executable, Launcher, ProcessLauncher};
use super::state::{PendingUpdate, UpdateEvent, UpdateState, UpdateStatus, UpdateStep};
use super::verify;
use super::version::{compare_versions, Version, VersionOrdering};
use crate::engine::config::UpdaterConfig;
use crate::engine::platform::{current_platform, parse_platform, Arch, Os};

/// Result of one check
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// Another sequence held the guard
    Skipped,
    NoUpdate,
    Available(PendingUpdate),
    /// A mandatory update was found and applied
    Installed { version: String },
    Failed(Arc<UpdateError>),
}

/// Result of one apply
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Another sequence held the guard
    Skipped,
    NothingPending,
    Installed { version: String },
    Failed(Arc<UpdateError>),
}

/// Handle to an update engine instance
///
/// Cheap to clone; clones share one state machine. Timer-driven checks
/// need a Tokio runtime.
#[derive(Clone)]
pub struct UpdateController {
    inner: Arc<Inner>,
}

struct Inner {
    manifest_url: String,
    current_version: Version,
    os: Os,
    arch: Arch,
    install_root: PathBuf,
    download_dir: PathBuf,
    check_interval: Duration,
    repeat_checks: bool,
    terminate_after_relaunch: bool,
    executable: Option<PathBuf>,
    relaunch_args: Vec<String>,
    downloader: Downloader,
    launcher: Arc<dyn Launcher>,

    state: Mutex<UpdateState>,
    pending: Mutex<Option<PendingUpdate>>,
    last_check: Mutex<Option<DateTime<Utc>>>,
    in_flight: AtomicBool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<UpdateEvent>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held while a check-or-apply sequence runs
struct FlightGuard {
    inner: Arc<Inner>,
}

impl FlightGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

impl UpdateController {
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        Self::with_launcher(config, Arc::new(ProcessLauncher))
    }

    pub fn with_launcher(config: &UpdaterConfig, launcher: Arc<dyn Launcher>) -> Result<Self> {
        let current_version: Version = config.current_version.parse()?;
        let (os, arch) = match &config.platform {
            Some(raw) => parse_platform(raw, None)?,
            None => current_platform()?,
        };
        let install_root = match &config.install_dir {
            Some(dir) => install::resolve_install_root(dir)?,
            None => install::default_install_root()?,
        };
        let executable = config.executable_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                install_root.join(p)
            }
        });

        tracing::debug!(
            %os,
            %arch,
            version = %current_version,
            root = %install_root.display(),
            "update controller configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                manifest_url: config.manifest_url.clone(),
                current_version,
                os,
                arch,
                install_root,
                download_dir: config.download_dir(),
                check_interval: config.check_interval(),
                repeat_checks: config.repeat_checks,
                terminate_after_relaunch: config.terminate_after_relaunch,
                executable,
                relaunch_args: config.relaunch_args.clone(),
                downloader: Downloader::with_options(&config.transport())?,
                launcher,
                state: Mutex::new(UpdateState::Idle),
                pending: Mutex::new(None),
                last_check: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
            }),
        })
    }

    /// Register a listener for lifecycle events
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UpdateEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.subscribers).push(tx);
        rx
    }

    /// Check immediately, then on every interval if repeating is enabled
    ///
    /// Calling `start` on a running controller does nothing.
    pub fn start(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("update controller already started");
            return;
        }

        let inner = Arc::clone(&self.inner);
        *timer = Some(tokio::spawn(async move {
            inner.tick();

            if !inner.repeat_checks || inner.check_interval.is_zero() {
                return;
            }

            let period = inner.check_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.tick();
            }
        }));
        tracing::info!(interval_secs = self.inner.check_interval.as_secs(), "update checks started");
    }

    /// Stop future ticks; an apply already running continues
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
            tracing::info!("update checks stopped");
        }
    }

    /// Run one check now
    pub async fn check(&self) -> CheckOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.inner) else {
            tracing::debug!("update sequence in flight, dropping check");
            return CheckOutcome::Skipped;
        };
        self.inner.check_sequence().await
    }

    /// Install the pending update found by the last check
    pub async fn apply(&self) -> ApplyOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.inner) else {
            tracing::debug!("update sequence in flight, dropping apply");
            return ApplyOutcome::Skipped;
        };
        let pending = lock(&self.inner.pending).clone();
        match pending {
            Some(pending) => self.inner.apply_sequence(pending).await,
            None => ApplyOutcome::NothingPending,
        }
    }

    /// Run [`apply`](Self::apply) on the runtime and return at once
    pub fn spawn_apply(&self) -> JoinHandle<ApplyOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.apply().await })
    }

    pub fn status(&self) -> UpdateStatus {
        UpdateStatus {
            state: *lock(&self.inner.state),
            pending_version: lock(&self.inner.pending)
                .as_ref()
                .map(|p| p.item.version.clone()),
            last_check: *lock(&self.inner.last_check),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn install_root(&self) -> &std::path::Path {
        &self.inner.install_root
    }
}

impl Inner {
    fn set_state(&self, state: UpdateState) {
        let mut current = lock(&self.state);
        let previous = *current;
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "update state changed");
            *current = state;
        }
    }

    fn emit(&self, event: UpdateEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn fail(&self, error: UpdateError) -> Arc<UpdateError> {
        tracing::error!(kind = ?error.kind(), "update failed: {}", error);
        let error = Arc::new(error);
        self.set_state(UpdateState::Failed);
        self.emit(UpdateEvent::Failure {
            error: Arc::clone(&error),
        });
        *lock(&self.pending) = None;
        self.set_state(UpdateState::Idle);
        error
    }

    /// Timer entry point: start a check unless one is in flight
    fn tick(self: &Arc<Self>) {
        let Some(guard) = FlightGuard::acquire(self) else {
            tracing::debug!("update sequence in flight, dropping tick");
            return;
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            inner.check_sequence().await;
        });
    }

    async fn check_sequence(self: &Arc<Self>) -> CheckOutcome {
        self.set_state(UpdateState::Checking);
        let resolved = self.resolve_update().await;
        *lock(&self.last_check) = Some(Utc::now());

        match resolved {
            Err(e) => CheckOutcome::Failed(self.fail(e)),
            Ok(None) => {
                *lock(&self.pending) = None;
                self.set_state(UpdateState::Idle);
                self.emit(UpdateEvent::NoUpdateAvailable);
                CheckOutcome::NoUpdate
            }
            Ok(Some(pending)) if pending.item.mandatory => {
                tracing::info!(version = %pending.item.version, "mandatory update, installing");
                *lock(&self.pending) = Some(pending.clone());
                match self.apply_sequence(pending).await {
                    ApplyOutcome::Installed { version } => CheckOutcome::Installed { version },
                    ApplyOutcome::Failed(e) => CheckOutcome::Failed(e),
                    ApplyOutcome::Skipped | ApplyOutcome::NothingPending => CheckOutcome::NoUpdate,
                }
            }
            Ok(Some(pending)) => {
                tracing::info!(version = %pending.item.version, "update available");
                *lock(&self.pending) = Some(pending.clone());
                self.set_state(UpdateState::UpdateAvailable);
                self.emit(UpdateEvent::UpdateAvailable {
                    version: pending.item.version.clone(),
                    changelog_url: pending.changelog_url.clone(),
                });
                CheckOutcome::Available(pending)
            }
        }
    }

    /// Fetch the manifest and pick a newer item for this platform
    async fn resolve_update(&self) -> Result<Option<PendingUpdate>> {
        tracing::debug!(url = %self.manifest_url, "fetching manifest");
        let bytes = self.downloader.fetch_bytes(&self.manifest_url).await?;
        let manifest = Manifest::parse(&bytes)?;

        let Some(item) = manifest.select_item(self.os, self.arch) else {
            tracing::info!(os = %self.os, arch = %self.arch, "no manifest entry for this platform");
            return Ok(None);
        };

        // Surface a broken remote version instead of silently skipping it
        item.version.parse::<Version>()?;
        if compare_versions(&item.version, &self.current_version) == VersionOrdering::NotNewer {
            tracing::info!(
                remote = %item.version,
                local = %self.current_version,
                "already up to date"
            );
            return Ok(None);
        }

        let download_url = resolve_url(&self.manifest_url, &item.url)?;
        let changelog_url = item
            .changelog
            .as_deref()
            .map(|c| resolve_url(&self.manifest_url, c).unwrap_or_else(|_| c.to_string()));

        Ok(Some(PendingUpdate {
            item: item.clone(),
            download_url,
            changelog_url,
        }))
    }

    fn artifact_path(&self, pending: &PendingUpdate) -> PathBuf {
        self.download_dir
            .join(format!("update-{}.zip", pending.item.version))
    }

    async fn apply_sequence(self: &Arc<Self>, pending: PendingUpdate) -> ApplyOutcome {
        let version = pending.item.version.clone();
        let artifact = self.artifact_path(&pending);

        self.set_state(UpdateState::Downloading);
        self.emit(UpdateEvent::UpdateStarted {
            version: version.clone(),
        });
        tracing::info!(%version, url = %pending.download_url, "applying update");

        match self.install(&pending, &artifact).await {
            Ok(()) => {
                *lock(&self.pending) = None;
                self.set_state(UpdateState::Idle);
                tracing::info!(%version, "update installed");

                if self.terminate_after_relaunch {
                    tracing::info!("terminating after relaunch");
                    std::process::exit(0);
                }
                ApplyOutcome::Installed { version }
            }
            Err(e) => {
                remove_artifact(&artifact).await;
                ApplyOutcome::Failed(self.fail(e))
            }
        }
    }

    async fn install(self: &Arc<Self>, pending: &PendingUpdate, artifact: &std::path::Path) -> Result<()> {
        let emitter = Arc::clone(self);
        self.downloader
            .download(&pending.download_url, artifact, move |progress| {
                emitter.emit(UpdateEvent::from_download(UpdateStep::Downloading, progress));
            })
            .await?;

        self.set_state(UpdateState::VerifyingChecksum);
        let path = artifact.to_path_buf();
        let checksum = pending.item.checksum.clone();
        blocking(move || verify::verify(&path, checksum.as_ref())).await?;
        self.emit(UpdateEvent::progress(UpdateStep::VerifyingChecksum, 1, Some(1)));

        self.set_state(UpdateState::Extracting);
        let path = artifact.to_path_buf();
        let root = self.install_root.clone();
        let emitter = Arc::clone(self);
        blocking(move || {
            install::extract(&path, &root, |done, total| {
                emitter.emit(UpdateEvent::progress(
                    UpdateStep::Extracting,
                    done as u64,
                    Some(total as u64),
                ));
            })
        })
        .await?;

        self.set_state(UpdateState::CleaningUp);
        let path = artifact.to_path_buf();
        let root = self.install_root.clone();
        let emitter = Arc::clone(self);
        blocking(move || {
            install::cleanup_old_files(&root, |done, total| {
                emitter.emit(UpdateEvent::progress(
                    UpdateStep::CleaningUp,
                    done as u64,
                    Some(total as u64),
                ));
            });
            install::delete_archive(&path)
        })
        .await?;

        self.set_state(UpdateState::Restarting);
        let executable = match &self.executable {
            Some(path) => path.clone(),
            None => current_executable()?,
        };
        self.launcher.relaunch(&executable, &self.relaunch_args)?;
        self.emit(UpdateEvent::progress(UpdateStep::Restarting, 1, Some(1)));

        Ok(())
    }
}

/// Run filesystem work off the async workers
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| UpdateError::Io(std::io::Error::other(e.to_string())))?
}

async fn remove_artifact(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed update artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove update artifact"),
    }
}
