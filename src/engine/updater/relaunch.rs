//! Process Relauncher
//!
//! Locates the running executable and starts the freshly installed copy
//! as an independent process.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::error::{Result, UpdateError};

/// Starts the relaunched application
pub trait Launcher: Send + Sync {
    fn relaunch(&self, executable: &Path, args: &[String]) -> Result<()>;
}

/// Spawns a detached OS process
///
/// The child is waited on from a background thread, so it is reaped when
/// it exits even if this process keeps running after the relaunch.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn relaunch(&self, executable: &Path, args: &[String]) -> Result<()> {
        spawn_detached(executable, args).map(|_| ())
    }
}

/// Start `executable` in its own process group and return its PID
fn spawn_detached(executable: &Path, args: &[String]) -> Result<u32> {
    ensure_executable(executable)?;

    let mut command = Command::new(executable);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if let Some(dir) = executable.parent() {
        command.current_dir(dir);
    }

    detach(&mut command);

    let mut child = command.spawn().map_err(|e| {
        UpdateError::ProcessLaunch(format!("{}: {}", executable.display(), e))
    })?;
    let pid = child.id();

    std::thread::spawn(move || match child.wait() {
        Ok(status) => tracing::debug!(pid, %status, "relaunched process exited"),
        Err(e) => tracing::warn!(pid, error = %e, "cannot wait on relaunched process"),
    });

    tracing::info!(
        executable = %executable.display(),
        pid,
        "relaunched application"
    );
    Ok(pid)
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // Own process group so the new copy survives the old one's exit
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Path of the running executable
///
/// Prefers the OS-reported image path, then falls back to `argv[0]`.
pub fn current_executable() -> Result<PathBuf> {
    match std::env::current_exe() {
        Ok(path) => return Ok(path),
        Err(e) => tracing::debug!(error = %e, "current_exe unavailable, trying argv[0]"),
    }

    let argv0 = std::env::args_os()
        .next()
        .ok_or_else(|| UpdateError::ProcessLaunch("cannot resolve current executable".into()))?;

    dunce::canonicalize(PathBuf::from(&argv0)).map_err(|e| {
        UpdateError::ProcessLaunch(format!(
            "cannot resolve current executable from {:?}: {}",
            argv0, e
        ))
    })
}

/// Make sure the relaunch target carries execute permission
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| UpdateError::ProcessLaunch(format!("{}: {}", path.display(), e)))?;
    let mode = metadata.permissions().mode();
    if mode & 0o111 != 0o111 {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o111))?;
        tracing::debug!(path = %path.display(), "added execute permission");
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_executable(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(UpdateError::ProcessLaunch(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}
