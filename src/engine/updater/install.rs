//! Install Engine
//!
//! Extracts an update archive over the live install directory.
//!
//! Files belonging to the running process may be open and unwritable in
//! place. Every existing file an entry would replace is first renamed to a
//! quarantine name carrying the [`QUARANTINE_MARKER`]; the new bytes are
//! then written to the freed path. Quarantined copies are collected by
//! [`cleanup_old_files`], on this run if they are no longer locked or on a
//! later run after the relaunch.
//!
//! Each entry is first written to a staging sibling and only then moved
//! onto its final path, so a corrupt entry never replaces a good file. Any
//! failure rolls the whole run back: files written so far are removed and
//! quarantined originals are renamed back. Entries whose path escapes the
//! install root, lexically or through a symlinked directory, are skipped
//! without touching the disk.

use path_clean::PathClean;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::error::{Result, UpdateError};

/// Marker inserted into quarantined file names
pub const QUARANTINE_MARKER: &str = "_OLD_";

/// Suffix of an entry being written next to its destination
const STAGING_SUFFIX: &str = ".partial";

/// Outcome of an extraction run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub total_entries: usize,
    pub written: usize,
    pub skipped: Vec<String>,
    pub quarantined: Vec<PathBuf>,
}

/// Outcome of a cleanup run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Resolve the install root to an absolute, normalized path
///
/// Existing directories are canonicalized; otherwise the path is made
/// absolute against the working directory and lexically cleaned.
pub fn resolve_install_root(dir: &Path) -> Result<PathBuf> {
    if dir.exists() {
        return Ok(dunce::canonicalize(dir)?);
    }

    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    Ok(absolute.clean())
}

/// Default install root: the directory holding the current executable
pub fn default_install_root() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        UpdateError::Extraction(format!("executable {} has no parent directory", exe.display()))
    })?;
    resolve_install_root(dir)
}

/// Destination of an archive entry, or `None` if it escapes `root`
pub fn contained_destination(root: &Path, entry_name: &str) -> Option<PathBuf> {
    let root = root.clean();
    let destination = root.join(entry_name).clean();
    if destination.starts_with(&root) {
        Some(destination)
    } else {
        None
    }
}

/// Candidate quarantine name for `path` with a collision counter
///
/// `app.exe` becomes `app_OLD_.exe`, then `app_OLD_1.exe`, `app_OLD_2.exe`.
fn quarantine_candidate(path: &Path, attempt: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = if attempt == 0 {
        String::new()
    } else {
        attempt.to_string()
    };

    let name = match path.extension() {
        Some(ext) => format!("{}{}{}.{}", stem, QUARANTINE_MARKER, suffix, ext.to_string_lossy()),
        None => format!("{}{}{}", stem, QUARANTINE_MARKER, suffix),
    };
    path.with_file_name(name)
}

/// First free quarantine name for `path`
pub fn quarantine_name(path: &Path) -> PathBuf {
    let mut attempt = 0;
    loop {
        let candidate = quarantine_candidate(path, attempt);
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        attempt += 1;
    }
}

/// Rename `path` out of the way, returning the quarantine path
pub fn quarantine_file(path: &Path) -> Result<PathBuf> {
    let target = quarantine_name(path);
    fs::rename(path, &target).map_err(|source| UpdateError::Quarantine {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(from = %path.display(), to = %target.display(), "quarantined existing file");
    Ok(target)
}

/// Whether the deepest existing ancestor of `destination` resolves inside `real_root`
///
/// Catches symlinked directories that lead out of the install root.
fn resolves_inside(real_root: &Path, destination: &Path) -> bool {
    let mut ancestor = destination.parent();
    while let Some(dir) = ancestor {
        if fs::symlink_metadata(dir).is_ok() {
            return dunce::canonicalize(dir)
                .map(|real| real.starts_with(real_root))
                .unwrap_or(false);
        }
        ancestor = dir.parent();
    }
    false
}

fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}{}", name, STAGING_SUFFIX))
}

/// Changes made by an extraction run, newest last
#[derive(Debug, Default)]
struct Journal {
    /// `(original, quarantined)` pairs
    moved: Vec<(PathBuf, PathBuf)>,
    written: Vec<PathBuf>,
}

impl Journal {
    /// Undo every recorded change, newest first
    fn roll_back(&self) {
        for path in self.written.iter().rev() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove extracted file"),
            }
        }
        for (original, moved) in self.moved.iter().rev() {
            if let Err(e) = fs::rename(moved, original) {
                tracing::error!(
                    from = %moved.display(),
                    to = %original.display(),
                    error = %e,
                    "cannot restore quarantined file"
                );
            }
        }
    }
}

/// Extract `archive_path` into `install_root`
///
/// `on_progress` receives `(processed_entries, total_entries)` after every
/// entry, written or skipped. On error the install root is restored to
/// its state before the call.
pub fn extract<F>(archive_path: &Path, install_root: &Path, mut on_progress: F) -> Result<ExtractReport>
where
    F: FnMut(usize, usize),
{
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let total = archive.len();
    let mut report = ExtractReport {
        total_entries: total,
        ..Default::default()
    };

    let root = install_root.clean();
    fs::create_dir_all(&root)?;
    let real_root = dunce::canonicalize(&root)?;
    tracing::info!(
        archive = %archive_path.display(),
        root = %root.display(),
        entries = total,
        "extracting update"
    );

    let mut journal = Journal::default();
    for index in 0..total {
        if let Err(e) = extract_entry(&mut archive, index, &root, &real_root, &mut report, &mut journal) {
            tracing::warn!(
                error = %e,
                restored = journal.moved.len(),
                removed = journal.written.len(),
                "extraction failed, rolling back"
            );
            journal.roll_back();
            return Err(e);
        }
        on_progress(index + 1, total);
    }

    tracing::info!(
        written = report.written,
        skipped = report.skipped.len(),
        quarantined = report.quarantined.len(),
        "extraction finished"
    );
    Ok(report)
}

fn extract_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    root: &Path,
    real_root: &Path,
    report: &mut ExtractReport,
    journal: &mut Journal,
) -> Result<()> {
    let mut entry = archive.by_index(index)?;
    let name = entry.name().to_string();

    let Some(destination) =
        contained_destination(root, &name).filter(|d| resolves_inside(real_root, d))
    else {
        tracing::warn!(entry = %name, "skipping archive entry outside install root");
        report.skipped.push(name);
        return Ok(());
    };

    if entry.is_dir() {
        fs::create_dir_all(&destination)?;
        return Ok(());
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(&destination);
    let staged = write_staged(&mut entry, &staging)
        .map_err(|e| UpdateError::Extraction(format!("{}: {}", name, e)))
        .and_then(|()| {
            // Links are moved aside too; writing through one would modify its target
            let existing = fs::symlink_metadata(&destination).map(|m| !m.is_dir()).unwrap_or(false);
            if existing {
                let moved = quarantine_file(&destination)?;
                journal.moved.push((destination.clone(), moved.clone()));
                report.quarantined.push(moved);
            }
            fs::rename(&staging, &destination)?;
            Ok(())
        });

    if let Err(e) = staged {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }

    journal.written.push(destination);
    report.written += 1;
    Ok(())
}

/// Decompress one entry into `staging`, replacing any leftover there
fn write_staged<R: Read>(entry: &mut zip::read::ZipFile<'_, R>, staging: &Path) -> io::Result<()> {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut out = File::create(staging)?;
    io::copy(entry, &mut out)?;
    out.sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(staging, fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }
    Ok(())
}

/// Check if a file name carries the quarantine marker
pub fn is_quarantined(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(QUARANTINE_MARKER))
        .unwrap_or(false)
}

/// Delete every quarantined file under `install_root`
///
/// Deletion failures are logged and left for a later run.
/// `on_progress` receives `(attempted, total)` after every attempt.
pub fn cleanup_old_files<F>(install_root: &Path, mut on_progress: F) -> CleanupReport
where
    F: FnMut(usize, usize),
{
    let candidates: Vec<PathBuf> = WalkDir::new(install_root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read entry during cleanup");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_quarantined(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    let total = candidates.len();
    let mut report = CleanupReport::default();

    for (index, path) in candidates.into_iter().enumerate() {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed quarantined file");
                report.deleted.push(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "quarantined file still in use, leaving it");
                report.failed.push(path);
            }
        }
        on_progress(index + 1, total);
    }

    report
}

/// Remove the downloaded archive
pub fn delete_archive(archive_path: &Path) -> Result<()> {
    match fs::remove_file(archive_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    enum Entry<'a> {
        File(&'a str, &'a [u8]),
        Dir(&'a str),
    }

    fn build_zip(path: &Path, entries: &[Entry]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for entry in entries {
            match entry {
                Entry::File(name, data) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
                Entry::Dir(name) => {
                    zip.add_directory(*name, options).unwrap();
                }
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_quarantine_names() {
        let p = Path::new("/opt/app/app.exe");
        assert_eq!(quarantine_candidate(p, 0), Path::new("/opt/app/app_OLD_.exe"));
        assert_eq!(quarantine_candidate(p, 1), Path::new("/opt/app/app_OLD_1.exe"));
        assert_eq!(quarantine_candidate(p, 2), Path::new("/opt/app/app_OLD_2.exe"));

        let p = Path::new("/opt/app/run");
        assert_eq!(quarantine_candidate(p, 0), Path::new("/opt/app/run_OLD_"));

        let p = Path::new("/opt/app/lib.so.1");
        assert_eq!(quarantine_candidate(p, 0), Path::new("/opt/app/lib.so_OLD_.1"));
    }

    #[test]
    fn test_quarantine_never_collides() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.exe");

        let mut names = Vec::new();
        for round in 0..5 {
            fs::write(&target, format!("build {}", round)).unwrap();
            names.push(quarantine_file(&target).unwrap());
            assert!(!target.exists());
        }

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
        assert_eq!(names[0], dir.path().join("app_OLD_.exe"));
        assert_eq!(names[4], dir.path().join("app_OLD_4.exe"));
        for (round, name) in names.iter().enumerate() {
            assert_eq!(fs::read_to_string(name).unwrap(), format!("build {}", round));
        }
    }

    #[test]
    fn test_contained_destination() {
        let root = Path::new("/srv/app");
        assert_eq!(
            contained_destination(root, "bin/app"),
            Some(PathBuf::from("/srv/app/bin/app"))
        );
        assert_eq!(
            contained_destination(root, "bin/../lib/x.so"),
            Some(PathBuf::from("/srv/app/lib/x.so"))
        );
        assert_eq!(contained_destination(root, "../../evil"), None);
        assert_eq!(contained_destination(root, "a/../../evil"), None);
        assert_eq!(contained_destination(root, "/etc/passwd"), None);
        assert_eq!(contained_destination(root, "../app-sibling/x"), None);

        let uncleaned = Path::new("/srv/app/bin/../");
        assert_eq!(
            contained_destination(uncleaned, "lib/x.so"),
            Some(PathBuf::from("/srv/app/lib/x.so"))
        );
        assert_eq!(contained_destination(uncleaned, "../evil"), None);
    }

    #[test]
    fn test_extract_round_trip() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        let big: Vec<u8> = (0..100_000).map(|i| (i * 7 % 256) as u8).collect();

        build_zip(
            &archive,
            &[
                Entry::Dir("data/"),
                Entry::File("app.exe", b"new app"),
                Entry::File("data/big.bin", &big),
                Entry::File("lib/nested/plugin.dll", b"plugin"),
            ],
        );

        let mut progress = Vec::new();
        let report = extract(&archive, &root, |done, total| progress.push((done, total))).unwrap();

        assert_eq!(report.total_entries, 4);
        assert_eq!(report.written, 3);
        assert!(report.skipped.is_empty());
        assert!(report.quarantined.is_empty());
        assert_eq!(fs::read(root.join("app.exe")).unwrap(), b"new app");
        assert_eq!(fs::read(root.join("data/big.bin")).unwrap(), big);
        assert_eq!(fs::read(root.join("lib/nested/plugin.dll")).unwrap(), b"plugin");
        assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_extract_quarantines_existing_files() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("app.exe"), b"old app").unwrap();
        fs::write(root.join("app_OLD_.exe"), b"older app").unwrap();
        fs::write(root.join("keep.txt"), b"untouched").unwrap();

        build_zip(
            &archive,
            &[Entry::Dir("data/"), Entry::File("app.exe", b"new app")],
        );

        let report = extract(&archive, &root, |_, _| {}).unwrap();

        assert_eq!(fs::read(root.join("app.exe")).unwrap(), b"new app");
        assert_eq!(report.quarantined, vec![root.join("app_OLD_1.exe")]);
        assert_eq!(fs::read(root.join("app_OLD_1.exe")).unwrap(), b"old app");
        assert_eq!(fs::read(root.join("app_OLD_.exe")).unwrap(), b"older app");
        assert_eq!(fs::read(root.join("keep.txt")).unwrap(), b"untouched");
        assert!(root.join("data").is_dir());
    }

    #[test]
    fn test_extract_skips_traversal_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("a").join("b").join("install");
        fs::create_dir_all(&root).unwrap();

        build_zip(
            &archive,
            &[
                Entry::File("../../evil", b"pwned"),
                Entry::File("ok.txt", b"fine"),
            ],
        );

        let mut progress = Vec::new();
        let report = extract(&archive, &root, |done, total| progress.push((done, total))).unwrap();

        assert_eq!(report.skipped, vec!["../../evil".to_string()]);
        assert_eq!(report.written, 1);
        assert!(!dir.path().join("a").join("evil").exists());
        assert!(!root.join("evil").exists());
        assert_eq!(fs::read(root.join("ok.txt")).unwrap(), b"fine");
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_extract_rejects_unreadable_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let result = extract(&archive, &dir.path().join("install"), |_, _| {});
        assert!(matches!(result, Err(UpdateError::Extraction(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_fails_in_read_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("app.bin"), b"old").unwrap();
        build_zip(&archive, &[Entry::File("locked/app.bin", b"new")]);

        // A read-only directory refuses renames of its children
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let probe = fs::rename(locked.join("app.bin"), locked.join("probe"));
        if probe.is_ok() {
            // Running as root: permissions do not apply, nothing to test
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = extract(&archive, &root, |_, _| {});
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Staging the new bytes fails before anything is moved
        assert!(matches!(result, Err(UpdateError::Extraction(_))));
        assert_eq!(fs::read(locked.join("app.bin")).unwrap(), b"old");
        assert_eq!(listing(&locked), vec!["app.bin"]);
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_corrupt_entry_rolls_back_whole_run() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("app.exe"), b"old app").unwrap();
        fs::write(root.join("lib.dll"), b"old lib").unwrap();

        // Stored entries keep their bytes verbatim, so one can be damaged in place
        let file = File::create(&archive).unwrap();
        let mut zip = ZipWriter::new(file);
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("app.exe", stored).unwrap();
        zip.write_all(b"new app").unwrap();
        zip.start_file("lib.dll", stored).unwrap();
        zip.write_all(b"NEWLIBDATA_MARK").unwrap();
        zip.start_file("fresh.txt", stored).unwrap();
        zip.write_all(b"never lands").unwrap();
        zip.finish().unwrap();

        let mut bytes = fs::read(&archive).unwrap();
        let at = bytes
            .windows(b"NEWLIBDATA_MARK".len())
            .position(|w| w == b"NEWLIBDATA_MARK")
            .unwrap();
        bytes[at] = b'X';
        fs::write(&archive, &bytes).unwrap();

        let result = extract(&archive, &root, |_, _| {});
        assert!(matches!(result, Err(UpdateError::Extraction(ref m)) if m.starts_with("lib.dll")));

        assert_eq!(listing(&root), vec!["app.exe", "lib.dll"]);
        assert_eq!(fs::read(root.join("app.exe")).unwrap(), b"old app");
        assert_eq!(fs::read(root.join("lib.dll")).unwrap(), b"old lib");

        let cleanup = cleanup_old_files(&root, |_, _| {});
        assert!(cleanup.deleted.is_empty());
        assert_eq!(fs::read(root.join("app.exe")).unwrap(), b"old app");
    }

    #[test]
    fn test_fresh_files_are_removed_on_rollback() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        fs::create_dir_all(root.join("blocked")).unwrap();

        // A file entry colliding with an existing directory cannot be moved into place
        build_zip(
            &archive,
            &[
                Entry::File("new.txt", b"new"),
                Entry::File("blocked", b"not a directory"),
            ],
        );

        assert!(extract(&archive, &root, |_, _| {}).is_err());
        assert_eq!(listing(&root), vec!["blocked"]);
        assert!(root.join("blocked").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_quarantined_not_written_through() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("libfoo.so.1"), b"mapped old library").unwrap();
        symlink("../outside/libfoo.so.1", root.join("libfoo.so")).unwrap();

        build_zip(&archive, &[Entry::File("libfoo.so", b"NEW")]);
        let report = extract(&archive, &root, |_, _| {}).unwrap();

        assert_eq!(
            fs::read(outside.join("libfoo.so.1")).unwrap(),
            b"mapped old library"
        );
        let installed = fs::symlink_metadata(root.join("libfoo.so")).unwrap();
        assert!(installed.file_type().is_file());
        assert_eq!(fs::read(root.join("libfoo.so")).unwrap(), b"NEW");

        assert_eq!(report.quarantined, vec![root.join("libfoo_OLD_.so")]);
        let moved = fs::symlink_metadata(root.join("libfoo_OLD_.so")).unwrap();
        assert!(moved.file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_leading_outside_is_skipped() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        let root = dir.path().join("install");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        symlink(&outside, root.join("plugins")).unwrap();

        build_zip(
            &archive,
            &[
                Entry::File("plugins/evil.so", b"pwned"),
                Entry::File("plugins/deep/evil.so", b"pwned"),
                Entry::File("ok.txt", b"fine"),
            ],
        );
        let report = extract(&archive, &root, |_, _| {}).unwrap();

        assert_eq!(
            report.skipped,
            vec!["plugins/evil.so".to_string(), "plugins/deep/evil.so".to_string()]
        );
        assert_eq!(report.written, 1);
        assert_eq!(listing(&outside), Vec::<String>::new());
        assert_eq!(fs::read(root.join("ok.txt")).unwrap(), b"fine");
    }

    #[test]
    fn test_cleanup_removes_quarantined_files_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("app_OLD_.exe"), b"x").unwrap();
        fs::write(root.join("app_OLD_1.exe"), b"x").unwrap();
        fs::write(root.join("sub").join("lib_OLD_.dll"), b"x").unwrap();
        fs::write(root.join("app.exe"), b"current").unwrap();
        fs::write(root.join("sub").join("lib.dll"), b"current").unwrap();

        let mut progress = Vec::new();
        let first = cleanup_old_files(root, |done, total| progress.push((done, total)));
        assert_eq!(first.deleted.len(), 3);
        assert!(first.failed.is_empty());
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(root.join("app.exe").exists());
        assert!(root.join("sub").join("lib.dll").exists());

        let mut second_progress = Vec::new();
        let second = cleanup_old_files(root, |d, t| second_progress.push((d, t)));
        assert!(second.deleted.is_empty());
        assert!(second.failed.is_empty());
        assert!(second_progress.is_empty());
    }

    #[test]
    fn test_delete_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("update.zip");
        fs::write(&archive, b"zip").unwrap();
        delete_archive(&archive).unwrap();
        assert!(!archive.exists());
        // Already gone is fine
        delete_archive(&archive).unwrap();
    }

    #[test]
    fn test_resolve_install_root() {
        let dir = tempdir().unwrap();
        let resolved = resolve_install_root(dir.path()).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, dunce::canonicalize(dir.path()).unwrap());

        let missing = dir.path().join("x").join("..").join("y");
        let resolved = resolve_install_root(&missing).unwrap();
        assert!(resolved.ends_with("y"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }
}
