// # State Lock
//
// Exclusive lock file guarding a state file against a second writer.
//
// The daemon loop holds the lock for its whole lifetime. Manual commands
// that mutate state (`check`, `failover`, `restore`) take it for the
// duration of one operation and fail fast when it is held elsewhere.
// Read-only status queries do not lock; the atomic rename in
// `FileStateStore::save` means they never observe a torn file.
//
// The lock file is `<state path>.lock` and contains the owner's PID. A lock
// is stale and reclaimed when:
//
// - its PID is our own (a restarted container reuses PID 1)
// - on Linux, its PID no longer exists
// - it holds no readable PID and is older than `UNREADABLE_LOCK_GRACE`
//   (the owner died between creating and writing the file)

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::Error;

/// Age after which a lock without a readable PID is treated as abandoned
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(10);

/// Held lock on a state file; released on drop
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Lock file path for a state file
    pub fn lock_path(state_path: impl AsRef<Path>) -> PathBuf {
        let mut name = OsString::from(state_path.as_ref().as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquire the lock for `state_path`
    ///
    /// # Errors
    ///
    /// `Error::Locked` when another live process holds the lock.
    pub fn acquire(state_path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::acquire_with_grace(state_path, UNREADABLE_LOCK_GRACE)
    }

    fn acquire_with_grace(state_path: impl AsRef<Path>, grace: Duration) -> Result<Self, Error> {
        let path = Self::lock_path(state_path);

        match Self::try_create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = Self::read_owner(&path);
                if !Self::is_stale(&path, owner, grace) {
                    return Err(Self::contended(&path, owner));
                }

                tracing::warn!(
                    path = %path.display(),
                    pid = owner,
                    "Reclaiming stale state lock"
                );
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::Io(e)),
                }
                Self::try_create(&path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => Self::contended(&path, None),
                    _ => Error::Io(e),
                })
            }
            Err(e) => Err(Error::state_store(format!(
                "Failed to create lock file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn is_stale(path: &Path, owner: Option<u32>, grace: Duration) -> bool {
        match owner {
            Some(pid) if pid == std::process::id() => true,
            Some(pid) => !process_alive(pid),
            None => lock_age(path).is_some_and(|age| age >= grace),
        }
    }

    /// Path of the held lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), "Acquired state lock");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn read_owner(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    fn contended(path: &Path, owner: Option<u32>) -> Error {
        match owner {
            Some(pid) => Error::locked(format!(
                "State is locked by process {} ({}). Is the daemon running?",
                pid,
                path.display()
            )),
            None => Error::locked(format!(
                "State is locked ({}). Is the daemon running?",
                path.display()
            )),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "Failed to release state lock: {}", e);
        } else {
            tracing::debug!(path = %self.path.display(), "Released state lock");
        }
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a portable liveness check every lock is treated as live.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    #[cfg(unix)]
    #[test]
    fn test_lock_held_by_live_process_fails() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        // The test runner's parent is alive and is not us
        let owner = std::os::unix::process::parent_id();
        fs::write(StateLock::lock_path(&state), format!("{}\n", owner)).unwrap();

        let err = assert_err!(StateLock::acquire(&state));
        assert!(matches!(err, Error::Locked(_)));
        assert!(err.to_string().contains(&owner.to_string()));
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        let lock = StateLock::acquire(&state).unwrap();
        let path = lock.path().to_path_buf();
        drop(lock);

        assert!(!path.exists());
        assert_ok!(StateLock::acquire(&state));
    }

    #[test]
    fn test_lock_records_pid() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        let lock = StateLock::acquire(&state).unwrap();
        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        // PIDs are capped well below u32::MAX on Linux
        fs::write(StateLock::lock_path(&state), format!("{}\n", u32::MAX - 1)).unwrap();

        assert!(StateLock::acquire(&state).is_ok());
    }

    #[test]
    fn test_own_pid_lock_is_reclaimed() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");

        // Left behind by a killed run of this same PID
        fs::write(StateLock::lock_path(&state), format!("{}\n", std::process::id())).unwrap();

        let lock = assert_ok!(StateLock::acquire(&state));
        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_empty_lock_is_reclaimed_after_grace() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");
        fs::write(StateLock::lock_path(&state), "").unwrap();

        assert_ok!(StateLock::acquire_with_grace(&state, Duration::ZERO));
    }

    #[test]
    fn test_fresh_empty_lock_is_respected() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("state.json");
        fs::write(StateLock::lock_path(&state), "").unwrap();

        let err = assert_err!(StateLock::acquire_with_grace(&state, Duration::from_secs(3600)));
        assert!(matches!(err, Error::Locked(_)));
    }
}
