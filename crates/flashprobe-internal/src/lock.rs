//! Cross-process advisory lock backing [`flashprobe_core::runtime::BigLockGuard`].
//!
//! Concurrent programmer instances across processes must not touch the same
//! chip at once; an advisory `flock()` on a well-known lock file in `/run`
//! (falling back to `/tmp` if `/run` isn't writable) serializes them, same
//! as a PID file would but without the stale-PID cleanup problem.

use flashprobe_core::runtime::BigLockGuard;

use crate::error::InternalError;

const LOCK_PATHS: [&str; 2] = ["/run/flashprobe.lock", "/tmp/flashprobe.lock"];

/// An acquired advisory file lock, released on drop.
#[cfg(all(feature = "std", target_os = "linux"))]
pub struct FileLock {
    file: std::fs::File,
    held: bool,
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl FileLock {
    /// Open (creating if needed) the well-known lock file and take an
    /// exclusive, non-blocking `flock()` on it.
    ///
    /// Call [`flashprobe_core::runtime::Runtime::mark_lock_acquired`]
    /// immediately after a successful acquire, and hold this guard for the
    /// lifetime of the `Runtime`.
    pub fn try_acquire() -> Result<Self, InternalError> {
        use std::os::unix::io::AsRawFd;

        let file = Self::open()?;
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(if err.kind() == std::io::ErrorKind::WouldBlock {
                InternalError::ChipsetEnable("another flashprobe instance is already running")
            } else {
                InternalError::Io("flock() failed")
            });
        }
        Ok(Self { file, held: true })
    }

    fn open() -> Result<std::fs::File, InternalError> {
        for path in LOCK_PATHS {
            if let Ok(file) = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(path)
            {
                return Ok(file);
            }
        }
        Err(InternalError::Io(
            "could not open a big-lock file under /run or /tmp",
        ))
    }
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl BigLockGuard for FileLock {
    fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(all(feature = "std", target_os = "linux"))]
impl Drop for FileLock {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        self.held = false;
    }
}

#[cfg(not(all(feature = "std", target_os = "linux")))]
pub struct FileLock {
    _private: (),
}

#[cfg(not(all(feature = "std", target_os = "linux")))]
impl FileLock {
    pub fn try_acquire() -> Result<Self, InternalError> {
        Err(InternalError::NotSupported(
            "advisory file locking only supported on Linux",
        ))
    }
}

#[cfg(not(all(feature = "std", target_os = "linux")))]
impl BigLockGuard for FileLock {
    fn is_held(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "std", target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_in_same_process_fails() {
        // flock is per-open-file-description, so opening the path again and
        // locking it from the same process still contends like a second
        // process would.
        let first = FileLock::try_acquire().expect("first lock should succeed");
        assert!(first.is_held());
        let second = FileLock::try_acquire();
        assert!(second.is_err());
    }
}
