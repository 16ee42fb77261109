use crate::errors::Result;
use crate::semaphore::{Semaphore, SemaphoreError};

/// Cross-process mutual exclusion over a segment's shared bookkeeping.
///
/// Backed by a binary named semaphore. A process that dies while holding the
/// lock leaves it held; recovery is an operator action (re-initialise).
pub(crate) struct SegmentLock {
    sem: Semaphore,
    name: String,
}

/// Held lock; released on drop, including on every error path.
pub(crate) struct LockGuard<'a> {
    sem: &'a Semaphore,
}

impl SegmentLock {
    /// Replace any semaphore of that name with a fresh, unlocked one.
    pub fn install(name: &str) -> Result<Self> {
        match Semaphore::unlink(name) {
            Ok(()) => tracing::debug!(lock = name, "Removed stale segment lock"),
            Err(SemaphoreError::Os(nix::errno::Errno::ENOENT)) => {}
            Err(e) => return Err(e.into()),
        }
        let sem = Semaphore::create(name, 1)?;
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    pub fn open(name: &str) -> Result<Self> {
        let sem = Semaphore::open(name)?;
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    pub fn acquire(&self) -> Result<LockGuard<'_>> {
        self.sem.wait()?;
        Ok(LockGuard { sem: &self.sem })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remove(&self) -> Result<()> {
        Semaphore::unlink(&self.name)?;
        Ok(())
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sem.post() {
            tracing::error!(error = %e, "Failed to release segment lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let name = format!("/shmheap_locktest_{}", std::process::id());
        let lock = SegmentLock::install(&name).unwrap();
        let peer = SegmentLock::open(&name).unwrap();

        {
            let _guard = lock.acquire().unwrap();
            assert!(!peer.sem.try_wait().unwrap(), "Lock is held by guard");
        }
        assert!(peer.sem.try_wait().unwrap(), "Guard drop released the lock");
        peer.sem.post().unwrap();

        lock.remove().unwrap();
    }

    #[test]
    fn test_install_resets_a_held_lock() {
        let name = format!("/shmheap_lockreset_{}", std::process::id());
        let stale = SegmentLock::install(&name).unwrap();
        let guard = stale.acquire().unwrap();
        std::mem::forget(guard);

        let fresh = SegmentLock::install(&name).unwrap();
        let _guard = fresh.acquire().unwrap();

        fresh.remove().unwrap();
    }
}
