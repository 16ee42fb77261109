//! Named POSIX semaphore used as the segment's cross-process mutex.

use nix::errno::Errno;
use nix::libc;
use std::ffi::CString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemaphoreError {
    #[error("Semaphore operation failed: {0}")]
    Os(#[from] Errno),
    #[error("Invalid semaphore name: {0:?}")]
    InvalidName(String),
}

pub struct Semaphore {
    sem: *mut libc::sem_t,
}

fn c_name(name: &str) -> Result<CString, SemaphoreError> {
    // POSIX wants exactly one leading slash and no other.
    if !name.starts_with('/') || name[1..].contains('/') || name.len() < 2 {
        return Err(SemaphoreError::InvalidName(name.to_string()));
    }
    CString::new(name).map_err(|_| SemaphoreError::InvalidName(name.to_string()))
}

impl Semaphore {
    /// Create the semaphore exclusively with `initial_value`.
    ///
    /// Fails with `EEXIST` if a semaphore of that name already exists; call
    /// [`Semaphore::unlink`] first to replace it.
    pub fn create(name: &str, initial_value: u32) -> Result<Self, SemaphoreError> {
        let c_name = c_name(name)?;

        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial_value as libc::c_uint,
            )
        };

        if sem == libc::SEM_FAILED {
            return Err(SemaphoreError::Os(Errno::last()));
        }

        Ok(Self { sem })
    }

    pub fn open(name: &str) -> Result<Self, SemaphoreError> {
        let c_name = c_name(name)?;

        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };

        if sem == libc::SEM_FAILED {
            return Err(SemaphoreError::Os(Errno::last()));
        }

        Ok(Self { sem })
    }

    /// Block until the semaphore can be decremented. Restarts on `EINTR`.
    pub fn wait(&self) -> Result<(), SemaphoreError> {
        loop {
            let ret = unsafe { libc::sem_wait(self.sem) };
            if ret == 0 {
                return Ok(());
            }
            let errno = Errno::last();
            if errno != Errno::EINTR {
                return Err(SemaphoreError::Os(errno));
            }
        }
    }

    pub fn try_wait(&self) -> Result<bool, SemaphoreError> {
        let ret = unsafe { libc::sem_trywait(self.sem) };
        if ret == 0 {
            Ok(true)
        } else {
            let errno = Errno::last();
            if errno == Errno::EAGAIN {
                Ok(false)
            } else {
                Err(SemaphoreError::Os(errno))
            }
        }
    }

    pub fn post(&self) -> Result<(), SemaphoreError> {
        let ret = unsafe { libc::sem_post(self.sem) };
        if ret != 0 {
            return Err(SemaphoreError::Os(Errno::last()));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn value(&self) -> Result<i32, SemaphoreError> {
        let mut val: libc::c_int = 0;
        let ret = unsafe { libc::sem_getvalue(self.sem, &mut val) };
        if ret != 0 {
            return Err(SemaphoreError::Os(Errno::last()));
        }
        Ok(val)
    }

    pub fn unlink(name: &str) -> Result<(), SemaphoreError> {
        let c_name = c_name(name)?;
        let ret = unsafe { libc::sem_unlink(c_name.as_ptr()) };
        if ret != 0 {
            return Err(SemaphoreError::Os(Errno::last()));
        }
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}
