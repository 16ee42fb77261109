use crate::errors::{Result, SegmentError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// One shared, file-backed mapping of a segment area.
pub(crate) struct Region {
    mmap: MmapMut,
    base: NonNull<u8>,
    path: PathBuf,
}

// The mapping is shared memory; all access through it goes via atomics or the
// segment lock.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Create the backing file (or truncate an existing one) and map `len`
    /// zeroed bytes.
    pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;

        // Zero-length mappings are rejected by mmap
        file.set_len(len.max(1) as u64)?;

        let mmap = unsafe { MmapOptions::new().len(len.max(1)).map_mut(&file)? };

        Ok(Self::from_mmap(mmap, path))
    }

    /// Map an existing backing file, which must be at least `min_len` bytes.
    pub fn open(path: impl AsRef<Path>, min_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let actual = file.metadata()?.len();
        if actual < min_len as u64 {
            return Err(SegmentError::LayoutMismatch(format!(
                "{} is {actual} bytes, expected at least {min_len}",
                path.display()
            )));
        }

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(Self::from_mmap(mmap, path))
    }

    fn from_mmap(mut mmap: MmapMut, path: &Path) -> Self {
        // A live mapping is never at address zero.
        let base = NonNull::new(mmap.as_mut_ptr()).unwrap_or(NonNull::dangling());
        Self {
            mmap,
            base,
            path: path.to_path_buf(),
        }
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// View the start of the mapping as a `T`.
    ///
    /// # Safety
    ///
    /// The mapping must be at least `size_of::<T>()` bytes, suitably aligned
    /// (mappings are page aligned) and every bit pattern must be a valid `T`.
    /// `T` must only use interior mutability.
    pub unsafe fn view<T>(&self) -> &T {
        debug_assert!(self.len() >= std::mem::size_of::<T>());
        unsafe { &*(self.base.as_ptr() as *const T) }
    }

    /// View the mapping as `count` consecutive `T`s.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Region::view`], for `count` elements.
    pub unsafe fn view_slice<T>(&self, count: usize) -> &[T] {
        debug_assert!(self.len() >= count * std::mem::size_of::<T>());
        unsafe { std::slice::from_raw_parts(self.base.as_ptr() as *const T, count) }
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}
