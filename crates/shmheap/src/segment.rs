use crate::config::SegmentConfig;
use crate::errors::{Result, SegmentError};
use crate::header::{HeaderState, RawHeader};
use crate::layout::{ClusterDesc, ClusterInfo, ControlBlock, Layout};
use crate::lock::{LockGuard, SegmentLock};
use crate::mapping::Region;
use crate::offset::{Offset, Translator};
use serde::Serialize;
use std::io;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

/// One process's handle on a shared heap.
///
/// Created by [`Segment::initialise`] in exactly one coordinating process and
/// by [`Segment::attach`] everywhere else. Every handle maps the segment at
/// its own base address; blocks are exchanged between processes as
/// [`Offset`]s.
pub struct Segment {
    ctl: Region,
    headers: Region,
    blocks: Region,
    layout: Layout,
    translator: Translator,
    lock: SegmentLock,
    config: SegmentConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterStats {
    pub block_size: u32,
    pub blocks: u32,
    pub free: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentStats {
    pub clusters: Vec<ClusterStats>,
    pub connections: usize,
}

impl SegmentStats {
    pub fn free_blocks(&self) -> u64 {
        self.clusters.iter().map(|c| c.free as u64).sum()
    }
}

impl Segment {
    /// Lay out a fresh segment with a uniform layout of `cluster_size` bytes
    /// per size class. See [`Layout::from_cluster_size`].
    pub fn initialise(config: &SegmentConfig, cluster_size: u32) -> Result<Self> {
        Self::initialise_with_layout(config, Layout::from_cluster_size(cluster_size)?)
    }

    /// Create (or truncate) the backing artifacts and build the segment.
    ///
    /// Any segment previously living at these paths is destroyed, including
    /// its lock. Run this once, from one coordinating process.
    pub fn initialise_with_layout(config: &SegmentConfig, layout: Layout) -> Result<Self> {
        let lock = SegmentLock::install(&config.lock_name)?;

        let ctl = Region::create(&config.ctl_path, ControlBlock::SIZE)?;
        let headers = Region::create(
            &config.headers_path,
            layout.total_blocks() * RawHeader::SIZE,
        )?;
        let blocks = Region::create(&config.blocks_path, layout.blocks_len())?;

        let segment = Self::assemble(ctl, headers, blocks, layout, lock, config);

        let control = segment.control();
        segment.layout.write_to(control);
        for (info, desc) in segment.layout.clusters().iter().zip(&control.clusters) {
            segment.thread_free_list(info, desc);
        }
        control.next_seed.store(1, Ordering::Relaxed);
        control.publish();

        tracing::info!(
            clusters = segment.layout.clusters().len(),
            blocks = segment.layout.total_blocks(),
            bytes = segment.layout.blocks_len(),
            ctl = %config.ctl_path.display(),
            "Segment initialised"
        );

        Ok(segment)
    }

    /// Map a segment some other process initialised.
    pub fn attach(config: &SegmentConfig) -> Result<Self> {
        let ctl = Region::open(&config.ctl_path, ControlBlock::SIZE)?;
        // SAFETY: the file holds at least one ControlBlock, which is all atomics.
        let control = unsafe { ctl.view::<ControlBlock>() };
        if !control.is_published() {
            return Err(SegmentError::NotInitialised);
        }
        let layout = Layout::read_from(control)?;

        let headers = Region::open(
            &config.headers_path,
            layout.total_blocks() * RawHeader::SIZE,
        )?;
        let blocks = Region::open(&config.blocks_path, layout.blocks_len())?;
        let lock = SegmentLock::open(&config.lock_name)?;

        tracing::info!(
            clusters = layout.clusters().len(),
            ctl = %config.ctl_path.display(),
            "Attached to segment"
        );

        Ok(Self::assemble(ctl, headers, blocks, layout, lock, config))
    }

    fn assemble(
        ctl: Region,
        headers: Region,
        blocks: Region,
        layout: Layout,
        lock: SegmentLock,
        config: &SegmentConfig,
    ) -> Self {
        let translator = Translator::new(blocks.base(), layout.blocks_len());
        Self {
            ctl,
            headers,
            blocks,
            layout,
            translator,
            lock,
            config: config.clone(),
        }
    }

    /// Detach this process. With `unlink`, also remove the backing files and
    /// the lock so no further process can attach.
    ///
    /// Unlinking while other processes still hold allocations loses their data.
    pub fn destroy(self, unlink: bool) -> Result<()> {
        if unlink {
            for path in self.config.artifacts() {
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            match self.lock.remove() {
                Ok(()) => {}
                Err(SegmentError::Lock(crate::semaphore::SemaphoreError::Os(
                    nix::errno::Errno::ENOENT,
                ))) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            unlink,
            lock = self.lock.name(),
            ctl = %self.ctl.path().display(),
            "Segment detached"
        );
        Ok(())
    }

    /// Number of size classes.
    pub fn clusters(&self) -> usize {
        self.layout.clusters().len()
    }

    /// Block size of the smallest cluster able to hold `value` bytes.
    pub fn block(&self, value: usize) -> Option<u32> {
        self.layout
            .fit(value)
            .map(|i| self.layout.clusters()[i].block_size)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Position-independent offset of an address inside this mapping.
    pub fn offset_of(&self, ptr: *const u8) -> Result<Offset> {
        self.translator.offset_of(ptr)
    }

    /// Address of `offset` inside this process's mapping.
    pub fn address_of(&self, offset: Offset) -> Result<NonNull<u8>> {
        self.translator.address_of(offset)
    }

    pub fn stats(&self) -> Result<SegmentStats> {
        let control = self.control();
        let _guard = self.lock()?;

        let clusters = self
            .layout
            .clusters()
            .iter()
            .zip(&control.clusters)
            .map(|(info, desc)| ClusterStats {
                block_size: info.block_size,
                blocks: info.blocks,
                free: desc.free_count.load(Ordering::Relaxed),
            })
            .collect();
        let connections = control
            .connections
            .iter()
            .filter(|slot| slot.seed.load(Ordering::Relaxed) != 0)
            .count();

        Ok(SegmentStats {
            clusters,
            connections,
        })
    }

    /// The requested bytes of the allocated block at `offset`.
    ///
    /// The slice aliases shared memory; other processes coordinating over the
    /// same block may change it concurrently.
    pub fn payload(&self, offset: Offset) -> Result<&[u8]> {
        let (cluster, index) = self.layout.locate(offset)?;
        let block_size = self.layout.clusters()[cluster].block_size;
        let size = {
            let _guard = self.lock()?;
            match self.headers()[index].load()? {
                HeaderState::Allocated(claim) if claim.size > block_size => {
                    tracing::error!(
                        offset = offset.get(),
                        size = claim.size,
                        block_size,
                        "Header claims more bytes than its block holds"
                    );
                    return Err(SegmentError::Corruption(format!(
                        "block {offset} claims {} bytes in a {block_size}-byte block",
                        claim.size
                    )));
                }
                HeaderState::Allocated(claim) => claim.size as usize,
                HeaderState::Free { .. } => return Err(SegmentError::NotAllocated(offset)),
            }
        };
        let start = self.address_of(offset)?;
        // SAFETY: locate() proved offset is a block start, and size was checked
        // against the block size above.
        Ok(unsafe { std::slice::from_raw_parts(start.as_ptr(), size) })
    }

    /// Copy `data` to the start of the allocated block at `offset`.
    pub fn write_payload(&self, offset: Offset, data: &[u8]) -> Result<()> {
        let (cluster, index) = self.layout.locate(offset)?;
        if data.len() > self.layout.clusters()[cluster].block_size as usize {
            return Err(SegmentError::InvalidArgument(
                "payload is larger than the block",
            ));
        }
        let _guard = self.lock()?;
        if let HeaderState::Free { .. } = self.headers()[index].load()? {
            return Err(SegmentError::NotAllocated(offset));
        }
        let start = self.address_of(offset)?;
        // SAFETY: the block spans at least data.len() bytes from start.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), start.as_ptr(), data.len()) };
        Ok(())
    }

    /// Flush all three mappings to their backing files.
    pub fn flush(&self) -> Result<()> {
        self.ctl.flush()?;
        self.headers.flush()?;
        self.blocks.flush()
    }

    pub(crate) fn lock(&self) -> Result<LockGuard<'_>> {
        self.lock.acquire()
    }

    pub(crate) fn control(&self) -> &ControlBlock {
        // SAFETY: the control file was sized for a ControlBlock on create/open
        // and ControlBlock is built from atomics only.
        unsafe { self.ctl.view::<ControlBlock>() }
    }

    pub(crate) fn headers(&self) -> &[RawHeader] {
        // SAFETY: the header file holds total_blocks records, checked on open.
        unsafe { self.headers.view_slice::<RawHeader>(self.layout.total_blocks()) }
    }

    pub(crate) fn desc(&self, cluster: usize) -> &ClusterDesc {
        &self.control().clusters[cluster]
    }

    /// Chain every block of a cluster onto its free list, lowest offset first.
    fn thread_free_list(&self, info: &ClusterInfo, desc: &ClusterDesc) {
        let first = info.first_header as usize;
        let last = first + info.blocks as usize - 1;
        let headers = self.headers();
        for index in first..=last {
            let next = (index < last).then(|| info.block_offset(index + 1));
            headers[index].store(&HeaderState::Free { next });
        }
        desc.free_head
            .store(info.block_offset(first).get(), Ordering::Relaxed);
        desc.free_count.store(info.blocks, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::layout::ClusterSpec;
    use std::sync::atomic::AtomicU32;
    use tempfile::TempDir;

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    /// A config under a fresh temp dir with a lock name unique to this test.
    pub(crate) fn test_config() -> (TempDir, SegmentConfig) {
        let dir = tempfile::tempdir().unwrap();
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let lock = format!("/shmheap_unit_{}_{}", std::process::id(), n);
        let config = SegmentConfig::with_prefix(dir.path().join("heap"), lock);
        (dir, config)
    }

    pub(crate) fn small_layout() -> Layout {
        Layout::custom(&[
            ClusterSpec {
                block_size: 64,
                blocks: 4,
            },
            ClusterSpec {
                block_size: 256,
                blocks: 2,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_initialise_threads_all_blocks_onto_free_lists() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();

        let stats = segment.stats().unwrap();
        assert_eq!(stats.clusters.len(), 2);
        assert_eq!(stats.clusters[0].free, 4);
        assert_eq!(stats.clusters[1].free, 2);
        assert_eq!(stats.connections, 0);

        let headers = segment.headers();
        assert_eq!(
            headers[0].load().unwrap(),
            HeaderState::Free {
                next: Some(Offset::new(64))
            }
        );
        assert_eq!(headers[3].load().unwrap(), HeaderState::Free { next: None });
        assert_eq!(
            segment.desc(1).free_head.load(Ordering::Relaxed),
            256,
            "Second cluster starts after 4 x 64 bytes"
        );

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_attach_sees_same_layout() {
        let (_dir, config) = test_config();
        let owner = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let peer = Segment::attach(&config).unwrap();

        assert_eq!(peer.layout(), owner.layout());
        assert_eq!(peer.clusters(), 2);

        peer.destroy(false).unwrap();
        owner.destroy(true).unwrap();
    }

    #[test]
    fn test_attach_before_initialise_fails() {
        let (_dir, config) = test_config();
        assert!(matches!(
            Segment::attach(&config),
            Err(SegmentError::IoError(_))
        ));
    }

    #[test]
    fn test_attach_rejects_unpublished_control_area() {
        let (_dir, config) = test_config();
        Region::create(&config.ctl_path, ControlBlock::SIZE).unwrap();
        assert!(matches!(
            Segment::attach(&config),
            Err(SegmentError::NotInitialised)
        ));
    }

    #[test]
    fn test_destroy_with_unlink_removes_artifacts() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        segment.destroy(true).unwrap();

        for path in config.artifacts() {
            assert!(!path.exists(), "{} should be removed", path.display());
        }
        assert!(Segment::attach(&config).is_err());
    }

    #[test]
    fn test_destroy_without_unlink_keeps_segment_attachable() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        segment.destroy(false).unwrap();

        let peer = Segment::attach(&config).unwrap();
        assert_eq!(peer.clusters(), 2);
        peer.destroy(true).unwrap();
    }

    #[test]
    fn test_payload_rejects_size_beyond_block() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();
        let seed = segment.connect().unwrap();
        let pid = nix::unistd::Pid::this();
        let ptr = segment.alloc(pid, seed, 0, 8).unwrap();
        let offset = segment.offset_of(ptr.as_ptr()).unwrap();
        let (_, index) = segment.layout().locate(offset).unwrap();

        segment.headers()[index].poke_size(1 << 20);
        let err = segment.payload(offset).unwrap_err();
        assert!(
            matches!(err, SegmentError::Corruption(_)),
            "Oversized claim must not yield a slice, got {err:?}"
        );
        assert!(matches!(
            segment.load_records(offset),
            Err(SegmentError::Corruption(_))
        ));

        // The largest legal claim is still readable.
        segment.headers()[index].poke_size(64);
        assert_eq!(segment.payload(offset).unwrap().len(), 64);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_block_classifies_request_sizes() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise_with_layout(&config, small_layout()).unwrap();

        assert_eq!(segment.block(1), Some(64));
        assert_eq!(segment.block(64), Some(64));
        assert_eq!(segment.block(65), Some(256));
        assert_eq!(segment.block(257), None);

        segment.destroy(true).unwrap();
    }

    #[test]
    fn test_uniform_initialise_uses_cluster_size() {
        let (_dir, config) = test_config();
        let segment = Segment::initialise(&config, 4096).unwrap();

        assert_eq!(segment.clusters(), 7, "64..4096 doubling is 7 classes");
        assert_eq!(segment.block(4096), Some(4096));

        segment.destroy(true).unwrap();
    }
}
