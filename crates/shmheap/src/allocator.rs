//! Size-class allocation over per-cluster free lists.
//!
//! Each cluster's free list is a stack threaded through the `next` links of
//! its free headers, so the most recently freed block is handed out first.

use crate::errors::{Result, SegmentError};
use crate::header::{Anchor, Claim, HeaderState, Seed, TypeTag};
use crate::lock::LockGuard;
use crate::offset::Offset;
use crate::registry;
use crate::segment::Segment;
use nix::unistd::Pid;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

impl Segment {
    /// Allocate `size` bytes from the general pool, owned by `pid`.
    ///
    /// Returns the block's address in this process's mapping.
    pub fn alloc(
        &self,
        pid: Pid,
        seed: Seed,
        type_tag: TypeTag,
        size: usize,
    ) -> Result<NonNull<u8>> {
        let offset = self.allocate(pid, seed, type_tag, size, Anchor::Pool)?;
        self.address_of(offset)
    }

    /// Allocate `size` bytes scoped to `seed`'s working set.
    ///
    /// Storage is identical to [`Segment::alloc`]; the block is tagged so the
    /// checker can reclaim it once `seed` disconnects. `seed` must be
    /// connected.
    pub fn alloc_seed(
        &self,
        pid: Pid,
        seed: Seed,
        type_tag: TypeTag,
        size: usize,
    ) -> Result<NonNull<u8>> {
        let offset = self.allocate(pid, seed, type_tag, size, Anchor::Seed)?;
        self.address_of(offset)
    }

    /// Offset-returning form of [`Segment::alloc`] / [`Segment::alloc_seed`].
    pub fn allocate(
        &self,
        pid: Pid,
        seed: Seed,
        type_tag: TypeTag,
        size: usize,
        anchor: Anchor,
    ) -> Result<Offset> {
        if size == 0 {
            return Err(SegmentError::InvalidArgument("allocation size is zero"));
        }
        let cluster = self
            .layout()
            .fit(size)
            .ok_or(SegmentError::NoFittingCluster { size })?;

        let guard = self.lock()?;
        if anchor == Anchor::Seed && registry::find_slot(self.control(), seed).is_none() {
            return Err(SegmentError::UnknownSeed(seed.get()));
        }

        let (index, offset) = self.pop_free(&guard, cluster)?;
        self.headers()[index].store(&HeaderState::Allocated(Claim {
            pid,
            seed,
            type_tag,
            size: size as u32,
            anchor,
        }));
        drop(guard);

        tracing::debug!(
            pid = pid.as_raw(),
            seed = seed.get(),
            type_tag,
            size,
            offset = offset.get(),
            "Allocated block"
        );
        Ok(offset)
    }

    /// Return the block at `ptr` to its cluster. Only the owning pid may
    /// free a block.
    pub fn free(&self, pid: Pid, ptr: NonNull<u8>) -> Result<()> {
        let offset = self.offset_of(ptr.as_ptr())?;
        self.free_offset(pid, offset)
    }

    pub fn free_offset(&self, pid: Pid, offset: Offset) -> Result<()> {
        let (cluster, index) = self.layout().locate(offset)?;

        let guard = self.lock()?;
        match self.headers()[index].load()? {
            HeaderState::Free { .. } => {
                tracing::error!(pid = pid.as_raw(), offset = offset.get(), "Double free");
                Err(SegmentError::DoubleFree(offset))
            }
            HeaderState::Allocated(claim) if claim.pid != pid => {
                tracing::warn!(
                    owner = claim.pid.as_raw(),
                    caller = pid.as_raw(),
                    offset = offset.get(),
                    "Refusing to free block owned by another process"
                );
                Err(SegmentError::OwnershipMismatch {
                    offset,
                    owner: claim.pid.as_raw(),
                    caller: pid.as_raw(),
                })
            }
            HeaderState::Allocated(_) => {
                self.push_free(&guard, cluster, index);
                tracing::debug!(pid = pid.as_raw(), offset = offset.get(), "Freed block");
                Ok(())
            }
        }
    }

    /// Take the head of `cluster`'s free list.
    pub(crate) fn pop_free(&self, _guard: &LockGuard<'_>, cluster: usize) -> Result<(usize, Offset)> {
        let info = self.layout().clusters()[cluster];
        let desc = self.desc(cluster);

        let offset = Offset::from_link(desc.free_head.load(Ordering::Relaxed)).ok_or(
            SegmentError::Exhausted {
                block_size: info.block_size,
            },
        )?;
        let index = info.header_index(offset).ok_or_else(|| {
            SegmentError::Corruption(format!(
                "free list head {offset} is not a block of the {}-byte cluster",
                info.block_size
            ))
        })?;
        let HeaderState::Free { next } = self.headers()[index].load()? else {
            return Err(SegmentError::Corruption(format!(
                "free list head {offset} is allocated"
            )));
        };
        let remaining = desc
            .free_count
            .load(Ordering::Relaxed)
            .checked_sub(1)
            .ok_or_else(|| {
                SegmentError::Corruption(format!(
                    "free count of the {}-byte cluster underflows",
                    info.block_size
                ))
            })?;

        desc.free_head.store(Offset::to_link(next), Ordering::Relaxed);
        desc.free_count.store(remaining, Ordering::Relaxed);
        Ok((index, offset))
    }

    /// Push header `index` onto `cluster`'s free list, dropping its claim.
    pub(crate) fn push_free(&self, _guard: &LockGuard<'_>, cluster: usize, index: usize) {
        let info = self.layout().clusters()[cluster];
        let desc = self.desc(cluster);

        let head = Offset::from_link(desc.free_head.load(Ordering::Relaxed));
        self.headers()[index].store(&HeaderState::Free { next: head });
        desc.free_head
            .store(info.block_offset(index).get(), Ordering::Relaxed);
        desc.free_count.fetch_add(1, Ordering::Relaxed);
    }
}
