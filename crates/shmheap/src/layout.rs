//! Segment geometry and the control area.
//!
//! A segment is three mappings: the control area ([`ControlBlock`]), the
//! header area (one [`RawHeader`](crate::header::RawHeader) per block) and the
//! block area. Clusters are laid out back to back in the block area in
//! ascending block-size order, and their headers likewise in the header area,
//! so a block's offset alone identifies its cluster and header.

use crate::errors::{Result, SegmentError};
use crate::offset::Offset;
use crate::paths::{BLOCK_ALIGN, MAX_BLOCK_SIZE, MAX_CLUSTERS, MAX_CONNECTIONS, MIN_BLOCK_SIZE};
use serde::Serialize;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

/// "SHMHEAP1" in ASCII.
pub(crate) const MAGIC: u64 = 0x5348_4d48_4541_5031;
pub(crate) const LAYOUT_VERSION: u32 = 1;

/// Requested shape of one size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSpec {
    pub block_size: u32,
    pub blocks: u32,
}

/// Resolved position of one size class inside the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterInfo {
    pub block_size: u32,
    pub blocks: u32,
    /// Index of the cluster's first header in the header area.
    pub first_header: u32,
    /// Offset of the cluster's first block in the block area.
    pub base: i32,
}

impl ClusterInfo {
    pub fn contains(&self, offset: Offset) -> bool {
        let raw = offset.get() as i64;
        let base = self.base as i64;
        raw >= base && raw < base + self.span() as i64
    }

    pub fn span(&self) -> u64 {
        self.block_size as u64 * self.blocks as u64
    }

    /// Header index of the block starting at `offset`, if `offset` is a block start.
    pub fn header_index(&self, offset: Offset) -> Option<usize> {
        if !self.contains(offset) {
            return None;
        }
        let rel = (offset.get() - self.base) as u32;
        (rel % self.block_size == 0)
            .then(|| self.first_header as usize + (rel / self.block_size) as usize)
    }

    pub fn block_offset(&self, header_index: usize) -> Offset {
        let slot = (header_index - self.first_header as usize) as i32;
        Offset::new(self.base + slot * self.block_size as i32)
    }
}

/// Immutable geometry of a segment, fixed at initialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    clusters: Vec<ClusterInfo>,
    total_blocks: u32,
    blocks_len: u64,
}

impl Layout {
    /// Power-of-two size classes from [`MIN_BLOCK_SIZE`] up to
    /// `min(cluster_size, MAX_BLOCK_SIZE)`, each holding `cluster_size` bytes.
    pub fn from_cluster_size(cluster_size: u32) -> Result<Self> {
        if cluster_size < MIN_BLOCK_SIZE {
            return Err(SegmentError::InvalidArgument(
                "cluster size is smaller than the minimum block size",
            ));
        }

        let largest = cluster_size.min(MAX_BLOCK_SIZE);
        let mut specs = Vec::new();
        let mut block_size = MIN_BLOCK_SIZE;
        while block_size <= largest {
            specs.push(ClusterSpec {
                block_size,
                blocks: cluster_size / block_size,
            });
            block_size *= 2;
        }

        Self::custom(&specs)
    }

    pub fn custom(specs: &[ClusterSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(SegmentError::InvalidArgument("layout has no clusters"));
        }
        if specs.len() > MAX_CLUSTERS {
            return Err(SegmentError::InvalidArgument("layout has too many clusters"));
        }

        let mut clusters = Vec::with_capacity(specs.len());
        let mut total_blocks: u64 = 0;
        let mut blocks_len: u64 = 0;
        let mut previous = 0;

        for spec in specs {
            if spec.block_size == 0 || spec.block_size % BLOCK_ALIGN != 0 {
                return Err(SegmentError::InvalidArgument(
                    "block size must be a non-zero multiple of 8",
                ));
            }
            if spec.block_size <= previous {
                return Err(SegmentError::InvalidArgument(
                    "block sizes must be strictly increasing",
                ));
            }
            if spec.blocks == 0 {
                return Err(SegmentError::InvalidArgument("cluster has no blocks"));
            }
            previous = spec.block_size;

            let info = ClusterInfo {
                block_size: spec.block_size,
                blocks: spec.blocks,
                first_header: total_blocks as u32,
                base: blocks_len as i32,
            };
            total_blocks += spec.blocks as u64;
            blocks_len += info.span();
            if blocks_len > i32::MAX as u64 || total_blocks > u32::MAX as u64 {
                return Err(SegmentError::InvalidArgument(
                    "block area exceeds the addressable offset range",
                ));
            }
            clusters.push(info);
        }

        Ok(Self {
            clusters,
            total_blocks: total_blocks as u32,
            blocks_len,
        })
    }

    pub fn clusters(&self) -> &[ClusterInfo] {
        &self.clusters
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks as usize
    }

    pub fn blocks_len(&self) -> usize {
        self.blocks_len as usize
    }

    /// Index of the smallest cluster whose blocks hold `size` bytes.
    pub fn fit(&self, size: usize) -> Option<usize> {
        self.clusters
            .iter()
            .position(|c| c.block_size as usize >= size)
    }

    /// Cluster index and header index of the block starting at `offset`.
    pub fn locate(&self, offset: Offset) -> Result<(usize, usize)> {
        let cluster = self
            .clusters
            .iter()
            .position(|c| c.contains(offset))
            .ok_or(SegmentError::OffsetOutOfBounds(offset.get()))?;
        let header = self.clusters[cluster]
            .header_index(offset)
            .ok_or(SegmentError::NotABlock(offset))?;
        Ok((cluster, header))
    }

    /// Cluster index owning header `index`.
    pub fn cluster_of_header(&self, index: usize) -> Option<usize> {
        self.clusters.iter().position(|c| {
            let first = c.first_header as usize;
            index >= first && index < first + c.blocks as usize
        })
    }

    pub(crate) fn write_to(&self, ctl: &ControlBlock) {
        ctl.cluster_count
            .store(self.clusters.len() as u32, Ordering::Relaxed);
        ctl.total_blocks.store(self.total_blocks, Ordering::Relaxed);
        ctl.blocks_len.store(self.blocks_len, Ordering::Relaxed);
        for (desc, info) in ctl.clusters.iter().zip(&self.clusters) {
            desc.block_size.store(info.block_size, Ordering::Relaxed);
            desc.blocks.store(info.blocks, Ordering::Relaxed);
            desc.first_header.store(info.first_header, Ordering::Relaxed);
            desc.base.store(info.base, Ordering::Relaxed);
        }
    }

    /// Rebuild the layout recorded in a published control area.
    pub(crate) fn read_from(ctl: &ControlBlock) -> Result<Self> {
        let count = ctl.cluster_count.load(Ordering::Relaxed) as usize;
        if count == 0 || count > MAX_CLUSTERS {
            return Err(SegmentError::LayoutMismatch(format!(
                "control area records {count} clusters"
            )));
        }
        let specs: Vec<ClusterSpec> = ctl.clusters[..count]
            .iter()
            .map(|d| ClusterSpec {
                block_size: d.block_size.load(Ordering::Relaxed),
                blocks: d.blocks.load(Ordering::Relaxed),
            })
            .collect();
        let layout = Self::custom(&specs)
            .map_err(|e| SegmentError::LayoutMismatch(format!("control area layout: {e}")))?;

        let recorded_blocks = ctl.total_blocks.load(Ordering::Relaxed);
        let recorded_len = ctl.blocks_len.load(Ordering::Relaxed);
        let positions_match = layout.clusters.iter().zip(&ctl.clusters[..count]).all(|(c, d)| {
            c.first_header == d.first_header.load(Ordering::Relaxed)
                && c.base == d.base.load(Ordering::Relaxed)
        });
        if recorded_blocks != layout.total_blocks
            || recorded_len != layout.blocks_len
            || !positions_match
        {
            return Err(SegmentError::LayoutMismatch(
                "control area totals disagree with its cluster table".to_string(),
            ));
        }
        Ok(layout)
    }
}

/// Per-cluster bookkeeping in the control area.
#[repr(C)]
pub(crate) struct ClusterDesc {
    pub block_size: AtomicU32,
    pub blocks: AtomicU32,
    pub first_header: AtomicU32,
    pub base: AtomicI32,
    /// Offset of the most recently freed block, or [`Offset::NIL`].
    pub free_head: AtomicI32,
    pub free_count: AtomicU32,
}

/// One attachment in the connection table. `seed == 0` marks an empty slot.
#[repr(C)]
pub(crate) struct ConnectionSlot {
    pub seed: AtomicI32,
    pub pid: AtomicI32,
}

/// Global bookkeeping shared by every attached process.
///
/// Mutable fields are only written while the segment lock is held; the
/// semaphore orders those writes, so relaxed atomics suffice. `magic` is
/// published last with `Release` so that attachers reading it with `Acquire`
/// see a complete layout.
#[repr(C, align(8))]
pub(crate) struct ControlBlock {
    pub magic: AtomicU64,
    pub version: AtomicU32,
    pub cluster_count: AtomicU32,
    pub total_blocks: AtomicU32,
    pub next_seed: AtomicI32,
    pub blocks_len: AtomicU64,
    pub clusters: [ClusterDesc; MAX_CLUSTERS],
    pub connections: [ConnectionSlot; MAX_CONNECTIONS],
}

impl ControlBlock {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn is_published(&self) -> bool {
        self.magic.load(Ordering::Acquire) == MAGIC
            && self.version.load(Ordering::Relaxed) == LAYOUT_VERSION
    }

    pub fn publish(&self) {
        self.version.store(LAYOUT_VERSION, Ordering::Relaxed);
        self.magic.store(MAGIC, Ordering::Release);
    }
}
