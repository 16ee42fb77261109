//! Centralized segment naming and sizing defaults
//!
//! Every process attaching to the same heap must agree on these, so the
//! defaults live in one place and are only overridden through
//! [`SegmentConfig`](crate::config::SegmentConfig).

/// Prefix of the three backing files (`<prefix>_ctl`, `<prefix>_headers`, `<prefix>_blocks`)
pub const DEFAULT_PREFIX: &str = "/dev/shm/shmheap";

/// Suffix of the control area file: layout, free-list heads, connection table
pub const CTL_SUFFIX: &str = "_ctl";

/// Suffix of the header area file: one metadata record per block
pub const HEADERS_SUFFIX: &str = "_headers";

/// Suffix of the block area file: raw payload storage
pub const BLOCKS_SUFFIX: &str = "_blocks";

/// Semaphore name of the cross-process segment lock
pub const DEFAULT_LOCK_NAME: &str = "/shmheap_lock";

/// Default byte capacity of each cluster (1MB)
pub const DEFAULT_CLUSTER_SIZE: u32 = 1024 * 1024;

/// Smallest block size handed out by a uniform layout
pub const MIN_BLOCK_SIZE: u32 = 64;

/// Largest block size handed out by a uniform layout (64KB)
pub const MAX_BLOCK_SIZE: u32 = 64 * 1024;

/// Maximum number of size classes in one segment
pub const MAX_CLUSTERS: usize = 32;

/// Maximum number of simultaneously connected attachments
pub const MAX_CONNECTIONS: usize = 256;

/// Block sizes must be a multiple of this so every block start is aligned
pub const BLOCK_ALIGN: u32 = 8;
