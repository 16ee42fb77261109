//! Shared-memory heap for cooperating processes on one host.
//!
//! A [`Segment`] is a pre-sized arena mapped by every participating process.
//! Blocks are handed out from fixed size classes, tagged with the owning
//! pid, connection seed and a caller type tag, and referenced across
//! processes by [`Offset`]. The checker reclaims blocks whose owner died.

mod allocator;
pub mod checker;
pub mod config;
pub mod errors;
pub mod header;
pub mod layout;
mod lock;
mod mapping;
pub mod offset;
pub mod paths;
pub mod records;
pub mod registry;
pub mod scan;
pub mod segment;
pub mod semaphore;

pub use checker::{CheckOptions, CheckReport, Finding, ProcessProbe, SystemProbe};
pub use config::SegmentConfig;
pub use errors::{ErrorKind, SegmentError};
pub use header::{Anchor, Seed, TypeTag};
pub use layout::{ClusterSpec, Layout};
pub use offset::Offset;
pub use records::NameValue;
pub use scan::{Blocks, LiveBlock, Scope};
pub use segment::{ClusterStats, Segment, SegmentStats};

pub use nix::unistd::Pid;
