use crate::errors::{Result, SegmentError};
use crate::offset::Offset;
use nix::unistd::Pid;
use serde::Serialize;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Per-connection token handed out by `connect`. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Seed(i32);

impl Seed {
    pub(crate) fn new(raw: i32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// Rebuild a seed received from another process, e.g. on a command line.
impl TryFrom<i32> for Seed {
    type Error = SegmentError;

    fn try_from(raw: i32) -> Result<Self> {
        Self::new(raw).ok_or(SegmentError::UnknownSeed(raw))
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-chosen tag describing what a block holds.
pub type TypeTag = i32;

/// How an allocation relates to its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Anchor {
    /// General pool allocation; survives its seed's disconnect.
    Pool,
    /// Scoped to the seed's working set; stale once the seed disconnects.
    Seed,
}

/// Logical ownership of an allocated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub pid: Pid,
    pub seed: Seed,
    pub type_tag: TypeTag,
    /// Requested payload size in bytes.
    pub size: u32,
    pub anchor: Anchor,
}

/// Decoded state of one header. A free header carries only its free-list
/// link; an allocated one carries only its claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    Free { next: Option<Offset> },
    Allocated(Claim),
}

const STATE_FREE: u32 = 0;
const STATE_POOL: u32 = 1;
const STATE_SEED: u32 = 2;

/// Shared-memory record behind a [`HeaderState`].
///
/// Only touched while the segment lock is held, so relaxed atomics suffice.
#[repr(C, align(8))]
pub(crate) struct RawHeader {
    state: AtomicU32,
    pid: AtomicI32,
    seed: AtomicI32,
    type_tag: AtomicI32,
    size: AtomicU32,
    next: AtomicI32,
}

impl RawHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn load(&self) -> Result<HeaderState> {
        match self.state.load(Ordering::Relaxed) {
            STATE_FREE => Ok(HeaderState::Free {
                next: Offset::from_link(self.next.load(Ordering::Relaxed)),
            }),
            state @ (STATE_POOL | STATE_SEED) => {
                let raw_seed = self.seed.load(Ordering::Relaxed);
                let seed = Seed::new(raw_seed).ok_or_else(|| {
                    SegmentError::Corruption(format!("allocated header has seed {raw_seed}"))
                })?;
                Ok(HeaderState::Allocated(Claim {
                    pid: Pid::from_raw(self.pid.load(Ordering::Relaxed)),
                    seed,
                    type_tag: self.type_tag.load(Ordering::Relaxed),
                    size: self.size.load(Ordering::Relaxed),
                    anchor: if state == STATE_SEED {
                        Anchor::Seed
                    } else {
                        Anchor::Pool
                    },
                }))
            }
            other => Err(SegmentError::Corruption(format!(
                "header has unknown state {other}"
            ))),
        }
    }

    pub fn store(&self, state: &HeaderState) {
        match state {
            HeaderState::Free { next } => {
                self.pid.store(0, Ordering::Relaxed);
                self.seed.store(0, Ordering::Relaxed);
                self.type_tag.store(0, Ordering::Relaxed);
                self.size.store(0, Ordering::Relaxed);
                self.next.store(Offset::to_link(*next), Ordering::Relaxed);
                self.state.store(STATE_FREE, Ordering::Relaxed);
            }
            HeaderState::Allocated(claim) => {
                self.pid.store(claim.pid.as_raw(), Ordering::Relaxed);
                self.seed.store(claim.seed.get(), Ordering::Relaxed);
                self.type_tag.store(claim.type_tag, Ordering::Relaxed);
                self.size.store(claim.size, Ordering::Relaxed);
                self.next.store(Offset::NIL, Ordering::Relaxed);
                let raw = match claim.anchor {
                    Anchor::Pool => STATE_POOL,
                    Anchor::Seed => STATE_SEED,
                };
                self.state.store(raw, Ordering::Relaxed);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn poke_state(&self, raw: u32) {
        self.state.store(raw, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn poke_size(&self, raw: u32) {
        self.size.store(raw, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn poke_next(&self, raw: i32) {
        self.next.store(raw, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed() -> RawHeader {
        RawHeader {
            state: AtomicU32::new(0),
            pid: AtomicI32::new(0),
            seed: AtomicI32::new(0),
            type_tag: AtomicI32::new(0),
            size: AtomicU32::new(0),
            next: AtomicI32::new(0),
        }
    }

    #[test]
    fn test_header_size() {
        assert_eq!(RawHeader::SIZE, 24, "Header should be six 4-byte fields");
        assert_eq!(std::mem::align_of::<RawHeader>(), 8);
    }

    #[test]
    fn test_seed_rejects_non_positive() {
        assert!(Seed::new(0).is_none());
        assert_eq!(Seed::try_from(5).unwrap().get(), 5);
        assert!(matches!(Seed::try_from(0), Err(SegmentError::UnknownSeed(0))));
        assert!(Seed::try_from(-3).is_err());
    }

    #[test]
    fn test_zeroed_header_is_free() {
        let header = zeroed();
        assert_eq!(
            header.load().unwrap(),
            HeaderState::Free {
                next: Some(Offset::new(0))
            }
        );
    }

    #[test]
    fn test_free_state_clears_claim() {
        let header = zeroed();
        let claim = Claim {
            pid: Pid::from_raw(42),
            seed: Seed::new(7).unwrap(),
            type_tag: 3,
            size: 100,
            anchor: Anchor::Seed,
        };
        header.store(&HeaderState::Allocated(claim));
        assert_eq!(header.load().unwrap(), HeaderState::Allocated(claim));

        header.store(&HeaderState::Free { next: None });
        assert_eq!(header.load().unwrap(), HeaderState::Free { next: None });
        assert_eq!(header.pid.load(Ordering::Relaxed), 0);
        assert_eq!(header.seed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_unknown_state_is_corruption() {
        let header = zeroed();
        header.poke_state(9);
        assert!(matches!(header.load(), Err(SegmentError::Corruption(_))));
    }
}
