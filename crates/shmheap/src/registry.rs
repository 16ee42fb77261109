//! Connection registry: which processes are attached, under which seed.

use crate::errors::{Result, SegmentError};
use crate::header::Seed;
use crate::layout::{ConnectionSlot, ControlBlock};
use crate::segment::Segment;
use nix::unistd::Pid;
use serde::Serialize;
use std::sync::atomic::Ordering;

/// A live entry of the connection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub seed: Seed,
    pub pid: i32,
}

impl Segment {
    /// Register the calling process and return its seed.
    pub fn connect(&self) -> Result<Seed> {
        self.connect_as(Pid::this())
    }

    /// Register an attachment on behalf of `pid`, e.g. a supervisor
    /// registering a worker it is about to spawn.
    pub fn connect_as(&self, pid: Pid) -> Result<Seed> {
        let control = self.control();
        let _guard = self.lock()?;

        let slot = control
            .connections
            .iter()
            .find(|slot| slot.seed.load(Ordering::Relaxed) == 0)
            .ok_or(SegmentError::RegistryFull)?;

        let seed = next_free_seed(control)?;
        slot.pid.store(pid.as_raw(), Ordering::Relaxed);
        slot.seed.store(seed.get(), Ordering::Relaxed);

        tracing::debug!(pid = pid.as_raw(), seed = seed.get(), "Connected");
        Ok(seed)
    }

    /// Unregister `seed`. Blocks allocated under it stay allocated; the
    /// checker decides what happens to them.
    pub fn disconnect(&self, seed: Seed) -> Result<()> {
        let control = self.control();
        let _guard = self.lock()?;

        let slot = find_slot(control, seed).ok_or(SegmentError::UnknownSeed(seed.get()))?;
        release(slot);

        tracing::debug!(seed = seed.get(), "Disconnected");
        Ok(())
    }

    pub fn is_connected(&self, seed: Seed) -> Result<bool> {
        let control = self.control();
        let _guard = self.lock()?;
        Ok(find_slot(control, seed).is_some())
    }

    pub fn connections(&self) -> Result<Vec<Connection>> {
        let control = self.control();
        let _guard = self.lock()?;
        Ok(control
            .connections
            .iter()
            .filter_map(|slot| {
                Seed::new(slot.seed.load(Ordering::Relaxed)).map(|seed| Connection {
                    seed,
                    pid: slot.pid.load(Ordering::Relaxed),
                })
            })
            .collect())
    }
}

/// Caller must hold the segment lock.
pub(crate) fn find_slot(control: &ControlBlock, seed: Seed) -> Option<&ConnectionSlot> {
    control
        .connections
        .iter()
        .find(|slot| slot.seed.load(Ordering::Relaxed) == seed.get())
}

/// Caller must hold the segment lock.
pub(crate) fn release(slot: &ConnectionSlot) {
    slot.seed.store(0, Ordering::Relaxed);
    slot.pid.store(0, Ordering::Relaxed);
}

/// Advance the seed counter to a value no live connection uses.
///
/// At most `MAX_CONNECTIONS - 1` seeds are live when this runs, so the
/// search ends within that many steps.
fn next_free_seed(control: &ControlBlock) -> Result<Seed> {
    for _ in 0..=control.connections.len() {
        let raw = control.next_seed.load(Ordering::Relaxed);
        let candidate = raw.max(1);
        let following = if candidate == i32::MAX { 1 } else { candidate + 1 };
        control.next_seed.store(following, Ordering::Relaxed);

        let Some(seed) = Seed::new(candidate) else {
            continue;
        };
        if find_slot(control, seed).is_none() {
            return Ok(seed);
        }
    }
    Err(SegmentError::Corruption(
        "connection table has no reusable seed".to_string(),
    ))
}
