//! Traversal of live blocks.
//!
//! The segment lock is taken per batch of headers, never for the whole walk,
//! so a slow consumer cannot stall allocators in other processes. The
//! traversal is therefore not a snapshot: blocks allocated or freed behind
//! the cursor are missed, ahead of it they are seen.

use crate::errors::Result;
use crate::header::{Anchor, Claim, HeaderState, Seed, TypeTag};
use crate::offset::Offset;
use crate::segment::Segment;
use nix::unistd::Pid;
use std::ops::ControlFlow;
use std::ptr::NonNull;

/// Headers examined per lock acquisition.
const SCAN_BATCH: usize = 64;

/// Which allocated blocks a traversal yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Process(Pid),
    Seed(Seed),
}

impl Scope {
    fn matches(&self, claim: &Claim) -> bool {
        match self {
            Scope::All => true,
            Scope::Process(pid) => claim.pid == *pid,
            Scope::Seed(seed) => claim.seed == *seed,
        }
    }
}

impl From<Pid> for Scope {
    fn from(pid: Pid) -> Self {
        Scope::Process(pid)
    }
}

/// An allocated block as seen by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveBlock {
    pub offset: Offset,
    /// Address in this process's mapping.
    pub address: NonNull<u8>,
    pub pid: Pid,
    pub seed: Seed,
    pub type_tag: TypeTag,
    pub size: u32,
    pub anchor: Anchor,
}

/// Lazy iterator over live blocks in header order.
///
/// Resume an abandoned traversal with [`Segment::blocks_from`] and the
/// value of [`Blocks::cursor`].
pub struct Blocks<'a> {
    segment: &'a Segment,
    scope: Scope,
    cursor: usize,
}

impl Blocks<'_> {
    /// Index of the next header to examine.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for Blocks<'_> {
    type Item = Result<LiveBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        let headers = self.segment.headers();
        let layout = self.segment.layout();

        while self.cursor < headers.len() {
            let guard = match self.segment.lock() {
                Ok(guard) => guard,
                Err(e) => return Some(Err(e)),
            };
            let end = (self.cursor + SCAN_BATCH).min(headers.len());

            while self.cursor < end {
                let index = self.cursor;
                self.cursor += 1;

                let claim = match headers[index].load() {
                    Ok(HeaderState::Allocated(claim)) if self.scope.matches(&claim) => claim,
                    Ok(_) => continue,
                    Err(e) => return Some(Err(e)),
                };
                let Some(cluster) = layout.cluster_of_header(index) else {
                    continue;
                };
                let offset = layout.clusters()[cluster].block_offset(index);
                drop(guard);

                return Some(self.segment.address_of(offset).map(|address| LiveBlock {
                    offset,
                    address,
                    pid: claim.pid,
                    seed: claim.seed,
                    type_tag: claim.type_tag,
                    size: claim.size,
                    anchor: claim.anchor,
                }));
            }
        }
        None
    }
}

impl Segment {
    pub fn blocks(&self, scope: Scope) -> Blocks<'_> {
        self.blocks_from(scope, 0)
    }

    pub fn blocks_from(&self, scope: Scope, cursor: usize) -> Blocks<'_> {
        Blocks {
            segment: self,
            scope,
            cursor,
        }
    }

    /// Push each live block in `scope` to `visitor`, outside the lock.
    ///
    /// Stops early when the visitor breaks. Returns the number of blocks
    /// visited.
    pub fn scan<F>(&self, scope: Scope, mut visitor: F) -> Result<usize>
    where
        F: FnMut(&LiveBlock) -> ControlFlow<()>,
    {
        let mut visited = 0;
        for block in self.blocks(scope) {
            let block = block?;
            visited += 1;
            if visitor(&block).is_break() {
                break;
            }
        }
        Ok(visited)
    }
}
