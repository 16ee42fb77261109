use crate::offset::Offset;
use crate::semaphore::SemaphoreError;
use std::io;
use thiserror::Error;

/// Coarse classification of a [`SegmentError`].
///
/// Lets callers tell resource pressure apart from misuse by another process
/// and from structural damage to the shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Capacity,
    InvalidArgument,
    Ownership,
    Corruption,
    System,
}

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Lock error: {0}")]
    Lock(#[from] SemaphoreError),

    #[error("No cluster can hold {size} bytes")]
    NoFittingCluster { size: usize },

    #[error("Cluster of {block_size}-byte blocks is exhausted")]
    Exhausted { block_size: u32 },

    #[error("Connection registry is full")]
    RegistryFull,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Address {0:#x} is outside the segment")]
    AddressOutOfBounds(usize),

    #[error("Offset {0} is outside the segment")]
    OffsetOutOfBounds(i32),

    #[error("Offset {0} is not the start of a block")]
    NotABlock(Offset),

    #[error("Unknown seed {0}")]
    UnknownSeed(i32),

    #[error("Block at offset {offset} is owned by pid {owner}, not pid {caller}")]
    OwnershipMismatch {
        offset: Offset,
        owner: i32,
        caller: i32,
    },

    #[error("Double free of block at offset {0}")]
    DoubleFree(Offset),

    #[error("Block at offset {0} is not allocated")]
    NotAllocated(Offset),

    #[error("Segment corrupted: {0}")]
    Corruption(String),

    #[error("Segment is not initialised")]
    NotInitialised,

    #[error("Segment layout mismatch: {0}")]
    LayoutMismatch(String),
}

impl SegmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SegmentError::NoFittingCluster { .. }
            | SegmentError::Exhausted { .. }
            | SegmentError::RegistryFull => ErrorKind::Capacity,
            SegmentError::InvalidArgument(_)
            | SegmentError::AddressOutOfBounds(_)
            | SegmentError::OffsetOutOfBounds(_)
            | SegmentError::NotABlock(_)
            | SegmentError::UnknownSeed(_)
            | SegmentError::NotAllocated(_) => ErrorKind::InvalidArgument,
            SegmentError::OwnershipMismatch { .. } => ErrorKind::Ownership,
            SegmentError::DoubleFree(_)
            | SegmentError::Corruption(_)
            | SegmentError::LayoutMismatch(_) => ErrorKind::Corruption,
            SegmentError::IoError(_) | SegmentError::Lock(_) | SegmentError::NotInitialised => {
                ErrorKind::System
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = SegmentError::IoError(io_err);
        assert_eq!(
            err.to_string(),
            "IO error: file not found",
            "IoError should display with 'IO error:' prefix"
        );

        let err = SegmentError::NoFittingCluster { size: 4096 };
        assert_eq!(err.to_string(), "No cluster can hold 4096 bytes");

        let err = SegmentError::Exhausted { block_size: 64 };
        assert_eq!(
            err.to_string(),
            "Cluster of 64-byte blocks is exhausted"
        );

        let err = SegmentError::OwnershipMismatch {
            offset: Offset::new(128),
            owner: 10,
            caller: 11,
        };
        assert_eq!(
            err.to_string(),
            "Block at offset 128 is owned by pid 10, not pid 11",
            "OwnershipMismatch should name both pids"
        );

        let err = SegmentError::DoubleFree(Offset::new(64));
        assert_eq!(err.to_string(), "Double free of block at offset 64");
    }

    #[test]
    fn test_error_kinds_follow_taxonomy() {
        assert_eq!(
            SegmentError::Exhausted { block_size: 64 }.kind(),
            ErrorKind::Capacity
        );
        assert_eq!(
            SegmentError::NoFittingCluster { size: 1 }.kind(),
            ErrorKind::Capacity
        );
        assert_eq!(
            SegmentError::OffsetOutOfBounds(-5).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            SegmentError::OwnershipMismatch {
                offset: Offset::new(0),
                owner: 1,
                caller: 2
            }
            .kind(),
            ErrorKind::Ownership
        );
        assert_eq!(
            SegmentError::DoubleFree(Offset::new(0)).kind(),
            ErrorKind::Corruption
        );
        assert_eq!(SegmentError::NotInitialised.kind(), ErrorKind::System);
    }

    #[test]
    fn test_error_conversion_from_io_error() {
        fn returns_io_error() -> std::result::Result<(), io::Error> {
            Err(io::Error::other("test error"))
        }

        fn uses_question_mark() -> Result<()> {
            returns_io_error()?;
            Ok(())
        }

        match uses_question_mark().unwrap_err() {
            SegmentError::IoError(e) => assert_eq!(e.to_string(), "test error"),
            other => panic!("Expected IoError variant, got {other:?}"),
        }
    }
}
