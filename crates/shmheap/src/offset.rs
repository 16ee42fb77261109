//! Position-independent references into the block area.
//!
//! Every process maps the segment at its own base address, so nothing stored
//! inside shared memory may hold a raw pointer. [`Offset`] is the only
//! cross-process reference, and [`Translator`] is the only code that turns a
//! process-local address into an offset or back.

use crate::errors::{Result, SegmentError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ptr::NonNull;

/// Distance in bytes from the start of the block area.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offset(i32);

impl Offset {
    /// Raw encoding of "no offset" inside shared structures (end of a free list).
    pub(crate) const NIL: i32 = -1;

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// Decode a raw shared-memory link, mapping [`Offset::NIL`] to `None`.
    pub(crate) fn from_link(raw: i32) -> Option<Self> {
        (raw != Self::NIL).then_some(Self(raw))
    }

    pub(crate) fn to_link(link: Option<Self>) -> i32 {
        link.map_or(Self::NIL, |o| o.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Offset> for i32 {
    fn from(offset: Offset) -> Self {
        offset.0
    }
}

/// Converts between addresses in this process's mapping of the block area
/// and [`Offset`]s.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Translator {
    base: NonNull<u8>,
    len: usize,
}

// The translator only does arithmetic on the mapping's base address; it never
// dereferences it.
unsafe impl Send for Translator {}
unsafe impl Sync for Translator {}

impl Translator {
    /// `len` must not exceed `i32::MAX`; the layout guarantees this.
    pub fn new(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(len <= i32::MAX as usize);
        Self { base, len }
    }

    pub fn offset_of(&self, ptr: *const u8) -> Result<Offset> {
        let base = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        if addr < base || addr - base >= self.len {
            return Err(SegmentError::AddressOutOfBounds(addr));
        }
        Ok(Offset((addr - base) as i32))
    }

    pub fn address_of(&self, offset: Offset) -> Result<NonNull<u8>> {
        let raw = offset.get();
        if raw < 0 || raw as usize >= self.len {
            return Err(SegmentError::OffsetOutOfBounds(raw));
        }
        // SAFETY: raw < len, so the result stays inside the mapping.
        Ok(unsafe { self.base.add(raw as usize) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(buf: &mut [u8]) -> Translator {
        let base = NonNull::new(buf.as_mut_ptr()).unwrap();
        Translator::new(base, buf.len())
    }

    #[test]
    fn test_round_trip_inside_bounds() {
        let mut buf = vec![0u8; 256];
        let t = translator(&mut buf);

        for raw in [0, 1, 64, 255] {
            let addr = t.address_of(Offset::new(raw)).unwrap();
            assert_eq!(t.offset_of(addr.as_ptr()).unwrap(), Offset::new(raw));
        }
    }

    #[test]
    fn test_rejects_offsets_outside_bounds() {
        let mut buf = vec![0u8; 128];
        let t = translator(&mut buf);

        assert!(matches!(
            t.address_of(Offset::new(128)),
            Err(SegmentError::OffsetOutOfBounds(128))
        ));
        assert!(matches!(
            t.address_of(Offset::new(-1)),
            Err(SegmentError::OffsetOutOfBounds(-1))
        ));
    }

    #[test]
    fn test_rejects_addresses_outside_mapping() {
        let mut buf = vec![0u8; 128];
        let t = translator(&mut buf);
        let other = [0u8; 4];

        assert!(matches!(
            t.offset_of(other.as_ptr()),
            Err(SegmentError::AddressOutOfBounds(_))
        ));
        let past_end = buf.as_ptr().wrapping_add(128);
        assert!(t.offset_of(past_end).is_err(), "one-past-end is outside");
    }

    #[test]
    fn test_two_mappings_agree_on_offsets() {
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        let ta = translator(&mut a);
        let tb = translator(&mut b);

        let off = ta.offset_of(a.as_ptr().wrapping_add(40)).unwrap();
        let in_b = tb.address_of(off).unwrap();
        assert_eq!(in_b.as_ptr() as usize - b.as_ptr() as usize, 40);
    }

    #[test]
    fn test_link_encoding() {
        assert_eq!(Offset::from_link(Offset::NIL), None);
        assert_eq!(Offset::from_link(32), Some(Offset::new(32)));
        assert_eq!(Offset::to_link(None), Offset::NIL);
        assert_eq!(Offset::to_link(Some(Offset::new(8))), 8);
    }
}
