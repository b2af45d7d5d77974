//! Handle types and id allocation.

use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};

/// Handle to a soundfont resource.
///
/// Handles are opaque non-zero integers. The value 0 is the reserved
/// "none" sentinel: it never resolves to a resource, is always accepted
/// by validity checks, and is skipped by batch deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundFontId(u32);

impl SoundFontId {
    /// The "no soundfont" sentinel.
    pub const NONE: SoundFontId = SoundFontId(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw id (for logging and FFI boundaries).
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for the reserved 0 sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SoundFontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a preset in the external preset registry.
///
/// Same sentinel convention as [`SoundFontId`]: 0 means "none".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresetId(u32);

impl PresetId {
    /// The "no preset" sentinel.
    pub const NONE: PresetId = PresetId(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out globally unique non-zero ids.
///
/// The registry treats the allocator as a black box: it only asks for a
/// fresh id per created resource and returns the id on destruction.
/// Implementations must never hand out 0 or an id that is still live.
pub trait IdAllocator: Send + Sync {
    /// Allocate a fresh non-zero id.
    fn allocate(&self) -> Result<u32>;

    /// Return an id to the pool after its resource is destroyed.
    fn release(&self, id: u32);
}

/// Default allocator: a monotonically increasing counter.
///
/// Ids are never reused; [`IdAllocator::release`] is a no-op. Allocation
/// fails only if the 32-bit id space is exhausted.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU32,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator for SequentialIds {
    fn allocate(&self) -> Result<u32> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            // Wrapped around: the id space is spent.
            return Err(Error::OutOfMemory);
        }
        Ok(id)
    }

    fn release(&self, _id: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(SoundFontId::NONE.is_none());
        assert!(!SoundFontId::new(1).is_none());
        assert_eq!(SoundFontId::new(7).raw(), 7);
        assert!(PresetId::NONE.is_none());
    }

    #[test]
    fn test_sequential_ids_are_distinct_and_nonzero() {
        let ids = SequentialIds::new();
        let a = ids.allocate().unwrap();
        let b = ids.allocate().unwrap();
        let c = ids.allocate().unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }
}
