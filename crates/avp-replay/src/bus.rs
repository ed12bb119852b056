//! Memory-window abstraction shared by the hardware and simulation
//! backends.
//!
//! Addresses are absolute physical addresses; each backend maps a
//! `[start, end)` window and rejects anything outside it. Writes take
//! `&self` — MMIO stores are volatile and the mailbox protocol, not the
//! borrow checker, serializes access (there is exactly one host caller).

use std::fmt;

use crate::error::Result;

/// Width of a sized memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    Half,
    /// 32-bit access.
    Word,
}

impl AccessSize {
    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Half => 16,
            Self::Word => 32,
        }
    }

    /// Width in bytes (the access footprint).
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }

    /// Natural alignment mask; an address is aligned when
    /// `addr & mask == 0`.
    pub const fn align_mask(self) -> u32 {
        self.bytes() - 1
    }
}

impl fmt::Display for AccessSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Mapped window bounds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrSpan {
    /// First mapped address.
    pub start: u32,
    /// One past the last mapped address.
    pub end: u32,
}

impl AddrSpan {
    /// Construct a span; `start <= end`.
    pub const fn new(start: u32, end: u32) -> Self {
        assert!(start <= end);
        Self { start, end }
    }

    /// Whether an access of `len` bytes at `addr` lies fully inside the
    /// window.
    pub fn contains(&self, addr: u32, len: u32) -> bool {
        let Some(end) = addr.checked_add(len) else {
            return false;
        };
        addr >= self.start && end <= self.end
    }
}

impl fmt::Display for AddrSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.start, self.end)
    }
}

/// Sized access to a mapped physical-memory window.
///
/// Implemented by [`crate::DevMemWindow`] (live hardware through
/// `/dev/mem`) and [`crate::SimWindow`] (atomic word array for tests and
/// CI). The simulated coprocessor runs against the same trait, so the
/// mailbox handshake exercises identical code on both substrates.
pub trait HostBus: Send + Sync {
    /// Read `size` bits at `addr`, zero-extended to u32.
    ///
    /// # Errors
    ///
    /// Returns an error if the access falls outside the window or is
    /// misaligned.
    fn read(&self, size: AccessSize, addr: u32) -> Result<u32>;

    /// Write the low `size` bits of `value` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the access falls outside the window or is
    /// misaligned.
    fn write(&self, size: AccessSize, addr: u32, value: u32) -> Result<()>;

    /// Copy a byte blob into the window (firmware install path).
    ///
    /// # Errors
    ///
    /// Returns an error if the blob does not fit inside the window.
    fn write_bytes(&self, addr: u32, data: &[u8]) -> Result<()>;

    /// Mapped window bounds.
    fn span(&self) -> AddrSpan;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_contains_edges() {
        let span = AddrSpan::new(0x100, 0x200);
        assert!(span.contains(0x100, 4));
        assert!(span.contains(0x1fc, 4));
        assert!(!span.contains(0x1fd, 4));
        assert!(!span.contains(0xfc, 4));
        // overflow footprint never passes
        assert!(!span.contains(u32::MAX, 4));
    }

    #[test]
    fn access_size_footprints() {
        assert_eq!(AccessSize::Byte.bytes(), 1);
        assert_eq!(AccessSize::Half.bytes(), 2);
        assert_eq!(AccessSize::Word.bytes(), 4);
        assert_eq!(AccessSize::Word.align_mask(), 3);
    }
}
