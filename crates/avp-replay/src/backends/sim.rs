//! Simulated memory window for tests and CI without hardware.
//!
//! A flat array of `AtomicU32` words stands in for the shared volatile
//! memory both cores poll. Atomics give the two execution contexts (the
//! host thread and the [`crate::CoprocCore`] interpreter thread) exactly
//! the semantics the hardware mailbox relies on: every load observes the
//! latest store, with no tearing inside a word.
//!
//! Sub-word accesses are read-modify-write on the containing word, which
//! matches how the real bus fabric presents byte/halfword lanes.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::bus::{AccessSize, AddrSpan, HostBus};
use crate::error::{AvpError, Result};

/// In-process memory window backed by atomic words.
pub struct SimWindow {
    words: Vec<AtomicU32>,
    span: AddrSpan,
}

impl std::fmt::Debug for SimWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWindow").field("span", &self.span).finish()
    }
}

impl SimWindow {
    /// Create a zero-filled window covering `[base, base + len)`.
    /// `base` and `len` must be word-aligned.
    ///
    /// # Panics
    ///
    /// Panics if `base` or `len` is not a multiple of 4.
    #[must_use]
    pub fn new(base: u32, len: u32) -> Self {
        assert_eq!(base % 4, 0, "window base must be word-aligned");
        assert_eq!(len % 4, 0, "window length must be word-aligned");
        let mut words = Vec::with_capacity(len as usize / 4);
        words.resize_with(len as usize / 4, AtomicU32::default);
        Self {
            words,
            span: AddrSpan::new(base, base + len),
        }
    }

    fn word(&self, addr: u32, size: AccessSize) -> Result<&AtomicU32> {
        if !self.span.contains(addr, size.bytes()) {
            return Err(AvpError::out_of_window(addr, size.bytes(), self.span));
        }
        if addr & size.align_mask() != 0 {
            return Err(AvpError::misaligned(addr, size));
        }
        Ok(&self.words[((addr - self.span.start) / 4) as usize])
    }
}

impl HostBus for SimWindow {
    fn read(&self, size: AccessSize, addr: u32) -> Result<u32> {
        let word = self.word(addr, size)?.load(Ordering::SeqCst);
        let shift = (addr % 4) * 8;
        let value = match size {
            AccessSize::Byte => (word >> shift) & 0xff,
            AccessSize::Half => (word >> shift) & 0xffff,
            AccessSize::Word => word,
        };
        tracing::trace!("sim read{size} {addr:#010x} = {value:#010x}");
        Ok(value)
    }

    fn write(&self, size: AccessSize, addr: u32, value: u32) -> Result<()> {
        let word = self.word(addr, size)?;
        let shift = (addr % 4) * 8;
        match size {
            AccessSize::Byte => {
                let mask = 0xff << shift;
                word.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                    Some((w & !mask) | ((value & 0xff) << shift))
                })
                .expect("fetch_update closure never returns None");
            }
            AccessSize::Half => {
                let mask = 0xffff << shift;
                word.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                    Some((w & !mask) | ((value & 0xffff) << shift))
                })
                .expect("fetch_update closure never returns None");
            }
            AccessSize::Word => word.store(value, Ordering::SeqCst),
        }
        tracing::trace!("sim write{size} {addr:#010x} = {value:#010x}");
        Ok(())
    }

    fn write_bytes(&self, addr: u32, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| AvpError::out_of_window(addr, u32::MAX, self.span))?;
        if !self.span.contains(addr, len) {
            return Err(AvpError::out_of_window(addr, len, self.span));
        }
        for (i, byte) in data.iter().enumerate() {
            self.write(AccessSize::Byte, addr + i as u32, u32::from(*byte))?;
        }
        Ok(())
    }

    fn span(&self) -> AddrSpan {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip() {
        let win = SimWindow::new(0x1000, 0x100);
        win.write(AccessSize::Word, 0x1010, 0xdead_beef).unwrap();
        assert_eq!(win.read(AccessSize::Word, 0x1010).unwrap(), 0xdead_beef);
    }

    #[test]
    fn subword_lanes() {
        let win = SimWindow::new(0x1000, 0x100);
        win.write(AccessSize::Word, 0x1010, 0x1122_3344).unwrap();

        assert_eq!(win.read(AccessSize::Byte, 0x1010).unwrap(), 0x44);
        assert_eq!(win.read(AccessSize::Byte, 0x1013).unwrap(), 0x11);
        assert_eq!(win.read(AccessSize::Half, 0x1012).unwrap(), 0x1122);

        // byte store leaves the other lanes intact
        win.write(AccessSize::Byte, 0x1011, 0xaa).unwrap();
        assert_eq!(win.read(AccessSize::Word, 0x1010).unwrap(), 0x1122_aa44);

        win.write(AccessSize::Half, 0x1010, 0xbbcc).unwrap();
        assert_eq!(win.read(AccessSize::Word, 0x1010).unwrap(), 0x1122_bbcc);
    }

    #[test]
    fn misaligned_rejected() {
        let win = SimWindow::new(0x1000, 0x100);
        assert!(matches!(
            win.read(AccessSize::Word, 0x1001),
            Err(AvpError::Misaligned { .. })
        ));
        assert!(matches!(
            win.write(AccessSize::Half, 0x1003, 0),
            Err(AvpError::Misaligned { .. })
        ));
    }

    #[test]
    fn out_of_window_rejected() {
        let win = SimWindow::new(0x1000, 0x100);
        assert!(matches!(
            win.read(AccessSize::Word, 0x0ffc),
            Err(AvpError::OutOfWindow { .. })
        ));
        assert!(matches!(
            win.read(AccessSize::Word, 0x10fe),
            Err(AvpError::OutOfWindow { .. })
        ));
        // last word of the window is fine
        assert!(win.read(AccessSize::Word, 0x10fc).is_ok());
    }

    #[test]
    fn write_bytes_blob() {
        let win = SimWindow::new(0x1000, 0x100);
        win.write_bytes(0x1020, &[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        assert_eq!(win.read(AccessSize::Word, 0x1020).unwrap(), 0x0403_0201);
        assert_eq!(win.read(AccessSize::Byte, 0x1024).unwrap(), 0x05);

        assert!(win.write_bytes(0x10fe, &[0; 4]).is_err());
    }
}
