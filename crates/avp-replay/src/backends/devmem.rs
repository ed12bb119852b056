//! Physical-memory window over `/dev/mem`.
//!
//! Maps the SoC I/O window with `O_SYNC` (uncached, synchronous) and
//! performs bounds-checked volatile sized accesses. rustix is used for
//! mmap/munmap; libc only supplies the `O_SYNC` open flag, which the
//! std `OpenOptions` API takes as a raw custom flag.

// MMIO registers are naturally aligned by hardware (alignment is checked
// before every access), so the pointer casts below are sound.
#![allow(clippy::cast_ptr_alignment)]

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};

use crate::bus::{AccessSize, AddrSpan, HostBus};
use crate::error::{AvpError, Result};

/// Memory-mapped physical I/O window.
///
/// Covers `[base, base + len)` in physical address space. The mapping is
/// page-aligned internally; accesses are by absolute physical address.
pub struct DevMemWindow {
    ptr: NonNull<u8>,
    map_len: usize,
    page_offset: usize,
    span: AddrSpan,
    _file: File,
}

impl std::fmt::Debug for DevMemWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevMemWindow")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("span", &self.span)
            .finish()
    }
}

// SAFETY: Send - DevMemWindow owns the mapping exclusively; mmap'd memory
// is process-wide and moving the handle between threads does not
// invalidate it.
unsafe impl Send for DevMemWindow {}

// SAFETY: Sync - all accesses are bounds-checked volatile loads/stores of
// MMIO registers; the mailbox protocol (single outstanding request)
// serializes the only concurrent writers.
unsafe impl Sync for DevMemWindow {}

impl DevMemWindow {
    /// Map `[base, base + len)` of physical memory through `/dev/mem`.
    ///
    /// Requires root (or CAP_SYS_RAWIO). The base need not be
    /// page-aligned; the mapping is widened to page boundaries and the
    /// sub-page offset tracked internally.
    ///
    /// # Errors
    ///
    /// Returns an error if `/dev/mem` cannot be opened or the mmap fails.
    ///
    /// # Panics
    ///
    /// Panics if rustix returns a null pointer on success (API contract
    /// says it never does).
    pub fn map(base: u32, len: u32) -> Result<Self> {
        let end = base.checked_add(len).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("window {base:#010x}+{len:#x} overflows the 32-bit address space"),
            )
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")?;

        let page_size = rustix::param::page_size();
        let page_offset = base as usize % page_size;
        let page_base = base as usize - page_offset;
        let map_len = (len as usize + page_offset).div_ceil(page_size) * page_size;

        // SAFETY: mmap of a freshly opened /dev/mem fd; length is non-zero
        // and page-rounded, offset is page-aligned, and the File is stored
        // in the struct so the fd outlives the mapping. Unmapped in Drop.
        let ptr = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                page_base as u64,
            )
            .map_err(|e| std::io::Error::from_raw_os_error(e.raw_os_error()))?;

            NonNull::new(addr.cast::<u8>()).expect("rustix mmap returns non-null on success")
        };

        tracing::info!("mapped I/O window [{base:#010x}, {end:#010x}) at {ptr:p}");

        Ok(Self {
            ptr,
            map_len,
            page_offset,
            span: AddrSpan::new(base, end),
            _file: file,
        })
    }

    /// Validate bounds and alignment, returning the host pointer for the
    /// access.
    fn check(&self, addr: u32, size: AccessSize) -> Result<*mut u8> {
        if !self.span.contains(addr, size.bytes()) {
            return Err(AvpError::out_of_window(addr, size.bytes(), self.span));
        }
        if addr & size.align_mask() != 0 {
            return Err(AvpError::misaligned(addr, size));
        }
        let offset = self.page_offset + (addr - self.span.start) as usize;
        // SAFETY: offset < map_len follows from the span check (the span
        // lies within the page-rounded mapping).
        Ok(unsafe { self.ptr.as_ptr().add(offset) })
    }
}

impl HostBus for DevMemWindow {
    fn read(&self, size: AccessSize, addr: u32) -> Result<u32> {
        let ptr = self.check(addr, size)?;
        // SAFETY: ptr is in-bounds and aligned per check(); volatile is
        // required because hardware can change the value between reads.
        let value = unsafe {
            match size {
                AccessSize::Byte => u32::from(ptr.read_volatile()),
                AccessSize::Half => u32::from(ptr.cast::<u16>().read_volatile()),
                AccessSize::Word => ptr.cast::<u32>().read_volatile(),
            }
        };
        tracing::trace!("read{size} {addr:#010x} = {value:#010x}");
        Ok(value)
    }

    fn write(&self, size: AccessSize, addr: u32, value: u32) -> Result<()> {
        let ptr = self.check(addr, size)?;
        tracing::trace!("write{size} {addr:#010x} = {value:#010x}");
        // SAFETY: ptr is in-bounds and aligned per check(); volatile is
        // required because MMIO stores have side effects the compiler
        // must not reorder or elide.
        unsafe {
            match size {
                AccessSize::Byte => ptr.write_volatile(value as u8),
                AccessSize::Half => ptr.cast::<u16>().write_volatile(value as u16),
                AccessSize::Word => ptr.cast::<u32>().write_volatile(value),
            }
        }
        Ok(())
    }

    fn write_bytes(&self, addr: u32, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| AvpError::out_of_window(addr, u32::MAX, self.span))?;
        if !self.span.contains(addr, len) {
            return Err(AvpError::out_of_window(addr, len, self.span));
        }
        let offset = self.page_offset + (addr - self.span.start) as usize;
        // SAFETY: destination range is in-bounds per the span check; src
        // and dst cannot overlap (one is the mapping, one a user slice).
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(offset),
                data.len(),
            );
        }
        tracing::debug!("copied {} bytes to {addr:#010x}", data.len());
        Ok(())
    }

    fn span(&self) -> AddrSpan {
        self.span
    }
}

impl Drop for DevMemWindow {
    fn drop(&mut self) {
        // SAFETY: ptr/map_len are exactly what mmap returned in map();
        // Drop runs at most once and no references outlive self.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.map_len) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
        tracing::debug!("unmapped I/O window {}", self.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_past_address_space_rejected() {
        // validated before /dev/mem is even opened, so no root needed
        let err = DevMemWindow::map(0xf000_0000, 0x2000_0000).unwrap_err();
        match err {
            AvpError::Io { source } => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput);
            }
            other => panic!("expected Io(InvalidInput), got {other}"),
        }
    }
}
