//! Trace record model.
//!
//! A trace is an externally recorded, ordered list of register
//! interactions. This crate never produces records; it only consumes
//! them. The numeric kind codes below are what recorded tables carry;
//! [`RecordKind::from_code`] keeps unknown codes around so the replay
//! engine can report a malformed trace at the exact step it is reached.

use std::fmt;

use crate::bus::AccessSize;

/// Which bus master performs a record's access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// The host CPU, directly through the mapped window.
    Host,
    /// The AVP coprocessor, through the mailbox.
    Coprocessor,
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "CPU"),
            Self::Coprocessor => write!(f, "AVP"),
        }
    }
}

/// Operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Verify the latched status of an interrupt line.
    IrqCheck,
    /// 8-bit read, value verified against the expectation.
    Read8,
    /// 16-bit read, value verified against the expectation.
    Read16,
    /// 32-bit read, value verified against the expectation.
    Read32,
    /// 32-bit read whose mismatch is logged but does not stop the replay.
    Read32NonFatal,
    /// 8-bit write.
    Write8,
    /// 16-bit write.
    Write16,
    /// 32-bit write.
    Write32,
    /// Host-side fill of `count` words at 4-byte stride.
    Memset32,
    /// Stop the replay successfully; trailing records never execute.
    End,
    /// A kind code this implementation does not understand (trace or
    /// version skew). Reaching it during replay is a malformed-trace
    /// failure.
    Unknown(u32),
}

impl RecordKind {
    /// Decode a recorded kind code.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::IrqCheck,
            1 => Self::Read8,
            2 => Self::Read16,
            3 => Self::Read32,
            4 => Self::Read32NonFatal,
            5 => Self::Write8,
            6 => Self::Write16,
            7 => Self::Write32,
            8 => Self::Memset32,
            9 => Self::End,
            other => Self::Unknown(other),
        }
    }

    /// Access width for read/write kinds, `None` otherwise.
    #[must_use]
    pub fn access_size(&self) -> Option<AccessSize> {
        match self {
            Self::Read8 | Self::Write8 => Some(AccessSize::Byte),
            Self::Read16 | Self::Write16 => Some(AccessSize::Half),
            Self::Read32 | Self::Read32NonFatal | Self::Write32 => Some(AccessSize::Word),
            _ => None,
        }
    }
}

/// One step of a recorded trace.
#[derive(Debug, Clone)]
pub struct Record {
    /// The operation.
    pub kind: RecordKind,
    /// Which bus master executes it.
    pub executor: Executor,
    /// Target address (interrupt number for [`RecordKind::IrqCheck`]).
    pub addr: u32,
    /// Expected value for reads and IRQ status (0/1), written value for
    /// writes, fill value for memset.
    pub value: u32,
    /// Word count for [`RecordKind::Memset32`], zero otherwise.
    pub count: u32,
    /// Human-readable label from the recorder; not load-bearing.
    pub label: String,
}

impl Record {
    fn new(kind: RecordKind, executor: Executor, addr: u32, value: u32, label: &str) -> Self {
        Self {
            kind,
            executor,
            addr,
            value,
            count: 0,
            label: label.to_string(),
        }
    }

    /// Sized read with an expected value.
    #[must_use]
    pub fn read(size: AccessSize, executor: Executor, addr: u32, expected: u32, label: &str) -> Self {
        let kind = match size {
            AccessSize::Byte => RecordKind::Read8,
            AccessSize::Half => RecordKind::Read16,
            AccessSize::Word => RecordKind::Read32,
        };
        Self::new(kind, executor, addr, expected, label)
    }

    /// 32-bit read with an expected value.
    #[must_use]
    pub fn read32(executor: Executor, addr: u32, expected: u32, label: &str) -> Self {
        Self::new(RecordKind::Read32, executor, addr, expected, label)
    }

    /// 32-bit read whose mismatch does not stop the replay.
    #[must_use]
    pub fn read32_nonfatal(executor: Executor, addr: u32, expected: u32, label: &str) -> Self {
        Self::new(RecordKind::Read32NonFatal, executor, addr, expected, label)
    }

    /// Sized write.
    #[must_use]
    pub fn write(size: AccessSize, executor: Executor, addr: u32, value: u32, label: &str) -> Self {
        let kind = match size {
            AccessSize::Byte => RecordKind::Write8,
            AccessSize::Half => RecordKind::Write16,
            AccessSize::Word => RecordKind::Write32,
        };
        Self::new(kind, executor, addr, value, label)
    }

    /// 32-bit write.
    #[must_use]
    pub fn write32(executor: Executor, addr: u32, value: u32, label: &str) -> Self {
        Self::new(RecordKind::Write32, executor, addr, value, label)
    }

    /// Latched-IRQ status check. `asserted` is the expected state.
    #[must_use]
    pub fn irq_check(irq: u32, asserted: bool, label: &str) -> Self {
        Self::new(RecordKind::IrqCheck, Executor::Host, irq, u32::from(asserted), label)
    }

    /// Host-side fill of `count` words starting at `addr`.
    #[must_use]
    pub fn memset32(addr: u32, value: u32, count: u32, label: &str) -> Self {
        Self {
            count,
            ..Self::new(RecordKind::Memset32, Executor::Host, addr, value, label)
        }
    }

    /// Trace terminator.
    #[must_use]
    pub fn end() -> Self {
        Self::new(RecordKind::End, Executor::Host, 0, 0, "end")
    }

    /// Build a record from raw recorded fields.
    #[must_use]
    pub fn from_raw(
        code: u32,
        executor: Executor,
        val1: u32,
        val2: u32,
        val3: u32,
        label: &str,
    ) -> Self {
        Self {
            kind: RecordKind::from_code(code),
            executor,
            addr: val1,
            value: val2,
            count: val3,
            label: label.to_string(),
        }
    }
}
