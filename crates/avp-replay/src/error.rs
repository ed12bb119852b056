//! Error types for the replay stack.

use thiserror::Error;

use crate::bus::{AccessSize, AddrSpan};
use crate::record::Executor;

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, AvpError>;

/// Errors that can occur while mapping the window or replaying a trace.
#[derive(Debug, Error)]
pub enum AvpError {
    /// I/O error while setting up the memory window.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Access footprint falls outside the mapped window.
    #[error("address {addr:#010x}+{len} outside mapped window {span}")]
    OutOfWindow {
        /// Start of the offending access.
        addr: u32,
        /// Footprint in bytes.
        len: u32,
        /// The mapped window bounds.
        span: AddrSpan,
    },

    /// Access address not aligned to its size.
    #[error("misaligned {size}-bit access at {addr:#010x}")]
    Misaligned {
        /// Offending address.
        addr: u32,
        /// Access width in bits.
        size: u32,
    },

    /// Coprocessor did not complete a mailbox command in time.
    #[error("coprocessor command timeout after {duration_ms}ms (action={action:#x})")]
    Timeout {
        /// Total time waited, in milliseconds.
        duration_ms: u64,
        /// Action code still pending in the mailbox.
        action: u32,
    },

    /// Observed read value differs from the recorded expectation.
    #[error(
        "step {step}: {executor:?} read of {addr:#010x} = {observed:#010x}, expected {expected:#010x}"
    )]
    Mismatch {
        /// Trace step index.
        step: usize,
        /// Which bus master performed the read.
        executor: Executor,
        /// Address that was read.
        addr: u32,
        /// Value actually observed.
        observed: u32,
        /// Value the trace recorded.
        expected: u32,
    },

    /// Latched IRQ status did not reach the recorded state within the
    /// retry window.
    #[error("step {step}: IRQ {irq} [{label}] status {observed}, expected {expected}")]
    IrqMismatch {
        /// Trace step index.
        step: usize,
        /// Interrupt line number.
        irq: u32,
        /// Record label.
        label: String,
        /// Observed latched status.
        observed: bool,
        /// Expected latched status.
        expected: bool,
    },

    /// A record kind the engine does not understand was reached.
    #[error("step {step}: malformed trace, unknown record kind {code:#x}")]
    MalformedTrace {
        /// Trace step index.
        step: usize,
        /// Raw kind code.
        code: u32,
    },

    /// A record is internally inconsistent (e.g. coprocessor-side memset).
    #[error("step {step}: invalid record: {reason}")]
    InvalidRecord {
        /// Trace step index.
        step: usize,
        /// What is wrong with it.
        reason: String,
    },
}

impl AvpError {
    /// Create a misaligned-access error.
    pub fn misaligned(addr: u32, size: AccessSize) -> Self {
        Self::Misaligned {
            addr,
            size: size.bits(),
        }
    }

    /// Create an out-of-window error.
    pub fn out_of_window(addr: u32, len: u32, span: AddrSpan) -> Self {
        Self::OutOfWindow { addr, len, span }
    }

    /// Process exit code for this failure.
    ///
    /// Stable codes for external tooling: 1 = value mismatch,
    /// 2 = malformed trace, 4 = IRQ status mismatch. Everything else
    /// fatal (window/config/timeout/I-O) exits 3 so a setup fault is
    /// never mistaken for a trace verdict.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Mismatch { .. } => 1,
            Self::MalformedTrace { .. } | Self::InvalidRecord { .. } => 2,
            Self::IrqMismatch { .. } => 4,
            _ => 3,
        }
    }
}
