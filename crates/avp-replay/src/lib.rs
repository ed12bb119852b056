//! Host-side register-trace replay over the AVP coprocessor mailbox.
//!
//! A recorded trace of hardware register interactions is replayed against a
//! live SoC and verified step by step. Accesses tagged for the coprocessor
//! are routed through a single-slot shared-memory mailbox so they originate
//! from the coprocessor's bus master, reproducing the recorded access
//! pattern faithfully (needed e.g. for power/clock-domain debugging).
//!
//! # Backend hierarchy
//!
//! ```text
//! Hardware:
//!   DevMemWindow — /dev/mem mmap of the SoC I/O window (root required)
//!
//! Development / CI:
//!   SimWindow    — atomic word array + CoprocCore interpreter thread
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use avp_chip::SocConfig;
//! use avp_replay::{
//!     CoprocCtl, DevMemWindow, Executor, Record, RemoteClient, ReplayConfig,
//!     ReplayEngine,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let soc = SocConfig::tegra20();
//! let bus = Arc::new(DevMemWindow::map(0x0, 0x7000_0000)?);
//!
//! let client = RemoteClient::new(soc.mailbox, CoprocCtl::new(soc.flow, soc.clock), soc.alias);
//! let engine = ReplayEngine::new(bus, client, soc.irq, ReplayConfig::default());
//!
//! let trace = vec![
//!     Record::write32(Executor::Coprocessor, 0x6000_6000, 0x1, "clk enable"),
//!     Record::read32(Executor::Host, 0x6000_6000, 0x1, "clk readback"),
//!     Record::end(),
//! ];
//! let report = engine.replay(&trace)?;
//! println!("replayed {} steps", report.steps_run);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod backends;
mod bus;
mod client;
mod coproc;
mod error;
mod lifecycle;
mod record;
mod replay;

pub use backends::devmem::DevMemWindow;
pub use backends::sim::SimWindow;
pub use bus::{AccessSize, AddrSpan, HostBus};
pub use client::{PollPolicy, RemoteClient};
pub use coproc::{CoprocCore, CoprocHandle, FirmwareImage, COPROC_MIN_STACK};
pub use error::{AvpError, Result};
pub use lifecycle::CoprocCtl;
pub use record::{Executor, Record, RecordKind};
pub use replay::{ReplayConfig, ReplayEngine, ReplayReport};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AccessSize, AvpError, CoprocCtl, Executor, HostBus, Record, RecordKind, RemoteClient,
        ReplayConfig, ReplayEngine, ReplayReport, Result,
    };
}
