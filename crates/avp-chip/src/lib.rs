//! Silicon model for the AVP trace-replay target.
//!
//! This crate has **no dependencies** and **no hardware access** — it is a
//! pure model of the SoC pieces the replay stack touches: the mailbox
//! command protocol, the flow controller, the clock/reset controller, the
//! interrupt-controller banks, and the firmware load/entry layout.
//!
//! All offsets are physical addresses inside the mapped I/O window and are
//! plain configuration. The defaults match the Tegra20-class SoC the
//! original trace recorder targeted; nothing downstream derives them.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`mailbox`] | Mailbox action codes and slot layout |
//! | [`regs`] | Flow / clock-reset / interrupt-controller register map |
//! | [`config`] | Configuration structs consumed by the driver crate |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod mailbox;
pub mod regs;

pub use config::{AliasWindow, ClockRegs, FlowCtrlRegs, IrqRegs, SocConfig};
pub use mailbox::MailboxLayout;
