//! SoC register map for the Tegra20-class replay target.
//!
//! Only the registers the replay stack itself drives are modelled: the
//! flow controller (coprocessor halt/run), the clock/reset controller
//! (coprocessor clock gate), the legacy interrupt-controller banks
//! (latched IRQ status), and the AVP reset vector / firmware load base.
//! The trace being replayed addresses everything else as opaque
//! address/value pairs.

// ── Flow controller ──────────────────────────────────────────────────────────

/// HALT_COP_EVENTS — coprocessor flow-control request register.
pub const FLOW_CTRL_HALT_COP_EVENTS: u32 = 0x6000_7004;

/// Flow-control modes written to `HALT_COP_EVENTS`.
pub mod flow_mode {
    /// Stop instruction fetch at the next boundary.
    pub const STOP: u32 = 2 << 29;
    /// No flow-control request; fetch proceeds.
    pub const NONE: u32 = 0;
}

// ── Clock / reset controller ─────────────────────────────────────────────────

/// Clock and reset controller base.
pub const CLK_RST_BASE: u32 = 0x6000_6000;

/// CLK_ENB_L_CLR — write 1 to gate a clock.
pub const CLK_ENB_CLR: u32 = CLK_RST_BASE + 0x300;

/// CLK_ENB_L_SET — write 1 to ungate a clock.
pub const CLK_ENB_SET: u32 = CLK_RST_BASE + 0x304;

/// Clock-enable bit for the COP (AVP) complex.
pub const CLK_ENB_COP: u32 = 1 << 1;

// ── Legacy interrupt controllers ─────────────────────────────────────────────

/// First interrupt-controller bank (PRI_ICTLR).
pub const ICTLR_BASE: u32 = 0x6000_4000;

/// Offset of the latched-status register within each bank.
pub const ICTLR_IRQ_LATCHED: u32 = 0x10;

/// Address stride between banks (PRI/SEC/TRI/QUAD).
pub const ICTLR_BANK_STRIDE: u32 = 0x100;

/// Number of 32-line banks.
pub const ICTLR_BANK_COUNT: u32 = 4;

// ── AVP firmware placement ───────────────────────────────────────────────────

/// AVP-specific fixed addresses.
pub mod avp {
    /// Exception-vector slot the AVP fetches its reset target from.
    pub const RESET_VECTOR: u32 = 0x6000_F200;

    /// Default firmware load base in on-chip RAM.
    pub const CODE_BASE: u32 = 0x4000_0400;

    /// Default mailbox slot base (just below the firmware).
    pub const MAILBOX_BASE: u32 = 0x4000_0100;
}
