//! Mailbox protocol between the host CPU and the AVP coprocessor.
//!
//! Four u32 slots in memory visible to both cores form a single-slot
//! request/response channel. There is no hardware arbitration: the
//! protocol is single-writer by convention — the host owns `arg1`, `arg2`
//! and the IDLE→command edge of `action`; the coprocessor owns `result`
//! and the command→IDLE edge of `action`. At most one command is in
//! flight at any time.

// ── Action codes ─────────────────────────────────────────────────────────────

/// Mailbox action codes.
///
/// `IDLE` doubles as the completion signal: the coprocessor stores it back
/// after finishing a command, and the host must observe it before issuing
/// the next one.
pub mod action {
    /// No command pending / last command complete.
    pub const IDLE: u32 = 0;
    /// Liveness probe — accepted, performs no access.
    pub const NOP: u32 = 1;
    /// 8-bit read at `arg1`.
    pub const READ8: u32 = 2;
    /// 16-bit read at `arg1`.
    pub const READ16: u32 = 3;
    /// 32-bit read at `arg1`.
    pub const READ32: u32 = 4;
    /// 8-bit write of `arg2` at `arg1`.
    pub const WRITE8: u32 = 5;
    /// 16-bit write of `arg2` at `arg1`.
    pub const WRITE16: u32 = 6;
    /// 32-bit write of `arg2` at `arg1`.
    pub const WRITE32: u32 = 7;
}

// ── Slot layout ──────────────────────────────────────────────────────────────

/// Physical addresses of the four mailbox slots.
///
/// The slots live in on-chip RAM just below the firmware load base, but
/// their placement is configuration supplied by the firmware image — the
/// driver never derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxLayout {
    /// First operand (target address of the access).
    pub arg1: u32,
    /// Second operand (value for writes).
    pub arg2: u32,
    /// Result of the last read command.
    pub result: u32,
    /// Pending action code; see [`action`].
    pub action: u32,
}

impl MailboxLayout {
    /// Four consecutive u32 slots starting at `base`.
    #[must_use]
    pub const fn at(base: u32) -> Self {
        Self {
            arg1: base,
            arg2: base + 4,
            result: base + 8,
            action: base + 12,
        }
    }
}

impl Default for MailboxLayout {
    /// Slots immediately below the default firmware load base.
    fn default() -> Self {
        Self::at(crate::regs::avp::MAILBOX_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_distinct() {
        let codes = [
            action::IDLE,
            action::NOP,
            action::READ8,
            action::READ16,
            action::READ32,
            action::WRITE8,
            action::WRITE16,
            action::WRITE32,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn slots_non_overlapping() {
        let mb = MailboxLayout::at(0x4000_0100);
        assert_eq!(mb.arg2 - mb.arg1, 4);
        assert_eq!(mb.result - mb.arg2, 4);
        assert_eq!(mb.action - mb.result, 4);
    }
}
