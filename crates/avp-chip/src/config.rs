//! Configuration structs consumed by the driver crate.
//!
//! Every register address the driver touches arrives through one of these
//! structs. Defaults are the Tegra20-class values from [`crate::regs`];
//! a different SoC revision supplies its own.

use crate::mailbox::MailboxLayout;
use crate::regs;

/// Flow-controller registers gating coprocessor instruction fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowCtrlRegs {
    /// Halt-events request register.
    pub halt_events: u32,
    /// Value asserting the halt request.
    pub mode_stop: u32,
    /// Value clearing the halt request.
    pub mode_none: u32,
}

impl Default for FlowCtrlRegs {
    fn default() -> Self {
        Self {
            halt_events: regs::FLOW_CTRL_HALT_COP_EVENTS,
            mode_stop: regs::flow_mode::STOP,
            mode_none: regs::flow_mode::NONE,
        }
    }
}

/// Clock/reset controller registers gating the coprocessor clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRegs {
    /// Write-1-to-ungate register.
    pub enb_set: u32,
    /// Write-1-to-gate register.
    pub enb_clr: u32,
    /// Coprocessor clock-enable bit.
    pub enb_bit: u32,
    /// Settle delay after gating the clock, in microseconds.
    pub settle_us: u64,
}

impl Default for ClockRegs {
    fn default() -> Self {
        Self {
            enb_set: regs::CLK_ENB_SET,
            enb_clr: regs::CLK_ENB_CLR,
            enb_bit: regs::CLK_ENB_COP,
            settle_us: 1000,
        }
    }
}

/// Interrupt-controller bank layout for latched-status lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqRegs {
    /// First bank base address.
    pub base: u32,
    /// Offset of the latched-status register within a bank.
    pub latched_offset: u32,
    /// Address stride between banks.
    pub bank_stride: u32,
    /// Number of 32-line banks.
    pub bank_count: u32,
}

impl IrqRegs {
    /// Latched-status register address for an interrupt line, or `None`
    /// if the line falls outside the configured banks.
    #[must_use]
    pub fn latched_status(&self, irq: u32) -> Option<(u32, u32)> {
        let bank = irq / 32;
        if bank >= self.bank_count {
            return None;
        }
        let reg = self.base + self.latched_offset + bank * self.bank_stride;
        let mask = 1 << (irq % 32);
        Some((reg, mask))
    }
}

impl Default for IrqRegs {
    fn default() -> Self {
        Self {
            base: regs::ICTLR_BASE,
            latched_offset: regs::ICTLR_IRQ_LATCHED,
            bank_stride: regs::ICTLR_BANK_STRIDE,
            bank_count: regs::ICTLR_BANK_COUNT,
        }
    }
}

/// Uncached-alias remap for coprocessor accesses to low host RAM.
///
/// The coprocessor must not use the cached alias of host RAM, so
/// addresses below `limit` are remapped to `addr + offset` before being
/// placed in the mailbox. Hardware-specific; pure configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasWindow {
    /// Addresses strictly below this boundary are remapped.
    pub limit: u32,
    /// Remap displacement into the uncached alias.
    pub offset: u32,
}

impl AliasWindow {
    /// Apply the remap to a coprocessor-side target address.
    #[must_use]
    pub const fn remap(&self, addr: u32) -> u32 {
        if addr < self.limit {
            addr.wrapping_add(self.offset)
        } else {
            addr
        }
    }
}

/// Aggregate SoC configuration for one replay target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocConfig {
    /// Mailbox slot addresses.
    pub mailbox: MailboxLayout,
    /// Flow-controller registers.
    pub flow: FlowCtrlRegs,
    /// Clock-gate registers.
    pub clock: ClockRegs,
    /// Interrupt-controller banks.
    pub irq: IrqRegs,
    /// Optional uncached-alias remap for coprocessor accesses.
    pub alias: Option<AliasWindow>,
    /// Reset-vector slot the firmware entry address is written to.
    pub reset_vector: u32,
}

impl SocConfig {
    /// Tegra20-class defaults.
    #[must_use]
    pub fn tegra20() -> Self {
        Self::default()
    }
}

impl Default for SocConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxLayout::default(),
            flow: FlowCtrlRegs::default(),
            clock: ClockRegs::default(),
            irq: IrqRegs::default(),
            alias: None,
            reset_vector: regs::avp::RESET_VECTOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_bank_lookup() {
        let irq = IrqRegs::default();
        let (reg0, mask0) = irq.latched_status(5).unwrap();
        assert_eq!(reg0, 0x6000_4010);
        assert_eq!(mask0, 1 << 5);

        let (reg2, mask2) = irq.latched_status(69).unwrap();
        assert_eq!(reg2, 0x6000_4210);
        assert_eq!(mask2, 1 << 5);

        assert!(irq.latched_status(128).is_none());
    }

    #[test]
    fn alias_remaps_only_below_limit() {
        let alias = AliasWindow { limit: 0x4000_0000, offset: 0x8000_0000 };
        assert_eq!(alias.remap(0x1000), 0x8000_1000);
        assert_eq!(alias.remap(0x4000_0000), 0x4000_0000);
        assert_eq!(alias.remap(0x6000_7004), 0x6000_7004);
    }
}
