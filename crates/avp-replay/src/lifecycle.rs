//! Coprocessor lifecycle control: clock gating and flow-control halt.
//!
//! The flow controller stops instruction fetch without resetting the
//! core; the clock/reset controller gates the clock entirely. Every
//! mailbox transaction brackets its completion wait with `run()` /
//! `halt()` so the coprocessor spends no time executing unobserved — any
//! extra bus traffic would pollute the trace's expected IRQ and
//! side-effect state.

use std::thread;
use std::time::Duration;

use avp_chip::config::{ClockRegs, FlowCtrlRegs};

use crate::bus::{AccessSize, HostBus};
use crate::error::Result;

/// Host-side coprocessor clock/flow controller.
#[derive(Debug, Clone, Copy)]
pub struct CoprocCtl {
    flow: FlowCtrlRegs,
    clock: ClockRegs,
}

impl CoprocCtl {
    /// Create a controller over the configured registers.
    #[must_use]
    pub const fn new(flow: FlowCtrlRegs, clock: ClockRegs) -> Self {
        Self { flow, clock }
    }

    /// Ungate the coprocessor clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock register is outside the window.
    pub fn power_on<B: HostBus>(&self, bus: &B) -> Result<()> {
        tracing::info!("coproc power on");
        bus.write(AccessSize::Word, self.clock.enb_set, self.clock.enb_bit)
    }

    /// Halt flow, gate the clock and wait the SoC's settle delay.
    ///
    /// # Errors
    ///
    /// Returns an error if a register is outside the window.
    pub fn power_off<B: HostBus>(&self, bus: &B) -> Result<()> {
        tracing::info!("coproc power off");
        self.halt(bus)?;
        bus.write(AccessSize::Word, self.clock.enb_clr, self.clock.enb_bit)?;
        thread::sleep(Duration::from_micros(self.clock.settle_us));
        Ok(())
    }

    /// Clear the halt request; instruction fetch proceeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow register is outside the window.
    pub fn run<B: HostBus>(&self, bus: &B) -> Result<()> {
        bus.write(AccessSize::Word, self.flow.halt_events, self.flow.mode_none)
    }

    /// Assert the halt request; the core stops at the next instruction
    /// boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the flow register is outside the window.
    pub fn halt<B: HostBus>(&self, bus: &B) -> Result<()> {
        bus.write(AccessSize::Word, self.flow.halt_events, self.flow.mode_stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sim::SimWindow;

    #[test]
    fn run_halt_toggle_flow_register() {
        let bus = SimWindow::new(0x1000, 0x1000);
        let flow = FlowCtrlRegs { halt_events: 0x1a04, ..FlowCtrlRegs::default() };
        let clock = ClockRegs {
            enb_set: 0x1b04,
            enb_clr: 0x1b00,
            settle_us: 0,
            ..ClockRegs::default()
        };
        let ctl = CoprocCtl::new(flow, clock);

        ctl.halt(&bus).unwrap();
        assert_eq!(bus.read(AccessSize::Word, 0x1a04).unwrap(), flow.mode_stop);

        ctl.run(&bus).unwrap();
        assert_eq!(bus.read(AccessSize::Word, 0x1a04).unwrap(), flow.mode_none);

        ctl.power_on(&bus).unwrap();
        assert_eq!(bus.read(AccessSize::Word, 0x1b04).unwrap(), clock.enb_bit);

        // power_off halts first, then gates
        ctl.power_off(&bus).unwrap();
        assert_eq!(bus.read(AccessSize::Word, 0x1a04).unwrap(), flow.mode_stop);
        assert_eq!(bus.read(AccessSize::Word, 0x1b00).unwrap(), clock.enb_bit);
    }
}
