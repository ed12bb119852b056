//! Coprocessor command interpreter.
//!
//! On real hardware this loop is the firmware blob running on the AVP:
//! drop to a private stack, then spin on the mailbox action slot forever.
//! Here the same state machine runs as a dedicated background thread over
//! a [`HostBus`], which is what makes the full mailbox handshake testable
//! without silicon. The thread owns no state beyond its arg snapshots —
//! the mailbox is its entire interface.
//!
//! The interpreter performs **no address validation**: a bad address in a
//! command faults exactly as a direct access would. Validation belongs to
//! the trace author and the replay engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use avp_chip::config::{FlowCtrlRegs, SocConfig};
use avp_chip::mailbox::{action, MailboxLayout};

use crate::bus::{AccessSize, HostBus};
use crate::error::Result;

/// Minimum working stack the interpreter requires.
///
/// The firmware entry point starts with an unspecified default stack and
/// must switch to a dedicated one at least this large before polling.
pub const COPROC_MIN_STACK: usize = 4 * 1024;

/// Interval between action-slot polls while idle or halted.
const POLL_INTERVAL: Duration = Duration::from_micros(50);

/// The WAIT/EXECUTE interpreter state machine.
///
/// [`CoprocCore::spawn`] runs it on its own named thread; the core only
/// executes while the flow controller is not requesting a halt, so the
/// host's run/halt bracketing is observable in simulation just as on
/// hardware.
#[derive(Debug)]
pub struct CoprocCore {
    mailbox: MailboxLayout,
    flow: FlowCtrlRegs,
}

impl CoprocCore {
    /// Create an interpreter for the given mailbox and flow controller.
    #[must_use]
    pub const fn new(mailbox: MailboxLayout, flow: FlowCtrlRegs) -> Self {
        Self { mailbox, flow }
    }

    /// Start the interpreter on a dedicated thread against `bus`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the thread.
    pub fn spawn<B: HostBus + 'static>(self, bus: Arc<B>) -> CoprocHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("coproc".into())
            // Firmware requirement: a dedicated stack of at least
            // COPROC_MIN_STACK. Give the simulated core a comfortable one.
            .stack_size(COPROC_MIN_STACK * 16)
            .spawn(move || {
                if let Err(e) = self.run(&*bus, &stop_flag) {
                    // A faulting access on the real core data-aborts and
                    // hangs; the simulated core logs and stops, and the
                    // host sees the same thing: a command that never
                    // completes.
                    tracing::error!("coproc fault: {e}");
                }
            })
            .expect("spawn coproc thread");

        CoprocHandle { stop, thread: Some(thread) }
    }

    /// The interpreter loop. Returns only on shutdown or fault.
    fn run<B: HostBus>(&self, bus: &B, stop: &AtomicBool) -> Result<()> {
        tracing::debug!("coproc interpreter up, mailbox {:?}", self.mailbox);

        while !stop.load(Ordering::Relaxed) {
            // Halted: no instruction fetch, so no polling either.
            let flow = bus.read(AccessSize::Word, self.flow.halt_events)?;
            if flow & self.flow.mode_stop != 0 {
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            let act = bus.read(AccessSize::Word, self.mailbox.action)?;
            if act == action::IDLE {
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            // Snapshot the operands before executing so a host overwrite
            // mid-execution cannot tear the command.
            let arg1 = bus.read(AccessSize::Word, self.mailbox.arg1)?;
            let arg2 = bus.read(AccessSize::Word, self.mailbox.arg2)?;

            match act {
                action::READ8 | action::READ16 | action::READ32 => {
                    let size = match act {
                        action::READ8 => AccessSize::Byte,
                        action::READ16 => AccessSize::Half,
                        _ => AccessSize::Word,
                    };
                    let value = bus.read(size, arg1)?;
                    bus.write(AccessSize::Word, self.mailbox.result, value)?;
                }
                action::WRITE8 | action::WRITE16 | action::WRITE32 => {
                    let size = match act {
                        action::WRITE8 => AccessSize::Byte,
                        action::WRITE16 => AccessSize::Half,
                        _ => AccessSize::Word,
                    };
                    bus.write(size, arg1, arg2)?;
                }
                // NOP and anything unrecognized complete without an
                // access; the host uses NOP as a liveness probe.
                _ => {}
            }

            bus.write(AccessSize::Word, self.mailbox.action, action::IDLE)?;
        }

        tracing::debug!("coproc interpreter shut down");
        Ok(())
    }
}

/// Handle to a running simulated core.
///
/// Shutdown exists for test teardown only; real hardware is stopped
/// through the lifecycle controller, not by killing the firmware.
#[derive(Debug)]
pub struct CoprocHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CoprocHandle {
    /// Stop the interpreter thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CoprocHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Coprocessor firmware blob plus its placement.
///
/// Prepared by an external image-build step; this crate only installs it.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    /// Raw firmware bytes.
    pub bytes: Vec<u8>,
    /// Physical address the blob is copied to.
    pub load_addr: u32,
    /// Entry address written to the reset vector.
    pub entry: u32,
}

impl FirmwareImage {
    /// Copy the blob into the window, point the reset vector at its entry
    /// and initialize the mailbox to IDLE.
    ///
    /// The coprocessor must be powered off (clock gated) while this runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob or any register falls outside the
    /// mapped window.
    pub fn install<B: HostBus>(&self, bus: &B, soc: &SocConfig) -> Result<()> {
        tracing::info!(
            "installing firmware: {} bytes at {:#010x}, entry {:#010x}",
            self.bytes.len(),
            self.load_addr,
            self.entry
        );
        bus.write_bytes(self.load_addr, &self.bytes)?;
        bus.write(AccessSize::Word, soc.reset_vector, self.entry)?;
        bus.write(AccessSize::Word, soc.mailbox.action, action::IDLE)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sim::SimWindow;

    fn sim_setup() -> (Arc<SimWindow>, MailboxLayout, FlowCtrlRegs) {
        let bus = Arc::new(SimWindow::new(0x1000, 0x1000));
        let mailbox = MailboxLayout::at(0x1100);
        let flow = FlowCtrlRegs {
            halt_events: 0x1a04,
            ..FlowCtrlRegs::default()
        };
        (bus, mailbox, flow)
    }

    fn wait_idle(bus: &SimWindow, mailbox: &MailboxLayout) {
        for _ in 0..1000 {
            if bus.read(AccessSize::Word, mailbox.action).unwrap() == action::IDLE {
                return;
            }
            thread::sleep(Duration::from_micros(200));
        }
        panic!("coproc never completed the command");
    }

    #[test]
    fn executes_sized_read() {
        let (bus, mailbox, flow) = sim_setup();
        let core = CoprocCore::new(mailbox, flow).spawn(Arc::clone(&bus));

        bus.write(AccessSize::Word, 0x1200, 0xcafe_f00d).unwrap();
        bus.write(AccessSize::Word, mailbox.arg1, 0x1202).unwrap();
        bus.write(AccessSize::Word, mailbox.action, action::READ16).unwrap();

        wait_idle(&bus, &mailbox);
        assert_eq!(bus.read(AccessSize::Word, mailbox.result).unwrap(), 0xcafe);

        core.shutdown();
    }

    #[test]
    fn nop_is_accepted_without_access() {
        let (bus, mailbox, flow) = sim_setup();
        let core = CoprocCore::new(mailbox, flow).spawn(Arc::clone(&bus));

        bus.write(AccessSize::Word, mailbox.action, action::NOP).unwrap();
        wait_idle(&bus, &mailbox);
        assert_eq!(bus.read(AccessSize::Word, mailbox.result).unwrap(), 0);

        core.shutdown();
    }

    #[test]
    fn halted_core_does_not_consume_commands() {
        let (bus, mailbox, flow) = sim_setup();
        let core = CoprocCore::new(mailbox, flow).spawn(Arc::clone(&bus));

        bus.write(AccessSize::Word, flow.halt_events, flow.mode_stop).unwrap();
        bus.write(AccessSize::Word, mailbox.arg1, 0x1200).unwrap();
        bus.write(AccessSize::Word, mailbox.action, action::READ32).unwrap();

        thread::sleep(Duration::from_millis(5));
        assert_eq!(
            bus.read(AccessSize::Word, mailbox.action).unwrap(),
            action::READ32,
            "halted core must not fetch"
        );

        // releasing the halt lets the pending command complete
        bus.write(AccessSize::Word, flow.halt_events, flow.mode_none).unwrap();
        wait_idle(&bus, &mailbox);

        core.shutdown();
    }

    #[test]
    fn firmware_install_points_reset_vector() {
        let (bus, mailbox, _) = sim_setup();
        let soc = SocConfig {
            mailbox,
            reset_vector: 0x1f00,
            ..SocConfig::tegra20()
        };
        let fw = FirmwareImage {
            bytes: vec![0xde, 0xad, 0xbe, 0xef],
            load_addr: 0x1400,
            entry: 0x1400,
        };
        fw.install(&*bus, &soc).unwrap();

        assert_eq!(bus.read(AccessSize::Word, 0x1400).unwrap(), 0xefbe_adde);
        assert_eq!(bus.read(AccessSize::Word, 0x1f00).unwrap(), 0x1400);
        assert_eq!(
            bus.read(AccessSize::Word, mailbox.action).unwrap(),
            action::IDLE
        );
    }
}
