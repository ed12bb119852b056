//! End-to-end replay tests against the simulated window with a live
//! coprocessor interpreter thread.
//!
//! The window layout used throughout:
//!
//! ```text
//! [0x1000, 0x2000)  simulated window
//!   0x1100  mailbox (arg1, arg2, result, action)
//!   0x1400  scratch RAM the traces poke
//!   0x1800  interrupt controller banks (latched status at +0x10, stride 0x40)
//!   0x1a04  flow controller HALT_COP_EVENTS
//!   0x1b00  clock enable clear / 0x1b04 set
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use avp_chip::config::{ClockRegs, FlowCtrlRegs, IrqRegs, SocConfig};
use avp_chip::mailbox::{action, MailboxLayout};
use avp_replay::{
    AccessSize, AvpError, CoprocCore, CoprocCtl, CoprocHandle, Executor, HostBus, PollPolicy,
    Record, RemoteClient, ReplayConfig, ReplayEngine, SimWindow,
};

const MAILBOX: u32 = 0x1100;
const SCRATCH: u32 = 0x1400;
const IRQ_BASE: u32 = 0x1800;
const FLOW_REG: u32 = 0x1a04;

struct Rig {
    bus: Arc<SimWindow>,
    engine: ReplayEngine<SimWindow>,
    mailbox: MailboxLayout,
    irq: IrqRegs,
    _core: Option<CoprocHandle>,
}

fn rig(with_core: bool, config: ReplayConfig) -> Rig {
    let bus = Arc::new(SimWindow::new(0x1000, 0x1000));
    let mailbox = MailboxLayout::at(MAILBOX);
    let flow = FlowCtrlRegs {
        halt_events: FLOW_REG,
        ..FlowCtrlRegs::default()
    };
    let clock = ClockRegs {
        enb_set: 0x1b04,
        enb_clr: 0x1b00,
        settle_us: 0,
        ..ClockRegs::default()
    };
    let irq = IrqRegs {
        base: IRQ_BASE,
        latched_offset: 0x10,
        bank_stride: 0x40,
        bank_count: 4,
    };

    let core = with_core.then(|| CoprocCore::new(mailbox, flow).spawn(Arc::clone(&bus)));

    let client = RemoteClient::new(mailbox, CoprocCtl::new(flow, clock), None)
        .with_poll_policy(PollPolicy {
            interval: Duration::from_micros(100),
            max_polls: 500,
        });

    let engine = ReplayEngine::new(Arc::clone(&bus), client, irq, config);
    Rig {
        bus,
        engine,
        mailbox,
        irq,
        _core: core,
    }
}

fn fast_config() -> ReplayConfig {
    ReplayConfig {
        host_write_settle: Duration::ZERO,
        irq_poll_interval: Duration::from_micros(200),
        ..ReplayConfig::default()
    }
}

#[test]
fn round_trip_all_sizes_both_executors() {
    let rig = rig(true, fast_config());

    let mut trace = Vec::new();
    for (i, &exec) in [Executor::Host, Executor::Coprocessor].iter().enumerate() {
        let base = SCRATCH + (i as u32) * 0x40;
        trace.push(Record::write(AccessSize::Word, exec, base, 0x1234_5678, "w32"));
        trace.push(Record::read(AccessSize::Word, exec, base, 0x1234_5678, "r32"));
        trace.push(Record::write(AccessSize::Half, exec, base + 8, 0xabcd, "w16"));
        trace.push(Record::read(AccessSize::Half, exec, base + 8, 0xabcd, "r16"));
        trace.push(Record::write(AccessSize::Byte, exec, base + 12, 0x5a, "w8"));
        trace.push(Record::read(AccessSize::Byte, exec, base + 12, 0x5a, "r8"));
    }
    // cross-executor visibility: the value the coprocessor wrote is what
    // the host reads back, and vice versa
    trace.push(Record::write32(Executor::Coprocessor, SCRATCH + 0x80, 0xfeed_face, "avp w"));
    trace.push(Record::read32(Executor::Host, SCRATCH + 0x80, 0xfeed_face, "cpu r"));
    trace.push(Record::write32(Executor::Host, SCRATCH + 0x84, 0x0bad_cafe, "cpu w"));
    trace.push(Record::read32(Executor::Coprocessor, SCRATCH + 0x84, 0x0bad_cafe, "avp r"));

    let report = rig.engine.replay(&trace).unwrap();
    assert_eq!(report.steps_run, trace.len());
    assert_eq!(report.nonfatal_mismatches, 0);
    assert!(!report.ended_by_end);
}

#[test]
fn mailbox_idle_before_and_after_every_call() {
    let rig = rig(true, fast_config());
    let client = RemoteClient::new(
        rig.mailbox,
        CoprocCtl::new(
            FlowCtrlRegs { halt_events: FLOW_REG, ..FlowCtrlRegs::default() },
            ClockRegs { enb_set: 0x1b04, enb_clr: 0x1b00, settle_us: 0, ..ClockRegs::default() },
        ),
        None,
    )
    .with_poll_policy(PollPolicy {
        interval: Duration::from_micros(100),
        max_polls: 500,
    });

    let idle = |bus: &SimWindow| {
        bus.read(AccessSize::Word, rig.mailbox.action).unwrap() == action::IDLE
    };

    assert!(idle(&rig.bus));
    client.write(&*rig.bus, SCRATCH, 42, AccessSize::Word).unwrap();
    assert!(idle(&rig.bus));
    assert_eq!(client.read(&*rig.bus, SCRATCH, AccessSize::Word).unwrap(), 42);
    assert!(idle(&rig.bus));
    client.probe(&*rig.bus).unwrap();
    assert!(idle(&rig.bus));
}

#[test]
fn write_then_read_replays_clean() {
    let rig = rig(true, fast_config());
    let trace = vec![
        Record::write32(Executor::Coprocessor, SCRATCH, 0xdead_beef, "store"),
        Record::read32(Executor::Coprocessor, SCRATCH, 0xdead_beef, "verify"),
    ];
    let report = rig.engine.replay(&trace).unwrap();
    assert_eq!(report.steps_run, 2);
}

#[test]
fn mismatch_halts_before_next_record() {
    let rig = rig(true, fast_config());
    let trace = vec![
        Record::write32(Executor::Host, SCRATCH, 0x1111, "store"),
        Record::read32(Executor::Host, SCRATCH, 0x2222, "wrong expectation"),
        Record::write32(Executor::Host, SCRATCH + 4, 0x3333, "must never run"),
    ];
    let err = rig.engine.replay(&trace).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(matches!(err, AvpError::Mismatch { step: 1, .. }));

    // the record after the mismatch never executed
    assert_eq!(rig.bus.read(AccessSize::Word, SCRATCH + 4).unwrap(), 0);
}

#[test]
fn nonfatal_mismatch_logs_and_continues() {
    let rig = rig(true, fast_config());
    let trace = vec![
        Record::write32(Executor::Host, SCRATCH, 0x1111, "store"),
        Record::read32_nonfatal(Executor::Host, SCRATCH, 0x2222, "tolerated"),
        Record::write32(Executor::Host, SCRATCH + 4, 0x3333, "still runs"),
    ];
    let report = rig.engine.replay(&trace).unwrap();
    assert_eq!(report.steps_run, 3);
    assert_eq!(report.nonfatal_mismatches, 1);
    assert_eq!(rig.bus.read(AccessSize::Word, SCRATCH + 4).unwrap(), 0x3333);
}

#[test]
fn irq_asserting_within_window_passes() {
    let rig = rig(false, fast_config());
    let irq_line = 69; // bank 2, bit 5
    let (reg, mask) = rig.irq.latched_status(irq_line).unwrap();

    // latch the bit from "hardware" after ~10 poll intervals
    let bus = Arc::clone(&rig.bus);
    let flipper = thread::spawn(move || {
        thread::sleep(Duration::from_micros(200) * 10);
        bus.write(AccessSize::Word, reg, mask).unwrap();
    });

    let trace = vec![Record::irq_check(irq_line, true, "usb")];
    let report = rig.engine.replay(&trace).unwrap();
    assert_eq!(report.steps_run, 1);
    flipper.join().unwrap();
}

#[test]
fn irq_never_asserting_exhausts_retries() {
    let rig = rig(false, fast_config());
    let trace = vec![Record::irq_check(5, true, "never fires")];
    let err = rig.engine.replay(&trace).unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(matches!(
        err,
        AvpError::IrqMismatch { irq: 5, observed: false, expected: true, .. }
    ));
}

#[test]
fn irq_expected_deasserted_checks_once() {
    let rig = rig(false, fast_config());

    // deasserted line passes immediately
    let trace = vec![Record::irq_check(7, false, "quiet line")];
    rig.engine.replay(&trace).unwrap();

    // asserted line expected deasserted fails without the retry window
    let (reg, mask) = rig.irq.latched_status(7).unwrap();
    rig.bus.write(AccessSize::Word, reg, mask).unwrap();
    let err = rig.engine.replay(&trace).unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn memset_then_sequential_reads() {
    let rig = rig(true, fast_config());
    let n = 16;
    let mut trace = vec![Record::memset32(SCRATCH, 0xa5a5_a5a5, n, "fill")];
    for i in 0..n {
        trace.push(Record::read32(
            Executor::Host,
            SCRATCH + i * 4,
            0xa5a5_a5a5,
            "fill check",
        ));
    }
    // word before and after the fill untouched
    trace.push(Record::read32(Executor::Host, SCRATCH - 4, 0, "below fill"));
    trace.push(Record::read32(Executor::Host, SCRATCH + n * 4, 0, "above fill"));

    let report = rig.engine.replay(&trace).unwrap();
    assert_eq!(report.steps_run, trace.len());
}

#[test]
fn end_stops_trailing_records() {
    let rig = rig(true, fast_config());
    let trace = vec![
        Record::write32(Executor::Host, SCRATCH, 1, "runs"),
        Record::end(),
        Record::write32(Executor::Host, SCRATCH + 4, 2, "never runs"),
        Record::from_raw(0xffff, Executor::Host, 0, 0, 0, "never reached"),
    ];
    let report = rig.engine.replay(&trace).unwrap();
    assert!(report.ended_by_end);
    assert_eq!(report.steps_run, 2);
    assert_eq!(rig.bus.read(AccessSize::Word, SCRATCH).unwrap(), 1);
    assert_eq!(rig.bus.read(AccessSize::Word, SCRATCH + 4).unwrap(), 0);
}

#[test]
fn dead_coprocessor_times_out() {
    // no interpreter thread: the command is never consumed
    let rig = rig(false, fast_config());
    let client = RemoteClient::new(
        rig.mailbox,
        CoprocCtl::new(
            FlowCtrlRegs { halt_events: FLOW_REG, ..FlowCtrlRegs::default() },
            ClockRegs { enb_set: 0x1b04, enb_clr: 0x1b00, settle_us: 0, ..ClockRegs::default() },
        ),
        None,
    )
    .with_poll_policy(PollPolicy {
        interval: Duration::from_micros(100),
        max_polls: 20,
    });

    let err = client.read(&*rig.bus, SCRATCH, AccessSize::Word).unwrap_err();
    assert!(matches!(err, AvpError::Timeout { .. }));
    assert_eq!(err.exit_code(), 3);

    // the client halted the core again even though the wait failed
    let flow = rig.bus.read(AccessSize::Word, FLOW_REG).unwrap();
    assert_eq!(flow, FlowCtrlRegs::default().mode_stop);
}

#[test]
fn alias_window_remaps_coproc_target() {
    let bus = Arc::new(SimWindow::new(0x1000, 0x1000));
    let mailbox = MailboxLayout::at(MAILBOX);
    let flow = FlowCtrlRegs { halt_events: FLOW_REG, ..FlowCtrlRegs::default() };
    let clock = ClockRegs { enb_set: 0x1b04, enb_clr: 0x1b00, settle_us: 0, ..ClockRegs::default() };
    let core = CoprocCore::new(mailbox, flow).spawn(Arc::clone(&bus));

    // "low RAM" below 0x100 aliases into the scratch area
    let alias = avp_chip::config::AliasWindow { limit: 0x100, offset: SCRATCH };
    let client = RemoteClient::new(mailbox, CoprocCtl::new(flow, clock), Some(alias))
        .with_poll_policy(PollPolicy {
            interval: Duration::from_micros(100),
            max_polls: 500,
        });

    client.write(&*bus, 0x10, 0x77, AccessSize::Word).unwrap();
    // the store landed in the alias target, visible to a host read there
    assert_eq!(bus.read(AccessSize::Word, SCRATCH + 0x10).unwrap(), 0x77);
    assert_eq!(client.read(&*bus, 0x10, AccessSize::Word).unwrap(), 0x77);

    core.shutdown();
}

#[test]
fn firmware_bring_up_sequence() {
    let bus = Arc::new(SimWindow::new(0x1000, 0x1000));
    let soc = SocConfig {
        mailbox: MailboxLayout::at(MAILBOX),
        flow: FlowCtrlRegs { halt_events: FLOW_REG, ..FlowCtrlRegs::default() },
        clock: ClockRegs { enb_set: 0x1b04, enb_clr: 0x1b00, settle_us: 0, ..ClockRegs::default() },
        reset_vector: 0x1f00,
        ..SocConfig::tegra20()
    };
    let ctl = CoprocCtl::new(soc.flow, soc.clock);

    // the original bring-up order: stop, install, start
    ctl.power_off(&*bus).unwrap();
    let fw = avp_replay::FirmwareImage {
        bytes: vec![0u8; 64],
        load_addr: 0x1c00,
        entry: 0x1c00,
    };
    fw.install(&*bus, &soc).unwrap();
    ctl.power_on(&*bus).unwrap();

    assert_eq!(bus.read(AccessSize::Word, 0x1f00).unwrap(), 0x1c00);
    assert_eq!(
        bus.read(AccessSize::Word, soc.mailbox.action).unwrap(),
        action::IDLE
    );
    // still halted until a transaction runs it
    assert_eq!(
        bus.read(AccessSize::Word, FLOW_REG).unwrap(),
        soc.flow.mode_stop
    );
}
