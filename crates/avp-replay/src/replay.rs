//! Replay engine: applies a recorded trace and verifies every outcome.
//!
//! Records are consumed strictly in order, optionally skipping a
//! configured prefix. Each access is range-checked against the mapped
//! window before it is dispatched — an out-of-window address is a
//! configuration fault, reported distinctly from a value mismatch. The
//! engine is the single aggregation point: it alone decides whether a
//! failure is fatal, and the first fatal failure stops the replay.
//!
//! One engine, one session: the mailbox has no arbitration, so running
//! two engines over the same window is a protocol violation. Do not.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use avp_chip::config::IrqRegs;

use crate::bus::{AccessSize, HostBus};
use crate::client::RemoteClient;
use crate::error::{AvpError, Result};
use crate::record::{Executor, Record, RecordKind};

/// Replay tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    /// Number of leading records to skip.
    pub skip_first: usize,
    /// Settle delay after a host-side write (the recorder's bus was
    /// slower than ours; back-to-back host writes can outrun IRQ
    /// propagation).
    pub host_write_settle: Duration,
    /// Delay between latched-IRQ status polls.
    pub irq_poll_interval: Duration,
    /// Maximum status polls while waiting for an expected assertion.
    pub irq_max_polls: u32,
}

impl Default for ReplayConfig {
    /// 1 ms settle, 40 × 1 ms IRQ window, no skip.
    fn default() -> Self {
        Self {
            skip_first: 0,
            host_write_settle: Duration::from_millis(1),
            irq_poll_interval: Duration::from_millis(1),
            irq_max_polls: 40,
        }
    }
}

/// Outcome of a successful replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records actually executed (skipped prefix excluded).
    pub steps_run: usize,
    /// Mismatches on non-fatal reads that were logged and passed over.
    pub nonfatal_mismatches: usize,
    /// Whether an END record stopped the replay (false: trace exhausted).
    pub ended_by_end: bool,
}

/// Trace replay engine.
pub struct ReplayEngine<B: HostBus> {
    bus: Arc<B>,
    client: RemoteClient,
    irq: IrqRegs,
    config: ReplayConfig,
}

impl<B: HostBus> ReplayEngine<B> {
    /// Create an engine over a mapped window and a remote-access client.
    #[must_use]
    pub fn new(bus: Arc<B>, client: RemoteClient, irq: IrqRegs, config: ReplayConfig) -> Self {
        Self {
            bus,
            client,
            irq,
            config,
        }
    }

    /// Replay the trace to END, exhaustion, or the first fatal failure.
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure; [`AvpError::exit_code`] maps it
    /// to the stable process exit code.
    pub fn replay(&self, trace: &[Record]) -> Result<ReplayReport> {
        let mut report = ReplayReport {
            steps_run: 0,
            nonfatal_mismatches: 0,
            ended_by_end: false,
        };

        for (step, rec) in trace.iter().enumerate() {
            if step < self.config.skip_first {
                continue;
            }

            tracing::info!(
                "step {step}: {} {:?} {:#010x} [{}]",
                rec.executor,
                rec.kind,
                rec.addr,
                rec.label
            );

            match rec.kind {
                RecordKind::Read8
                | RecordKind::Read16
                | RecordKind::Read32
                | RecordKind::Read32NonFatal => {
                    let nonfatal = rec.kind == RecordKind::Read32NonFatal;
                    let size = rec.kind.access_size().unwrap_or(AccessSize::Word);
                    self.check_window(rec.addr, size.bytes())?;

                    let observed = match rec.executor {
                        Executor::Host => self.bus.read(size, rec.addr)?,
                        Executor::Coprocessor => self.client.read(&*self.bus, rec.addr, size)?,
                    };

                    if observed != rec.value {
                        let err = AvpError::Mismatch {
                            step,
                            executor: rec.executor,
                            addr: rec.addr,
                            observed,
                            expected: rec.value,
                        };
                        if nonfatal {
                            tracing::warn!("nonfatal: {err}");
                            report.nonfatal_mismatches += 1;
                        } else {
                            return Err(err);
                        }
                    }
                }

                RecordKind::Write8 | RecordKind::Write16 | RecordKind::Write32 => {
                    let size = rec.kind.access_size().unwrap_or(AccessSize::Word);
                    self.check_window(rec.addr, size.bytes())?;

                    match rec.executor {
                        Executor::Host => {
                            self.bus.write(size, rec.addr, rec.value)?;
                            thread::sleep(self.config.host_write_settle);
                        }
                        Executor::Coprocessor => {
                            self.client.write(&*self.bus, rec.addr, rec.value, size)?;
                        }
                    }
                }

                RecordKind::IrqCheck => {
                    self.check_irq(step, rec)?;
                }

                RecordKind::Memset32 => {
                    if rec.executor != Executor::Host {
                        return Err(AvpError::InvalidRecord {
                            step,
                            reason: "MEMSET32 is host-only (the mailbox has no fill command)"
                                .into(),
                        });
                    }
                    let len = rec
                        .count
                        .checked_mul(4)
                        .ok_or_else(|| AvpError::out_of_window(rec.addr, u32::MAX, self.bus.span()))?;
                    self.check_window(rec.addr, len)?;
                    for i in 0..rec.count {
                        self.bus.write(AccessSize::Word, rec.addr + i * 4, rec.value)?;
                    }
                }

                RecordKind::End => {
                    tracing::info!("reached END at step {step}");
                    report.steps_run += 1;
                    report.ended_by_end = true;
                    break;
                }

                RecordKind::Unknown(code) => {
                    return Err(AvpError::MalformedTrace { step, code });
                }
            }

            report.steps_run += 1;
        }

        tracing::info!(
            "replay completed: {} steps, {} nonfatal mismatches",
            report.steps_run,
            report.nonfatal_mismatches
        );
        Ok(report)
    }

    /// Verify a latched-IRQ expectation with the propagation-latency
    /// tolerance window.
    ///
    /// Expected-asserted waits up to the configured poll budget for the
    /// bit to latch, breaking as soon as it does; the comparison after
    /// the loop is the verdict either way. Expected-deasserted settles
    /// one interval and checks once — a bit that might still assert
    /// later is exactly what the recording said must not have happened
    /// yet.
    fn check_irq(&self, step: usize, rec: &Record) -> Result<()> {
        let irq = rec.addr;
        let expected = rec.value != 0;

        thread::sleep(self.config.irq_poll_interval);
        let mut observed = self.irq_status(step, irq)?;

        if expected {
            let mut polls = self.config.irq_max_polls;
            while !observed && polls > 0 {
                polls -= 1;
                thread::sleep(self.config.irq_poll_interval);
                observed = self.irq_status(step, irq)?;
            }
        }

        if observed == expected {
            Ok(())
        } else {
            Err(AvpError::IrqMismatch {
                step,
                irq,
                label: rec.label.clone(),
                observed,
                expected,
            })
        }
    }

    /// Read the latched status bit of one interrupt line.
    fn irq_status(&self, step: usize, irq: u32) -> Result<bool> {
        let (reg, mask) = self.irq.latched_status(irq).ok_or_else(|| {
            AvpError::InvalidRecord {
                step,
                reason: format!(
                    "IRQ {irq} outside the {} configured banks",
                    self.irq.bank_count
                ),
            }
        })?;
        Ok(self.bus.read(AccessSize::Word, reg)? & mask != 0)
    }

    /// Fatal configuration check: the access footprint must lie inside
    /// the mapped window. Never clamped.
    fn check_window(&self, addr: u32, len: u32) -> Result<()> {
        let span = self.bus.span();
        if span.contains(addr, len) {
            Ok(())
        } else {
            Err(AvpError::out_of_window(addr, len, span))
        }
    }
}
