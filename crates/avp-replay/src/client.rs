//! Remote access client: synchronous sized reads/writes executed by the
//! coprocessor on the host's behalf.
//!
//! Each call is one complete mailbox transaction: assert the mailbox is
//! IDLE, place the operands, set the action, let the coprocessor run,
//! sleep-poll for completion, halt the coprocessor again, collect the
//! result. The caller sees an ordinary blocking read/write; the value a
//! read returns reflects memory at the moment the coprocessor executed
//! the access, which is the entire point of routing through it.

use std::thread;
use std::time::Duration;

use avp_chip::config::AliasWindow;
use avp_chip::mailbox::{action, MailboxLayout};

use crate::bus::{AccessSize, HostBus};
use crate::error::{AvpError, Result};
use crate::lifecycle::CoprocCtl;

/// Completion-wait tuning for the mailbox handshake.
///
/// The original handshake looped forever on a dead coprocessor; the
/// bounded attempt count turns that into a distinct fatal
/// [`AvpError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Sleep between completion polls.
    pub interval: Duration,
    /// Maximum number of polls before declaring the coprocessor dead.
    pub max_polls: u32,
}

impl Default for PollPolicy {
    /// 500 µs between polls, up to 2000 polls (~1 s worst case).
    fn default() -> Self {
        Self {
            interval: Duration::from_micros(500),
            max_polls: 2000,
        }
    }
}

/// Host-side wrapper turning the mailbox handshake into synchronous
/// calls.
#[derive(Debug, Clone, Copy)]
pub struct RemoteClient {
    mailbox: MailboxLayout,
    ctl: CoprocCtl,
    alias: Option<AliasWindow>,
    poll: PollPolicy,
}

impl RemoteClient {
    /// Create a client over the configured mailbox and lifecycle
    /// controller.
    #[must_use]
    pub fn new(mailbox: MailboxLayout, ctl: CoprocCtl, alias: Option<AliasWindow>) -> Self {
        Self {
            mailbox,
            ctl,
            alias,
            poll: PollPolicy::default(),
        }
    }

    /// Replace the completion-wait tuning.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sized read executed by the coprocessor.
    ///
    /// # Errors
    ///
    /// Returns [`AvpError::Timeout`] if the coprocessor never completes
    /// the command, or a window error if a mailbox slot is unmapped.
    ///
    /// # Panics
    ///
    /// Panics if the mailbox is not IDLE on entry — that is unmatched
    /// call pairing, a driver defect, never a runtime condition.
    pub fn read<B: HostBus>(&self, bus: &B, addr: u32, size: AccessSize) -> Result<u32> {
        let target = self.remap(addr);
        self.transact(bus, |mb| {
            (
                [(mb.arg1, target)],
                match size {
                    AccessSize::Byte => action::READ8,
                    AccessSize::Half => action::READ16,
                    AccessSize::Word => action::READ32,
                },
            )
        })?;
        let value = bus.read(AccessSize::Word, self.mailbox.result)?;
        tracing::debug!("coproc read{size} {addr:#010x} = {value:#010x}");
        Ok(value)
    }

    /// Sized write executed by the coprocessor.
    ///
    /// # Errors
    ///
    /// Returns [`AvpError::Timeout`] if the coprocessor never completes
    /// the command, or a window error if a mailbox slot is unmapped.
    ///
    /// # Panics
    ///
    /// Panics if the mailbox is not IDLE on entry (unmatched call
    /// pairing).
    pub fn write<B: HostBus>(
        &self,
        bus: &B,
        addr: u32,
        value: u32,
        size: AccessSize,
    ) -> Result<()> {
        let target = self.remap(addr);
        tracing::debug!("coproc write{size} {addr:#010x} = {value:#010x}");
        self.transact(bus, |mb| {
            (
                [(mb.arg1, target), (mb.arg2, value)],
                match size {
                    AccessSize::Byte => action::WRITE8,
                    AccessSize::Half => action::WRITE16,
                    AccessSize::Word => action::WRITE32,
                },
            )
        })
    }

    /// Liveness probe: a NOP transaction that completes without any
    /// memory access.
    ///
    /// # Errors
    ///
    /// Returns [`AvpError::Timeout`] if the coprocessor is dead.
    pub fn probe<B: HostBus>(&self, bus: &B) -> Result<()> {
        self.transact::<B, 0>(bus, |_| ([], action::NOP))
    }

    /// Remap low host-RAM addresses into the uncached alias the
    /// coprocessor must use.
    fn remap(&self, addr: u32) -> u32 {
        match self.alias {
            Some(alias) => alias.remap(addr),
            None => addr,
        }
    }

    /// One full handshake: IDLE precondition, operands, action, run,
    /// bounded completion wait, halt.
    fn transact<B: HostBus, const N: usize>(
        &self,
        bus: &B,
        command: impl FnOnce(&MailboxLayout) -> ([(u32, u32); N], u32),
    ) -> Result<()> {
        let mb = &self.mailbox;

        let pending = bus.read(AccessSize::Word, mb.action)?;
        assert_eq!(
            pending,
            action::IDLE,
            "mailbox busy (action={pending:#x}): unmatched remote call pairing"
        );

        let (operands, act) = command(mb);
        for (slot, value) in operands {
            bus.write(AccessSize::Word, slot, value)?;
        }
        bus.write(AccessSize::Word, mb.action, act)?;

        self.ctl.run(bus)?;
        let wait = self.wait_idle(bus, act);
        // Halt even on timeout so a late completion cannot generate
        // unobserved bus traffic.
        self.ctl.halt(bus)?;
        wait
    }

    fn wait_idle<B: HostBus>(&self, bus: &B, act: u32) -> Result<()> {
        for _ in 0..self.poll.max_polls {
            thread::sleep(self.poll.interval);
            if bus.read(AccessSize::Word, self.mailbox.action)? == action::IDLE {
                return Ok(());
            }
        }
        Err(AvpError::Timeout {
            duration_ms: (self.poll.interval * self.poll.max_polls).as_millis() as u64,
            action: act,
        })
    }
}
