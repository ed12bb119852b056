//! `avpreplay` — replay a recorded register trace against a live SoC.
//!
//! ```text
//! USAGE:
//!   avpreplay check <trace>          Parse and print a trace file
//!   avpreplay run <trace> [opts]     Map /dev/mem and replay (root)
//! ```
//!
//! Exit codes from `run`: 0 success, 1 value mismatch, 2 malformed
//! trace, 4 IRQ status mismatch, 3 any other fatal fault (window,
//! timeout, I/O).

mod trace_file;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use avp_chip::SocConfig;
use avp_replay::{
    CoprocCtl, DevMemWindow, FirmwareImage, RemoteClient, ReplayConfig, ReplayEngine,
};

#[derive(Parser)]
#[command(name = "avpreplay", about = "AVP register-trace replay", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Parse a trace file and print the decoded records.
    Check {
        /// Trace file path.
        trace: PathBuf,
    },
    /// Replay a trace against the hardware (requires root).
    Run {
        /// Trace file path.
        trace: PathBuf,
        /// Physical base of the mapped I/O window.
        #[arg(long, value_parser = parse_num, default_value = "0x0")]
        base: u32,
        /// Length of the mapped I/O window.
        #[arg(long, value_parser = parse_num, default_value = "0x70000000")]
        len: u32,
        /// Skip the first N records.
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Coprocessor firmware blob to install before replaying.
        #[arg(long)]
        firmware: Option<PathBuf>,
        /// Physical load address for the firmware blob.
        #[arg(long, value_parser = parse_num, default_value = "0x40000400")]
        load_addr: u32,
        /// Entry address written to the reset vector (defaults to the
        /// load address).
        #[arg(long, value_parser = parse_num)]
        entry: Option<u32>,
    },
}

fn parse_num(field: &str) -> std::result::Result<u32, String> {
    let parsed = if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        field.parse()
    };
    parsed.map_err(|e| format!("{field:?}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Check { trace } => cmd_check(&trace),
        Cmd::Run {
            trace,
            base,
            len,
            skip,
            firmware,
            load_addr,
            entry,
        } => cmd_run(&trace, base, len, skip, firmware.as_deref(), load_addr, entry),
    }
}

fn cmd_check(path: &std::path::Path) -> Result<()> {
    let records = trace_file::load(path)?;
    for (step, rec) in records.iter().enumerate() {
        println!(
            "{step:4}: {} {:?} {:#010x} {:#010x} [{}]",
            rec.executor, rec.kind, rec.addr, rec.value, rec.label
        );
    }
    println!("{} records", records.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    path: &std::path::Path,
    base: u32,
    len: u32,
    skip: usize,
    firmware: Option<&std::path::Path>,
    load_addr: u32,
    entry: Option<u32>,
) -> Result<()> {
    let records = trace_file::load(path)?;
    let soc = SocConfig::tegra20();

    let bus = Arc::new(DevMemWindow::map(base, len).context("mapping /dev/mem window")?);
    let ctl = CoprocCtl::new(soc.flow, soc.clock);

    // Bring-up order matters: halt and gate the coprocessor before
    // touching its code region, then point the reset vector and ungate.
    ctl.power_off(&*bus)?;
    if let Some(fw_path) = firmware {
        let bytes = std::fs::read(fw_path)
            .with_context(|| format!("reading firmware {}", fw_path.display()))?;
        let image = FirmwareImage {
            bytes,
            load_addr,
            entry: entry.unwrap_or(load_addr),
        };
        image.install(&*bus, &soc).context("installing firmware")?;
    }
    ctl.power_on(&*bus)?;

    let client = RemoteClient::new(soc.mailbox, ctl, soc.alias);
    let engine = ReplayEngine::new(
        Arc::clone(&bus),
        client,
        soc.irq,
        ReplayConfig {
            skip_first: skip,
            ..ReplayConfig::default()
        },
    );

    let result = engine.replay(&records);
    // Leave the coprocessor gated whatever the verdict.
    if let Err(e) = ctl.power_off(&*bus) {
        tracing::warn!("power-off after replay failed: {e}");
    }

    match result {
        Ok(report) => {
            println!(
                "replay completed: {} steps, {} nonfatal mismatches{}",
                report.steps_run,
                report.nonfatal_mismatches,
                if report.ended_by_end { " (END)" } else { "" }
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("replay failed: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
