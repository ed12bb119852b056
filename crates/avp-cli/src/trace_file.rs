//! Line-based trace file loader.
//!
//! A convenience for feeding the replay engine from disk — the recorded
//! table itself is produced elsewhere, this is only a transport. One
//! record per line:
//!
//! ```text
//! # comment
//! CPU WRITE32 0x60006000 0x00000002        # clk enable
//! AVP READ32  0x60006000 0x00000002        # readback via coproc
//! CPU IRQ     69 1                         # usb irq latched
//! CPU MEMSET32 0x40001000 0x0 64           # clear buffer
//! END
//! ```
//!
//! Numbers accept `0x` hex or decimal. Everything after `#` is the
//! record label.

use anyhow::{bail, Context, Result};
use std::path::Path;

use avp_replay::{AccessSize, Executor, Record};

/// Load a trace from a file.
pub fn load(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read trace file {}", path.display()))?;
    parse(&text).with_context(|| format!("in trace file {}", path.display()))
}

/// Parse trace text into records.
pub fn parse(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let (body, label) = match raw.split_once('#') {
            Some((body, label)) => (body.trim(), label.trim()),
            None => (raw.trim(), ""),
        };
        if body.is_empty() {
            continue;
        }

        let mut fields = body.split_whitespace();
        let first = fields.next().unwrap_or_default();

        if first.eq_ignore_ascii_case("END") {
            records.push(Record::end());
            continue;
        }

        let executor = match first.to_ascii_uppercase().as_str() {
            "CPU" | "HOST" => Executor::Host,
            "AVP" | "COP" => Executor::Coprocessor,
            other => bail!("line {lineno}: unknown executor {other:?}"),
        };

        let op = fields
            .next()
            .with_context(|| format!("line {lineno}: missing operation"))?
            .to_ascii_uppercase();

        let mut num = |what: &str| -> Result<u32> {
            let field = fields
                .next()
                .with_context(|| format!("line {lineno}: missing {what}"))?;
            parse_u32(field).with_context(|| format!("line {lineno}: bad {what} {field:?}"))
        };

        let record = match op.as_str() {
            "READ8" => Record::read(AccessSize::Byte, executor, num("address")?, num("expected")?, label),
            "READ16" => Record::read(AccessSize::Half, executor, num("address")?, num("expected")?, label),
            "READ32" => Record::read(AccessSize::Word, executor, num("address")?, num("expected")?, label),
            "READ32_NOFAIL" => {
                Record::read32_nonfatal(executor, num("address")?, num("expected")?, label)
            }
            "WRITE8" => Record::write(AccessSize::Byte, executor, num("address")?, num("value")?, label),
            "WRITE16" => Record::write(AccessSize::Half, executor, num("address")?, num("value")?, label),
            "WRITE32" => Record::write(AccessSize::Word, executor, num("address")?, num("value")?, label),
            "IRQ" => {
                let irq = num("irq number")?;
                let sts = num("expected status")?;
                if executor != Executor::Host {
                    bail!("line {lineno}: IRQ checks are host-side");
                }
                Record::irq_check(irq, sts != 0, label)
            }
            "MEMSET32" => {
                if executor != Executor::Host {
                    bail!("line {lineno}: MEMSET32 is host-only");
                }
                Record::memset32(num("address")?, num("value")?, num("count")?, label)
            }
            other => bail!("line {lineno}: unknown operation {other:?}"),
        };

        if let Some(extra) = fields.next() {
            bail!("line {lineno}: trailing field {extra:?}");
        }
        records.push(record);
    }

    Ok(records)
}

fn parse_u32(field: &str) -> Result<u32> {
    let value = if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)?
    } else {
        field.parse()?
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avp_replay::RecordKind;

    #[test]
    fn parses_mixed_trace() {
        let text = "\
# power on
CPU WRITE32 0x60006304 0x2       # clk enable
AVP READ16  0x6000_
";
        // deliberately malformed hex
        assert!(parse(text).is_err());

        let text = "\
CPU WRITE32 0x60006304 0x2       # clk enable
AVP READ32  0x60006304 0x2
CPU IRQ 69 1                     # usb
CPU MEMSET32 0x40001000 0 64
END
CPU WRITE32 0x0 0x0              # after END, still parsed
";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].kind, RecordKind::Write32);
        assert_eq!(records[0].label, "clk enable");
        assert_eq!(records[1].executor, Executor::Coprocessor);
        assert_eq!(records[2].kind, RecordKind::IrqCheck);
        assert_eq!(records[2].addr, 69);
        assert_eq!(records[3].count, 64);
        assert_eq!(records[4].kind, RecordKind::End);
    }

    #[test]
    fn rejects_junk() {
        assert!(parse("CPU FROB 0x0 0x0").is_err());
        assert!(parse("GPU READ32 0x0 0x0").is_err());
        assert!(parse("CPU READ32 0x0").is_err());
        assert!(parse("CPU READ32 0x0 0x0 0x0").is_err());
        assert!(parse("AVP MEMSET32 0x0 0x0 4").is_err());
    }

    #[test]
    fn decimal_and_hex_numbers() {
        let records = parse("CPU WRITE8 4096 255").unwrap();
        assert_eq!(records[0].addr, 4096);
        assert_eq!(records[0].value, 255);
        assert_eq!(records[0].kind, RecordKind::Write8);
    }
}
