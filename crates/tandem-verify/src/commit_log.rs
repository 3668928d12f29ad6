//! Spike commit-log parsing.
//!
//! Both the golden model (`spike --log-commits`) and simulated devices report
//! retired instructions in this format:
//!
//! ```text
//! core   0: 3 0x0000000080000050 (0x00000093) x1 0x0000000000000000
//! core   0: 3 0x000000008000010c (0x0182b283) x5 0x0000000080000000 mem 0x0000000000001018
//! core   0: 3 0x0000000080000100 (0x00b52023) mem 0x0000000080001000 0x0000000000000001
//! ```

use std::sync::OnceLock;

use regex::Regex;

use crate::packet::VerificationPacket;

static PC_PATTERN: OnceLock<Regex> = OnceLock::new();
static REG_PATTERN: OnceLock<Regex> = OnceLock::new();
static MEM_PATTERN: OnceLock<Regex> = OnceLock::new();

fn hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s, 16).ok()
}

/// Parse one commit-log line into a packet.
///
/// Returns `None` for anything that is not a retired-instruction line
/// (program output, trap notices, blank lines).
pub fn parse_commit_line(line: &str) -> Option<VerificationPacket> {
    let line = line.trim();
    if !line.starts_with("core") {
        return None;
    }

    let pc_pattern = PC_PATTERN.get_or_init(|| {
        Regex::new(r"0x([0-9a-fA-F]+)\s+\(0x([0-9a-fA-F]+)\)").expect("valid pc pattern")
    });
    let caps = pc_pattern.captures(line)?;
    let pc = hex(caps.get(1)?.as_str())?;
    let instruction = u32::try_from(hex(caps.get(2)?.as_str())?).ok()?;
    let mut packet = VerificationPacket::new(pc, instruction);

    // Only look past the opcode so the PC itself never matches.
    let rest = &line[caps.get(0)?.end()..];

    let reg_pattern = REG_PATTERN.get_or_init(|| {
        Regex::new(r"\bx(\d+)\s+0x([0-9a-fA-F]+)").expect("valid register pattern")
    });
    if let Some(caps) = reg_pattern.captures(rest) {
        let reg = caps.get(1)?.as_str().parse::<u8>().ok()?;
        let value = hex(caps.get(2)?.as_str())?;
        packet = packet.with_dst(reg, value);
    }

    let mem_pattern = MEM_PATTERN.get_or_init(|| {
        Regex::new(r"\bmem\s+0x([0-9a-fA-F]+)(?:\s+0x([0-9a-fA-F]+))?")
            .expect("valid memory pattern")
    });
    if let Some(caps) = mem_pattern.captures(rest) {
        let addr = hex(caps.get(1)?.as_str())?;
        packet = match caps.get(2).and_then(|v| hex(v.as_str())) {
            Some(value) => packet.with_store(addr, value),
            None => packet.with_load(addr),
        };
    }

    Some(packet)
}
