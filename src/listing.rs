//! The textual listing: the assembler's output and the simulator's
//! input. Data lines come first, then instructions from address 0.
//! Only the first two tokens of each line are load-bearing for the
//! loader; everything after them is advisory.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use crate::arch::TEXT_BASE;
use crate::encoder::{encode, encoding_of};
use crate::errors::KestrelError;
use crate::instruction::Instruction;
use crate::symtab::SymbolTable;

/// Debug comment carried on each instruction line:
/// `mnemonic-funct3-funct7-rd-rs1-rs2-imm`, operand fields verbatim
/// from the record, funct fields in binary.
pub fn fingerprint(inst: &Instruction) -> String {
    let (f3, f7) = match encoding_of(&inst.opcode) {
        Some(e) => (format!("{:03b}", e.funct3), format!("{:07b}", e.funct7)),
        None => (String::new(), String::new()),
    };
    format!(
        "{}-{}-{}-{}-{}-{}-{}",
        inst.opcode, f3, f7, inst.rd, inst.rs1, inst.rs2, inst.immediate
    )
}

/// Serializes the data image and the encoded instructions.
pub fn write_listing<W: Write>(
    w: &mut W,
    table: &SymbolTable,
    instructions: &[Instruction],
) -> Result<(), KestrelError> {
    for seg in &table.data_segments {
        let mut addr = seg.start_address;
        for entry in &seg.contents {
            let mask: u64 = if entry.size >= 8 {
                u64::MAX
            } else {
                (1u64 << (entry.size * 8)) - 1
            };
            writeln!(w, "0x{:x} 0x{:08x} # Data", addr, (entry.value as u64) & mask)?;
            addr = addr.wrapping_add(entry.size);
        }
    }

    let mut addr = TEXT_BASE;
    for inst in instructions {
        let word = encode(inst).map_err(KestrelError::Encode)?;
        writeln!(
            w,
            "0x{:x} 0x{:08x} , {} # {}",
            addr,
            word,
            inst.line_name,
            fingerprint(inst)
        )?;
        addr = addr.wrapping_add(4);
    }
    Ok(())
}

/// Re-parses a listing into the address → word map the simulator
/// fetches from. Data lines land in the map too; the PC never reaches
/// them.
pub fn parse_listing(text: &str) -> Result<BTreeMap<u32, u32>, KestrelError> {
    let mut code = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let mut tokens = raw.split_whitespace();
        let Some(addr_tok) = tokens.next() else {
            continue;
        };
        let Some(word_tok) = tokens.next() else {
            return Err(KestrelError::Listing {
                line: idx + 1,
                msg: "expected 'address value'".to_string(),
            });
        };
        let addr = parse_hex(addr_tok).ok_or_else(|| KestrelError::Listing {
            line: idx + 1,
            msg: format!("bad address: {addr_tok}"),
        })?;
        let word = parse_hex(word_tok).ok_or_else(|| KestrelError::Listing {
            line: idx + 1,
            msg: format!("bad value: {word_tok}"),
        })?;
        code.insert(addr, word);
    }
    Ok(code)
}

pub fn load_listing(path: &str) -> Result<BTreeMap<u32, u32>, KestrelError> {
    parse_listing(&fs::read_to_string(path)?)
}

// Values wider than 32 bits (dword data lines) truncate on load.
fn parse_hex(tok: &str) -> Option<u32> {
    let t = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")).unwrap_or(tok);
    u64::from_str_radix(t, 16).ok().map(|v| v as u32)
}
