// src/asm/mod.rs
pub mod errors;
pub(crate) mod utils;

use std::fs;

use crate::arch::{DATA_BASE, TEXT_BASE};
use crate::instruction::{Format, Instruction};
use crate::symtab::SymbolTable;

use errors::AsmError;
use utils::*;

/// Reads `path` and runs one parsing pass over it. The same file is
/// parsed twice: pass 1 records labels and data segments, pass 2
/// produces instruction records with label immediates resolved. The
/// two-pass split is what makes forward branch references work.
pub fn parse_file(
    path: &str,
    instructions: &mut Vec<Instruction>,
    table: &mut SymbolTable,
    first_pass: bool,
) -> Result<(), AsmError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AsmError::new(0, format!("cannot open {path}: {e}")))?;
    parse_source(&text, instructions, table, first_pass)
}

/// One pass over in-memory source text. See [`parse_file`].
pub fn parse_source(
    text: &str,
    instructions: &mut Vec<Instruction>,
    table: &mut SymbolTable,
    first_pass: bool,
) -> Result<(), AsmError> {
    let mut text_address = TEXT_BASE;
    let mut data_address = DATA_BASE;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = raw.split('#').next().unwrap_or(raw).trim();
        if stripped.is_empty() {
            continue;
        }

        let mut line = stripped;
        if let Some(colon) = line.find(':') {
            let label = line[..colon].trim();
            let rest = line[colon + 1..].trim();
            if label.is_empty() || label.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(AsmError::new(
                    line_no,
                    format!("invalid label '{label}': labels cannot start with a digit"),
                ));
            }
            if first_pass {
                // A directive after the label binds it to the data
                // cursor, anything else to the text cursor.
                let address = if rest.starts_with('.') {
                    data_address
                } else {
                    text_address
                };
                table.add_label(label, address);
            }
            if rest.is_empty() {
                continue;
            }
            line = rest;
        }

        if line.starts_with('.') {
            if first_pass {
                process_directive(line, table, &mut data_address)
                    .map_err(|msg| AsmError::new(line_no, msg))?;
            }
            continue;
        }

        if !first_pass {
            let mut inst =
                parse_instruction(line).map_err(|msg| AsmError::new(line_no, msg))?;
            if matches!(inst.format, Format::SB | Format::UJ) {
                resolve_target(&mut inst, text_address, table)
                    .map_err(|msg| AsmError::new(line_no, msg))?;
            }
            instructions.push(inst);
        }
        // Instruction lines advance the text cursor on both passes so
        // pass-2 label offsets see the same addresses as pass 1.
        text_address = text_address.wrapping_add(4);
    }
    Ok(())
}

fn process_directive(
    line: &str,
    table: &mut SymbolTable,
    data_address: &mut u32,
) -> Result<(), String> {
    let (directive, rest) = match line.split_once(char::is_whitespace) {
        Some((d, r)) => (d, r.trim()),
        None => (line, ""),
    };
    match directive {
        // Section switch; only the data section is tracked explicitly.
        ".text" => {}
        ".data" => table.open_segment(*data_address),
        ".word" => {
            for v in data_values(rest)? {
                table.append_data_entry(data_address, v, 4);
            }
        }
        ".half" => {
            for v in data_values(rest)? {
                table.append_data_entry(data_address, v & 0xFFFF, 2);
            }
        }
        ".byte" => {
            for v in data_values(rest)? {
                table.append_data_entry(data_address, v & 0xFF, 1);
            }
        }
        ".dword" => {
            for v in data_values(rest)? {
                table.append_data_entry(data_address, v, 8);
            }
        }
        ".asciiz" => {
            let s = parse_str_lit(rest).ok_or_else(|| format!("invalid string: {rest}"))?;
            for b in s.bytes() {
                table.append_data_entry(data_address, b as i64, 1);
            }
            table.append_data_entry(data_address, 0, 1);
        }
        ".globl" => {
            let sym = rest
                .split_whitespace()
                .next()
                .ok_or_else(|| ".globl: missing symbol".to_string())?;
            table.add_global(sym);
        }
        _ => return Err(format!("unknown directive: {directive}")),
    }
    Ok(())
}

fn data_values(rest: &str) -> Result<Vec<i64>, String> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| parse_imm64(t).ok_or_else(|| format!("invalid data value: {t}")))
        .collect()
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r),
        None => (line, ""),
    };
    let mnemonic = mnemonic.to_lowercase();
    let ops = split_operands(rest);

    let record = |format: Format, opcode: &str, rd: &str, rs1: &str, rs2: &str, imm: &str| {
        Instruction {
            opcode: opcode.to_string(),
            format,
            rd: rd.to_string(),
            rs1: rs1.to_string(),
            rs2: rs2.to_string(),
            immediate: imm.to_string(),
            line_name: line.to_string(),
        }
    };
    let arity = |n: usize| -> Result<(), String> {
        if ops.len() == n {
            Ok(())
        } else {
            Err(format!("{mnemonic}: expected {n} operands, got {}", ops.len()))
        }
    };

    match mnemonic.as_str() {
        // ---------- Pseudo-instructions (one machine word each) ----------
        "nop" => {
            arity(0)?;
            Ok(record(Format::I, "addi", "x0", "x0", "", "0"))
        }
        "mv" => {
            arity(2)?;
            Ok(record(Format::I, "addi", reg(&ops[0])?, reg(&ops[1])?, "", "0"))
        }
        "li" => {
            arity(2)?;
            Ok(record(Format::I, "addi", reg(&ops[0])?, "x0", "", &imm(&ops[1])?))
        }
        "j" => {
            arity(1)?;
            Ok(record(Format::UJ, "jal", "x0", "", "", &ops[0]))
        }
        "ret" => {
            arity(0)?;
            Ok(record(Format::I, "jalr", "x0", "x1", "", "0"))
        }

        // ---------- R: op rd, rs1, rs2 ----------
        "add" | "sub" | "xor" | "or" | "and" | "sll" | "slt" | "sltu" | "sra" | "srl"
        | "mul" | "div" | "rem" => {
            arity(3)?;
            Ok(record(
                Format::R,
                &mnemonic,
                reg(&ops[0])?,
                reg(&ops[1])?,
                reg(&ops[2])?,
                "",
            ))
        }

        // ---------- I: op rd, rs1, imm ----------
        "addi" | "andi" | "ori" | "xori" | "slti" | "sltiu" | "slli" | "srli" | "srai"
        | "jalr" => {
            arity(3)?;
            Ok(record(
                Format::I,
                &mnemonic,
                reg(&ops[0])?,
                reg(&ops[1])?,
                "",
                &imm(&ops[2])?,
            ))
        }

        // ---------- Loads: op rd, imm(rs1) ----------
        "lb" | "lh" | "lw" | "ld" | "lbu" | "lhu" => {
            arity(2)?;
            let rd = reg(&ops[0])?;
            let (offset, base) = parse_memop(&ops[1])?;
            Ok(record(Format::I, &mnemonic, rd, &base, "", &offset))
        }

        // ---------- Stores: op rs2, imm(rs1) ----------
        "sb" | "sh" | "sw" | "sd" => {
            arity(2)?;
            let rs2 = reg(&ops[0])?;
            let (offset, base) = parse_memop(&ops[1])?;
            Ok(record(Format::S, &mnemonic, "", &base, rs2, &offset))
        }

        // ---------- Branches: op rs1, rs2, label|imm ----------
        "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" => {
            arity(3)?;
            Ok(record(
                Format::SB,
                &mnemonic,
                "",
                reg(&ops[0])?,
                reg(&ops[1])?,
                &ops[2],
            ))
        }

        // ---------- U: op rd, imm ----------
        "lui" | "auipc" => {
            arity(2)?;
            Ok(record(Format::U, &mnemonic, reg(&ops[0])?, "", "", &imm(&ops[1])?))
        }

        // ---------- UJ: jal rd, label|imm ----------
        "jal" => {
            arity(2)?;
            Ok(record(Format::UJ, "jal", reg(&ops[0])?, "", "", &ops[1]))
        }

        "halt" => {
            arity(0)?;
            Ok(record(Format::Halt, "halt", "", "", "", ""))
        }

        _ => Err(format!("unknown mnemonic: {mnemonic}")),
    }
}

fn reg(t: &str) -> Result<&str, String> {
    parse_reg(t)
        .map(|_| t)
        .ok_or_else(|| format!("invalid register: {t}"))
}

// Normalizes a numeric immediate to decimal text.
fn imm(t: &str) -> Result<String, String> {
    parse_imm(t)
        .map(|v| v.to_string())
        .ok_or_else(|| format!("invalid immediate: {t}"))
}

// Branch/jump targets may be labels; rewrite them to the byte offset
// from the instruction's own address.
fn resolve_target(
    inst: &mut Instruction,
    text_address: u32,
    table: &SymbolTable,
) -> Result<(), String> {
    let tok = inst.immediate.trim();
    if tok.is_empty() {
        return Err(format!("{}: missing target", inst.opcode));
    }
    if let Some(v) = parse_imm(tok) {
        inst.immediate = v.to_string();
        return Ok(());
    }
    match table.lookup_label(tok) {
        Some(target) => {
            inst.immediate = (target as i64 - text_address as i64).to_string();
            Ok(())
        }
        None => Err(format!("label '{tok}' not found")),
    }
}
