// src/encoder/mod.rs
use tracing::warn;

use crate::arch::*;
use crate::asm::utils::{parse_imm, parse_reg};
use crate::instruction::{Format, Instruction};

/// Fixed encoding data for one mnemonic.
#[derive(Debug, Clone, Copy)]
pub struct Encoding {
    pub format: Format,
    pub opcode: u8,
    pub funct3: u8,
    pub funct7: u8,
}

/// Opcode/funct assignment per mnemonic, standard integer ISA values
/// with multiply/divide under funct7 = 0x01.
pub fn encoding_of(mnemonic: &str) -> Option<Encoding> {
    let e = |format, opcode, funct3, funct7| {
        Some(Encoding {
            format,
            opcode,
            funct3,
            funct7,
        })
    };
    match mnemonic {
        "add" => e(Format::R, OPC_RTYPE, 0x0, 0x00),
        "sub" => e(Format::R, OPC_RTYPE, 0x0, 0x20),
        "sll" => e(Format::R, OPC_RTYPE, 0x1, 0x00),
        "slt" => e(Format::R, OPC_RTYPE, 0x2, 0x00),
        "sltu" => e(Format::R, OPC_RTYPE, 0x3, 0x00),
        "xor" => e(Format::R, OPC_RTYPE, 0x4, 0x00),
        "srl" => e(Format::R, OPC_RTYPE, 0x5, 0x00),
        "sra" => e(Format::R, OPC_RTYPE, 0x5, 0x20),
        "or" => e(Format::R, OPC_RTYPE, 0x6, 0x00),
        "and" => e(Format::R, OPC_RTYPE, 0x7, 0x00),
        "mul" => e(Format::R, OPC_RTYPE, 0x0, 0x01),
        "div" => e(Format::R, OPC_RTYPE, 0x4, 0x01),
        "rem" => e(Format::R, OPC_RTYPE, 0x6, 0x01),

        "addi" => e(Format::I, OPC_OPIMM, 0x0, 0x00),
        "slli" => e(Format::I, OPC_OPIMM, 0x1, 0x00),
        "slti" => e(Format::I, OPC_OPIMM, 0x2, 0x00),
        "sltiu" => e(Format::I, OPC_OPIMM, 0x3, 0x00),
        "xori" => e(Format::I, OPC_OPIMM, 0x4, 0x00),
        "srli" => e(Format::I, OPC_OPIMM, 0x5, 0x00),
        "srai" => e(Format::I, OPC_OPIMM, 0x5, 0x20),
        "ori" => e(Format::I, OPC_OPIMM, 0x6, 0x00),
        "andi" => e(Format::I, OPC_OPIMM, 0x7, 0x00),

        "lb" => e(Format::I, OPC_LOAD, 0x0, 0x00),
        "lh" => e(Format::I, OPC_LOAD, 0x1, 0x00),
        "lw" => e(Format::I, OPC_LOAD, 0x2, 0x00),
        "ld" => e(Format::I, OPC_LOAD, 0x3, 0x00),
        "lbu" => e(Format::I, OPC_LOAD, 0x4, 0x00),
        "lhu" => e(Format::I, OPC_LOAD, 0x5, 0x00),
        "jalr" => e(Format::I, OPC_JALR, 0x0, 0x00),

        "sb" => e(Format::S, OPC_STORE, 0x0, 0x00),
        "sh" => e(Format::S, OPC_STORE, 0x1, 0x00),
        "sw" => e(Format::S, OPC_STORE, 0x2, 0x00),
        "sd" => e(Format::S, OPC_STORE, 0x3, 0x00),

        "beq" => e(Format::SB, OPC_BRANCH, 0x0, 0x00),
        "bne" => e(Format::SB, OPC_BRANCH, 0x1, 0x00),
        "blt" => e(Format::SB, OPC_BRANCH, 0x4, 0x00),
        "bge" => e(Format::SB, OPC_BRANCH, 0x5, 0x00),
        "bltu" => e(Format::SB, OPC_BRANCH, 0x6, 0x00),
        "bgeu" => e(Format::SB, OPC_BRANCH, 0x7, 0x00),

        "lui" => e(Format::U, OPC_LUI, 0x0, 0x00),
        "auipc" => e(Format::U, OPC_AUIPC, 0x0, 0x00),
        "jal" => e(Format::UJ, OPC_JAL, 0x0, 0x00),
        "halt" => e(Format::Halt, OPC_HALT, 0x0, 0x00),
        _ => None,
    }
}

#[inline]
fn r(f7: u32, rs2: u32, rs1: u32, f3: u32, rd: u32, opc: u32) -> u32 {
    (f7 << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | opc
}
#[inline]
fn i(imm12: i32, rs1: u32, f3: u32, rd: u32, opc: u32) -> u32 {
    let imm = (imm12 & 0xFFF) as u32;
    (imm << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | opc
}
#[inline]
fn s(imm12: i32, rs2: u32, rs1: u32, f3: u32, opc: u32) -> u32 {
    let imm = imm12 & 0xFFF;
    let imm_lo = (imm & 0x1F) as u32;
    let imm_hi = ((imm >> 5) & 0x7F) as u32;
    (imm_hi << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | (imm_lo << 7) | opc
}
#[inline]
fn b(imm_bytes: i32, rs2: u32, rs1: u32, f3: u32, opc: u32) -> u32 {
    // imm is a byte offset relative to the PC; bit 0 has no slot
    let imm = imm_bytes as u32;
    let b12 = ((imm >> 12) & 1) << 31;
    let b10_5 = ((imm >> 5) & 0x3F) << 25;
    let b4_1 = ((imm >> 1) & 0xF) << 8;
    let b11 = ((imm >> 11) & 1) << 7;
    b12 | b10_5 | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | b4_1 | b11 | opc
}
#[inline]
fn u(imm20: i32, rd: u32, opc: u32) -> u32 {
    (((imm20 as u32) & 0xFFFFF) << 12) | (rd << 7) | opc
}
#[inline]
fn j(imm_bytes: i32, rd: u32, opc: u32) -> u32 {
    let imm = imm_bytes as u32;
    let b20 = ((imm >> 20) & 1) << 31;
    let b10_1 = ((imm >> 1) & 0x3FF) << 21;
    let b11 = ((imm >> 11) & 1) << 20;
    let b19_12 = ((imm >> 12) & 0xFF) << 12;
    b20 | b10_1 | b11 | b19_12 | (rd << 7) | opc
}

// Truncation is silent by contract; the warning is advisory.
fn check_range(value: i32, bits: u32, ctx: &str) {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    if (value as i64) < min || (value as i64) > max {
        warn!("{ctx}: immediate {value} truncated to {bits} bits");
    }
}

/// Translates one instruction record into its 32-bit machine word.
pub fn encode(inst: &Instruction) -> Result<u32, String> {
    let enc = encoding_of(&inst.opcode)
        .ok_or_else(|| format!("unsupported mnemonic: {}", inst.opcode))?;
    let reg = |t: &str| {
        parse_reg(t)
            .map(u32::from)
            .ok_or_else(|| format!("invalid register: {t}"))
    };
    let imm = |t: &str| {
        if t.is_empty() {
            Ok(0)
        } else {
            parse_imm(t).ok_or_else(|| format!("invalid immediate: {t}"))
        }
    };

    let opc = enc.opcode as u32;
    let f3 = enc.funct3 as u32;
    let f7 = enc.funct7 as u32;
    Ok(match enc.format {
        Format::R => r(
            f7,
            reg(&inst.rs2)?,
            reg(&inst.rs1)?,
            f3,
            reg(&inst.rd)?,
            opc,
        ),
        Format::I => {
            let mut v = imm(&inst.immediate)?;
            check_range(v, 12, &inst.opcode);
            if enc.opcode == OPC_OPIMM && (enc.funct3 == 0x1 || enc.funct3 == 0x5) {
                // shifts: low 5 bits are the amount, funct7 rides above
                v = (v & 0x1F) | ((f7 as i32) << 5);
            }
            i(v, reg(&inst.rs1)?, f3, reg(&inst.rd)?, opc)
        }
        Format::S => {
            let v = imm(&inst.immediate)?;
            check_range(v, 12, &inst.opcode);
            s(v, reg(&inst.rs2)?, reg(&inst.rs1)?, f3, opc)
        }
        Format::SB => {
            let v = imm(&inst.immediate)?;
            check_range(v, 13, &inst.opcode);
            b(v, reg(&inst.rs2)?, reg(&inst.rs1)?, f3, opc)
        }
        Format::U => {
            let v = imm(&inst.immediate)?;
            if !(0..=0xFFFFF).contains(&v) {
                warn!("{}: immediate {v} truncated to 20 bits", inst.opcode);
            }
            u(v, reg(&inst.rd)?, opc)
        }
        Format::UJ => {
            let v = imm(&inst.immediate)?;
            check_range(v, 21, &inst.opcode);
            j(v, reg(&inst.rd)?, opc)
        }
        Format::Halt => opc,
    })
}
