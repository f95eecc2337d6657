// src/exec.rs
//
// Single-cycle execution: fetch, decode, execute, memory, writeback,
// commit. Stores and branches run with writeback disabled; x0 never
// takes a value.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::arch::*;
use crate::decoder::{imm_b, imm_i, imm_j, imm_s, imm_u, Fields};
use crate::errors::KestrelError;
use crate::memory::Memory;
use crate::registers::Cpu;
use crate::symtab::SymbolTable;

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The custom halt word retired.
    Halted,
    /// No instruction mapped at the current PC.
    OutOfProgram,
}

/// Unpacks every data entry byte-by-byte (little-endian) into the
/// word-aligned slots of data memory.
pub fn init_data_memory(mem: &mut Memory, table: &SymbolTable) {
    for seg in &table.data_segments {
        let mut addr = seg.start_address;
        for entry in &seg.contents {
            for i in 0..entry.size {
                let byte = ((entry.value >> (8 * i)) & 0xFF) as u8;
                mem.store_byte(addr.wrapping_add(i), byte);
            }
            addr = addr.wrapping_add(entry.size);
        }
    }
}

/// Zeroes the stack region and points x2 at its base.
pub fn init_stack(cpu: &mut Cpu, mem: &mut Memory) {
    mem.zero_range(STACK_END, STACK_BASE);
    cpu.write(2, STACK_BASE as i32);
}

enum Step {
    Continue,
    Done(Exit),
}

/// Runs until halt, end-of-program or a fatal decode error.
pub fn run(
    cpu: &mut Cpu,
    mem: &mut Memory,
    code: &BTreeMap<u32, u32>,
) -> Result<Exit, KestrelError> {
    loop {
        match step(cpu, mem, code)? {
            Step::Continue => {}
            Step::Done(exit) => {
                info!(clock = cpu.clock, ?exit, "execution finished");
                return Ok(exit);
            }
        }
    }
}

fn step(
    cpu: &mut Cpu,
    mem: &mut Memory,
    code: &BTreeMap<u32, u32>,
) -> Result<Step, KestrelError> {
    // fetch
    let pc = cpu.pc;
    let Some(&word) = code.get(&pc) else {
        return Ok(Step::Done(Exit::OutOfProgram));
    };
    cpu.ir = word;
    debug!(cycle = cpu.clock, pc = format_args!("{pc:#010x}"), ir = format_args!("{word:#010x}"), "fetch");

    // decode
    let f = Fields::of(word);
    let imm: i32 = match f.opcode {
        OPC_OPIMM | OPC_LOAD | OPC_JALR => imm_i(word),
        OPC_STORE => imm_s(word),
        OPC_BRANCH => imm_b(word),
        OPC_LUI | OPC_AUIPC => imm_u(word),
        OPC_JAL => imm_j(word),
        _ => 0,
    };
    debug!(opcode = format_args!("{:#04x}", f.opcode), rd = f.rd, rs1 = f.rs1, rs2 = f.rs2, imm, "decode");

    // execute
    let mut alu: i32 = 0;
    let mut new_pc = pc.wrapping_add(4);
    let mut writeback = true;

    match f.opcode {
        OPC_RTYPE => alu = alu_reg(cpu, &f, pc)?,
        OPC_OPIMM => alu = alu_imm(cpu, &f, imm),
        OPC_LOAD => {
            // stage the effective address for the memory step
            alu = (cpu.read(f.rs1) as u32).wrapping_add(imm as u32) as i32;
        }
        OPC_STORE => {
            alu = (cpu.read(f.rs1) as u32).wrapping_add(imm as u32) as i32;
            writeback = false;
        }
        OPC_BRANCH => {
            let taken = branch_taken(cpu, &f, pc)?;
            if taken {
                new_pc = pc.wrapping_add(imm as u32);
            }
            debug!(taken, target = format_args!("{new_pc:#010x}"), "branch");
            writeback = false;
        }
        OPC_LUI => alu = imm,
        OPC_AUIPC => alu = pc.wrapping_add(imm as u32) as i32,
        OPC_JAL => {
            alu = pc.wrapping_add(4) as i32;
            new_pc = pc.wrapping_add(imm as u32);
        }
        OPC_JALR => {
            alu = pc.wrapping_add(4) as i32;
            new_pc = (cpu.read(f.rs1) as u32).wrapping_add(imm as u32) & !1;
        }
        OPC_HALT => {
            // halt retires like any instruction before stopping
            cpu.clock += 1;
            return Ok(Step::Done(Exit::Halted));
        }
        opcode => return Err(KestrelError::UnknownOpcode { pc, opcode }),
    }

    // memory
    if f.opcode == OPC_LOAD {
        alu = load_value(mem, alu as u32, f.funct3, pc)?;
    } else if f.opcode == OPC_STORE {
        store_value(mem, alu as u32, cpu.read(f.rs2), f.funct3, pc)?;
    }

    // writeback
    if writeback && f.rd != 0 {
        debug!(rd = f.rd, value = alu, "writeback");
        cpu.write(f.rd, alu);
    }

    // commit
    cpu.pc = new_pc;
    cpu.clock += 1;
    Ok(Step::Continue)
}

fn alu_reg(cpu: &Cpu, f: &Fields, pc: u32) -> Result<i32, KestrelError> {
    let a = cpu.read(f.rs1);
    let b = cpu.read(f.rs2);
    let v = match (f.funct7, f.funct3) {
        (0x00, 0x0) => a.wrapping_add(b),
        (0x20, 0x0) => a.wrapping_sub(b),
        (0x00, 0x1) => ((a as u32) << (b & 0x1F)) as i32,
        (0x00, 0x2) => (a < b) as i32,
        (0x00, 0x3) => ((a as u32) < (b as u32)) as i32,
        (0x00, 0x4) => a ^ b,
        (0x00, 0x5) => ((a as u32) >> (b & 0x1F)) as i32,
        (0x20, 0x5) => a >> (b & 0x1F),
        (0x00, 0x6) => a | b,
        (0x00, 0x7) => a & b,
        (0x01, 0x0) => a.wrapping_mul(b),
        // division never traps: div by zero is -1, rem by zero the dividend
        (0x01, 0x4) => {
            if b == 0 {
                -1
            } else {
                a.wrapping_div(b)
            }
        }
        (0x01, 0x6) => {
            if b == 0 {
                a
            } else {
                a.wrapping_rem(b)
            }
        }
        _ => {
            return Err(KestrelError::Decode {
                pc,
                msg: "undefined funct combination for R-type",
            })
        }
    };
    Ok(v)
}

fn alu_imm(cpu: &Cpu, f: &Fields, imm: i32) -> i32 {
    let a = cpu.read(f.rs1);
    match f.funct3 {
        0x0 => a.wrapping_add(imm),
        0x1 => ((a as u32) << (imm & 0x1F)) as i32,
        0x2 => (a < imm) as i32,
        0x3 => ((a as u32) < (imm as u32)) as i32,
        0x4 => a ^ imm,
        0x5 => {
            if f.funct7 == 0x20 {
                a >> (imm & 0x1F)
            } else {
                ((a as u32) >> (imm & 0x1F)) as i32
            }
        }
        0x6 => a | imm,
        0x7 => a & imm,
        _ => unreachable!("funct3 is three bits"),
    }
}

fn branch_taken(cpu: &Cpu, f: &Fields, pc: u32) -> Result<bool, KestrelError> {
    let a = cpu.read(f.rs1);
    let b = cpu.read(f.rs2);
    Ok(match f.funct3 {
        0x0 => a == b,
        0x1 => a != b,
        0x4 => a < b,
        0x5 => a >= b,
        0x6 => (a as u32) < (b as u32),
        0x7 => (a as u32) >= (b as u32),
        _ => {
            return Err(KestrelError::Decode {
                pc,
                msg: "undefined branch condition",
            })
        }
    })
}

fn load_value(mem: &Memory, addr: u32, funct3: u8, pc: u32) -> Result<i32, KestrelError> {
    let v = match funct3 {
        0x0 => mem.load_byte(addr) as i8 as i32,
        0x1 => mem.load_half(addr) as i16 as i32,
        // ld executes at word width on this 32-bit model
        0x2 | 0x3 => mem.load_word(addr) as i32,
        0x4 => mem.load_byte(addr) as i32,
        0x5 => mem.load_half(addr) as i32,
        _ => {
            return Err(KestrelError::Decode {
                pc,
                msg: "undefined load width",
            })
        }
    };
    debug!(addr = format_args!("{addr:#010x}"), value = v, "memory load");
    Ok(v)
}

fn store_value(
    mem: &mut Memory,
    addr: u32,
    value: i32,
    funct3: u8,
    pc: u32,
) -> Result<(), KestrelError> {
    match funct3 {
        0x0 => mem.store_byte(addr, value as u8),
        0x1 => mem.store_half(addr, value as u16),
        0x2 | 0x3 => mem.store_word(addr, value as u32),
        _ => {
            return Err(KestrelError::Decode {
                pc,
                msg: "undefined store width",
            })
        }
    }
    debug!(addr = format_args!("{addr:#010x}"), value, "memory store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::parse_source;
    use crate::encoder::encode;
    use crate::instruction::Instruction;

    // Assembles source text straight into the fetch map.
    fn code_of(src: &str) -> BTreeMap<u32, u32> {
        let mut table = SymbolTable::new();
        let mut instructions: Vec<Instruction> = Vec::new();
        parse_source(src, &mut instructions, &mut table, true).expect("pass 1");
        parse_source(src, &mut instructions, &mut table, false).expect("pass 2");
        instructions
            .iter()
            .enumerate()
            .map(|(i, inst)| (4 * i as u32, encode(inst).expect("encode")))
            .collect()
    }

    fn run_src(src: &str) -> (Cpu, Memory, Exit) {
        let code = code_of(src);
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        let exit = run(&mut cpu, &mut mem, &code).expect("run");
        (cpu, mem, exit)
    }

    #[test]
    fn halt_counts_as_a_retired_instruction() {
        let (cpu, _, exit) = run_src("addi x5, x0, 7\naddi x6, x5, -3\nhalt\n");
        assert_eq!(exit, Exit::Halted);
        assert_eq!(cpu.read(5), 7);
        assert_eq!(cpu.read(6), 4);
        assert_eq!(cpu.clock, 3);
    }

    #[test]
    fn running_off_the_end_is_a_normal_exit() {
        let (cpu, _, exit) = run_src("addi x1, x0, 1\n");
        assert_eq!(exit, Exit::OutOfProgram);
        assert_eq!(cpu.clock, 1);
        assert_eq!(cpu.pc, 4);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut code = BTreeMap::new();
        code.insert(0, 0x0000_005Bu32); // reserved opcode
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        let err = run(&mut cpu, &mut mem, &code).unwrap_err();
        assert!(matches!(err, KestrelError::UnknownOpcode { pc: 0, .. }));
    }

    #[test]
    fn x0_stays_zero_through_writeback() {
        let (cpu, _, _) = run_src("addi x0, x0, 5\nhalt\n");
        assert_eq!(cpu.read(0), 0);
    }

    #[test]
    fn untaken_branch_falls_through() {
        let (cpu, _, _) = run_src("beq x1, x2, 8\naddi x5, x0, 1\nhalt\n");
        // x1 == x2 == 0, so the branch IS taken and skips the addi
        assert_eq!(cpu.read(5), 0);
        let (cpu, _, _) = run_src("bne x1, x2, 8\naddi x5, x0, 1\nhalt\n");
        assert_eq!(cpu.read(5), 1);
    }

    #[test]
    fn division_by_zero_follows_the_isa() {
        let (cpu, _, _) = run_src(
            "addi x10, x0, 20\naddi x11, x0, 0\ndiv x5, x10, x11\nrem x6, x10, x11\nhalt\n",
        );
        assert_eq!(cpu.read(5), -1);
        assert_eq!(cpu.read(6), 20);
    }

    #[test]
    fn shifts_and_compares() {
        let (cpu, _, _) = run_src(
            "addi x1, x0, -8\nsrai x2, x1, 2\nsrli x3, x1, 28\nslti x4, x1, 0\nsltiu x5, x1, 0\nhalt\n",
        );
        assert_eq!(cpu.read(2), -2);
        assert_eq!(cpu.read(3), 0xF);
        assert_eq!(cpu.read(4), 1);
        assert_eq!(cpu.read(5), 0); // -8 as unsigned is huge
    }

    #[test]
    fn jalr_links_and_clears_bit_zero() {
        let (cpu, _, _) = run_src("addi x5, x0, 13\njalr x1, x5, 0\nhalt\n");
        // target 13 & ~1 = 12: off the end of the program
        assert_eq!(cpu.read(1), 8);
        assert_eq!(cpu.pc, 12);
    }

    #[test]
    fn stores_and_loads_cooperate_on_lanes() {
        let (cpu, _, _) = run_src(
            "lui x11, 0x10000\naddi x5, x0, 258\nsw x5, 0(x11)\nlb x6, 0(x11)\nlb x7, 1(x11)\nlbu x8, 1(x11)\nhalt\n",
        );
        assert_eq!(cpu.read(6), 2);
        assert_eq!(cpu.read(7), 1);
        assert_eq!(cpu.read(8), 1);
    }

    #[test]
    fn stack_initialization_holds() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        init_stack(&mut cpu, &mut mem);
        assert_eq!(cpu.read(2) as u32, STACK_BASE);
        assert_eq!(mem.load_word(STACK_END), 0);
        assert_eq!(mem.load_word(STACK_BASE - 4), 0);
    }

    #[test]
    fn data_memory_unpacks_little_endian() {
        let mut table = SymbolTable::new();
        let mut cursor = DATA_BASE;
        table.append_data_entry(&mut cursor, 0x48, 1);
        table.append_data_entry(&mut cursor, 0x69, 1);
        table.append_data_entry(&mut cursor, 0, 1);
        let mut mem = Memory::new();
        init_data_memory(&mut mem, &table);
        assert_eq!(mem.load_word(DATA_BASE), 0x0000_6948);
    }
}
