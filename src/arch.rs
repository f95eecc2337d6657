// Base opcodes, word bits [6:0].
pub const OPC_RTYPE: u8 = 0x33;
pub const OPC_OPIMM: u8 = 0x13;
pub const OPC_LOAD: u8 = 0x03;
pub const OPC_STORE: u8 = 0x23;
pub const OPC_BRANCH: u8 = 0x63;
pub const OPC_LUI: u8 = 0x37;
pub const OPC_AUIPC: u8 = 0x17;
pub const OPC_JAL: u8 = 0x6F;
pub const OPC_JALR: u8 = 0x67;
/// Custom opcode: orderly stop plus a data memory dump.
pub const OPC_HALT: u8 = 0x7F;

// Address map. Text grows by 4 per instruction, data by entry size,
// the stack grows downward from STACK_BASE.
pub const TEXT_BASE: u32 = 0x0000_0000;
pub const DATA_BASE: u32 = 0x1000_0000;
pub const STACK_SIZE: u32 = 1 << 20;
pub const STACK_BASE: u32 = 0x8000_0000;
pub const STACK_END: u32 = STACK_BASE - STACK_SIZE;
