// src/instruction.rs

/// Bitfield layout family of an instruction. Also selects the immediate
/// reconstruction rule on the simulator side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    SB,
    U,
    UJ,
    /// The custom halt word; no operand fields.
    Halt,
}

/// One parsed source instruction.
///
/// Operand fields stay textual: the encoder owns the translation to
/// register numbers and bit patterns, and the listing reprints the
/// fields verbatim in its trailing comment. Branch and jump targets are
/// rewritten to a decimal byte offset during the second pass.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: String,
    pub format: Format,
    pub rd: String,
    pub rs1: String,
    pub rs2: String,
    pub immediate: String,
    /// The effective source line, kept for the listing comment.
    pub line_name: String,
}
