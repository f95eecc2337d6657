use thiserror::Error;

/// Errors that can occur while loading or running a listing.
#[derive(Error, Debug)]
pub enum KestrelError {
    /// A fetched word whose opcode is not part of the ISA.
    #[error("unknown opcode {opcode:#04x} at pc {pc:#010x}")]
    UnknownOpcode { pc: u32, opcode: u8 },

    /// A known opcode with an undefined funct combination.
    #[error("decode error at pc {pc:#010x}: {msg}")]
    Decode { pc: u32, msg: &'static str },

    /// A listing line the loader cannot interpret.
    #[error("bad listing line {line}: {msg}")]
    Listing { line: usize, msg: String },

    /// An instruction record the encoder cannot translate.
    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
