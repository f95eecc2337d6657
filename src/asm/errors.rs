use thiserror::Error;

/// Assembly-time failure, carrying the 1-based source line.
#[derive(Error, Debug, Clone)]
#[error("line {line}: {msg}")]
pub struct AsmError {
    pub line: usize,
    pub msg: String,
}

impl AsmError {
    pub fn new(line: usize, msg: impl Into<String>) -> Self {
        AsmError {
            line,
            msg: msg.into(),
        }
    }
}
