use std::error::Error as StdError;
use std::fmt;

/// Errors surfaced by the virtual machine.
///
/// The host decides how to react: [`Error::UnimplementedOpcode`] is a
/// diagnostic and execution may continue (the program counter is left
/// pointing at the offending instruction), while the other kinds mean the
/// machine state can no longer be trusted.
#[derive(Debug)]
pub enum Error {
    /// The program image could not be placed in memory.
    Load(String),
    /// A memory, stack, or framebuffer access fell outside its fixed bounds.
    InvalidAddress(String),
    /// The fetched instruction word matches no known opcode pattern.
    UnimplementedOpcode(u16),
}

impl Error {
    /// Whether continuing to step the machine after this error is meaningless.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::UnimplementedOpcode(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Load(msg) => write!(f, "load error: {}", msg),
            Error::InvalidAddress(msg) => write!(f, "invalid address: {}", msg),
            Error::UnimplementedOpcode(word) => {
                write!(f, "unimplemented opcode: {:#06X}", word)
            }
        }
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;
