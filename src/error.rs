use serde::Serialize;

/// What went wrong while assembling a line or decoding an opcode.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[error("unknown instruction")]
    UnknownInstruction,
    #[error("operand not allowed")]
    OperandNotAllowed,
    #[error("unknown operand")]
    UnknownOperand,
    #[error("illegal size")]
    IllegalSize,
    #[error("overflow range")]
    OverflowRange,
    #[error("illegal constant")]
    IllegalConstant,
    #[error("illegal bit number")]
    IllegalBitNumber,
    #[error("operand not aligned")]
    OperandNotAligned,
    #[error("operand too far")]
    OperandTooFar,
    #[error("undefined symbol")]
    UndefinedSymbol,
    #[error("duplicate register")]
    DuplicateRegister,
    #[error("register not allowed")]
    RegisterNotAllowed,
    #[error("garbage at end")]
    GarbageAtEnd,
    #[error("missing closing paren")]
    MissingClosingParen,
    #[error("missing closing quote")]
    MissingClosingQuote,
    #[error("divide by zero")]
    DivideByZero,
    #[error("no memory")]
    NoMemory,
    #[error("internal error")]
    InternalError,
}

/// An error kind with the offset it was detected at.
///
/// For assembly `at` is a byte offset into the source line; for
/// disassembly it is the byte offset inside the instruction.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[error("{kind} at {at}")]
pub struct Error {
    pub kind: ErrorKind,
    pub at: usize,
}

impl Error {
    pub fn new(kind: ErrorKind, at: usize) -> Self {
        Self { kind, at }
    }

    /// Errors that still let the instruction be emitted.
    pub fn is_soft(&self) -> bool {
        self.kind == ErrorKind::UndefinedSymbol
    }
}

impl ErrorKind {
    pub fn at(self, at: usize) -> Error {
        Error::new(self, at)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
