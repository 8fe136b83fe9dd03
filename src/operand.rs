use crate::error::{Error, ErrorKind};
use crate::instructions::Size;
use crate::value::Value;

/// Explicit size-forcing prefix on an address or displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Force {
    /// `<`: short / direct page.
    Short,
    /// `>`: long / extended.
    Long,
}

/// Parsed (or decoded) operand. `M` is the target's addressing-mode enum
/// and `R` its register enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand<M, R> {
    pub mode: M,
    pub value: i64,
    pub undefined: bool,
    pub force: Option<Force>,
    pub reg: Option<R>,
    pub index: Option<R>,
    pub index_size: Size,
    /// Register list bitmap, bit n for register n.
    pub list: u32,
    /// Offset of the operand text in the line.
    pub at: usize,
    pub error: Option<Error>,
}

impl<M, R> Operand<M, R> {
    pub fn new(mode: M, at: usize) -> Self {
        Self {
            mode,
            value: 0,
            undefined: false,
            force: None,
            reg: None,
            index: None,
            index_size: Size::None,
            list: 0,
            at,
            error: None,
        }
    }

    pub fn with_value(mut self, v: Value) -> Self {
        self.value = v.value;
        self.undefined = v.undefined;
        if v.undefined && self.error.is_none() {
            self.error = Some(ErrorKind::UndefinedSymbol.at(self.at));
        }
        self
    }

    pub fn with_num(mut self, value: i64) -> Self {
        self.value = value;
        self
    }

    pub fn with_reg(mut self, reg: R) -> Self {
        self.reg = Some(reg);
        self
    }

    pub fn with_list(mut self, list: u32) -> Self {
        self.list = list;
        self
    }

    pub fn with_force(mut self, force: Option<Force>) -> Self {
        self.force = force;
        self
    }

    pub fn failed(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    /// Error that must stop encoding of the line.
    pub fn hard_error(&self) -> Option<Error> {
        self.error.filter(|e| !e.is_soft())
    }
}
