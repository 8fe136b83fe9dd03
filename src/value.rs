use serde::Serialize;

use crate::error::{ErrorKind, Result};
use crate::scanner::{is_ident_char, Scanner};
use crate::symbols::SymbolTable;

/// Number syntax family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dialect {
    /// `0FFH`, `377Q`, `1010B`, `$FF`, `0xFF`; `$` is the location counter.
    Intel,
    /// `$FF`, `%1010`, `@377`; `*` is the location counter.
    Motorola,
    /// `0xFF`, `0b1010`, `0o377`; `*` is the location counter.
    National,
    /// `>FF`, `0xFF`; `$` is the location counter.
    Texas,
}

impl Dialect {
    pub fn location_symbol(self) -> char {
        match self {
            Dialect::Intel | Dialect::Texas => '$',
            Dialect::Motorola | Dialect::National => '*',
        }
    }

    /// Renders `v` in hex with at least `digits` digits.
    pub fn hex(self, v: u64, digits: usize) -> String {
        match self {
            Dialect::Intel => {
                let s = format!("{v:0digits$X}");
                if s.starts_with(|c: char| c.is_ascii_alphabetic()) { format!("0{s}H") } else { format!("{s}H") }
            }
            Dialect::Motorola => format!("${v:0digits$X}"),
            Dialect::National => format!("0x{v:0digits$x}"),
            Dialect::Texas => format!(">{v:0digits$X}"),
        }
    }

    /// Renders a signed value; small magnitudes stay decimal.
    pub fn signed(self, v: i64) -> String {
        if (-9..=9).contains(&v) {
            return v.to_string();
        }
        if v < 0 { format!("-{}", self.hex(v.unsigned_abs(), 1)) } else { self.hex(v as u64, 1) }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Value {
    pub value: i64,
    /// Some symbol in the expression has no value yet; `value` treats it as 0.
    pub undefined: bool,
}

impl Value {
    pub fn new(value: i64) -> Self {
        Self { value, undefined: false }
    }
}

/// Expression evaluator over one dialect and a symbol table snapshot.
pub struct ValueParser<'a> {
    dialect: Dialect,
    symbols: &'a dyn SymbolTable,
    location: u32,
}

#[derive(Clone, Copy)]
enum BinOp { Or, Xor, And, Shl, Shr, Add, Sub, Mul, Div, Rem }

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::Xor => 2,
            BinOp::And => 3,
            BinOp::Shl | BinOp::Shr => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }
}

const MIN_VALUE: i64 = -(1 << 31);
const MAX_VALUE: i64 = u32::MAX as i64;

impl<'a> ValueParser<'a> {
    pub fn new(dialect: Dialect, symbols: &'a dyn SymbolTable) -> Self {
        Self { dialect, symbols, location: 0 }
    }

    /// Sets the value of the location counter symbol.
    pub fn at(mut self, location: u32) -> Self {
        self.location = location;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn symbols(&self) -> &'a dyn SymbolTable {
        self.symbols
    }

    /// Parses one expression from the start of `text`, returning the value and
    /// how many bytes were consumed.
    pub fn parse_str(&self, text: &str) -> Result<(Value, usize)> {
        let mut scan = Scanner::new(text);
        let v = self.parse(&mut scan)?;
        Ok((v, scan.pos()))
    }

    /// Parses an expression at the cursor. On error the cursor is left where
    /// it was.
    pub fn parse(&self, scan: &mut Scanner<'_>) -> Result<Value> {
        let start = scan.pos();
        match self.expr(scan, 0) {
            Ok(v) if !v.undefined && !(MIN_VALUE..=MAX_VALUE).contains(&v.value) => {
                scan.set_pos(start);
                Err(ErrorKind::OverflowRange.at(start))
            }
            Ok(v) => Ok(v),
            Err(e) => {
                scan.set_pos(start);
                Err(e)
            }
        }
    }

    fn expr(&self, scan: &mut Scanner<'_>, min_prec: u8) -> Result<Value> {
        let mut lhs = self.unary(scan)?;
        loop {
            let save = scan.pos();
            scan.skip_spaces();
            let at = scan.pos();
            let Some(op) = self.binop(scan) else {
                scan.set_pos(save);
                break;
            };
            if op.precedence() <= min_prec {
                scan.set_pos(save);
                break;
            }
            let rhs = self.expr(scan, op.precedence())?;
            lhs = apply(op, lhs, rhs, at)?;
        }
        Ok(lhs)
    }

    fn binop(&self, scan: &mut Scanner<'_>) -> Option<BinOp> {
        let op = match (scan.peek()?, scan.peek_nth(1)) {
            ('<', Some('<')) => { scan.bump(); BinOp::Shl }
            ('>', Some('>')) => { scan.bump(); BinOp::Shr }
            ('|', _) => BinOp::Or,
            ('^', _) => BinOp::Xor,
            ('&', _) => BinOp::And,
            ('+', _) => BinOp::Add,
            ('-', _) => BinOp::Sub,
            ('*', _) => BinOp::Mul,
            ('/', _) => BinOp::Div,
            ('%', _) => BinOp::Rem,
            _ => return None,
        };
        scan.bump();
        Some(op)
    }

    fn unary(&self, scan: &mut Scanner<'_>) -> Result<Value> {
        scan.skip_spaces();
        let at = scan.pos();
        match scan.peek() {
            Some('-') => { scan.bump(); let v = self.unary(scan)?; Ok(Value { value: v.value.wrapping_neg(), ..v }) }
            Some('+') => { scan.bump(); self.unary(scan) }
            Some('~') => { scan.bump(); let v = self.unary(scan)?; Ok(Value { value: !v.value, ..v }) }
            Some('!') => { scan.bump(); let v = self.unary(scan)?; Ok(Value { value: (v.value == 0) as i64, ..v }) }
            Some(open @ ('(' | '[')) => {
                scan.bump();
                let v = self.expr(scan, 0)?;
                scan.skip_spaces();
                let close = if open == '(' { ')' } else { ']' };
                if !scan.eat(close) {
                    return Err(ErrorKind::MissingClosingParen.at(scan.pos()));
                }
                Ok(v)
            }
            Some('\'') => {
                scan.bump();
                let c = scan.bump().ok_or(ErrorKind::MissingClosingQuote.at(at))?;
                if !scan.eat('\'') {
                    return Err(ErrorKind::MissingClosingQuote.at(scan.pos()));
                }
                Ok(Value::new(c as i64))
            }
            Some(_) => {
                if let Some(n) = self.number(scan)? {
                    return Ok(Value::new(n as i64));
                }
                if scan.eat(self.dialect.location_symbol()) {
                    return Ok(Value::new(self.location as i64));
                }
                if let Some(name) = scan.ident() {
                    return Ok(match self.symbols.lookup_value(name) {
                        Some(v) => Value::new(v as i64),
                        None => Value { value: 0, undefined: true },
                    });
                }
                Err(ErrorKind::UnknownOperand.at(at))
            }
            None => Err(ErrorKind::UnknownOperand.at(at)),
        }
    }

    /// Parses a numeric literal if one starts at the cursor.
    fn number(&self, scan: &mut Scanner<'_>) -> Result<Option<u64>> {
        let at = scan.pos();
        let c0 = match scan.peek() { Some(c) => c, None => return Ok(None) };
        let c1 = scan.peek_nth(1);
        let prefixed = |p: char, radix: u32| c0 == p && c1.map_or(false, |c| c.is_digit(radix));
        let radix_prefix = match self.dialect {
            Dialect::Intel if prefixed('$', 16) => Some((1, 16)),
            Dialect::Motorola if prefixed('$', 16) => Some((1, 16)),
            Dialect::Motorola if prefixed('%', 2) => Some((1, 2)),
            Dialect::Motorola if prefixed('@', 8) => Some((1, 8)),
            Dialect::Texas if prefixed('>', 16) => Some((1, 16)),
            _ => None,
        };
        if let Some((skip, radix)) = radix_prefix {
            for _ in 0..skip { scan.bump(); }
            return digits(scan, radix, at).map(Some);
        }
        if !c0.is_ascii_digit() {
            return Ok(None);
        }
        if c0 == '0' {
            let c2 = scan.peek_nth(2);
            let radix = match (self.dialect, c1) {
                (_, Some('x' | 'X')) => 16,
                (Dialect::National, Some('b' | 'B')) => 2,
                (Dialect::National, Some('o' | 'O')) => 8,
                _ => 0,
            };
            if radix != 0 && c2.map_or(false, |c| c.is_digit(radix)) {
                scan.bump();
                scan.bump();
                return digits(scan, radix, at).map(Some);
            }
        }
        if self.dialect == Dialect::Intel {
            return intel_number(scan, at).map(Some);
        }
        digits(scan, 10, at).map(Some)
    }
}

fn accumulate(body: &str, radix: u32, at: usize) -> Result<u64> {
    let mut v: u64 = 0;
    for c in body.chars() {
        let d = c.to_digit(radix).ok_or(ErrorKind::IllegalConstant.at(at))?;
        v = v * radix as u64 + d as u64;
        if v > u32::MAX as u64 {
            return Err(ErrorKind::OverflowRange.at(at));
        }
    }
    Ok(v)
}

fn digits(scan: &mut Scanner<'_>, radix: u32, at: usize) -> Result<u64> {
    let rest = scan.rest();
    let end = rest.find(|c: char| !c.is_digit(radix)).unwrap_or(rest.len());
    if rest[end..].chars().next().map_or(false, is_ident_char) {
        return Err(ErrorKind::IllegalConstant.at(at));
    }
    let v = accumulate(&rest[..end], radix, at)?;
    scan.set_pos(scan.pos() + end);
    Ok(v)
}

/// Suffix-radix numbers: `0FFH`, `377Q`, `1010B`, `99D`.
fn intel_number(scan: &mut Scanner<'_>, at: usize) -> Result<u64> {
    let rest = scan.rest();
    let end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
    let token = &rest[..end];
    let (body, radix) = match token.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('H') => (&token[..end - 1], 16),
        Some('O' | 'Q') => (&token[..end - 1], 8),
        Some('B') if token[..end - 1].chars().all(|c| c == '0' || c == '1') => (&token[..end - 1], 2),
        Some('D') if token[..end - 1].chars().all(|c| c.is_ascii_digit()) => (&token[..end - 1], 10),
        _ => (token, 10),
    };
    if body.is_empty() {
        return Err(ErrorKind::IllegalConstant.at(at));
    }
    let v = accumulate(body, radix, at)?;
    scan.set_pos(scan.pos() + end);
    Ok(v)
}

fn apply(op: BinOp, lhs: Value, rhs: Value, at: usize) -> Result<Value> {
    let undefined = lhs.undefined || rhs.undefined;
    let (a, b) = (lhs.value, rhs.value);
    let value = match op {
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::And => a & b,
        BinOp::Shl => a.wrapping_shl((b & 63) as u32),
        BinOp::Shr => ((a as u64 & 0xFFFF_FFFF) >> (b & 63)) as i64,
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Rem if b == 0 => {
            if undefined {
                0
            } else {
                return Err(ErrorKind::DivideByZero.at(at));
            }
        }
        BinOp::Div => a.wrapping_div(b),
        BinOp::Rem => a.wrapping_rem(b),
    };
    Ok(Value { value, undefined })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{NoSymbols, Symbols};

    fn eval(dialect: Dialect, text: &str) -> Result<(Value, usize)> {
        ValueParser::new(dialect, &NoSymbols).at(0x100).parse_str(text)
    }

    #[test]
    fn intel_suffixes() {
        assert_eq!(eval(Dialect::Intel, "0FFH").unwrap().0.value, 0xFF);
        assert_eq!(eval(Dialect::Intel, "377Q").unwrap().0.value, 0o377);
        assert_eq!(eval(Dialect::Intel, "1010B").unwrap().0.value, 10);
        assert_eq!(eval(Dialect::Intel, "12").unwrap().0.value, 12);
        assert_eq!(eval(Dialect::Intel, "$1F").unwrap().0.value, 0x1F);
        assert_eq!(eval(Dialect::Intel, "$+2").unwrap().0.value, 0x102);
    }

    #[test]
    fn motorola_prefixes() {
        assert_eq!(eval(Dialect::Motorola, "$FF").unwrap().0.value, 0xFF);
        assert_eq!(eval(Dialect::Motorola, "%101").unwrap().0.value, 5);
        assert_eq!(eval(Dialect::Motorola, "@17").unwrap().0.value, 15);
        assert_eq!(eval(Dialect::Motorola, "*-2").unwrap().0.value, 0xFE);
        assert_eq!(eval(Dialect::Motorola, "7%4").unwrap().0.value, 3);
    }

    #[test]
    fn stops_before_operand_separator() {
        let (v, n) = eval(Dialect::Motorola, "$10,X").unwrap();
        assert_eq!(v.value, 0x10);
        assert_eq!(n, 3);
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval(Dialect::National, "2+3*4").unwrap().0.value, 14);
        assert_eq!(eval(Dialect::National, "(2+3)*4").unwrap().0.value, 20);
        assert_eq!(eval(Dialect::National, "0x1234>>8").unwrap().0.value, 0x12);
        assert_eq!(eval(Dialect::National, "-1&0xFF").unwrap().0.value, 0xFF);
        assert_eq!(eval(Dialect::National, "'A'+1").unwrap().0.value, 0x42);
    }

    #[test]
    fn errors() {
        assert_eq!(eval(Dialect::National, "(1+2").unwrap_err().kind, ErrorKind::MissingClosingParen);
        assert_eq!(eval(Dialect::National, "4/0").unwrap_err().kind, ErrorKind::DivideByZero);
        assert_eq!(eval(Dialect::National, "0x100000000").unwrap_err().kind, ErrorKind::OverflowRange);
        assert_eq!(eval(Dialect::National, "'A").unwrap_err().kind, ErrorKind::MissingClosingQuote);
        assert_eq!(eval(Dialect::National, ",").unwrap_err().kind, ErrorKind::UnknownOperand);
    }

    #[test]
    fn undefined_symbol_is_not_a_failure() {
        let mut syms = Symbols::new();
        syms.define("known", 0x40);
        let p = ValueParser::new(Dialect::Intel, &syms);
        let (v, _) = p.parse_str("known+1").unwrap();
        assert_eq!(v, Value::new(0x41));
        let (v, n) = p.parse_str("later+1").unwrap();
        assert!(v.undefined);
        assert_eq!(n, 7);
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(Dialect::Intel.hex(0xFF, 2), "0FFH");
        assert_eq!(Dialect::Intel.hex(0x12, 2), "12H");
        assert_eq!(Dialect::Motorola.hex(0x1002, 4), "$1002");
        assert_eq!(Dialect::Texas.hex(0x1F, 2), ">1F");
        assert_eq!(Dialect::National.signed(-0x20), "-0x20");
    }
}
