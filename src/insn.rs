use crate::arch::{ArchConfig, LadderStep, RelBase};
use crate::error::{Error, ErrorKind};
use crate::instructions::Page;
use crate::memory::Endian;
use crate::operand::Force;

/// Where an extension lands relative to the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Between the prefix and the opcode.
    Infix,
    /// Right after the opcode, before any other extension.
    Index,
    Payload,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Value { value: u32, bytes: u8, endian: Endian },
    Relative { target: i64, bytes: u8, undefined: bool },
    Ladder { value: i64, relative: bool, force: Option<Force>, undefined: bool },
}

#[derive(Debug, Clone, Copy)]
struct Ext {
    stage: Stage,
    at: usize,
    field: Field,
}

/// Bytes and first error of an encoded instruction.
pub type Encoded = (Vec<u8>, Option<Error>);

/// Accumulates one instruction while its operands are encoded, then lays it
/// out once every extension size is known.
#[derive(Debug, Clone)]
pub struct Insn {
    address: u32,
    config: ArchConfig,
    prefix: &'static [u8],
    opcode: u32,
    opcode_len: u8,
    infix: u8,
    exts: Vec<Ext>,
}

impl Insn {
    pub fn new(address: u32, config: ArchConfig) -> Self {
        Self { address, config, prefix: &[], opcode: 0, opcode_len: 1, infix: 0, exts: Vec::new() }
    }

    pub fn start<M>(&mut self, page: &Page<M>, opcode: u32) {
        self.prefix = page.prefix;
        self.opcode_len = page.opcode_len;
        self.infix = page.infix;
        self.opcode = opcode;
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn config(&self) -> &ArchConfig {
        &self.config
    }

    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    pub fn set_opcode(&mut self, opcode: u32) {
        self.opcode = opcode;
    }

    /// ORs `field` into the opcode at `pos`, masked to `width` bits.
    pub fn embed(&mut self, field: u32, pos: u8, width: u8) {
        let mask = ((1u64 << width) - 1) as u32;
        self.opcode |= (field & mask) << pos;
    }

    /// Stage for an operand displacement: the infix slot if the page reserves
    /// one that is still free, otherwise the payload.
    pub fn disp_stage(&self) -> Stage {
        let used = self.exts.iter().filter(|e| e.stage == Stage::Infix).count();
        if used < self.infix as usize { Stage::Infix } else { Stage::Payload }
    }

    pub fn emit(&mut self, stage: Stage, value: u32, bytes: u8, at: usize) {
        let endian = self.config.endian;
        self.emit_endian(stage, value, bytes, endian, at);
    }

    pub fn emit_endian(&mut self, stage: Stage, value: u32, bytes: u8, endian: Endian, at: usize) {
        self.exts.push(Ext { stage, at, field: Field::Value { value, bytes, endian } });
    }

    pub fn emit_relative(&mut self, stage: Stage, target: i64, bytes: u8, undefined: bool, at: usize) {
        self.exts.push(Ext { stage, at, field: Field::Relative { target, bytes, undefined } });
    }

    pub fn emit_ladder(&mut self, stage: Stage, value: i64, relative: bool, force: Option<Force>, undefined: bool, at: usize) {
        self.exts.push(Ext { stage, at, field: Field::Ladder { value, relative, force, undefined } });
    }

    fn base(&self, len_bytes: usize) -> i64 {
        match self.config.rel_base {
            RelBase::Start => self.address as i64,
            RelBase::End => self.address as i64 + (len_bytes / self.config.unit.bytes()) as i64,
        }
    }

    fn head_len(&self) -> usize {
        self.prefix.len() + self.opcode_len as usize * self.config.unit.bytes()
    }

    /// Lays the instruction out. Extensions that cannot be represented still
    /// occupy their final width; the first such problem is returned.
    pub fn finish(self) -> Encoded {
        let steps = self.config.ladder.unwrap_or(&[]);
        let mut sizes: Vec<usize> = self
            .exts
            .iter()
            .map(|e| match e.field {
                Field::Value { bytes, .. } | Field::Relative { bytes, .. } => bytes as usize,
                Field::Ladder { value, relative: false, force, undefined } => ladder_size(steps, value, force, undefined),
                Field::Ladder { force, undefined, .. } => ladder_size(steps, 0, force, undefined),
            })
            .collect();

        // Relative ladders may grow the instruction, which moves an End base.
        for _ in 0..=steps.len() {
            let total = self.head_len() + sizes.iter().sum::<usize>();
            let mut grown = false;
            for (i, e) in self.exts.iter().enumerate() {
                if let Field::Ladder { value, relative: true, force, undefined } = e.field {
                    let size = ladder_size(steps, value - self.base(total), force, undefined);
                    if size > sizes[i] {
                        sizes[i] = size;
                        grown = true;
                    }
                }
            }
            if !grown {
                break;
            }
        }

        let total = self.head_len() + sizes.iter().sum::<usize>();
        let base = self.base(total);
        let mut error: Option<Error> = None;
        let mut chunks: Vec<(Stage, Vec<u8>)> = Vec::with_capacity(self.exts.len());
        for (e, &size) in self.exts.iter().zip(&sizes) {
            let bytes = match e.field {
                Field::Value { value, bytes, endian } => put(value, bytes as usize, endian),
                Field::Relative { target, bytes, undefined } => {
                    let delta = if undefined { 0 } else { target - base };
                    let bits = bytes as u32 * 8;
                    if !fits_signed(delta, bits) {
                        error.get_or_insert(ErrorKind::OperandTooFar.at(e.at));
                    }
                    put(delta as u32, bytes as usize, self.config.endian)
                }
                Field::Ladder { value, relative, undefined, .. } => {
                    let v = match (undefined, relative) {
                        (true, _) => 0,
                        (false, true) => value - base,
                        (false, false) => value,
                    };
                    let step = steps.iter().find(|s| s.bytes as usize == size);
                    match step {
                        Some(step) if step.min <= v && v <= step.max => ladder_bytes(step, v),
                        Some(step) => {
                            let kind = if relative { ErrorKind::OperandTooFar } else { ErrorKind::OverflowRange };
                            error.get_or_insert(kind.at(e.at));
                            ladder_bytes(step, 0)
                        }
                        None => {
                            error.get_or_insert(ErrorKind::InternalError.at(e.at));
                            vec![0; size]
                        }
                    }
                }
            };
            chunks.push((e.stage, bytes));
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(self.prefix);
        extend_stage(&mut out, &chunks, Stage::Infix);
        let n = self.opcode_len as usize * self.config.unit.bytes();
        out.extend(put(self.opcode, n, self.config.endian));
        extend_stage(&mut out, &chunks, Stage::Index);
        extend_stage(&mut out, &chunks, Stage::Payload);
        (out, error)
    }
}

fn extend_stage(out: &mut Vec<u8>, chunks: &[(Stage, Vec<u8>)], stage: Stage) {
    for (s, bytes) in chunks {
        if *s == stage {
            out.extend_from_slice(bytes);
        }
    }
}

/// Low `n` bytes of `value` in `endian` order.
pub fn put(value: u32, n: usize, endian: Endian) -> Vec<u8> {
    let n = n.min(4);
    match endian {
        Endian::Big => value.to_be_bytes()[4 - n..].to_vec(),
        Endian::Little => value.to_le_bytes()[..n].to_vec(),
    }
}

pub fn fits_signed(v: i64, bits: u32) -> bool {
    let half = 1i64 << (bits - 1);
    (-half..half).contains(&v)
}

pub fn fits_unsigned(v: i64, bits: u32) -> bool {
    (0..(1i64 << bits)).contains(&v)
}

/// Byte size the ladder picks for `value`. Unresolved values take the long
/// form unless forced short.
pub fn ladder_size(steps: &[LadderStep], value: i64, force: Option<Force>, undefined: bool) -> usize {
    let (Some(first), Some(last)) = (steps.first(), steps.last()) else { return 0 };
    let step = match (force, undefined) {
        (Some(Force::Short), _) => first,
        (Some(Force::Long), _) | (None, true) => last,
        (None, false) => steps.iter().find(|s| s.min <= value && value <= s.max).unwrap_or(last),
    };
    step.bytes as usize
}

/// Big-endian bytes of `value` tagged for `step`.
pub fn ladder_bytes(step: &LadderStep, value: i64) -> Vec<u8> {
    let bits = step.bytes as u32 * 8 - step.tag_bits as u32;
    let raw = (value as u64 & ((1u64 << bits) - 1)) | ((step.tag as u64) << bits);
    put(raw as u32, step.bytes as usize, Endian::Big)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_orders_bytes() {
        assert_eq!(put(0x1234, 2, Endian::Big), vec![0x12, 0x34]);
        assert_eq!(put(0x1234, 2, Endian::Little), vec![0x34, 0x12]);
        assert_eq!(put(0xAB, 1, Endian::Big), vec![0xAB]);
    }

    #[test]
    fn range_helpers() {
        assert!(fits_signed(-128, 8));
        assert!(!fits_signed(128, 8));
        assert!(fits_unsigned(255, 8));
        assert!(!fits_unsigned(-1, 8));
    }
}
