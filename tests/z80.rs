use pretty_assertions::assert_eq;

use retroasm::{ArchId, ErrorKind, Memory, NoSymbols, Options};

fn asm(line: &str) -> Vec<u8> {
    let out = retroasm::assemble(ArchId::Z80, line, 0x1000, &NoSymbols);
    assert!(out.is_ok(), "{line}: {:?}", out.error);
    out.bytes
}

fn asm_err(line: &str) -> Option<ErrorKind> {
    retroasm::assemble(ArchId::Z80, line, 0x1000, &NoSymbols).error_kind()
}

fn dis(bytes: &[u8]) -> String {
    let mut mem = Memory::new(0x1000, bytes.to_vec());
    let d = retroasm::disassemble(ArchId::Z80, &mut mem, &NoSymbols, Options::default());
    assert!(d.is_ok(), "{bytes:02x?}: {:?}", d.error);
    assert_eq!(d.len(), bytes.len());
    d.text()
}

#[test]
fn register_fields_embed_into_the_opcode() {
    assert_eq!(asm("LD A,B"), vec![0x78]);
    assert_eq!(asm("LD A,(HL)"), vec![0x7E]);
    assert_eq!(asm("LD (HL),A"), vec![0x77]);
    assert_eq!(asm("ld e,l"), vec![0x5D]);
    assert_eq!(asm("ADD A,C"), vec![0x81]);
    assert_eq!(asm("SUB B"), vec![0x90]);
    assert_eq!(asm("PUSH AF"), vec![0xF5]);
    assert_eq!(asm("LD BC,1234H"), vec![0x01, 0x34, 0x12]);
}

#[test]
fn halt_is_not_a_load() {
    assert_eq!(asm("HALT"), vec![0x76]);
    assert_eq!(asm_err("LD (HL),(HL)"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(dis(&[0x76]), "HALT");
}

#[test]
fn index_registers_use_prefix_pages() {
    assert_eq!(asm("LD (IX+5),A"), vec![0xDD, 0x77, 0x05]);
    assert_eq!(asm("LD B,(IY-3)"), vec![0xFD, 0x46, 0xFD]);
    assert_eq!(asm("LD (IX+5),0AAH"), vec![0xDD, 0x36, 0x05, 0xAA]);
    assert_eq!(asm("PUSH IX"), vec![0xDD, 0xE5]);
    assert_eq!(asm("JP (IY)"), vec![0xFD, 0xE9]);
    assert_eq!(asm_err("JP (IX+1)"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err("LD (IX+128),A"), Some(ErrorKind::OverflowRange));
}

#[test]
fn index_bit_ops_put_displacement_before_opcode() {
    assert_eq!(asm("BIT 3,(IX+2)"), vec![0xDD, 0xCB, 0x02, 0x5E]);
    assert_eq!(asm("SET 0,(IY-1)"), vec![0xFD, 0xCB, 0xFF, 0xC6]);
    assert_eq!(dis(&[0xDD, 0xCB, 0x02, 0x5E]), "BIT 3,(IX+2)");
    assert_eq!(asm_err("BIT 8,A"), Some(ErrorKind::IllegalBitNumber));
}

#[test]
fn relative_jumps_and_conditions() {
    assert_eq!(asm("JR 1010H"), vec![0x18, 0x0E]);
    assert_eq!(asm("JR NZ,1010H"), vec![0x20, 0x0E]);
    assert_eq!(asm("JR C,$"), vec![0x38, 0xFE]);
    assert_eq!(asm("JP C,1234H"), vec![0xDA, 0x34, 0x12]);
    assert_eq!(asm_err("JR PO,1010H"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err("DJNZ 2000H"), Some(ErrorKind::OperandTooFar));
    assert_eq!(dis(&[0x38, 0x0E]), "JR C,1010H");
}

#[test]
fn restart_and_interrupt_mode_map_their_operands() {
    assert_eq!(asm("RST 38H"), vec![0xFF]);
    assert_eq!(asm("RST 8"), vec![0xCF]);
    assert_eq!(asm_err("RST 7"), Some(ErrorKind::IllegalConstant));
    assert_eq!(asm("IM 0"), vec![0xED, 0x46]);
    assert_eq!(asm("IM 1"), vec![0xED, 0x56]);
    assert_eq!(asm("IM 2"), vec![0xED, 0x5E]);
    assert_eq!(asm_err("IM 3"), Some(ErrorKind::IllegalConstant));
    assert_eq!(dis(&[0xED, 0x5E]), "IM 2");
}

#[test]
fn main_page_wins_over_ed_for_hl_store() {
    assert_eq!(asm("LD (1234H),HL"), vec![0x22, 0x34, 0x12]);
    assert_eq!(asm("LD (1234H),BC"), vec![0xED, 0x43, 0x34, 0x12]);
    // The ED encoding of the same instruction still decodes.
    assert_eq!(dis(&[0xED, 0x63, 0x34, 0x12]), "LD (1234H),HL");
}

#[test]
fn unknown_forms() {
    assert_eq!(asm_err("LD A,"), Some(ErrorKind::UnknownOperand));
    assert_eq!(asm_err("LD A,(BC"), Some(ErrorKind::MissingClosingParen));
    assert_eq!(asm_err("LD A,(AF)"), Some(ErrorKind::RegisterNotAllowed));
    assert_eq!(asm_err("LD A,(1234H"), Some(ErrorKind::MissingClosingParen));
    assert_eq!(asm_err("MOV A,B"), Some(ErrorKind::UnknownInstruction));
    assert_eq!(asm_err("EX DE,BC"), Some(ErrorKind::OperandNotAllowed));
}

#[test]
fn decode_renders_reassemblable_text() {
    for line in [
        "NOP",
        "LD A,B",
        "LD A,(HL)",
        "LD BC,1234H",
        "LD (IX+5),A",
        "LD B,(IY-3)",
        "LD (IX+5),0AAH",
        "BIT 3,(IX+2)",
        "SET 7,(HL)",
        "JR C,1010H",
        "DJNZ 1000H",
        "JP 0C000H",
        "CALL NZ,1234H",
        "RST 38H",
        "IM 1",
        "EX AF,AF'",
        "PUSH IX",
        "OUT (0FEH),A",
        "IN A,(C)",
        "LD (1234H),HL",
        "LD I,A",
        "EX (SP),HL",
        "ADD IX,DE",
        "RET PE",
    ] {
        assert_eq!(dis(&asm(line)), line);
    }
}

#[test]
fn lowercase_rendering() {
    let mut mem = Memory::new(0, vec![0xDD, 0x77, 0x05]);
    let options = Options { lowercase: true, ..Options::default() };
    let d = retroasm::disassemble(ArchId::Z80, &mut mem, &NoSymbols, options);
    assert_eq!(d.text(), "ld (ix+5),a");
}

#[test]
fn operand_errors_keep_the_instruction_length() {
    let out = retroasm::assemble(ArchId::Z80, "LD (IX+200),5", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0xDD, 0x36, 0x00, 0x05]);

    let out = retroasm::assemble(ArchId::Z80, "LD A,1FFH", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0x3E, 0x00]);

    let out = retroasm::assemble(ArchId::Z80, "JR 2000H", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OperandTooFar));
    assert_eq!(out.bytes.len(), 2);
}

#[test]
fn undocumented_interrupt_mode_does_not_decode() {
    let mut mem = Memory::new(0, vec![0xED, 0x4E]);
    let d = retroasm::disassemble(ArchId::Z80, &mut mem, &NoSymbols, Options::default());
    assert_eq!(d.error_kind(), Some(ErrorKind::IllegalConstant));
}
