use pretty_assertions::assert_eq;

use retroasm::{ArchId, ErrorKind, Memory, NoSymbols, Options};

fn asm(line: &str) -> Vec<u8> {
    let out = retroasm::assemble(ArchId::Ns32000, line, 0x1000, &NoSymbols);
    assert!(out.is_ok(), "{line}: {:?}", out.error);
    out.bytes
}

fn asm_err(line: &str) -> Option<ErrorKind> {
    retroasm::assemble(ArchId::Ns32000, line, 0x1000, &NoSymbols).error_kind()
}

fn decode(bytes: &[u8]) -> retroasm::Decoded {
    let mut mem = Memory::new(0x1000, bytes.to_vec());
    retroasm::disassemble(ArchId::Ns32000, &mut mem, &NoSymbols, Options::default())
}

fn dis(bytes: &[u8]) -> String {
    let d = decode(bytes);
    assert!(d.is_ok(), "{bytes:02x?}: {:?}", d.error);
    assert_eq!(d.len(), bytes.len());
    d.text()
}

#[test]
fn register_and_immediate_general_operands() {
    assert_eq!(asm("MOVD R1,R2"), vec![0x97, 0x08]);
    assert_eq!(asm("MOVB 5,R0"), vec![0x14, 0xA0, 0x05]);
    // Immediates are big-endian even though opcodes are not.
    assert_eq!(asm("MOVW 0x1234,R0"), vec![0x15, 0xA0, 0x12, 0x34]);
    assert_eq!(asm("MOVD 5,R0"), vec![0x17, 0xA0, 0x00, 0x00, 0x00, 0x05]);
    assert_eq!(asm_err("ADDB 300,R0"), Some(ErrorKind::OverflowRange));
    assert_eq!(asm_err("MOVB R0,5"), Some(ErrorKind::OperandNotAllowed));
}

#[test]
fn displacements_pick_the_shortest_ladder_step() {
    assert_eq!(asm("MOVD 4(R1),R0"), vec![0x17, 0x48, 0x04]);
    assert_eq!(asm("MOVD -1(R1),R0"), vec![0x17, 0x48, 0x7F]);
    assert_eq!(asm("MOVD 100(R1),R0"), vec![0x17, 0x48, 0x80, 0x64]);
    assert_eq!(asm("MOVD 0x10000(R1),R0"), vec![0x17, 0x48, 0xC0, 0x01, 0x00, 0x00]);
    assert_eq!(asm("MOVD 8(SP),R0"), vec![0x17, 0xC8, 0x08]);
    assert_eq!(asm("MOVD @0x1000,R0"), vec![0x17, 0xA8, 0x90, 0x00]);
    assert_eq!(asm("MOVD TOS,R0"), vec![0x17, 0xB8]);
}

#[test]
fn scaled_index_byte_follows_the_opcode() {
    assert_eq!(asm("MOVD 4(R1)[R2:W],R0"), vec![0x17, 0xE8, 0x4A, 0x04]);
    assert_eq!(dis(&[0x17, 0xE8, 0x4A, 0x04]), "MOVD 4(R1)[R2:W],R0");
    assert_eq!(asm_err("MOVD 4(R1)[R2:X],R0"), Some(ErrorKind::IllegalSize));
    assert_eq!(asm_err("MOVD 5[R2:B],R0"), Some(ErrorKind::OperandNotAllowed));
}

#[test]
fn branches_are_relative_to_the_opcode() {
    assert_eq!(asm("BR 0x1010"), vec![0xEA, 0x10]);
    assert_eq!(asm("BR *"), vec![0xEA, 0x00]);
    assert_eq!(asm("BEQ 0xFF0"), vec![0x0A, 0x70]);
    assert_eq!(asm("BR 0x1100"), vec![0xEA, 0x81, 0x00]);
    assert_eq!(dis(&[0xEA, 0x10]), "BR 0x001010");
    assert_eq!(asm("JUMP 0x1010"), vec![0x7F, 0xDA, 0x10]);
    assert_eq!(dis(&[0x7F, 0xDA, 0x10]), "JUMP 0x001010");
}

#[test]
fn quick_operands_are_signed_nibbles() {
    assert_eq!(asm("ADDQD 3,R1"), vec![0x8F, 0x09]);
    assert_eq!(asm("MOVQB -8,R0"), vec![0x5C, 0x04]);
    assert_eq!(asm_err("ADDQD 8,R0"), Some(ErrorKind::OverflowRange));
}

#[test]
fn register_lists() {
    assert_eq!(asm("SAVE [R0,R1,R7]"), vec![0x62, 0x83]);
    assert_eq!(asm("RESTORE [R0,R1,R7]"), vec![0x72, 0xC1]);
    assert_eq!(asm("ENTER [R0],16"), vec![0x82, 0x01, 0x10]);
    assert_eq!(asm_err("SAVE [R0,R0]"), Some(ErrorKind::DuplicateRegister));
    assert_eq!(asm_err("SAVE [R0,FP]"), Some(ErrorKind::RegisterNotAllowed));
    assert_eq!(dis(&[0x72, 0xC1]), "RESTORE [R0,R1,R7]");
    assert_eq!(dis(&[0x82, 0x01, 0x10]), "ENTER [R0],0x10");
}

#[test]
fn bad_registers() {
    assert_eq!(asm_err("MOVD PC,R0"), Some(ErrorKind::RegisterNotAllowed));
    assert_eq!(asm_err("MOVD 5(R9),R0"), Some(ErrorKind::UnknownOperand));
    assert_eq!(asm_err("MOVD 5(R1,R0"), Some(ErrorKind::MissingClosingParen));
}

#[test]
fn reserved_displacement_pattern_is_rejected() {
    let d = decode(&[0xEA, 0xE0, 0x00, 0x00, 0x00]);
    assert_eq!(d.error_kind(), Some(ErrorKind::IllegalConstant));
    assert_eq!(d.len(), 5);
}

#[test]
fn decode_renders_reassemblable_text() {
    for line in [
        "NOP",
        "RETI",
        "MOVD R1,R2",
        "MOVB 5,R0",
        "MOVW 0x1234,R0",
        "MOVD 4(R1),R0",
        "MOVD -1(R1),R0",
        "MOVD 8(SP),R0",
        "MOVD TOS,R0",
        "MOVD @0x001000,R0",
        "ADDQD 3,R1",
        "CMPQB -1,TOS",
        "SAVE [R0,R1,R7]",
        "ADDR 4(FP),R0",
        "BR 0x001010",
    ] {
        assert_eq!(dis(&asm(line)), line);
    }
}

#[test]
fn size_prefixes_pick_the_ladder_step() {
    assert_eq!(asm("MOVB 3,>4(R1)"), vec![0x54, 0xA2, 0x03, 0xC0, 0x00, 0x00, 0x04]);
    assert_eq!(asm("MOVB 3,<4(R1)"), vec![0x54, 0xA2, 0x03, 0x04]);
    assert_eq!(asm("MOVD @>0x10,R0"), vec![0x17, 0xA8, 0xC0, 0x00, 0x00, 0x10]);
    assert_eq!(asm("JUMP >0x1010"), vec![0x7F, 0xDA, 0xC0, 0x00, 0x00, 0x10]);
    assert_eq!(asm("BR >0x1010"), vec![0xEA, 0xC0, 0x00, 0x00, 0x10]);

    let out = retroasm::assemble(ArchId::Ns32000, "MOVB 3,<0x1234(R1)", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0x54, 0xA2, 0x03, 0x00]);
}

#[test]
fn forced_width_fixes_the_length_of_forward_references() {
    let undefined = retroasm::assemble(ArchId::Ns32000, "MOVD >later(R1),R0", 0x1000, &NoSymbols);
    assert_eq!(undefined.error_kind(), Some(ErrorKind::UndefinedSymbol));
    let mut symbols = retroasm::Symbols::new();
    symbols.define("later", 4);
    let defined = retroasm::assemble(ArchId::Ns32000, "MOVD >later(R1),R0", 0x1000, &symbols);
    assert!(defined.is_ok(), "{:?}", defined.error);
    assert_eq!(defined.bytes, vec![0x17, 0x48, 0xC0, 0x00, 0x00, 0x04]);
    assert_eq!(undefined.len(), defined.len());
}

#[test]
fn operand_errors_keep_the_instruction_length() {
    let out = retroasm::assemble(ArchId::Ns32000, "MOVB 300,0(R1)", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0x54, 0xA2, 0x00, 0x00]);

    // The second operand is still laid out after the first one fails.
    let out = retroasm::assemble(ArchId::Ns32000, "MOVB 300,0x100(R1)", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0x54, 0xA2, 0x00, 0x81, 0x00]);
}

#[test]
fn immediates_do_not_decode_in_writable_or_address_slots() {
    // ADDB R0,5
    assert_eq!(decode(&[0x00, 0x05, 0x05]).error_kind(), Some(ErrorKind::OperandNotAllowed));
    // ADDR 5,R0
    assert_eq!(decode(&[0x27, 0xA0, 0x05]).error_kind(), Some(ErrorKind::OperandNotAllowed));
    // JUMP R0
    assert_eq!(decode(&[0x7F, 0x02]).error_kind(), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(dis(&[0x14, 0xA0, 0x05]), "MOVB 5,R0");
}
