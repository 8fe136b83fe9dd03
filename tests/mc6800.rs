use pretty_assertions::assert_eq;

use retroasm::{ArchId, ErrorKind, Memory, NoSymbols, Options, Symbols};

fn asm(cpu: ArchId, line: &str) -> Vec<u8> {
    let out = retroasm::assemble(cpu, line, 0x1000, &NoSymbols);
    assert!(out.is_ok(), "{line}: {:?}", out.error);
    out.bytes
}

fn asm_err(cpu: ArchId, line: &str) -> Option<ErrorKind> {
    retroasm::assemble(cpu, line, 0x1000, &NoSymbols).error_kind()
}

fn dis(cpu: ArchId, bytes: &[u8]) -> String {
    let mut mem = Memory::new(0x1000, bytes.to_vec());
    let d = retroasm::disassemble(cpu, &mut mem, &NoSymbols, Options::default());
    assert!(d.is_ok(), "{bytes:02x?}: {:?}", d.error);
    assert_eq!(d.len(), bytes.len());
    d.text()
}

#[test]
fn accumulator_forms_pick_by_operand() {
    let cpu = ArchId::Mc6800;
    assert_eq!(asm(cpu, "LDAA #$12"), vec![0x86, 0x12]);
    assert_eq!(asm(cpu, "LDAA $12"), vec![0x96, 0x12]);
    assert_eq!(asm(cpu, "LDAA $1234"), vec![0xB6, 0x12, 0x34]);
    assert_eq!(asm(cpu, "LDAA 5,X"), vec![0xA6, 0x05]);
    assert_eq!(asm(cpu, "LDAA ,X"), vec![0xA6, 0x00]);
    assert_eq!(asm(cpu, "ldx #$8000"), vec![0xCE, 0x80, 0x00]);
}

#[test]
fn forcing_prefixes() {
    let cpu = ArchId::Mc6800;
    assert_eq!(asm(cpu, "LDAA >$12"), vec![0xB6, 0x00, 0x12]);
    assert_eq!(asm(cpu, "LDAA <$12"), vec![0x96, 0x12]);
    assert_eq!(asm_err(cpu, "LDAA <$1234"), Some(ErrorKind::OverflowRange));
}

#[test]
fn forward_reference_takes_extended_form() {
    let out = retroasm::assemble(ArchId::Mc6800, "LDAA later", 0, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::UndefinedSymbol));
    assert_eq!(out.bytes, vec![0xB6, 0x00, 0x00]);

    let mut symbols = Symbols::new();
    symbols.define("later", 0x20);
    let out = retroasm::assemble(ArchId::Mc6800, "LDAA later", 0, &symbols);
    assert_eq!(out.bytes, vec![0x96, 0x20]);
}

#[test]
fn store_has_no_immediate_form() {
    assert_eq!(asm_err(ArchId::Mc6800, "STAA #1"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err(ArchId::Mc6800, "LDAA"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err(ArchId::Mc6800, "LDAB #1,X"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err(ArchId::Mc6800, "LDAB #1 )"), Some(ErrorKind::GarbageAtEnd));
}

#[test]
fn branches_measure_from_next_instruction() {
    let cpu = ArchId::Mc6800;
    assert_eq!(asm(cpu, "BRA $1010"), vec![0x20, 0x0E]);
    assert_eq!(asm(cpu, "BNE *"), vec![0x26, 0xFE]);
    assert_eq!(asm_err(cpu, "BEQ $2000"), Some(ErrorKind::OperandTooFar));
    assert_eq!(dis(cpu, &[0x20, 0x0E]), "BRA $1010");
    assert_eq!(dis(cpu, &[0x27, 0xFE]), "BEQ $1000");
}

#[test]
fn variants_gate_their_pages() {
    assert_eq!(asm_err(ArchId::Mc6800, "LDD #$1234"), Some(ErrorKind::UnknownInstruction));
    assert_eq!(asm(ArchId::Mc6801, "LDD #$1234"), vec![0xCC, 0x12, 0x34]);
    assert_eq!(asm(ArchId::Hd6301, "LDD #$1234"), vec![0xCC, 0x12, 0x34]);
    assert_eq!(asm(ArchId::Mc6800, "JSR $12"), vec![0xBD, 0x00, 0x12]);
    assert_eq!(asm(ArchId::Mc6801, "JSR $12"), vec![0x9D, 0x12]);
    assert_eq!(asm_err(ArchId::Mc6801, "XGDX"), Some(ErrorKind::UnknownInstruction));
    assert_eq!(asm(ArchId::Hd6301, "XGDX"), vec![0x18]);

    let mut mem = Memory::new(0, vec![0x18]);
    let d = retroasm::disassemble(ArchId::Mc6800, &mut mem, &NoSymbols, Options::default());
    assert_eq!(d.error_kind(), Some(ErrorKind::UnknownInstruction));
}

#[test]
fn bit_aliases_share_opcodes_with_mask_forms() {
    let cpu = ArchId::Hd6301;
    assert_eq!(asm(cpu, "BCLR 3,$40"), vec![0x71, 0xF7, 0x40]);
    assert_eq!(asm(cpu, "AIM #$F7,$40"), vec![0x71, 0xF7, 0x40]);
    assert_eq!(asm(cpu, "BSET 0,5,X"), vec![0x62, 0x01, 0x05]);
    assert_eq!(asm_err(cpu, "BCLR 8,$40"), Some(ErrorKind::IllegalBitNumber));

    // A single-bit mask decodes as the alias, anything else as the mask op.
    assert_eq!(dis(cpu, &[0x71, 0xF7, 0x40]), "BCLR 3,$40");
    assert_eq!(dis(cpu, &[0x71, 0x0F, 0x40]), "AIM #$0F,$40");
    assert_eq!(dis(cpu, &[0x62, 0x01, 0x05]), "BSET 0,$05,X");
}

#[test]
fn decode_renders_reassemblable_text() {
    let cpu = ArchId::Mc6801;
    for line in ["NOP", "LDAA #$12", "LDAA $12", "LDAA $1234", "LDAA >$0012", "STD $05,X", "ADDD #$1234", "CLR 0,X", "JMP $F000"] {
        let bytes = asm(cpu, line);
        assert_eq!(dis(cpu, &bytes), line);
    }
}

#[test]
fn mnemonics_follow_the_variant() {
    let base = retroasm::mnemonics(ArchId::Mc6800);
    let hd = retroasm::mnemonics(ArchId::Hd6301);
    assert!(base.contains(&"LDAA"));
    assert!(!base.contains(&"AIM"));
    assert!(hd.contains(&"AIM") && hd.contains(&"LDD") && hd.contains(&"LDAA"));
}

#[test]
fn direct_force_needs_a_direct_form() {
    let cpu = ArchId::Mc6800;
    assert_eq!(asm_err(cpu, "JMP <$10"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err(cpu, "JSR <$10"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm(cpu, "JMP $10"), vec![0x7E, 0x00, 0x10]);
    assert_eq!(asm(cpu, "STAA <$12"), vec![0x97, 0x12]);
    assert_eq!(asm(ArchId::Mc6801, "JSR <$10"), vec![0x9D, 0x10]);
}

#[test]
fn operand_errors_keep_the_instruction_length() {
    let cpu = ArchId::Mc6800;
    let out = retroasm::assemble(cpu, "LDAA #$1FF", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0x86, 0x00]);

    let out = retroasm::assemble(cpu, "LDAA $1FF,X", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::OverflowRange));
    assert_eq!(out.bytes, vec![0xA6, 0x00]);

    let out = retroasm::assemble(ArchId::Hd6301, "BCLR 9,$40", 0x1000, &NoSymbols);
    assert_eq!(out.error_kind(), Some(ErrorKind::IllegalBitNumber));
    assert_eq!(out.bytes.len(), 3);
}
