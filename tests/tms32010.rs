use pretty_assertions::assert_eq;

use retroasm::{ArchId, ErrorKind, Memory, NoSymbols, Options};

fn asm(line: &str) -> Vec<u8> {
    let out = retroasm::assemble(ArchId::Tms32010, line, 0x40, &NoSymbols);
    assert!(out.is_ok(), "{line}: {:?}", out.error);
    out.bytes
}

fn asm_err(line: &str) -> Option<ErrorKind> {
    retroasm::assemble(ArchId::Tms32010, line, 0x40, &NoSymbols).error_kind()
}

fn dis(bytes: &[u8]) -> String {
    let mut mem = Memory::words(0x40, bytes.to_vec());
    let d = retroasm::disassemble(ArchId::Tms32010, &mut mem, &NoSymbols, Options::default());
    assert!(d.is_ok(), "{bytes:02x?}: {:?}", d.error);
    assert_eq!(d.len(), bytes.len());
    d.text()
}

#[test]
fn direct_and_indirect_memory_operands() {
    assert_eq!(asm("ADD 5"), vec![0x00, 0x05]);
    assert_eq!(asm("ADD 5,4"), vec![0x04, 0x05]);
    assert_eq!(asm("ADD *"), vec![0x00, 0x88]);
    assert_eq!(asm("ADD *+,3,1"), vec![0x03, 0xA1]);
    assert_eq!(asm("ADD *-,0,0"), vec![0x00, 0x90]);
    assert_eq!(asm("MAR *+"), vec![0x68, 0xA8]);
    assert_eq!(asm_err("ADD 128"), Some(ErrorKind::OverflowRange));
}

#[test]
fn next_arp_needs_indirect_addressing() {
    assert_eq!(asm_err("ADD 5,0,1"), Some(ErrorKind::OperandNotAllowed));
    assert_eq!(asm_err("ADD *,0,2"), Some(ErrorKind::OverflowRange));
}

#[test]
fn optional_operands_are_dropped_when_defaulted() {
    assert_eq!(dis(&[0x00, 0x05]), "ADD 5");
    assert_eq!(dis(&[0x04, 0x05]), "ADD 5,4");
    assert_eq!(dis(&[0x03, 0xA1]), "ADD *+,3,1");
    // A zero shift stays when the next-ARP operand needs a place.
    assert_eq!(dis(&[0x00, 0x90]), "ADD *-,0,0");
}

#[test]
fn sach_shift_takes_only_0_1_or_4() {
    assert_eq!(asm("SACH 5,4"), vec![0x5C, 0x05]);
    assert_eq!(asm_err("SACH 5,2"), Some(ErrorKind::IllegalConstant));
    assert_eq!(dis(&[0x5C, 0x05]), "SACH 5,4");
}

#[test]
fn auxiliary_registers_and_constants() {
    assert_eq!(asm("SAR AR1,5"), vec![0x31, 0x05]);
    assert_eq!(asm("LARK AR0,>FF"), vec![0x70, 0xFF]);
    assert_eq!(asm("LARP 1"), vec![0x68, 0x81]);
    assert_eq!(asm("MPYK -1"), vec![0x9F, 0xFF]);
    assert_eq!(asm_err("SAR AR2,5"), Some(ErrorKind::RegisterNotAllowed));
    assert_eq!(asm_err("LDPK 2"), Some(ErrorKind::OverflowRange));
    assert_eq!(asm_err("MPYK 4096"), Some(ErrorKind::OverflowRange));
    assert_eq!(dis(&[0x68, 0x81]), "LARP 1");
    assert_eq!(dis(&[0x68, 0xA8]), "MAR *+");
}

#[test]
fn branches_carry_a_program_address_word() {
    assert_eq!(asm("B >123"), vec![0xF9, 0x00, 0x01, 0x23]);
    assert_eq!(asm("BANZ $"), vec![0xF4, 0x00, 0x00, 0x40]);
    assert_eq!(asm_err("B >1000"), Some(ErrorKind::OverflowRange));
    assert_eq!(dis(&[0xF9, 0x00, 0x01, 0x23]), "B >123");
}

#[test]
fn addresses_count_words() {
    let mut mem = Memory::words(0x100, vec![0x7F, 0x80, 0xF9, 0x00, 0x01, 0x23, 0x7F, 0x8D]);
    let out = retroasm::disassemble_all(ArchId::Tms32010, &mut mem, &NoSymbols, Options::default());
    let got: Vec<_> = out.iter().map(|d| (d.address, d.text())).collect();
    assert_eq!(
        got,
        vec![(0x100, "NOP".to_string()), (0x101, "B >123".to_string()), (0x103, "RET".to_string())]
    );
}

#[test]
fn conflicting_indirect_steps_do_not_decode() {
    let mut mem = Memory::words(0, vec![0x00, 0xB8]);
    let d = retroasm::disassemble(ArchId::Tms32010, &mut mem, &NoSymbols, Options::default());
    assert_eq!(d.error_kind(), Some(ErrorKind::UnknownOperand));
}

#[test]
fn decode_renders_reassemblable_text() {
    for line in ["NOP", "ZAC", "LAC >1F,8", "SACL *", "SAR AR1,*-,0", "IN 5,2", "LACK 7", "LARK AR0,>FF", "MPYK -1", "CALL >100"] {
        assert_eq!(dis(&asm(line)), line);
    }
}

#[test]
fn reserved_indirect_bits_do_not_decode() {
    for bytes in [[0x00, 0x82], [0x00, 0x89], [0x00, 0xC8], [0x68, 0x8C]] {
        let mut mem = Memory::words(0, bytes.to_vec());
        let d = retroasm::disassemble(ArchId::Tms32010, &mut mem, &NoSymbols, Options::default());
        assert_eq!(d.error_kind(), Some(ErrorKind::UnknownOperand), "{bytes:02x?}");
    }
    assert_eq!(dis(&[0x00, 0x81]), "ADD *,0,1");
}

#[test]
fn unencodable_sach_shifts_do_not_decode() {
    let mut mem = Memory::words(0, vec![0x5A, 0x05]);
    let d = retroasm::disassemble(ArchId::Tms32010, &mut mem, &NoSymbols, Options::default());
    assert_eq!(d.error_kind(), Some(ErrorKind::IllegalConstant));
    assert_eq!(dis(&[0x59, 0x05]), "SACH 5,1");
}
