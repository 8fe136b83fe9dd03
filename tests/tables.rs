use retroasm::isa::mc6800::Mc6800;
use retroasm::isa::ns32000::Ns32000;
use retroasm::isa::tms32010::Tms32010;
use retroasm::isa::z80::Z80;
use retroasm::Architecture;

/// Every entry must be matchable: fixed bits never overlap operand fields,
/// and fields stay inside the opcode units of their page.
fn check_table<A: Architecture>(arch: &A) {
    let unit_bits = arch.config().unit.bytes() as u32 * 8;
    for page in arch.table().pages() {
        assert!(!page.entries.is_empty(), "{}: empty page", arch.name());
        let bits = unit_bits * page.opcode_len as u32;
        for entry in page.entries {
            assert_eq!(entry.opcode & entry.mask(), 0, "{}: {} {:#x}", arch.name(), entry.name, entry.opcode);
            for slot in entry.slots {
                assert!(
                    slot.pos as u32 + slot.width as u32 <= bits,
                    "{}: {} field past the opcode",
                    arch.name(),
                    entry.name
                );
            }
            assert!(entry.matches(entry.opcode), "{}: {}", arch.name(), entry.name);
        }
    }
}

#[test]
fn tables_are_consistent() {
    check_table(&Mc6800::mc6800());
    check_table(&Mc6800::hd6301());
    check_table(&Z80::new());
    check_table(&Ns32000::new());
    check_table(&Tms32010::new());
}

#[test]
fn every_target_lists_its_mnemonics() {
    for id in retroasm::ArchId::ALL {
        let names = retroasm::mnemonics(*id);
        assert!(names.len() > 10, "{id}");
        assert!(names.windows(2).all(|w| w[0] < w[1]), "{id}: not sorted");
    }
}
