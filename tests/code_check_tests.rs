//! Bytecode-verifier scenarios: operand lengths, constant-pool target
//! kinds, branch bounds, switch tables, and the DUP2 narrowing rewrite.

mod common;

use tolv::classfile::class::ClassAccess;
use tolv::classfile::constpool::{ConstantPool, CpEntry};
use tolv::classfile::opcodes as op;
use tolv::verify::check_code_validity;
use tolv::DiagSink;

/// A pool with a dummy slot and a filler entry, enough for opcodes that
/// never touch the CP.
fn basic_cp() -> ConstantPool {
    ConstantPool {
        entries: vec![CpEntry::Dummy, CpEntry::IntConst(0)],
    }
}

/// A pool whose slot 1 holds the given entry.
fn cp_with(entry: CpEntry) -> ConstantPool {
    ConstantPool {
        entries: vec![CpEntry::Dummy, entry],
    }
}

fn field_ref() -> CpEntry {
    CpEntry::FieldRef {
        class_index: 0,
        name_and_type_index: 0,
    }
}

fn method_ref() -> CpEntry {
    CpEntry::MethodRef {
        class_index: 0,
        name_and_type_index: 0,
    }
}

fn interface_method_ref() -> CpEntry {
    CpEntry::InterfaceMethodRef {
        class_index: 0,
        name_and_type_index: 0,
    }
}

fn class_ref() -> CpEntry {
    CpEntry::ClassRef { name_index: 0 }
}

fn check(code: &[u8], cp: &ConstantPool, max_locals: u16) -> tolv::Result<()> {
    let mut code = code.to_vec();
    check_code_validity(
        Some(&mut code),
        Some(cp),
        max_locals,
        &ClassAccess::default(),
        &DiagSink::null(),
    )
}

// ---- entry preconditions ---------------------------------------------------

#[test]
fn valid_code_passes() {
    let cp = basic_cp();
    assert!(check(&[op::NOP, op::ACONST_NULL, op::RETURN], &cp, 5).is_ok());
}

#[test]
fn bipush_without_operand() {
    let cp = basic_cp();
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::BIPUSH];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    let text = handle.contents();
    assert!(text.contains("java.lang.VerifyError"));
    assert!(text.contains("invalid bytecode or argument"));
}

#[test]
fn bipush_with_operand() {
    let cp = basic_cp();
    assert!(check(&[op::BIPUSH, 0x42], &cp, 5).is_ok());
}

#[test]
fn sipush_lengths() {
    let cp = basic_cp();
    assert!(check(&[op::SIPUSH, 0x01, 0x00], &cp, 5).is_ok());
    assert!(check(&[op::SIPUSH, 0x01], &cp, 5).is_err());
}

// ---- stack model -----------------------------------------------------------

#[test]
fn iadd_requires_two_operands() {
    let cp = basic_cp();
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::IADD];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle.contents().contains("operand stack underflow"));

    assert!(check(&[op::ICONST_1, op::ICONST_2, op::IADD], &cp, 5).is_ok());
}

#[test]
fn pop_family_underflow() {
    let cp = basic_cp();
    assert!(check(&[op::POP], &cp, 5).is_err());
    assert!(check(&[op::ICONST_0, op::POP], &cp, 5).is_ok());
    assert!(check(&[op::LCONST_0, op::POP2], &cp, 5).is_ok());
    assert!(check(&[op::ICONST_0, op::ICONST_1, op::POP2], &cp, 5).is_ok());
}

#[test]
fn dup2_followed_by_ladd_narrows_to_dup() {
    let cp = basic_cp();
    let mut code = vec![op::LCONST_0, op::DUP2, op::LADD];
    assert!(check_code_validity(
        Some(&mut code),
        Some(&cp),
        5,
        &ClassAccess::default(),
        &DiagSink::null()
    )
    .is_ok());
    // rewritten in place: the DUP2 became a DUP
    assert_eq!(code[1], op::DUP);
}

#[test]
fn dup2_over_category1_values_is_left_alone() {
    let cp = basic_cp();
    let mut code = vec![op::ICONST_0, op::ICONST_1, op::DUP2, op::IADD];
    assert!(check_code_validity(
        Some(&mut code),
        Some(&cp),
        5,
        &ClassAccess::default(),
        &DiagSink::null()
    )
    .is_ok());
    assert_eq!(code[2], op::DUP2);
}

#[test]
fn dup2_as_last_instruction() {
    let cp = basic_cp();
    assert!(check(&[op::ICONST_0, op::ICONST_1, op::DUP2], &cp, 5).is_ok());
}

// ---- field and method targets ----------------------------------------------

#[test]
fn getfield_with_field_ref() {
    let cp = cp_with(field_ref());
    assert!(check(&[op::ICONST_0, op::GETFIELD, 0x00, 0x01], &cp, 5).is_ok());
}

#[test]
fn getfield_pointing_at_method_ref() {
    let cp = cp_with(method_ref());
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::GETFIELD, 0x00, 0x01];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    let text = handle.contents();
    assert!(text.contains("java.lang.VerifyError"));
    assert!(text.contains("not a field reference"));
}

#[test]
fn getfield_with_out_of_range_slot() {
    let cp = basic_cp();
    assert!(check(&[op::GETFIELD, 0x00, 0xFF], &cp, 5).is_err());
}

#[test]
fn putstatic_and_getstatic_require_field_refs() {
    let cp = cp_with(field_ref());
    assert!(check(&[op::GETSTATIC, 0x00, 0x01], &cp, 5).is_ok());
    assert!(check(&[op::ICONST_0, op::PUTSTATIC, 0x00, 0x01], &cp, 5).is_ok());

    let cp = cp_with(class_ref());
    assert!(check(&[op::GETSTATIC, 0x00, 0x01], &cp, 5).is_err());
}

#[test]
fn invokevirtual_target_kinds() {
    let cp = cp_with(method_ref());
    assert!(check(&[op::INVOKEVIRTUAL, 0x00, 0x01], &cp, 5).is_ok());

    let cp = cp_with(class_ref());
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::INVOKEVIRTUAL, 0x00, 0x01];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    let text = handle.contents();
    assert!(text.contains("java.lang.VerifyError"));
    assert!(text.contains("not a method reference"));
}

#[test]
fn invokespecial_and_invokestatic() {
    let cp = cp_with(method_ref());
    assert!(check(&[op::INVOKESPECIAL, 0x00, 0x01], &cp, 10).is_ok());
    assert!(check(&[op::INVOKESTATIC, 0x00, 0x01], &cp, 10).is_ok());

    let cp = basic_cp();
    assert!(check(&[op::INVOKESPECIAL, 0x00, 0xFF], &cp, 10).is_err());
    assert!(check(&[op::INVOKESTATIC, 0x00, 0xFF], &cp, 10).is_err());
}

// ---- INVOKEINTERFACE / INVOKEDYNAMIC ----------------------------------------

#[test]
fn invokeinterface_wellformed() {
    let cp = cp_with(interface_method_ref());
    assert!(check(&[op::INVOKEINTERFACE, 0x00, 0x01, 0x02, 0x00], &cp, 5).is_ok());
}

#[test]
fn invokeinterface_bad_cp_slot() {
    let cp = basic_cp();
    assert!(check(&[op::INVOKEINTERFACE, 0x00, 0xFF, 0x02, 0x00], &cp, 5).is_err());
}

#[test]
fn invokeinterface_zero_count_byte() {
    let cp = cp_with(interface_method_ref());
    assert!(check(&[op::INVOKEINTERFACE, 0x00, 0x01, 0x00, 0x00], &cp, 5).is_err());
}

#[test]
fn invokeinterface_nonzero_fourth_byte() {
    let cp = cp_with(interface_method_ref());
    assert!(check(&[op::INVOKEINTERFACE, 0x00, 0x01, 0x02, 0x01], &cp, 5).is_err());
}

#[test]
fn invokedynamic_target_and_zero_bytes() {
    let cp = cp_with(CpEntry::InvokeDynamic {
        bootstrap_index: 0,
        name_and_type_index: 0,
    });
    assert!(check(&[op::INVOKEDYNAMIC, 0x00, 0x01, 0x00, 0x00], &cp, 5).is_ok());
    assert!(check(&[op::INVOKEDYNAMIC, 0x00, 0x01, 0x01, 0x00], &cp, 5).is_err());

    let cp = basic_cp();
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::INVOKEDYNAMIC, 0x00, 0xFF, 0x00, 0x00];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle
        .contents()
        .contains("points to a non-existent invokeDynamic slot"));
}

// ---- branches ----------------------------------------------------------------

#[test]
fn goto_within_bounds() {
    let cp = basic_cp();
    let code = [op::GOTO, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00];
    assert!(check(&code, &cp, 5).is_ok());
}

#[test]
fn goto_negative_out_of_bounds() {
    let cp = basic_cp();
    // GOTO -2 at PC 0
    assert!(check(&[op::GOTO, 0xFF, 0xFE], &cp, 5).is_err());
}

#[test]
fn goto_forward_out_of_bounds() {
    let cp = basic_cp();
    // GOTO +16 in a 3-byte method
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::GOTO, 0x00, 0x10];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle.contents().contains("branch target"));
}

#[test]
fn goto_w_bounds() {
    let cp = basic_cp();
    assert!(check(&[op::GOTO_W, 0x00, 0x00, 0x00, 0x05, op::NOP], &cp, 10).is_ok());
    // +5 lands exactly on the method end
    assert!(check(&[op::GOTO_W, 0x00, 0x00, 0x00, 0x05], &cp, 10).is_err());
    // backwards past the start
    assert!(check(&[op::NOP, op::GOTO_W, 0xFF, 0xFF, 0xFF, 0xFE], &cp, 10).is_err());
}

#[test]
fn conditional_branches() {
    let cp = basic_cp();
    assert!(check(&[op::ICONST_0, op::IFEQ, 0x00, 0x03, op::NOP, op::NOP], &cp, 5).is_ok());
    assert!(check(
        &[op::ACONST_NULL, op::ACONST_NULL, op::IF_ACMPEQ, 0x00, 0x03, op::NOP, op::NOP],
        &cp,
        5
    )
    .is_ok());
    assert!(check(&[op::ICONST_0, op::IFEQ, 0x00, 0x40], &cp, 5).is_err());
}

// ---- switches -----------------------------------------------------------------

#[test]
fn tableswitch_valid_range() {
    let cp = basic_cp();
    let code = [
        op::ICONST_1, //
        op::TABLESWITCH,
        0x00,
        0x00, // padding to the next 4-byte boundary
        0x00,
        0x00,
        0x00,
        0x0A, // default: +10
        0x00,
        0x00,
        0x00,
        0x01, // low = 1
        0x00,
        0x00,
        0x00,
        0x03, // high = 3
        0x00,
        0x00,
        0x00,
        0x0C, // offset for 1: +12
        0x00,
        0x00,
        0x00,
        0x10, // offset for 2: +16
        0x00,
        0x00,
        0x00,
        0x14, // offset for 3: +20
    ];
    assert!(check(&code, &cp, 5).is_ok());
}

#[test]
fn tableswitch_low_greater_than_high() {
    let cp = basic_cp();
    let code = [
        op::TABLESWITCH,
        0x00,
        0x00,
        0x00, // padding
        0x00,
        0x00,
        0x00,
        0x0A, // default
        0x00,
        0x00,
        0x00,
        0x05, // low = 5
        0x00,
        0x00,
        0x00,
        0x03, // high = 3
    ];
    let (sink, handle) = DiagSink::buffer();
    let mut code = code.to_vec();
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle.contents().contains("low 5 greater than high 3"));
}

#[test]
fn lookupswitch_sorted_and_unsorted() {
    let cp = basic_cp();
    let sorted = [
        op::ICONST_1,
        op::LOOKUPSWITCH,
        0x00,
        0x00, // padding
        0x00,
        0x00,
        0x00,
        0x08, // default: +8
        0x00,
        0x00,
        0x00,
        0x02, // npairs = 2
        0x00,
        0x00,
        0x00,
        0x01, // key 1
        0x00,
        0x00,
        0x00,
        0x0C, // offset +12
        0x00,
        0x00,
        0x00,
        0x05, // key 5
        0x00,
        0x00,
        0x00,
        0x10, // offset +16
    ];
    assert!(check(&sorted, &cp, 5).is_ok());

    let mut unsorted = sorted;
    // swap the keys: 5 before 1
    unsorted[12..16].copy_from_slice(&[0x00, 0x00, 0x00, 0x05]);
    unsorted[20..24].copy_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    let (sink, handle) = DiagSink::buffer();
    let mut code = unsorted.to_vec();
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle.contents().contains("unsorted match keys"));
}

// ---- object creation ------------------------------------------------------------

#[test]
fn multianewarray_wellformed() {
    let cp = cp_with(class_ref());
    assert!(check(
        &[op::ICONST_1, op::ICONST_1, op::MULTIANEWARRAY, 0x00, 0x01, 0x02],
        &cp,
        5
    )
    .is_ok());
}

#[test]
fn multianewarray_zero_dimensions() {
    let cp = cp_with(class_ref());
    let (sink, handle) = DiagSink::buffer();
    let mut code = vec![op::MULTIANEWARRAY, 0x00, 0x01, 0x00];
    assert!(
        check_code_validity(Some(&mut code), Some(&cp), 5, &ClassAccess::default(), &sink)
            .is_err()
    );
    assert!(handle.contents().contains("at least one dimension"));
}

#[test]
fn new_and_checkcast_require_class_refs() {
    let cp = cp_with(class_ref());
    assert!(check(&[op::NEW, 0x00, 0x01], &cp, 5).is_ok());
    assert!(check(&[op::ACONST_NULL, op::CHECKCAST, 0x00, 0x01], &cp, 5).is_ok());
    assert!(check(&[op::ACONST_NULL, op::INSTANCEOF, 0x00, 0x01], &cp, 5).is_ok());

    let cp = cp_with(method_ref());
    assert!(check(&[op::NEW, 0x00, 0x01], &cp, 5).is_err());
}

// ---- LDC family -------------------------------------------------------------------

#[test]
fn ldc_loadable_kinds() {
    let cp = cp_with(CpEntry::IntConst(42));
    assert!(check(&[op::LDC, 0x01], &cp, 5).is_ok());
    assert!(check(&[op::LDC_W, 0x00, 0x01], &cp, 5).is_ok());

    // a UTF8 payload is not loadable
    let cp = cp_with(CpEntry::Utf8(b"raw".to_vec()));
    assert!(check(&[op::LDC, 0x01], &cp, 5).is_err());

    // LDC of a two-slot constant must use LDC2_W
    let cp = cp_with(CpEntry::LongConst(7));
    assert!(check(&[op::LDC, 0x01], &cp, 5).is_err());
    assert!(check(&[op::LDC2_W, 0x00, 0x01], &cp, 5).is_ok());

    let cp = cp_with(CpEntry::IntConst(7));
    assert!(check(&[op::LDC2_W, 0x00, 0x01], &cp, 5).is_err());
}

// ---- loads and stores ---------------------------------------------------------------

#[test]
fn load_store_with_local_indices() {
    let cp = basic_cp();
    assert!(check(&[op::FLOAD, 0x01], &cp, 10).is_ok());
    assert!(check(&[op::FCONST_0, op::FSTORE, 0x01], &cp, 10).is_ok());
    assert!(check(&[op::FCONST_0, op::FSTORE_0], &cp, 10).is_ok());
    assert!(check(&[op::ISTORE, 0x01], &cp, 10).is_ok());
    assert!(check(&[op::ISTORE_0], &cp, 10).is_ok());
    assert!(check(&[op::IINC, 0x01, 0x05], &cp, 10).is_ok());

    // index beyond max_locals
    assert!(check(&[op::FLOAD, 0x0A], &cp, 10).is_err());
}
