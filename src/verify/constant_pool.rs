//! Per-entry-kind validation of the constant pool, JVMS §4.4.
//!
//! Walks every slot once, enforcing the cross-reference rules for each
//! entry kind. The first violation is fatal for the class. The walk also
//! resolves module/package names out of the pool into the parsed record —
//! the only mutation the format checker performs besides the derived flag
//! view.

use crate::cfe;
use crate::classfile::class::ParsedClass;
use crate::classfile::constpool::CpEntry;
use crate::classfile::defs::{MH_INTERFACE_MIN_MAJOR, MODULE_MIN_MAJOR};
use crate::common::diag::DiagSink;
use crate::common::error::Result;
use crate::consts::CONSTRUCTOR_METHOD_NAME;
use crate::runtime::string_pool;

use super::descriptor::{validate_field_desc, validate_method_desc};
use super::names::{
    check_module_name, check_package_name, invalid_utf8_reason, validate_class_name,
    validate_field_name, validate_unqualified_name,
};

pub fn format_check_constant_pool(klass: &mut ParsedClass, sink: &DiagSink) -> Result<()> {
    if klass.cp_count != klass.cp.len() {
        return Err(cfe!(
            sink,
            "Error in size of constant pool: declared {}, actual {}",
            klass.cp_count,
            klass.cp.len()
        ));
    }

    match klass.cp.slot(0) {
        Some(CpEntry::Dummy) => {}
        _ => {
            return Err(cfe!(
                sink,
                "Missing dummy entry in first slot of constant pool"
            ))
        }
    }

    let mut module_name: Option<String> = None;
    let mut package_name: Option<String> = None;

    for i in 1..klass.cp.len() {
        match &klass.cp.entries[i] {
            CpEntry::Dummy => {
                // only legal as the shadow of a long/double in the
                // preceding slot
                let after_wide = matches!(
                    klass.cp.slot(i - 1),
                    Some(CpEntry::LongConst(_)) | Some(CpEntry::DoubleConst(_))
                );
                if !after_wide {
                    return Err(cfe!(
                        sink,
                        "Unexpected dummy entry in constant pool slot {i}"
                    ));
                }
            }

            CpEntry::Utf8(bytes) => {
                if let Some(reason) = invalid_utf8_reason(bytes) {
                    return Err(cfe!(sink, "UTF8 entry in CP slot {i} {reason}"));
                }
            }

            CpEntry::IntConst(_) | CpEntry::FloatConst(_) => {}

            CpEntry::LongConst(_) | CpEntry::DoubleConst(_) => {
                match klass.cp.slot(i + 1) {
                    Some(CpEntry::Dummy) => {}
                    _ => {
                        return Err(cfe!(
                            sink,
                            "Missing dummy entry in constant pool slot {} after long or double constant",
                            i + 1
                        ))
                    }
                }
            }

            CpEntry::StringConst { utf8_index } => {
                if klass.cp.utf8(*utf8_index).is_none() {
                    return Err(cfe!(
                        sink,
                        "StringConst at CP slot {i} points to invalid UTF8 entry {utf8_index}"
                    ));
                }
            }

            CpEntry::ClassRef { name_index } => {
                let name = string_pool::get(*name_index).ok_or_else(|| {
                    cfe!(
                        sink,
                        "ClassRef at CP slot {i} holds unresolved string pool handle {name_index}"
                    )
                })?;
                if !validate_class_name(&name) {
                    return Err(cfe!(
                        sink,
                        "ClassRef at CP slot {i} has an invalid class name: {name}"
                    ));
                }
            }

            CpEntry::FieldRef {
                class_index,
                name_and_type_index,
            } => {
                let (name_idx, desc_idx) =
                    check_ref_targets(klass, i, *class_index, *name_and_type_index, "FieldRef", sink)?;
                let name = klass.cp.utf8_str(name_idx).ok_or_else(|| {
                    cfe!(sink, "FieldRef at CP slot {i} points to invalid UTF8 entry {name_idx}")
                })?;
                if !validate_field_name(name) {
                    return Err(cfe!(
                        sink,
                        "FieldRef at CP slot {i} points to an entry with an invalid field name: {name}"
                    ));
                }
                let desc = klass.cp.utf8_str(desc_idx).ok_or_else(|| {
                    cfe!(sink, "FieldRef at CP slot {i} points to invalid UTF8 entry {desc_idx}")
                })?;
                if !validate_field_desc(desc) {
                    return Err(cfe!(
                        sink,
                        "FieldRef at CP slot {i} has an invalid field descriptor: {desc}"
                    ));
                }
            }

            CpEntry::MethodRef {
                class_index,
                name_and_type_index,
            }
            | CpEntry::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let kind = klass.cp.entries[i].kind_name();
                let (name_idx, desc_idx) =
                    check_ref_targets(klass, i, *class_index, *name_and_type_index, kind, sink)?;
                let name = klass.cp.utf8_str(name_idx).ok_or_else(|| {
                    cfe!(sink, "{kind} at CP slot {i} points to invalid UTF8 entry {name_idx}")
                })?;
                let name_ok = if name.starts_with('<') {
                    name == CONSTRUCTOR_METHOD_NAME
                } else {
                    validate_unqualified_name(name, true)
                };
                if !name_ok {
                    return Err(cfe!(
                        sink,
                        "{kind} at CP slot {i} points to an entry with an invalid method name: {name}"
                    ));
                }
                let desc = klass.cp.utf8_str(desc_idx).ok_or_else(|| {
                    cfe!(sink, "{kind} at CP slot {i} points to invalid UTF8 entry {desc_idx}")
                })?;
                if !validate_method_desc(desc) {
                    return Err(cfe!(
                        sink,
                        "{kind} at CP slot {i} has an invalid method descriptor: {desc}"
                    ));
                }
            }

            CpEntry::NameAndType {
                name_index,
                desc_index,
            } => {
                let name = klass.cp.utf8_str(*name_index).ok_or_else(|| {
                    cfe!(
                        sink,
                        "NameAndType at CP slot {i} points to invalid UTF8 entry {name_index}"
                    )
                })?;
                if !validate_unqualified_name(name, true) {
                    return Err(cfe!(
                        sink,
                        "NameAndType at CP slot {i} has an invalid name: {name}"
                    ));
                }
                let desc = klass.cp.utf8_str(*desc_index).ok_or_else(|| {
                    cfe!(
                        sink,
                        "NameAndType at CP slot {i} points to invalid UTF8 entry {desc_index}"
                    )
                })?;
                if !validate_field_desc(desc) && !validate_method_desc(desc) {
                    return Err(cfe!(
                        sink,
                        "NameAndType at CP slot {i} has an invalid descriptor: {desc}"
                    ));
                }
            }

            CpEntry::MethodHandle { ref_kind, ref_index } => {
                check_method_handle(klass, i, *ref_kind, *ref_index, sink)?;
            }

            CpEntry::MethodType { desc_index } => {
                match klass.cp.utf8_str(*desc_index) {
                    Some(desc) if desc.starts_with('(') => {}
                    _ => {
                        return Err(cfe!(
                            sink,
                            "MethodType at CP slot {i} does \
                             not point to a type that starts with an open parenthesis"
                        ))
                    }
                }
            }

            CpEntry::Dynamic {
                bootstrap_index,
                name_and_type_index,
            } => {
                if *bootstrap_index as usize >= klass.bootstraps.len() {
                    return Err(cfe!(
                        sink,
                        "Dynamic at CP slot {i} points to a non-existent bootstrap method slot {bootstrap_index}"
                    ));
                }
                let desc = nat_descriptor(klass, i, *name_and_type_index, "Dynamic", sink)?;
                if !validate_field_desc(&desc) {
                    return Err(cfe!(
                        sink,
                        "Dynamic at CP slot {i} has a descriptor that does not denote a field type: {desc}"
                    ));
                }
                check_bootstrap_method(klass, i, *bootstrap_index, sink)?;
            }

            CpEntry::InvokeDynamic {
                bootstrap_index,
                name_and_type_index,
            } => {
                if *bootstrap_index as usize >= klass.bootstraps.len() {
                    return Err(cfe!(
                        sink,
                        "InvokeDynamic at CP slot {i} points to a non-existent invokeDynamic slot {bootstrap_index}"
                    ));
                }
                let desc = nat_descriptor(klass, i, *name_and_type_index, "InvokeDynamic", sink)?;
                if !validate_method_desc(&desc) {
                    return Err(cfe!(
                        sink,
                        "InvokeDynamic at CP slot {i} has a descriptor that does not denote a method type: {desc}"
                    ));
                }
                check_bootstrap_method(klass, i, *bootstrap_index, sink)?;
            }

            CpEntry::Module { name_index } => {
                check_module_gate(klass, i, "Module", sink)?;
                let name = klass.cp.utf8_str(*name_index).ok_or_else(|| {
                    cfe!(
                        sink,
                        "Module entry at CP slot {i} points to invalid UTF8 entry {name_index}"
                    )
                })?;
                if let Err(reason) = check_module_name(name) {
                    return Err(cfe!(sink, "Module entry at CP slot {i}: {reason}"));
                }
                module_name = Some(name.to_string());
            }

            CpEntry::Package { name_index } => {
                check_module_gate(klass, i, "Package", sink)?;
                let name = klass.cp.utf8_str(*name_index).ok_or_else(|| {
                    cfe!(
                        sink,
                        "Package entry at CP slot {i} points to invalid UTF8 entry {name_index}"
                    )
                })?;
                if let Err(reason) = check_package_name(name) {
                    return Err(cfe!(sink, "Package entry at CP slot {i}: {reason}"));
                }
                package_name = Some(name.to_string());
            }
        }
    }

    if let Some(name) = module_name {
        klass.module_name = name;
    }
    if let Some(name) = package_name {
        klass.package_name = name;
    }
    Ok(())
}

/// FieldRef/MethodRef/InterfaceMethodRef all carry a ClassRef index and a
/// NameAndType index; validate both targets and hand back the name and
/// descriptor UTF8 indices for the kind-specific grammar checks.
fn check_ref_targets(
    klass: &ParsedClass,
    slot: usize,
    class_index: u16,
    nat_index: u16,
    kind: &str,
    sink: &DiagSink,
) -> Result<(u16, u16)> {
    match klass.cp.fetch(class_index) {
        Some(CpEntry::ClassRef { .. }) => {}
        _ => {
            return Err(cfe!(
                sink,
                "{kind} at CP slot {slot} points to an invalid entry in ClassRefs: {class_index}"
            ))
        }
    }
    match klass.cp.fetch(nat_index) {
        Some(CpEntry::NameAndType {
            name_index,
            desc_index,
        }) => Ok((*name_index, *desc_index)),
        _ => Err(cfe!(
            sink,
            "{kind} at CP slot {slot} points to an invalid entry in nameAndType: {nat_index}"
        )),
    }
}

/// Resolve the descriptor string of the NameAndType entry referenced by a
/// Dynamic/InvokeDynamic constant.
fn nat_descriptor(
    klass: &ParsedClass,
    slot: usize,
    nat_index: u16,
    kind: &str,
    sink: &DiagSink,
) -> Result<String> {
    let (_, desc_index) = match klass.cp.fetch(nat_index) {
        Some(CpEntry::NameAndType {
            name_index,
            desc_index,
        }) => (*name_index, *desc_index),
        _ => {
            return Err(cfe!(
                sink,
                "{kind} at CP slot {slot} points to an invalid entry in nameAndType: {nat_index}"
            ))
        }
    };
    match klass.cp.utf8_str(desc_index) {
        Some(desc) => Ok(desc.to_string()),
        None => Err(cfe!(
            sink,
            "{kind} at CP slot {slot} points to invalid UTF8 entry {desc_index}"
        )),
    }
}

/// The (ref_kind, target kind) table of JVMS §4.4.8.
fn check_method_handle(
    klass: &ParsedClass,
    slot: usize,
    ref_kind: u8,
    ref_index: u16,
    sink: &DiagSink,
) -> Result<()> {
    let target = klass.cp.fetch(ref_index);
    match ref_kind {
        1..=4 => match target {
            Some(CpEntry::FieldRef { .. }) => Ok(()),
            _ => Err(cfe!(
                sink,
                "MethodHandle at CP slot {slot} has reference kind {ref_kind} \
                 which does not point to a FieldRef"
            )),
        },
        5 => match target {
            Some(CpEntry::MethodRef { .. }) => Ok(()),
            _ => Err(cfe!(
                sink,
                "MethodHandle at CP slot {slot} has reference kind {ref_kind} \
                 which does not point to a MethodRef"
            )),
        },
        6 | 7 => match target {
            Some(CpEntry::MethodRef { .. }) => Ok(()),
            Some(CpEntry::InterfaceMethodRef { .. })
                if klass.major_version >= MH_INTERFACE_MIN_MAJOR =>
            {
                Ok(())
            }
            _ => Err(cfe!(
                sink,
                "MethodHandle at CP slot {slot} has reference kind {ref_kind} which must \
                 point to a MethodRef, or in Java version 52 or later an InterfaceMethodRef"
            )),
        },
        8 => {
            let nat_index = match target {
                Some(CpEntry::MethodRef {
                    name_and_type_index,
                    ..
                }) => *name_and_type_index,
                _ => {
                    return Err(cfe!(
                        sink,
                        "MethodHandle at CP slot {slot} has reference kind 8 \
                         which does not point to a MethodRef"
                    ))
                }
            };
            let method_name = match klass.cp.fetch(nat_index) {
                Some(CpEntry::NameAndType { name_index, .. }) => klass.cp.utf8_str(*name_index),
                _ => None,
            };
            if method_name != Some(CONSTRUCTOR_METHOD_NAME) {
                return Err(cfe!(
                    sink,
                    "MethodHandle at CP slot {slot} has reference kind 8 \
                     whose method name should be <init>"
                ));
            }
            Ok(())
        }
        9 => match target {
            Some(CpEntry::InterfaceMethodRef { .. }) => Ok(()),
            _ => Err(cfe!(
                sink,
                "MethodHandle at CP slot {slot} has a reference kind of 9 \
                 which does not point to an interface"
            )),
        },
        _ => Err(cfe!(
            sink,
            "MethodHandle at CP slot {slot} has an invalid reference kind {ref_kind}"
        )),
    }
}

/// Module and Package constants are only legal in module-info class files
/// of Java 9 or later.
fn check_module_gate(
    klass: &ParsedClass,
    slot: usize,
    kind: &str,
    sink: &DiagSink,
) -> Result<()> {
    if !klass.access.is_module {
        return Err(cfe!(
            sink,
            "{kind} entry at CP slot {slot} in a class without the module access flag"
        ));
    }
    if klass.major_version < MODULE_MIN_MAJOR {
        return Err(cfe!(
            sink,
            "{kind} entry at CP slot {slot} requires class file version {MODULE_MIN_MAJOR} or later, found {}",
            klass.major_version
        ));
    }
    Ok(())
}

/// A bootstrap method's handle must be a MethodHandle constant, and each
/// static argument must be a loadable constant. Runs once here, during
/// format check; publication does not re-validate.
fn check_bootstrap_method(
    klass: &ParsedClass,
    slot: usize,
    bootstrap_index: u16,
    sink: &DiagSink,
) -> Result<()> {
    let bsm = &klass.bootstraps[bootstrap_index as usize];
    match klass.cp.fetch(bsm.method_ref) {
        Some(CpEntry::MethodHandle { .. }) => {}
        _ => {
            return Err(cfe!(
                sink,
                "Bootstrap method {bootstrap_index} referenced from CP slot {slot} \
                 does not point to a MethodHandle"
            ))
        }
    }
    for &arg in &bsm.args {
        let loadable = klass.cp.fetch(arg).map(CpEntry::is_loadable).unwrap_or(false);
        if !loadable {
            return Err(cfe!(
                sink,
                "Bootstrap method {bootstrap_index} referenced from CP slot {slot} \
                 has a non-loadable argument at CP slot {arg}"
            ));
        }
    }
    Ok(())
}

/// Loadability of a single CP slot, exposed for the LDC-family checks and
/// for direct testing.
pub fn validate_item_is_loadable(klass: &ParsedClass, index: u16) -> bool {
    klass
        .cp
        .fetch(index)
        .map(CpEntry::is_loadable)
        .unwrap_or(false)
}
