//! Method-table checks: name and descriptor grammar, thrown-exception
//! references, and Code-attribute presence rules.

use crate::cfe;
use crate::classfile::class::ParsedClass;
use crate::classfile::constpool::CpEntry;
use crate::classfile::defs::access_flags::{ACC_ABSTRACT, ACC_NATIVE};
use crate::common::diag::DiagSink;
use crate::common::error::Result;

use super::descriptor::validate_method_desc;
use super::names::validate_unqualified_name;

pub fn format_check_methods(klass: &ParsedClass, sink: &DiagSink) -> Result<()> {
    for (n, method) in klass.methods.iter().enumerate() {
        super::access_flags::check_method_flags(klass, n, method.access_flags, sink)?;
        let name = klass.cp.utf8_str(method.name_index).ok_or_else(|| {
            cfe!(
                sink,
                "Method {n} has a name index {} that points to invalid UTF8 entry",
                method.name_index
            )
        })?;
        if !validate_unqualified_name(name, true) {
            return Err(cfe!(sink, "Method {n} has an invalid method name: {name}"));
        }

        let desc = klass.cp.utf8_str(method.desc_index).ok_or_else(|| {
            cfe!(
                sink,
                "Method {name} has a descriptor index {} that points to invalid UTF8 entry",
                method.desc_index
            )
        })?;
        if !validate_method_desc(desc) {
            return Err(cfe!(
                sink,
                "Method {name} has an invalid method descriptor: {desc}"
            ));
        }

        // abstract and native methods carry no code; everything else must
        let code_free = method.access_flags & (ACC_ABSTRACT | ACC_NATIVE) != 0;
        if code_free && method.code.is_some() {
            return Err(cfe!(
                sink,
                "Method {name} is abstract or native but has a Code attribute"
            ));
        }
        if !code_free && method.code.is_none() {
            return Err(cfe!(
                sink,
                "Method {name} must have a Code attribute unless abstract or native"
            ));
        }

        for &exc_index in &method.exceptions {
            match klass.cp.fetch(exc_index) {
                Some(CpEntry::ClassRef { .. }) => {}
                _ => {
                    return Err(cfe!(
                        sink,
                        "Method {name} declares a thrown exception at CP slot {exc_index} \
                         that is not a class reference"
                    ))
                }
            }
        }
    }
    Ok(())
}
