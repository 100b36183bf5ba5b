//! Field-table checks: name and descriptor grammar, plus the
//! ConstantValue constraints.

use crate::cfe;
use crate::classfile::class::ParsedClass;
use crate::classfile::constpool::CpEntry;
use crate::common::diag::DiagSink;
use crate::common::error::Result;

use super::descriptor::validate_field_desc;
use super::names::validate_field_name;

pub fn format_check_fields(klass: &ParsedClass, sink: &DiagSink) -> Result<()> {
    for (n, field) in klass.fields.iter().enumerate() {
        super::access_flags::check_field_flags(klass, n, field.access_flags, sink)?;
        let name = klass.cp.utf8_str(field.name_index).ok_or_else(|| {
            cfe!(
                sink,
                "Field {n} has a name index {} that points to invalid UTF8 entry",
                field.name_index
            )
        })?;
        if !validate_field_name(name) {
            return Err(cfe!(sink, "Field {n} has an invalid field name: {name}"));
        }

        let desc = klass.cp.utf8_str(field.desc_index).ok_or_else(|| {
            cfe!(
                sink,
                "Field {name} has a descriptor index {} that points to invalid UTF8 entry",
                field.desc_index
            )
        })?;
        if !validate_field_desc(desc) {
            return Err(cfe!(
                sink,
                "Field {name} has an invalid field descriptor: {desc}"
            ));
        }

        if let Some(cv_index) = field.const_value_index {
            if !field.is_static {
                return Err(cfe!(
                    sink,
                    "Field {name} has a ConstantValue attribute but is not static"
                ));
            }
            match klass.cp.fetch(cv_index) {
                Some(
                    CpEntry::IntConst(_)
                    | CpEntry::FloatConst(_)
                    | CpEntry::LongConst(_)
                    | CpEntry::DoubleConst(_)
                    | CpEntry::StringConst { .. },
                ) => {}
                _ => {
                    return Err(cfe!(
                        sink,
                        "Field {name} has a ConstantValue referring to an invalid constant kind \
                         at CP slot {cv_index}"
                    ))
                }
            }
        }
    }
    Ok(())
}
