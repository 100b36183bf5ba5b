//! Structural size consistency: every declared count in the parsed class
//! must equal the length of the table it describes.

use crate::cfe;
use crate::classfile::class::ParsedClass;
use crate::common::diag::DiagSink;
use crate::common::error::Result;

pub fn format_check_structure(klass: &ParsedClass, sink: &DiagSink) -> Result<()> {
    if klass.cp_count != klass.cp.len() {
        return Err(cfe!(
            sink,
            "Error in size of constant pool: declared {}, actual {}",
            klass.cp_count,
            klass.cp.len()
        ));
    }
    if klass.interface_count != klass.interfaces.len() {
        return Err(cfe!(
            sink,
            "Error in size of interface table: declared {}, actual {}",
            klass.interface_count,
            klass.interfaces.len()
        ));
    }
    if klass.field_count != klass.fields.len() {
        return Err(cfe!(
            sink,
            "Error in size of field table: declared {}, actual {}",
            klass.field_count,
            klass.fields.len()
        ));
    }
    if klass.method_count != klass.methods.len() {
        return Err(cfe!(
            sink,
            "Error in size of method table: declared {}, actual {}",
            klass.method_count,
            klass.methods.len()
        ));
    }
    if klass.attrib_count != klass.attributes.len() {
        return Err(cfe!(
            sink,
            "Error in size of attribute table: declared {}, actual {}",
            klass.attrib_count,
            klass.attributes.len()
        ));
    }
    if klass.bootstrap_count != klass.bootstraps.len() {
        return Err(cfe!(
            sink,
            "Error in size of bootstrap method table: declared {}, actual {}",
            klass.bootstrap_count,
            klass.bootstraps.len()
        ));
    }
    Ok(())
}
