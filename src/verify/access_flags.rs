//! Access-flag combination rules of JVMS §4.1, §4.5 and §4.6.

use crate::cfe;
use crate::classfile::class::ParsedClass;
use crate::classfile::defs::access_flags::*;
use crate::common::diag::DiagSink;
use crate::common::error::Result;

/// Class-level flag combinations.
pub fn check_class_flags(klass: &ParsedClass, sink: &DiagSink) -> Result<()> {
    let flags = klass.access_flags;
    if klass.access.is_interface {
        if !klass.access.is_abstract {
            return Err(cfe!(
                sink,
                "Interface {} must also carry the abstract flag (flags 0x{flags:04x})",
                klass.class_name
            ));
        }
        if flags & (ACC_FINAL | ACC_SUPER | ACC_ENUM) != 0 {
            return Err(cfe!(
                sink,
                "Interface {} carries flags illegal on interfaces (flags 0x{flags:04x})",
                klass.class_name
            ));
        }
    } else if klass.access.is_annotation {
        return Err(cfe!(
            sink,
            "Class {} has the annotation flag without the interface flag",
            klass.class_name
        ));
    }
    if klass.access.is_final && klass.access.is_abstract {
        return Err(cfe!(
            sink,
            "Class {} cannot be both final and abstract",
            klass.class_name
        ));
    }
    Ok(())
}

/// Field flag combinations; `n` identifies the field in diagnostics.
pub fn check_field_flags(klass: &ParsedClass, n: usize, flags: u16, sink: &DiagSink) -> Result<()> {
    if visibility_count(flags) > 1 {
        return Err(cfe!(
            sink,
            "Field {n} has more than one visibility flag (flags 0x{flags:04x})"
        ));
    }
    if flags & ACC_FINAL != 0 && flags & ACC_VOLATILE != 0 {
        return Err(cfe!(
            sink,
            "Field {n} cannot be both final and volatile (flags 0x{flags:04x})"
        ));
    }
    if klass.access.is_interface {
        let required = ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
        let illegal = ACC_PRIVATE | ACC_PROTECTED | ACC_VOLATILE | ACC_TRANSIENT | ACC_ENUM;
        if flags & required != required || flags & illegal != 0 {
            return Err(cfe!(
                sink,
                "Interface field {n} must be public static final (flags 0x{flags:04x})"
            ));
        }
    }
    Ok(())
}

/// Method flag combinations; `n` identifies the method in diagnostics.
pub fn check_method_flags(klass: &ParsedClass, n: usize, flags: u16, sink: &DiagSink) -> Result<()> {
    if visibility_count(flags) > 1 {
        return Err(cfe!(
            sink,
            "Method {n} has more than one visibility flag (flags 0x{flags:04x})"
        ));
    }
    if klass.access.is_interface
        && flags & (ACC_PROTECTED | ACC_FINAL | ACC_SYNCHRONIZED | ACC_NATIVE) != 0
    {
        return Err(cfe!(
            sink,
            "Interface method {n} carries flags illegal on interface methods (flags 0x{flags:04x})"
        ));
    }
    if flags & ACC_ABSTRACT != 0
        && flags & (ACC_PRIVATE | ACC_STATIC | ACC_FINAL | ACC_SYNCHRONIZED | ACC_NATIVE | ACC_STRICT)
            != 0
    {
        return Err(cfe!(
            sink,
            "Abstract method {n} carries flags incompatible with abstract (flags 0x{flags:04x})"
        ));
    }
    Ok(())
}

fn visibility_count(flags: u16) -> u8 {
    ((flags & ACC_PUBLIC != 0) as u8)
        + ((flags & ACC_PRIVATE != 0) as u8)
        + ((flags & ACC_PROTECTED != 0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::class::ClassAccess;

    fn klass_with_flags(flags: u16) -> ParsedClass {
        let mut klass = ParsedClass::new();
        klass.access_flags = flags;
        klass.access = ClassAccess::from_flags(flags);
        klass
    }

    #[test]
    fn interface_requires_abstract() {
        let klass = klass_with_flags(ACC_INTERFACE);
        assert!(check_class_flags(&klass, &DiagSink::null()).is_err());

        let klass = klass_with_flags(ACC_INTERFACE | ACC_ABSTRACT);
        assert!(check_class_flags(&klass, &DiagSink::null()).is_ok());
    }

    #[test]
    fn final_abstract_class_is_rejected() {
        let klass = klass_with_flags(ACC_FINAL | ACC_ABSTRACT);
        assert!(check_class_flags(&klass, &DiagSink::null()).is_err());
    }

    #[test]
    fn annotation_without_interface_is_rejected() {
        let klass = klass_with_flags(ACC_ANNOTATION);
        assert!(check_class_flags(&klass, &DiagSink::null()).is_err());
    }

    #[test]
    fn double_visibility_is_rejected() {
        let klass = klass_with_flags(ACC_PUBLIC);
        assert!(check_method_flags(&klass, 0, ACC_PUBLIC | ACC_PRIVATE, &DiagSink::null()).is_err());
        assert!(check_field_flags(&klass, 0, ACC_PUBLIC | ACC_PROTECTED, &DiagSink::null()).is_err());
        assert!(check_method_flags(&klass, 0, ACC_PUBLIC, &DiagSink::null()).is_ok());
    }

    #[test]
    fn abstract_method_flag_conflicts() {
        let klass = klass_with_flags(ACC_PUBLIC);
        assert!(check_method_flags(&klass, 0, ACC_ABSTRACT | ACC_FINAL, &DiagSink::null()).is_err());
        assert!(check_method_flags(&klass, 0, ACC_ABSTRACT, &DiagSink::null()).is_ok());
    }

    #[test]
    fn interface_fields_must_be_public_static_final() {
        let klass = klass_with_flags(ACC_INTERFACE | ACC_ABSTRACT);
        assert!(check_field_flags(&klass, 0, ACC_PUBLIC, &DiagSink::null()).is_err());
        assert!(check_field_flags(
            &klass,
            0,
            ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
            &DiagSink::null()
        )
        .is_ok());
    }

    #[test]
    fn volatile_final_field_is_rejected() {
        let klass = klass_with_flags(ACC_PUBLIC);
        assert!(check_field_flags(&klass, 0, ACC_FINAL | ACC_VOLATILE, &DiagSink::null()).is_err());
    }
}
