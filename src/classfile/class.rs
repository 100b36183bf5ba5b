//! The parsed (pre-publication) class representation and its component
//! records. A `ParsedClass` is produced by the parser, mutated only by the
//! format checker (derived flag view, module/package names), and consumed
//! by the publisher.

use super::constpool::ConstantPool;
use crate::runtime::string_pool::INVALID_STRING_INDEX;

/// Everything parsed out of one class file. Declared counts are retained
/// separately from the tables they describe so the format checker can
/// detect count/length mismatches.
#[derive(Debug, Default)]
pub struct ParsedClass {
    pub major_version: u16,
    pub minor_version: u16,

    /// Class name, without path and without `.class`
    pub class_name: String,
    /// String-pool handle for the class name
    pub class_name_index: u32,
    /// String-pool handle for the direct superclass name
    pub superclass_index: u32,
    /// Resolved by the format checker from the CP Module entry, if any
    pub module_name: String,
    /// Resolved by the format checker from the CP Package entry, if any
    pub package_name: String,

    pub interface_count: usize,
    /// Implemented interfaces as string-pool handles
    pub interfaces: Vec<u32>,

    pub field_count: usize,
    pub fields: Vec<Field>,

    pub method_count: usize,
    pub methods: Vec<Method>,

    pub attrib_count: usize,
    pub attributes: Vec<Attr>,

    pub source_file: String,
    pub bootstrap_count: usize,
    pub bootstraps: Vec<BootstrapMethod>,

    pub deprecated: bool,

    pub cp_count: usize,
    pub cp: ConstantPool,

    /// Raw access-flag word as parsed
    pub access_flags: u16,
    /// Boolean view of the flag word, derived during format checking
    pub access: ClassAccess,
}

impl ParsedClass {
    pub fn new() -> Self {
        ParsedClass {
            class_name_index: INVALID_STRING_INDEX,
            superclass_index: INVALID_STRING_INDEX,
            ..ParsedClass::default()
        }
    }
}

/// Boolean view of the class access-flag word.
#[derive(Debug, Default, Clone)]
pub struct ClassAccess {
    pub is_public: bool,
    pub is_final: bool,
    pub is_super: bool,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_synthetic: bool,
    pub is_annotation: bool,
    pub is_enum: bool,
    pub is_module: bool,
}

impl ClassAccess {
    /// Derive the boolean view from a raw flag word.
    pub fn from_flags(flags: u16) -> Self {
        use super::defs::access_flags::*;
        ClassAccess {
            is_public: flags & ACC_PUBLIC != 0,
            is_final: flags & ACC_FINAL != 0,
            is_super: flags & ACC_SUPER != 0,
            is_interface: flags & ACC_INTERFACE != 0,
            is_abstract: flags & ACC_ABSTRACT != 0,
            is_synthetic: flags & ACC_SYNTHETIC != 0,
            is_annotation: flags & ACC_ANNOTATION != 0,
            is_enum: flags & ACC_ENUM != 0,
            is_module: flags & ACC_MODULE != 0,
        }
    }
}

/// A field declared by the class.
#[derive(Debug, Default)]
pub struct Field {
    pub access_flags: u16,
    pub is_static: bool,
    /// CP index of the UTF8 name
    pub name_index: u16,
    /// CP index of the UTF8 descriptor
    pub desc_index: u16,
    /// CP index referenced by a ConstantValue attribute, if present
    pub const_value_index: Option<u16>,
    pub attributes: Vec<Attr>,
}

/// A method declared by the class, constructors included.
#[derive(Debug, Default)]
pub struct Method {
    pub access_flags: u16,
    /// CP index of the UTF8 name
    pub name_index: u16,
    /// CP index of the UTF8 descriptor
    pub desc_index: u16,
    pub code: Option<CodeAttr>,
    pub attributes: Vec<Attr>,
    /// CP indices of ClassRef entries naming the declared thrown exceptions
    pub exceptions: Vec<u16>,
    pub parameters: Vec<MethodParameter>,
    pub deprecated: bool,
}

/// Decoded `Code` attribute.
#[derive(Debug, Default)]
pub struct CodeAttr {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exceptions: Vec<CodeException>,
    /// The Code attribute carries its own sub-attributes
    pub attributes: Vec<Attr>,
    /// Decoded LineNumberTable, when the class was compiled with one
    pub line_table: Option<Vec<BytecodeToSourceLine>>,
}

/// One exception-table row of a `Code` attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeException {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// CP index of the caught type's ClassRef; 0 catches everything
    pub catch_type: u16,
}

/// One row of a decoded LineNumberTable.
#[derive(Debug, Clone, Copy)]
pub struct BytecodeToSourceLine {
    pub byte_pc: u16,
    pub source_line: u16,
}

/// One `MethodParameters` row. The name is kept as a string since the
/// entry may legitimately be anonymous.
#[derive(Debug, Default, Clone)]
pub struct MethodParameter {
    pub name: String,
    pub access_flags: u16,
}

/// An attribute the core does not interpret: name plus raw payload.
#[derive(Debug, Default, Clone)]
pub struct Attr {
    /// CP index of the UTF8 attribute name
    pub name_index: u16,
    pub content: Vec<u8>,
}

/// One row of the class-level BootstrapMethods attribute.
#[derive(Debug, Default, Clone)]
pub struct BootstrapMethod {
    /// CP index of a MethodHandle entry
    pub method_ref: u16,
    /// CP indices of the loadable static arguments
    pub args: Vec<u16>,
}
