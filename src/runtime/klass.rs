//! Posted class data: the compact, immutable form a class takes once it
//! has passed format checking and is published to the method area.

use crate::classfile::class::{
    Attr, BootstrapMethod, BytecodeToSourceLine, ClassAccess, CodeException, MethodParameter,
};
use crate::classfile::constpool::ConstantPool;
use std::collections::HashMap;
use std::sync::Arc;

/// Load status of a method-area entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlassStatus {
    /// A loader thread has claimed the name and is parsing/checking it.
    Initializing,
    /// The class passed format checking and its data is published.
    FormatChecked,
}

impl KlassStatus {
    /// One-character form used in traces, matching the classic 'I'/'F'
    /// status bytes.
    pub fn as_char(self) -> char {
        match self {
            KlassStatus::Initializing => 'I',
            KlassStatus::FormatChecked => 'F',
        }
    }

    /// Terminal states no longer change; waiters stop polling on them.
    pub fn is_terminal(self) -> bool {
        matches!(self, KlassStatus::FormatChecked)
    }
}

/// A method-area entry: status, owning loader, and (once format-checked)
/// the published data.
#[derive(Debug)]
pub struct Klass {
    pub status: KlassStatus,
    pub loader: String,
    pub data: Option<Arc<ClData>>,
}

/// Whether the class has a `<clinit>` and whether it has been run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClInitStatus {
    #[default]
    NoClinit,
    ClInitNotRun,
    ClInitRun,
}

/// Published class data. Append-only once inserted into the method area.
#[derive(Debug, Default)]
pub struct ClData {
    pub name: String,
    pub name_index: u32,
    pub superclass_index: u32,
    pub module: String,
    pub pkg: String,
    pub interfaces: Vec<u32>,
    pub fields: Vec<PostedField>,
    /// Methods keyed by `name + descriptor`
    pub method_table: HashMap<String, Arc<PostedMethod>>,
    pub attributes: Vec<Attr>,
    pub source_file: String,
    pub bootstraps: Vec<BootstrapMethod>,
    pub cl_init: ClInitStatus,
    pub access: ClassAccess,
    pub cp: ConstantPool,
    pub major_version: u16,
}

/// A field in posted form: narrowed indices, attributes carried raw.
#[derive(Debug, Default)]
pub struct PostedField {
    pub name: u16,
    pub desc: u16,
    pub is_static: bool,
    pub attributes: Vec<Attr>,
}

/// A method in posted form.
#[derive(Debug, Default)]
pub struct PostedMethod {
    pub name: u16,
    pub desc: u16,
    pub access_flags: u16,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// CP indices of declared thrown-exception ClassRefs
    pub exceptions: Vec<u16>,
    /// Exception table of the Code attribute
    pub code_exceptions: Vec<CodeException>,
    pub attributes: Vec<Attr>,
    pub code_attributes: Vec<Attr>,
    pub parameters: Vec<MethodParameter>,
    pub deprecated: bool,
    pub line_table: Option<Vec<BytecodeToSourceLine>>,
}
