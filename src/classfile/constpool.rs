//! Constant pool model and the runtime lookup utilities over it.
//!
//! The pool is stored exactly as indexed by the class file: slot 0 holds
//! the reserved dummy entry, and the slot after every `LongConst` /
//! `DoubleConst` holds another dummy, so every `u16` index in the file maps
//! straight onto the vector.

use crate::runtime::string_pool;
use std::sync::Arc;

/// One constant-pool entry. One variant per JVMS tag, plus the reserved
/// dummy filler.
#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
    Dummy,
    /// Raw modified-UTF-8 payload. Kept as bytes: wellformedness is the
    /// format checker's job, and invalid payloads must survive parsing so
    /// the checker can see them.
    Utf8(Vec<u8>),
    IntConst(i32),
    FloatConst(f32),
    LongConst(i64),
    DoubleConst(f64),
    /// Interned class name; the payload is a string-pool handle, not a CP
    /// index, because the parser resolves and normalizes the name eagerly.
    ClassRef { name_index: u32 },
    StringConst { utf8_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, desc_index: u16 },
    MethodHandle { ref_kind: u8, ref_index: u16 },
    MethodType { desc_index: u16 },
    Dynamic { bootstrap_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl CpEntry {
    /// Entry-kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CpEntry::Dummy => "Dummy",
            CpEntry::Utf8(_) => "UTF8",
            CpEntry::IntConst(_) => "IntConst",
            CpEntry::FloatConst(_) => "FloatConst",
            CpEntry::LongConst(_) => "LongConst",
            CpEntry::DoubleConst(_) => "DoubleConst",
            CpEntry::ClassRef { .. } => "ClassRef",
            CpEntry::StringConst { .. } => "StringConst",
            CpEntry::FieldRef { .. } => "FieldRef",
            CpEntry::MethodRef { .. } => "MethodRef",
            CpEntry::InterfaceMethodRef { .. } => "InterfaceMethodRef",
            CpEntry::NameAndType { .. } => "NameAndType",
            CpEntry::MethodHandle { .. } => "MethodHandle",
            CpEntry::MethodType { .. } => "MethodType",
            CpEntry::Dynamic { .. } => "Dynamic",
            CpEntry::InvokeDynamic { .. } => "InvokeDynamic",
            CpEntry::Module { .. } => "Module",
            CpEntry::Package { .. } => "Package",
        }
    }

    /// True for the entry kinds that may appear as a static bootstrap
    /// argument (JVMS "loadable" constants).
    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            CpEntry::IntConst(_)
                | CpEntry::FloatConst(_)
                | CpEntry::LongConst(_)
                | CpEntry::DoubleConst(_)
                | CpEntry::StringConst { .. }
                | CpEntry::ClassRef { .. }
                | CpEntry::MethodHandle { .. }
                | CpEntry::MethodType { .. }
                | CpEntry::Dynamic { .. }
        )
    }

    /// True for the loadable kinds that occupy a single operand-stack slot
    /// (everything loadable except long/double).
    pub fn is_loadable_category1(&self) -> bool {
        self.is_loadable()
            && !matches!(self, CpEntry::LongConst(_) | CpEntry::DoubleConst(_))
    }
}

/// The ordered constant pool of one class, dummy slots included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    pub entries: Vec<CpEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow the entry at a class-file index. Index 0 (the reserved dummy)
    /// and out-of-range indices both return `None`; callers treat either as
    /// an invalid reference.
    pub fn fetch(&self, index: u16) -> Option<&CpEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    /// Direct slot access including slot 0; used by the format checker's
    /// walk over every slot.
    pub fn slot(&self, index: usize) -> Option<&CpEntry> {
        self.entries.get(index)
    }

    /// UTF-8 payload bytes at `index`, if that slot holds a UTF8 entry.
    pub fn utf8(&self, index: u16) -> Option<&[u8]> {
        match self.fetch(index) {
            Some(CpEntry::Utf8(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// UTF-8 payload as `&str`. Returns `None` for non-UTF8 slots and for
    /// payloads that are not valid Rust UTF-8 (surrogate-encoded names are
    /// rejected upstream by the format checker).
    pub fn utf8_str(&self, index: u16) -> Option<&str> {
        self.utf8(index).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Resolve a ClassRef entry to its interned class name.
    pub fn class_name(&self, index: u16) -> Option<Arc<str>> {
        match self.fetch(index) {
            Some(CpEntry::ClassRef { name_index }) => string_pool::get(*name_index),
            _ => None,
        }
    }

    /// Resolve a NameAndType entry to `(name, descriptor)` strings.
    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.fetch(index) {
            Some(CpEntry::NameAndType { name_index, desc_index }) => {
                Some((self.utf8_str(*name_index)?, self.utf8_str(*desc_index)?))
            }
            _ => None,
        }
    }

    /// Resolve a MethodRef entry to `(class name, method name, descriptor)`.
    /// The runtime uses this when materialising call sites.
    pub fn method_info(&self, index: u16) -> Option<(Arc<str>, String, String)> {
        let (class_index, nat_index) = match self.fetch(index) {
            Some(CpEntry::MethodRef { class_index, name_and_type_index })
            | Some(CpEntry::InterfaceMethodRef { class_index, name_and_type_index }) => {
                (*class_index, *name_and_type_index)
            }
            _ => return None,
        };
        let class_name = self.class_name(class_index)?;
        let (name, desc) = self.name_and_type(nat_index)?;
        Some((class_name, name.to_string(), desc.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(entries: Vec<CpEntry>) -> ConstantPool {
        ConstantPool { entries }
    }

    #[test]
    fn fetch_rejects_slot_zero_and_overflow() {
        let cp = pool_with(vec![CpEntry::Dummy, CpEntry::IntConst(7)]);
        assert!(cp.fetch(0).is_none());
        assert!(cp.fetch(2).is_none());
        assert_eq!(cp.fetch(1), Some(&CpEntry::IntConst(7)));
    }

    #[test]
    fn loadable_kinds() {
        assert!(CpEntry::IntConst(1).is_loadable());
        assert!(CpEntry::LongConst(1).is_loadable());
        assert!(CpEntry::MethodType { desc_index: 1 }.is_loadable());
        assert!(!CpEntry::Utf8(b"x".to_vec()).is_loadable());
        assert!(!CpEntry::NameAndType { name_index: 1, desc_index: 2 }.is_loadable());

        assert!(CpEntry::IntConst(1).is_loadable_category1());
        assert!(!CpEntry::LongConst(1).is_loadable_category1());
        assert!(!CpEntry::DoubleConst(1.0).is_loadable_category1());
    }

    #[test]
    fn name_and_type_resolves_through_utf8() {
        let cp = pool_with(vec![
            CpEntry::Dummy,
            CpEntry::NameAndType { name_index: 2, desc_index: 3 },
            CpEntry::Utf8(b"run".to_vec()),
            CpEntry::Utf8(b"()V".to_vec()),
        ]);
        assert_eq!(cp.name_and_type(1), Some(("run", "()V")));
    }

    #[test]
    fn method_info_resolves_class_name_through_string_pool() {
        let idx = string_pool::get_or_insert("com/example/Widget");
        let cp = pool_with(vec![
            CpEntry::Dummy,
            CpEntry::MethodRef { class_index: 2, name_and_type_index: 3 },
            CpEntry::ClassRef { name_index: idx },
            CpEntry::NameAndType { name_index: 4, desc_index: 5 },
            CpEntry::Utf8(b"spin".to_vec()),
            CpEntry::Utf8(b"(I)V".to_vec()),
        ]);
        let (class, name, desc) = cp.method_info(1).expect("should resolve");
        assert_eq!(&*class, "com/example/Widget");
        assert_eq!(name, "spin");
        assert_eq!(desc, "(I)V");
    }
}
