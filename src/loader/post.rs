//! The publisher: converts a fully checked `ParsedClass` into the compact
//! `ClData` form posted to the method area.
//!
//! Conversion narrows indices to their wire width, re-keys the method list
//! as a `name+descriptor` table, resolves StringConst pool entries into
//! direct UTF-8 payloads, and summarises `<clinit>` presence. It never
//! fails: it runs only on classes that survived the format check.

use crate::classfile::class::ParsedClass;
use crate::classfile::constpool::{ConstantPool, CpEntry};
use crate::runtime::klass::{ClData, ClInitStatus, PostedField, PostedMethod};
use std::sync::Arc;

/// Key of the `<clinit>` entry in a posted method table.
const CLINIT_KEY: &str = "<clinit>()V";

pub fn convert_to_postable(klass: &ParsedClass) -> ClData {
    let mut cl_data = ClData {
        name: klass.class_name.clone(),
        name_index: klass.class_name_index,
        superclass_index: klass.superclass_index,
        module: klass.module_name.clone(),
        pkg: klass.package_name.clone(),
        interfaces: klass.interfaces.clone(),
        attributes: klass.attributes.clone(),
        source_file: klass.source_file.clone(),
        bootstraps: klass.bootstraps.clone(),
        access: klass.access.clone(),
        major_version: klass.major_version,
        ..ClData::default()
    };

    for field in &klass.fields {
        cl_data.fields.push(PostedField {
            name: field.name_index,
            desc: field.desc_index,
            is_static: field.is_static,
            attributes: field.attributes.clone(),
        });
    }

    for method in &klass.methods {
        let meth_name = klass.cp.utf8_str(method.name_index).unwrap_or_default();
        let meth_desc = klass.cp.utf8_str(method.desc_index).unwrap_or_default();

        let mut posted = PostedMethod {
            name: method.name_index,
            desc: method.desc_index,
            access_flags: method.access_flags,
            exceptions: method.exceptions.clone(),
            attributes: method.attributes.clone(),
            parameters: method.parameters.clone(),
            deprecated: method.deprecated,
            ..PostedMethod::default()
        };
        if let Some(code_attr) = &method.code {
            posted.max_stack = code_attr.max_stack;
            posted.max_locals = code_attr.max_locals;
            posted.code = code_attr.code.clone();
            posted.code_exceptions = code_attr.exceptions.clone();
            posted.code_attributes = code_attr.attributes.clone();
            posted.line_table = code_attr.line_table.clone();
        }

        cl_data
            .method_table
            .insert(format!("{meth_name}{meth_desc}"), Arc::new(posted));
    }

    cl_data.cl_init = if cl_data.method_table.contains_key(CLINIT_KEY) {
        ClInitStatus::ClInitNotRun
    } else {
        ClInitStatus::NoClinit
    };

    cl_data.cp = post_constant_pool(&klass.cp);
    cl_data
}

/// Copy the constant pool into its posted form. StringConst entries are
/// resolved into direct UTF-8 payloads so the runtime never chases the
/// extra indirection.
fn post_constant_pool(cp: &ConstantPool) -> ConstantPool {
    let entries = cp
        .entries
        .iter()
        .map(|entry| match entry {
            CpEntry::StringConst { utf8_index } => match cp.utf8(*utf8_index) {
                Some(bytes) => CpEntry::Utf8(bytes.to_vec()),
                None => entry.clone(),
            },
            other => other.clone(),
        })
        .collect();
    ConstantPool { entries }
}
