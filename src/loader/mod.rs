//! Classloader orchestration.
//!
//! Drives the full ingestion pipeline — fetch bytes, parse, format check,
//! verify each method's code, publish — and enforces the cross-class
//! ordering rules: one loader wins each class name, and a subclass is
//! never published before its direct superclass is at least
//! format-checked.

pub mod post;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classfile::class::ParsedClass;
use crate::common::diag::DiagSink;
use crate::common::error::{JvmError, Result};
use crate::runtime::klass::{Klass, KlassStatus};
use crate::runtime::{meth_area, string_pool};
use crate::verify;

/// A classloader: a name, a parent, and a count of classes it has posted.
#[derive(Debug, Clone)]
pub struct Classloader {
    pub name: String,
    pub parent: String,
    pub class_count: usize,
}

impl Classloader {
    pub fn new(name: &str, parent: &str) -> Self {
        Classloader {
            name: name.to_string(),
            parent: parent.to_string(),
            class_count: 0,
        }
    }

    /// The loader for the standard libraries.
    pub fn bootstrap() -> Self {
        Classloader::new("bootstrap", "")
    }

    /// The loader typically used for custom agents.
    pub fn extension() -> Self {
        Classloader::new("extension", "bootstrap")
    }

    /// The loader for most application classes.
    pub fn app() -> Self {
        Classloader::new("app", "extension")
    }

    pub fn loaded_class_count(&self) -> usize {
        self.class_count
    }
}

/// Where class bytes come from. Jar/jmod readers implement this trait
/// outside the core; the directory source below covers exploded trees.
pub trait ClassByteSource {
    fn get_class_bytes(&self, class_name: &str) -> std::io::Result<Vec<u8>>;
}

/// Byte source over an exploded directory of `.class` files laid out by
/// internal class name.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }
}

impl ClassByteSource for DirectorySource {
    fn get_class_bytes(&self, class_name: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.root.join(format!("{class_name}.class")))
    }
}

/// Parse, format-check and code-verify a class without publishing it.
fn parse_and_check(raw: &[u8], sink: &DiagSink) -> Result<ParsedClass> {
    let mut klass = crate::classfile::parse(raw, sink)?;
    verify::format_check_class(&mut klass, sink)?;

    let access = klass.access.clone();
    let (methods, cp) = (&mut klass.methods, &klass.cp);
    for method in methods.iter_mut() {
        if let Some(code_attr) = method.code.as_mut() {
            verify::check_code_validity(
                Some(&mut code_attr.code),
                Some(cp),
                code_attr.max_locals,
                &access,
                sink,
            )?;
        }
    }
    Ok(klass)
}

/// Publish a checked class under the given loader.
fn publish(cl: &mut Classloader, klass: &ParsedClass) {
    let cl_data = post::convert_to_postable(klass);
    meth_area::insert(
        &klass.class_name,
        Klass {
            status: KlassStatus::FormatChecked,
            loader: cl.name.clone(),
            data: Some(Arc::new(cl_data)),
        },
    );
    cl.class_count += 1;
}

/// Parse a class presented as bytes and, if all checks pass, post it to
/// the method area. Returns the string-pool handles of the class name and
/// its superclass name.
pub fn parse_and_post_class(
    cl: &mut Classloader,
    raw: &[u8],
    sink: &DiagSink,
) -> Result<(u32, u32)> {
    let klass = parse_and_check(raw, sink)?;
    publish(cl, &klass);
    Ok((klass.class_name_index, klass.superclass_index))
}

/// Read one `.class` file and run it through the loader. The `.class`
/// suffix is appended when missing.
pub fn load_class_from_file(
    cl: &mut Classloader,
    fname: &Path,
    sink: &DiagSink,
) -> Result<(u32, u32)> {
    let filename = if fname.extension().map(|e| e == "class").unwrap_or(false) {
        fname.to_path_buf()
    } else {
        fname.with_extension("class")
    };
    let raw = std::fs::read(&filename).map_err(|_| {
        JvmError::ClassNotFound(format!("class file {} could not be read", filename.display()))
    })?;
    parse_and_post_class(cl, &raw, sink)
}

/// Load a class by internal name (`java/lang/String` form), claiming the
/// name in the method area and sequencing the superclass chain so that a
/// superclass is always published before its subclass.
pub fn load_class_by_name(
    cl: &mut Classloader,
    name: &str,
    source: &dyn ClassByteSource,
    sink: &DiagSink,
) -> Result<()> {
    let mut chain = Vec::new();
    load_with_chain(cl, name, source, sink, &mut chain)
}

fn load_with_chain(
    cl: &mut Classloader,
    name: &str,
    source: &dyn ClassByteSource,
    sink: &DiagSink,
    chain: &mut Vec<String>,
) -> Result<()> {
    if name.is_empty() {
        return Err(JvmError::ClassNotFound("empty class name".to_string()));
    }
    if name.ends_with(';') {
        return Err(JvmError::ClassNotFound(format!("invalid class name: {name}")));
    }
    if chain.iter().any(|ancestor| ancestor == name) {
        let err = JvmError::NoClassDef(format!("circular superclass chain at {name}"));
        sink.emit(&err.to_string());
        return Err(err);
    }

    // claim the name, or wait out whoever holds it
    loop {
        if let Some(entry) = meth_area::fetch(name) {
            if entry.status.is_terminal() {
                return Ok(());
            }
            if meth_area::wait_for_terminal(name).is_some() {
                return Ok(());
            }
            // the claim was rolled back; try to take it ourselves
            continue;
        }
        if meth_area::claim_for_loading(name, &cl.name) {
            break;
        }
    }

    chain.push(name.to_string());
    let outcome = load_claimed(cl, name, source, sink, chain);
    chain.pop();

    if outcome.is_err() {
        meth_area::delete(name); // roll back the claim
    }
    outcome.map_err(|err| promote_bootstrap_failure(cl, name, err))
}

fn load_claimed(
    cl: &mut Classloader,
    name: &str,
    source: &dyn ClassByteSource,
    sink: &DiagSink,
    chain: &mut Vec<String>,
) -> Result<()> {
    let raw = source
        .get_class_bytes(name)
        .map_err(|e| JvmError::ClassNotFound(format!("no class bytes for {name}: {e}")))?;

    let klass = parse_and_check(&raw, sink)?;

    // the superclass must be at least format-checked before this class
    // becomes visible
    if klass.superclass_index != string_pool::OBJECT_POOL_STRING_INDEX
        && klass.superclass_index != klass.class_name_index
    {
        let super_name = string_pool::get(klass.superclass_index).ok_or_else(|| {
            JvmError::NoClassDef(format!("unresolvable superclass of {name}"))
        })?;
        load_with_chain(cl, &super_name, source, sink, chain)?;
    }

    publish(cl, &klass);
    Ok(())
}

/// A bootstrap class that fails to load takes the VM down; other loaders
/// surface the failure to the caller unchanged.
fn promote_bootstrap_failure(cl: &Classloader, name: &str, err: JvmError) -> JvmError {
    if cl.name == "bootstrap" && err.is_rejection() {
        JvmError::Fatal(format!("bootstrap class {name} failed to load: {err}"))
    } else {
        err
    }
}

/// Bulk-load every `.class` file below `dir`, in the manner of a jmod
/// tree walk. Individual failures are skipped — whether a given class is
/// actually needed is not known yet. Returns the number of classes
/// posted.
pub fn load_directory(cl: &mut Classloader, dir: &Path, sink: &DiagSink) -> usize {
    let mut loaded = 0;
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().map(|e| e == "class").unwrap_or(false)
            && load_class_from_file(cl, entry.path(), sink).is_ok()
        {
            loaded += 1;
        }
    }
    loaded
}
