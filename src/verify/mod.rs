//! Verification of parsed classes.
//!
//! Two layers live here: the format checker, which enforces the
//! structural and cross-reference rules of JVMS §4 over a `ParsedClass`,
//! and the code verifier, which walks each method's bytecode enforcing
//! per-opcode operand, constant-pool-target and branch-bound rules.
//!
//! Failure semantics are shared: the first violated rule is fatal for the
//! class, a one-line diagnostic goes to the sink, and the error carries
//! the checker-internal origin for operator diagnosis.

pub mod access_flags;
pub mod code;
pub mod constant_pool;
pub mod descriptor;
pub mod fields;
pub mod methods;
pub mod names;
pub mod structure;

pub use code::check_code_validity;
pub use constant_pool::format_check_constant_pool;

use crate::classfile::class::{ClassAccess, ParsedClass};
use crate::common::diag::DiagSink;
use crate::common::error::Result;

/// Run the complete format check over a parsed class.
///
/// The only mutations performed are deriving the boolean access-flag view
/// from the raw flag word and resolving module/package names out of the
/// constant pool; re-running the check yields the same verdict.
pub fn format_check_class(klass: &mut ParsedClass, sink: &DiagSink) -> Result<()> {
    klass.access = ClassAccess::from_flags(klass.access_flags);
    structure::format_check_structure(klass, sink)?;
    access_flags::check_class_flags(klass, sink)?;
    constant_pool::format_check_constant_pool(klass, sink)?;
    fields::format_check_fields(klass, sink)?;
    methods::format_check_methods(klass, sink)?;
    Ok(())
}
