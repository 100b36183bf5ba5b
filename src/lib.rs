//! tolv — class file ingestion and verification core
//!
//! Turns a raw `.class` byte stream into a validated, link-ready class
//! representation and publishes it to the process-wide method area.
//!
//! ## Pipeline
//!
//! ```text
//! bytes → classfile::parser → ParsedClass → verify::format_check_class
//!                                         → verify::code (per method)
//!                                         → loader::post → ClData → runtime::meth_area
//! ```
//!
//! - **classfile**: the JVMS §4 data model (constant pool, fields, methods,
//!   attributes) and the strict-order byte parser.
//! - **verify**: the structural format checker and the stack-size /
//!   branch-target bytecode verifier.
//! - **runtime**: the string interning pool and the method area.
//! - **loader**: orchestration — byte sources, superclass sequencing, and
//!   the publisher that converts a checked class into its posted form.

pub mod classfile;
pub mod common;
pub mod consts;
pub mod loader;
pub mod runtime;
pub mod verify;

pub use common::diag::DiagSink;
pub use common::error::{JvmError, Result};
