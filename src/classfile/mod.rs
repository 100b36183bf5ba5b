//! The JVMS §4 class-file data model and the raw byte parser.

pub mod class;
pub mod constpool;
pub mod defs;
pub mod opcodes;
pub mod parser;

pub use class::{Attr, BootstrapMethod, ClassAccess, CodeAttr, Field, Method, ParsedClass};
pub use constpool::{ConstantPool, CpEntry};
pub use parser::parse;
