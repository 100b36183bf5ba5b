//! Process-wide runtime collaborators of the loader: the string interning
//! pool and the method area.

pub mod klass;
pub mod meth_area;
pub mod string_pool;

pub use klass::{ClData, ClInitStatus, Klass, KlassStatus};
