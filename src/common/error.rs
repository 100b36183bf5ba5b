use thiserror::Error;

/// Result type for tolv operations
pub type Result<T> = std::result::Result<T, JvmError>;

/// Error surface of the class ingestion core.
///
/// Every variant that reports a malformed class carries the source location
/// inside the checker that detected it, so operators can find the exact
/// rule from the one-line diagnostic.
#[derive(Error, Debug)]
pub enum JvmError {
    #[error("Class Format Error: {reason}\n  detected by file: {file}, line: {line}")]
    ClassFormat {
        reason: String,
        file: &'static str,
        line: u32,
    },

    #[error("java.lang.VerifyError: {0}")]
    Verify(String),

    #[error("java.lang.ClassNotFoundException: {0}")]
    ClassNotFound(String),

    #[error("java.lang.NoClassDefFoundError: {0}")]
    NoClassDef(String),

    #[error("Internal error: {reason} ({file}:{line})")]
    Internal {
        reason: String,
        file: &'static str,
        line: u32,
    },

    /// A bootstrap class failed to load; the embedder is expected to shut
    /// the VM down in an orderly fashion.
    #[error("JVM exception: {0}")]
    Fatal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JvmError {
    pub fn class_format(reason: impl Into<String>, file: &'static str, line: u32) -> Self {
        JvmError::ClassFormat {
            reason: reason.into(),
            file,
            line,
        }
    }

    pub fn internal(reason: impl Into<String>, file: &'static str, line: u32) -> Self {
        JvmError::Internal {
            reason: reason.into(),
            file,
            line,
        }
    }

    /// True for the two rejection kinds that abort a class load outright.
    pub fn is_rejection(&self) -> bool {
        matches!(self, JvmError::ClassFormat { .. } | JvmError::Verify(_))
    }
}

/// Build a `ClassFormat` error at the call site, emitting the diagnostic
/// line to the given sink first. Mirrors the convention that every rule
/// violation is logged once before it propagates.
#[macro_export]
macro_rules! cfe {
    ($sink:expr, $($arg:tt)*) => {{
        let err = $crate::common::error::JvmError::class_format(
            format!($($arg)*), file!(), line!());
        $sink.emit(&err.to_string());
        err
    }};
}

/// Build an `Internal` error at the call site, emitting to the sink first.
#[macro_export]
macro_rules! internal_err {
    ($sink:expr, $($arg:tt)*) => {{
        let err = $crate::common::error::JvmError::internal(
            format!($($arg)*), file!(), line!());
        $sink.emit(&err.to_string());
        err
    }};
}

/// Build a `Verify` error, emitting the `java.lang.VerifyError` diagnostic
/// line to the sink first.
#[macro_export]
macro_rules! verify_fail {
    ($sink:expr, $($arg:tt)*) => {{
        let err = $crate::common::error::JvmError::Verify(format!($($arg)*));
        $sink.emit(&err.to_string());
        err
    }};
}
