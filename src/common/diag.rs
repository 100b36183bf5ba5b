//! Diagnostic sink for verification messages.
//!
//! The format checker and the code verifier write one line per rejection to
//! a sink in addition to returning the error, so batch loads leave a
//! greppable trail. The sink is a handle owned by whoever drives the
//! pipeline rather than a process global: tests swap in a buffer and assert
//! on the captured text instead of redirecting stderr.

use std::io::Write;
use std::sync::{Arc, Mutex};

enum Target {
    Stderr,
    Null,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Cheaply cloneable handle to a diagnostic output target.
#[derive(Clone)]
pub struct DiagSink {
    target: Arc<Target>,
}

impl DiagSink {
    /// Sink that writes to the process stderr. This is the default wiring
    /// used by the loader.
    pub fn stderr() -> Self {
        DiagSink {
            target: Arc::new(Target::Stderr),
        }
    }

    /// Sink that discards everything. Used by tests that only care about
    /// the returned error.
    pub fn null() -> Self {
        DiagSink {
            target: Arc::new(Target::Null),
        }
    }

    /// Sink backed by an in-memory buffer, plus a handle to read it back.
    pub fn buffer() -> (Self, BufferHandle) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (
            DiagSink {
                target: Arc::new(Target::Buffer(Arc::clone(&buf))),
            },
            BufferHandle { buf },
        )
    }

    /// Write one diagnostic line. Never fails; a broken stderr is not a
    /// reason to lose the verification verdict.
    pub fn emit(&self, msg: &str) {
        match &*self.target {
            Target::Stderr => {
                let _ = writeln!(std::io::stderr(), "{msg}");
            }
            Target::Null => {}
            Target::Buffer(buf) => {
                if let Ok(mut guard) = buf.lock() {
                    let _ = writeln!(guard, "{msg}");
                }
            }
        }
    }
}

impl Default for DiagSink {
    fn default() -> Self {
        DiagSink::stderr()
    }
}

/// Read side of a buffered [`DiagSink`].
pub struct BufferHandle {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl BufferHandle {
    pub fn contents(&self) -> String {
        let guard = self.buf.lock().expect("diag buffer poisoned");
        String::from_utf8_lossy(&guard).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().expect("diag buffer poisoned").is_empty()
    }
}
