//! Global string interning pool.
//!
//! Handles are monotonically increasing `u32` indices, stable for the
//! process lifetime and never reused, so they can be embedded in posted
//! class data as cheap stand-ins for class names.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Sentinel for "no string": never a valid pool handle.
pub const INVALID_STRING_INDEX: u32 = u32::MAX;

/// Reserved handle for `java/lang/Object`; terminates every superclass
/// walk. Guaranteed by the pool's pre-seeding.
pub const OBJECT_POOL_STRING_INDEX: u32 = 0;

struct Pool {
    strings: Vec<Arc<str>>,
    index: HashMap<Arc<str>, u32>,
}

impl Pool {
    fn seeded() -> Self {
        let mut pool = Pool {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        // Seed order is a contract: java/lang/Object must land on the
        // reserved handle.
        pool.intern(crate::consts::OBJECT_CLASS_NAME);
        pool
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        let entry: Arc<str> = Arc::from(s);
        self.strings.push(Arc::clone(&entry));
        self.index.insert(entry, idx);
        idx
    }
}

static POOL: Lazy<RwLock<Pool>> = Lazy::new(|| RwLock::new(Pool::seeded()));

/// Intern `s`, returning its stable handle. Existing strings return their
/// original handle; new strings append under the write lock.
pub fn get_or_insert(s: &str) -> u32 {
    {
        let pool = POOL.read().expect("string pool poisoned");
        if let Some(&idx) = pool.index.get(s) {
            return idx;
        }
    }
    POOL.write().expect("string pool poisoned").intern(s)
}

/// Resolve a handle back to its string.
pub fn get(index: u32) -> Option<Arc<str>> {
    let pool = POOL.read().expect("string pool poisoned");
    pool.strings.get(index as usize).cloned()
}

/// Number of interned strings.
pub fn size() -> usize {
    POOL.read().expect("string pool poisoned").strings.len()
}
