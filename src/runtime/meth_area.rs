//! The method area: the process-wide, read-mostly store of published
//! class data, keyed by internal class name.
//!
//! Writers take the single write lock only for the duration of an insert
//! or rollback; readers share the read lock. Per-name load ordering is
//! cooperative: the first loader to claim a name inserts an
//! `Initializing` marker, and later callers poll until the entry reaches a
//! terminal state or the claim is rolled back.

use super::klass::{Klass, KlassStatus};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

static METH_AREA: Lazy<RwLock<HashMap<String, Arc<Klass>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Insert (or replace) the entry for `name`. Replacement is how a claimed
/// `Initializing` marker transitions to `FormatChecked`.
pub fn insert(name: &str, klass: Klass) {
    let mut area = METH_AREA.write().expect("method area poisoned");
    area.insert(name.to_string(), Arc::new(klass));
}

/// Fetch the current entry for `name`, if any.
pub fn fetch(name: &str) -> Option<Arc<Klass>> {
    let area = METH_AREA.read().expect("method area poisoned");
    area.get(name).cloned()
}

/// Remove the entry for `name`; used to roll back a failed load claim.
pub fn delete(name: &str) {
    let mut area = METH_AREA.write().expect("method area poisoned");
    area.remove(name);
}

/// Number of entries, markers included.
pub fn size() -> usize {
    METH_AREA.read().expect("method area poisoned").len()
}

/// Claim `name` for loading. Returns `true` when this caller inserted the
/// `Initializing` marker and therefore owns the load; `false` when some
/// entry (marker or published class) already exists.
pub fn claim_for_loading(name: &str, loader: &str) -> bool {
    let mut area = METH_AREA.write().expect("method area poisoned");
    if area.contains_key(name) {
        return false;
    }
    area.insert(
        name.to_string(),
        Arc::new(Klass {
            status: KlassStatus::Initializing,
            loader: loader.to_string(),
            data: None,
        }),
    );
    true
}

/// Poll until the entry for `name` reaches a terminal state, or until the
/// claim is rolled back (entry disappears). Returns the terminal entry,
/// or `None` when the load it was waiting on failed.
pub fn wait_for_terminal(name: &str) -> Option<Arc<Klass>> {
    loop {
        match fetch(name) {
            Some(entry) if entry.status.is_terminal() => return Some(entry),
            Some(_) => std::thread::yield_now(),
            None => return None,
        }
    }
}

/// Look up one method of a published class by name and descriptor.
pub fn fetch_method(
    class_name: &str,
    meth_name: &str,
    meth_desc: &str,
) -> Option<Arc<super::klass::PostedMethod>> {
    let entry = fetch(class_name)?;
    let data = entry.data.as_ref()?;
    data.method_table
        .get(&format!("{meth_name}{meth_desc}"))
        .cloned()
}
