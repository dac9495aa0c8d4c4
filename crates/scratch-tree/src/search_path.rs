// search_path.rs — The process-wide package search path a workspace patches.
//
// Toolchains that use a GOPATH-style layout find sources through a list
// variable in the environment. Many of them also keep an in-process copy of
// that value (read once at startup), so a workspace has two representations
// to keep in agreement: the cached copy and the real environment variable.
//
// The `SearchPath` trait abstracts both so the workspace logic can run
// against an in-memory fake in tests instead of the real process state.

use std::collections::HashMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::WorkspaceError;

/// Variable patched when no other name is configured.
pub const DEFAULT_VARIABLE: &str = "GOPATH";

/// Platform path-list separator used to join search path entries.
#[cfg(windows)]
pub const SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const SEPARATOR: &str = ":";

/// Access to a search path variable and its in-process cached copy.
///
/// Values are `OsString`s so a variable holding arbitrary bytes is put
/// back exactly as it was found.
pub trait SearchPath {
    /// Name of the environment variable.
    fn variable(&self) -> &str;

    /// The in-process cached value.
    fn cached(&self) -> OsString;

    /// The environment variable's current value, `None` when unset.
    fn current(&self) -> Option<OsString>;

    /// Write `value` to both the cache and the environment variable.
    fn set(&self, value: &OsStr);

    /// Prepend `entry` to the search path and return the value it replaced.
    ///
    /// Fails with [`WorkspaceError::ConfigurationMismatch`] without touching
    /// anything if the cache and the environment disagree.
    fn prepend(&self, entry: &Path) -> Result<OsString, WorkspaceError> {
        check_and_prepend(self, entry)
    }
}

/// Join `entry` in front of `list` with the platform separator.
pub fn prepend_entry(entry: &OsStr, list: &OsStr) -> OsString {
    let mut joined = entry.to_os_string();
    joined.push(SEPARATOR);
    joined.push(list);
    joined
}

fn check_and_prepend<S: SearchPath + ?Sized>(
    search_path: &S,
    entry: &Path,
) -> Result<OsString, WorkspaceError> {
    let original = search_path.cached();
    let environment = search_path.current().unwrap_or_default();
    if environment != original {
        return Err(WorkspaceError::ConfigurationMismatch {
            variable: search_path.variable().to_string(),
            environment,
            cached: original,
        });
    }

    let patched = prepend_entry(entry.as_os_str(), &original);
    search_path.set(&patched);
    tracing::info!(
        variable = search_path.variable(),
        value = ?patched,
        "patched search path"
    );
    Ok(original)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Real process environment ──────────────────────────────────────

/// Cached values keyed by variable name, seeded from the environment the
/// first time a variable is looked at.
fn process_cache() -> &'static Mutex<HashMap<String, OsString>> {
    static CACHE: OnceLock<Mutex<HashMap<String, OsString>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Serialises the check-then-write sequence of [`SearchPath::prepend`]
/// across every `ProcessSearchPath` in the process.
static PATCH_LOCK: Mutex<()> = Mutex::new(());

/// The real process environment plus a process-wide cached copy.
#[derive(Debug, Clone)]
pub struct ProcessSearchPath {
    variable: String,
}

impl ProcessSearchPath {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Default for ProcessSearchPath {
    fn default() -> Self {
        Self::new(DEFAULT_VARIABLE)
    }
}

impl SearchPath for ProcessSearchPath {
    fn variable(&self) -> &str {
        &self.variable
    }

    fn cached(&self) -> OsString {
        lock(process_cache())
            .entry(self.variable.clone())
            .or_insert_with(|| env::var_os(&self.variable).unwrap_or_default())
            .clone()
    }

    fn current(&self) -> Option<OsString> {
        env::var_os(&self.variable)
    }

    fn set(&self, value: &OsStr) {
        lock(process_cache()).insert(self.variable.clone(), value.to_os_string());
        env::set_var(&self.variable, value);
    }

    fn prepend(&self, entry: &Path) -> Result<OsString, WorkspaceError> {
        let _guard = lock(&PATCH_LOCK);
        check_and_prepend(self, entry)
    }
}

// ── In-memory fake ────────────────────────────────────────────────

#[derive(Debug)]
struct MemoryState {
    cached: OsString,
    environment: Option<OsString>,
}

/// An in-memory search path. Clones share state, so a test can keep a
/// handle and inspect the value after the workspace is gone.
#[derive(Debug, Clone)]
pub struct MemorySearchPath {
    variable: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySearchPath {
    /// A consistent search path where cache and environment both hold `initial`.
    pub fn new(variable: impl Into<String>, initial: Option<&str>) -> Self {
        Self {
            variable: variable.into(),
            state: Arc::new(Mutex::new(MemoryState {
                cached: initial.unwrap_or_default().into(),
                environment: initial.map(OsString::from),
            })),
        }
    }

    /// Change only the environment side, as an outside writer would.
    pub fn set_environment(&self, value: Option<&str>) {
        lock(&self.state).environment = value.map(OsString::from);
    }

    /// Change only the cached side.
    pub fn set_cached(&self, value: &str) {
        lock(&self.state).cached = value.into();
    }
}

impl SearchPath for MemorySearchPath {
    fn variable(&self) -> &str {
        &self.variable
    }

    fn cached(&self) -> OsString {
        lock(&self.state).cached.clone()
    }

    fn current(&self) -> Option<OsString> {
        lock(&self.state).environment.clone()
    }

    fn set(&self, value: &OsStr) {
        let mut state = lock(&self.state);
        state.cached = value.to_os_string();
        state.environment = Some(value.to_os_string());
    }
}
