//! Kind-keyed loader dispatch with supertype fallback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{MapError, MapResult};
use crate::value::{Value, ValueKind};

/// A coercion routine turning one raw value shape into an attribute's
/// canonical shape.
pub type Loader = Arc<dyn Fn(Value) -> MapResult<Value> + Send + Sync>;

/// Per-attribute-type registry mapping a value's runtime kind to its loader.
///
/// Lookup on an unregistered kind walks the kind's supertype chain; the
/// resolution is memoized under the original kind so later loads are a
/// single map hit. The memo table is owned by this dispatch alone and
/// write-once per key; explicit re-registration is the only thing that
/// clears it.
pub struct LoaderDispatch {
    registered: HashMap<ValueKind, Loader>,
    memo: Mutex<HashMap<ValueKind, Loader>>,
}

impl LoaderDispatch {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Register a loader for a kind. Re-registering drops every memoized
    /// resolution in this table (and only this table), so stale fallbacks
    /// cannot survive a specialization.
    pub fn register<F>(&mut self, kind: ValueKind, loader: F)
    where
        F: Fn(Value) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.registered.insert(kind, Arc::new(loader));
        self.memo.lock().unwrap().clear();
    }

    /// Coerce `value` through the loader for its kind, falling back along
    /// the supertype chain.
    ///
    /// A failed lookup is [`MapError::NoLoader`]; a loader's own failure
    /// (e.g. a malformed numeric string) propagates unchanged.
    pub fn load(&self, value: Value) -> MapResult<Value> {
        let kind = value.kind();
        if let Some(loader) = self.registered.get(&kind) {
            return loader(value);
        }
        let memoized = self.memo.lock().unwrap().get(&kind).cloned();
        if let Some(loader) = memoized {
            return loader(value);
        }
        for ancestor in kind.ancestry().skip(1) {
            if let Some(loader) = self.registered.get(&ancestor) {
                let loader = loader.clone();
                self.memo
                    .lock()
                    .unwrap()
                    .entry(kind)
                    .or_insert_with(|| loader.clone());
                return loader(value);
            }
        }
        Err(MapError::NoLoader { kind: kind.name() })
    }

    /// Whether a load of this kind would resolve, via exact registration or
    /// the supertype chain.
    pub fn resolves(&self, kind: ValueKind) -> bool {
        kind.ancestry().any(|k| self.registered.contains_key(&k))
    }

    /// Whether a fallback resolution for `kind` has already been memoized.
    pub(crate) fn memoized(&self, kind: ValueKind) -> bool {
        self.memo.lock().unwrap().contains_key(&kind)
    }
}

impl Default for LoaderDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoaderDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&'static str> = self.registered.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("LoaderDispatch")
            .field("registered", &kinds)
            .finish()
    }
}
