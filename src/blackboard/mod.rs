//! Typed property registry ("blackboard")
//!
//! A write-once, identity-keyed store used to pass bootstrap-computed values
//! (paths, flags, target identifiers) between independently-initialized
//! stages without a shared constructor graph. Unlike the original's global
//! statics this is an explicit context object: tests create as many
//! independent registries as they need.
//!
//! Keys are identity-unique per (name, type) pair. Requesting the same name
//! with a different type is a programming error and fails fast instead of
//! silently aliasing.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::module::traits::EngineError;

/// Typed key into a [`Blackboard`]
///
/// Compared by the identity counter assigned at first creation, not by name.
pub struct Key<T> {
    id: u64,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// The name this key was declared under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity assigned at first declaration
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

struct KeySlot {
    id: u64,
    type_id: TypeId,
    type_name: &'static str,
}

#[derive(Default)]
struct Inner {
    keys: HashMap<Arc<str>, KeySlot>,
    values: HashMap<u64, Arc<dyn Any + Send + Sync>>,
    next_id: u64,
}

/// Process-wide typed property registry
///
/// Created once at process start (or per test) and shared by `Arc`.
/// No transactional semantics: callers needing atomic read-modify-write
/// must synchronize externally.
#[derive(Default)]
pub struct Blackboard {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard").finish_non_exhaustive()
    }
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or re-fetch) the key for `name` with value type `T`
    ///
    /// Idempotent: repeated calls with the same name and type return the
    /// same identity. A redeclaration with a different type is rejected.
    pub fn key<T: Any + Send + Sync>(&self, name: &str) -> Result<Key<T>, EngineError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = inner.keys.get(name) {
            if slot.type_id != TypeId::of::<T>() {
                return Err(EngineError::Blackboard(format!(
                    "key {} already declared with type {}, requested {}",
                    name,
                    slot.type_name,
                    std::any::type_name::<T>()
                )));
            }
            let name: Arc<str> = inner
                .keys
                .get_key_value(name)
                .map(|(k, _)| Arc::clone(k))
                .unwrap_or_else(|| Arc::from(name));
            return Ok(Key {
                id: slot.id,
                name,
                _marker: PhantomData,
            });
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let name: Arc<str> = Arc::from(name);
        inner.keys.insert(
            Arc::clone(&name),
            KeySlot {
                id,
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
            },
        );
        Ok(Key {
            id,
            name,
            _marker: PhantomData,
        })
    }

    /// Read the value stored under `key`, if any
    pub fn get<T: Any + Send + Sync>(&self, key: &Key<T>) -> Option<Arc<T>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .values
            .get(&key.id)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Store a value under `key`
    ///
    /// This is a write-once store: a second `put` for the same key is
    /// rejected. Use [`Blackboard::compute_if_absent`] for the idempotent
    /// initialization path.
    pub fn put<T: Any + Send + Sync>(&self, key: &Key<T>, value: T) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.values.contains_key(&key.id) {
            return Err(EngineError::Blackboard(format!(
                "key {} already has a value",
                key.name
            )));
        }
        inner.values.insert(key.id, Arc::new(value));
        Ok(())
    }

    /// Return the stored value, computing and storing it first if absent
    ///
    /// Subsequent calls are no-ops that return the first value.
    pub fn compute_if_absent<T, F>(&self, key: &Key<T>, supplier: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inner
            .values
            .get(&key.id)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
        {
            return existing;
        }
        let value: Arc<T> = Arc::new(supplier());
        inner
            .values
            .insert(key.id, Arc::clone(&value) as Arc<dyn Any + Send + Sync>);
        value
    }
}
