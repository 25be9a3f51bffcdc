//! Serializer registry
//!
//! Capability map from a concrete type to a custom encode/decode pair.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

/// Custom encoder/decoder for one concrete type
pub trait TypeSerializer<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// `TypeSerializer` built from a pair of closures
pub struct FnSerializer<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnSerializer<E, D> {
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<T, E, D> TypeSerializer<T> for FnSerializer<E, D>
where
    E: Fn(&T) -> Result<Vec<u8>> + Send + Sync,
    D: Fn(&[u8]) -> Result<T> + Send + Sync,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        (self.encode)(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        (self.decode)(bytes)
    }
}

struct Registration {
    type_name: &'static str,
    /// Holds an `Arc<dyn TypeSerializer<T>>` for the keyed `T`
    serializer: Arc<dyn Any + Send + Sync>,
}

/// Type-keyed serializer lookup shared by every book on a shelf
///
/// ## Concurrency:
/// - `serializers`: RwLock (lookups on every encode/decode, rare registration)
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: RwLock<HashMap<TypeId, Registration>>,
}

impl SerializerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the serializer for `T`
    ///
    /// Returns true if a previous registration was replaced.
    pub fn register<T, S>(&self, serializer: S) -> bool
    where
        T: 'static,
        S: TypeSerializer<T> + 'static,
    {
        let typed: Arc<dyn TypeSerializer<T>> = Arc::new(serializer);
        let registration = Registration {
            type_name: type_name::<T>(),
            serializer: Arc::new(typed),
        };

        let replaced = self
            .serializers
            .write()
            .insert(TypeId::of::<T>(), registration)
            .is_some();

        tracing::debug!(type_name = type_name::<T>(), replaced, "Registered serializer");
        replaced
    }

    /// Look up the serializer for `T`
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn TypeSerializer<T>>> {
        self.serializers
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|r| r.serializer.downcast_ref::<Arc<dyn TypeSerializer<T>>>())
            .cloned()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.serializers.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.serializers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all registered types, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.serializers.read().values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }
}
