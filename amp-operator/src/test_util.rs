//! In-memory cluster for tests.
//!
//! [`MemoryClient`] keeps objects as JSON, keyed by [`ObjectKey`], and records
//! every call so tests can assert on what was read and written.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::{Client, ManagedResource, ObjectKey};
use crate::error::ClientError;

/// Client operation, for call records and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
}

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub key: ObjectKey,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    calls: Vec<Call>,
    failures: HashMap<(Op, ObjectKey), String>,
    resource_version: u64,
}

impl State {
    fn record(&mut self, op: Op, key: &ObjectKey) -> Result<(), ClientError> {
        self.calls.push(Call {
            op,
            key: key.clone(),
        });
        match self.failures.get(&(op, key.clone())) {
            Some(message) => Err(ClientError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn stamp(&mut self, value: &mut Value) {
        self.resource_version += 1;
        if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(
                "resourceVersion".to_string(),
                Value::String(self.resource_version.to_string()),
            );
        }
    }
}

/// In-memory [`Client`] with call records and failure injection.
#[derive(Default)]
pub struct MemoryClient {
    state: Mutex<State>,
}

fn key_of<K: ManagedResource>(obj: &K) -> Result<ObjectKey, ClientError> {
    ObjectKey::of(obj).map_err(|e| ClientError::Api(e.to_string()))
}

fn resource_version(value: &Value) -> Option<&str> {
    value.pointer("/metadata/resourceVersion").and_then(Value::as_str)
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object as if someone else had created it. Not recorded as a call.
    pub fn insert<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        state.stamp(&mut value);
        state.objects.insert(key, value);
        Ok(())
    }

    /// Current stored version of an object.
    pub fn object<K: ManagedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = ObjectKey::for_kind::<K>(namespace, name);
        self.lock()
            .objects
            .get(&key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.lock().objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every `op` on `key` fail with an API error.
    pub fn fail(&self, op: Op, key: ObjectKey, message: &str) {
        self.lock().failures.insert((op, key), message.to_string());
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Create and update calls, in order.
    pub fn writes(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op != Op::Get)
            .cloned()
            .collect()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    fn get_sync<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, ClientError> {
        let key = ObjectKey::for_kind::<K>(namespace, name);
        let mut state = self.lock();
        state.record(Op::Get, &key)?;
        match state.objects.get(&key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn create_sync<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        state.record(Op::Create, &key)?;
        if state.objects.contains_key(&key) {
            return Err(ClientError::Conflict(format!("{key} already exists")));
        }
        state.stamp(&mut value);
        state.objects.insert(key, value);
        Ok(())
    }

    fn update_sync<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        let key = key_of(obj)?;
        let mut value = serde_json::to_value(obj)?;
        let mut state = self.lock();
        state.record(Op::Update, &key)?;
        let Some(stored) = state.objects.get(&key) else {
            return Err(ClientError::Api(format!("{key} not found")));
        };
        if let (Some(ours), Some(theirs)) = (resource_version(&value), resource_version(stored)) {
            if ours != theirs {
                return Err(ClientError::Conflict(format!(
                    "{key} has resourceVersion {theirs}, update is based on {ours}"
                )));
            }
        }
        state.stamp(&mut value);
        state.objects.insert(key, value);
        Ok(())
    }
}

#[async_trait]
impl Client for MemoryClient {
    async fn get<K: ManagedResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, ClientError> {
        self.get_sync(namespace, name)
    }

    async fn create<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        self.create_sync(obj)
    }

    async fn update<K: ManagedResource>(&self, obj: &K) -> Result<(), ClientError> {
        self.update_sync(obj)
    }
}
