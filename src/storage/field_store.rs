use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Namespaced key/value persistence for form fields.
///
/// Writes never fail from the caller's point of view: implementations log
/// storage errors and carry on.
#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn get(&self, namespace: &str, field: &str) -> Option<String>;

    async fn set(&self, namespace: &str, field: &str, value: &str);
}

/// Volatile store, used in tests and when no data directory is available
#[derive(Debug, Clone, Default)]
pub struct MemoryFieldStore {
    values: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldStore for MemoryFieldStore {
    async fn get(&self, namespace: &str, field: &str) -> Option<String> {
        let values = self.values.read().await;
        values
            .get(&(namespace.to_string(), field.to_string()))
            .cloned()
    }

    async fn set(&self, namespace: &str, field: &str, value: &str) {
        let mut values = self.values.write().await;
        values.insert(
            (namespace.to_string(), field.to_string()),
            value.to_string(),
        );
    }
}
