//! Compute function registry and dispatch.
//!
//! Maps a method name to a deterministic compute function. The registry is
//! assembled once through [`ComputeRegistryBuilder`], which refuses duplicate
//! names, and is immutable afterwards. Functions are opaque to the gateway:
//! they may suspend on outbound I/O, and the envelope's semantics rely on
//! them being deterministic in their inputs. The registry cannot enforce
//! that, only document it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Parameter map handed to compute functions.
pub type JsonMap = serde_json::Map<String, Value>;

/// Failure reported by a compute function itself.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while assembling the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A second implementation was registered under an existing name.
    #[error("Compute function already registered: {0}")]
    Duplicate(String),
}

/// Dispatch outcome distinct from registry assembly errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown compute function: {0}")]
    UnknownMethod(String),
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// A deterministic `params → result` producer.
#[async_trait]
pub trait ComputeFunction: Send + Sync {
    async fn call(&self, params: JsonMap) -> Result<Value, ComputeError>;
}

/// Adaptor letting plain async closures register as compute functions.
struct FnCompute<F>(F);

#[async_trait]
impl<F, Fut> ComputeFunction for FnCompute<F>
where
    F: Fn(JsonMap) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ComputeError>> + Send,
{
    async fn call(&self, params: JsonMap) -> Result<Value, ComputeError> {
        (self.0)(params).await
    }
}

/// Builds a [`ComputeRegistry`], enforcing at most one implementation per
/// name.
#[derive(Default)]
pub struct ComputeRegistryBuilder {
    functions: HashMap<String, Arc<dyn ComputeFunction>>,
}

impl ComputeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        function: impl ComputeFunction + 'static,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.functions.insert(name, Arc::new(function));
        Ok(self)
    }

    /// Registers an async closure or function pointer.
    pub fn register_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Result<Self, RegistryError>
    where
        F: Fn(JsonMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ComputeError>> + Send + 'static,
    {
        self.register(name, FnCompute(f))
    }

    pub fn build(self) -> ComputeRegistry {
        ComputeRegistry {
            functions: self.functions,
        }
    }
}

/// Read-only name → function mapping.
pub struct ComputeRegistry {
    functions: HashMap<String, Arc<dyn ComputeFunction>>,
}

impl ComputeRegistry {
    /// Registered method names, sorted for stable listing.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Runs the named function. No gateway lock is held while the function
    /// suspends.
    pub async fn dispatch(&self, name: &str, params: JsonMap) -> Result<Value, DispatchError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))?
            .clone();
        Ok(function.call(params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_registry() -> ComputeRegistry {
        ComputeRegistryBuilder::new()
            .register_fn("echo", |params| async move {
                Ok(Value::Object(params))
            })
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_runs_registered_function() {
        let registry = echo_registry();
        let mut params = JsonMap::new();
        params.insert("pair".to_string(), json!("ethereum"));
        let result = registry.dispatch("echo", params).await.unwrap();
        assert_eq!(result["pair"], "ethereum");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let registry = echo_registry();
        let err = registry.dispatch("nosuch", JsonMap::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownMethod(ref name) if name == "nosuch"));
        assert!(err.to_string().contains("Unknown compute function"));
    }

    #[tokio::test]
    async fn test_compute_failure_propagates() {
        let registry = ComputeRegistryBuilder::new()
            .register_fn("fail", |_| async {
                Err(ComputeError::new("upstream unavailable"))
            })
            .unwrap()
            .build();
        let err = registry.dispatch("fail", JsonMap::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Compute(_)));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = ComputeRegistryBuilder::new()
            .register_fn("echo", |params| async move { Ok(Value::Object(params)) })
            .unwrap()
            .register_fn("echo", |_| async { Ok(Value::Null) });
        assert!(matches!(result, Err(RegistryError::Duplicate(ref name)) if name == "echo"));
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = ComputeRegistryBuilder::new()
            .register_fn("zeta", |_| async { Ok(Value::Null) })
            .unwrap()
            .register_fn("alpha", |_| async { Ok(Value::Null) })
            .unwrap()
            .build();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
