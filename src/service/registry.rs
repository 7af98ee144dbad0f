//! Service Registry & Dispatcher
//!
//! - `ServiceBuilder`: declares a namespace's verbs and binds its client
//! - `RegistryBuilder`: collects services, frozen by `build()`
//! - `Registry`: read-only after build, shared as `Arc<Registry>`
//!
//! Registration completes before any session can reference the registry,
//! so concurrent lookups never race a mutation.

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RunbookError};

use super::builtin;
use super::context::ActionContext;
use super::handler::{Erased, ErasedHandler, Handler};

/// Uniform dispatch result: empty `error` means success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub response: Value,
    #[serde(default)]
    pub error: String,
}

impl ServiceResponse {
    pub fn ok(response: Value) -> Self {
        Self {
            response,
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            response: Value::Null,
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

/// A namespace with its verbs and bound client
pub struct Service {
    namespace: String,
    verbs: FxHashMap<String, Arc<dyn ErasedHandler>>,
    client: Arc<dyn Any + Send + Sync>,
}

impl Service {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registered verb names, sorted
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.verbs.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("namespace", &self.namespace)
            .field("verbs", &self.verbs())
            .finish()
    }
}

pub struct ServiceBuilder {
    namespace: String,
    verbs: Vec<(String, Arc<dyn ErasedHandler>)>,
}

impl ServiceBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            verbs: Vec::new(),
        }
    }

    pub fn verb<H: Handler>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.verbs.push((name.into(), Arc::new(Erased(handler))));
        self
    }

    /// Bind the backing client; every verb must expect this client type
    pub fn bind<C: Any + Send + Sync>(self, client: C) -> Result<Service> {
        let bound = TypeId::of::<C>();
        if let Some((_, handler)) = self.verbs.iter().find(|(_, h)| h.client_type() != bound) {
            return Err(RunbookError::ClientMismatch {
                service: self.namespace,
                expected: handler.client_type_name().to_string(),
            });
        }

        Ok(Service {
            namespace: self.namespace,
            verbs: self.verbs.into_iter().collect(),
            client: Arc::new(client),
        })
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    services: Vec<Service>,
}

impl RegistryBuilder {
    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Add the built-in namespaces (nop, workflow, validator, exec, http)
    pub fn with_builtins(mut self) -> Result<Self> {
        self.services.extend(builtin::services()?);
        Ok(self)
    }

    pub fn build(self) -> Result<Arc<Registry>> {
        let mut services = FxHashMap::default();
        for service in self.services {
            if services.contains_key(&service.namespace) {
                return Err(RunbookError::DuplicateService {
                    service: service.namespace,
                });
            }
            debug!(namespace = %service.namespace, verbs = ?service.verbs(), "service registered");
            services.insert(service.namespace.clone(), service);
        }
        Ok(Arc::new(Registry { services }))
    }
}

/// Frozen map of namespaces to services
#[derive(Debug)]
pub struct Registry {
    services: FxHashMap<String, Service>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding only the built-in services
    pub fn with_builtins() -> Result<Arc<Registry>> {
        Self::builder().with_builtins()?.build()
    }

    pub fn service(&self, namespace: &str) -> Option<&Service> {
        self.services.get(namespace)
    }

    /// Resolve `namespace.verb`; `location` names the caller in error messages
    pub fn resolve(&self, id: &str, location: &str) -> Result<Resolved> {
        let (namespace, verb) = split_action_id(id)?;
        let service = self
            .services
            .get(namespace)
            .ok_or_else(|| RunbookError::UnknownService {
                service: namespace.to_string(),
            })?;
        let handler = service
            .verbs
            .get(verb)
            .ok_or_else(|| RunbookError::UnknownAction {
                service: namespace.to_string(),
                action: verb.to_string(),
                location: location.to_string(),
            })?;

        Ok(Resolved {
            id: Arc::from(id),
            handler: Arc::clone(handler),
            client: Arc::clone(&service.client),
        })
    }
}

/// `namespace.verb` split; a bare namespace is looked up as a service
fn split_action_id(id: &str) -> Result<(&str, &str)> {
    let id = id.trim();
    match id.split_once('.') {
        Some((namespace, verb)) if !namespace.is_empty() && !verb.is_empty() => {
            Ok((namespace, verb))
        }
        None if !id.is_empty() => Ok((id, "")),
        _ => Err(RunbookError::InvalidActionId { id: id.to_string() }),
    }
}

/// A resolved verb, owning what it needs to be dispatched
#[derive(Clone)]
pub struct Resolved {
    id: Arc<str>,
    handler: Arc<dyn ErasedHandler>,
    client: Arc<dyn Any + Send + Sync>,
}

impl Resolved {
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub async fn dispatch(&self, ctx: &ActionContext, request: Value) -> Result<Value> {
        self.handler.call(self.client.as_ref(), ctx, request).await
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Counter;

    #[derive(Deserialize)]
    struct AddRequest {
        by: i64,
    }

    #[async_trait]
    impl Handler for Counter {
        type Client = i64;
        type Request = AddRequest;
        type Response = Value;

        async fn handle(
            &self,
            client: &i64,
            _ctx: &ActionContext,
            request: AddRequest,
        ) -> anyhow::Result<Value> {
            Ok(json!({"total": client + request.by}))
        }
    }

    fn registry() -> Arc<Registry> {
        Registry::builder()
            .with_builtins()
            .unwrap()
            .service(ServiceBuilder::new("count").verb("add", Counter).bind(40_i64).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_bind_rejects_wrong_client() {
        let err = ServiceBuilder::new("count")
            .verb("add", Counter)
            .bind("not a number")
            .unwrap_err();
        assert!(matches!(err, RunbookError::ClientMismatch { .. }));
    }

    #[test]
    fn test_duplicate_namespace() {
        let err = Registry::builder()
            .service(ServiceBuilder::new("a").bind(()).unwrap())
            .service(ServiceBuilder::new("a").bind(()).unwrap())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "RB-024");
    }

    #[test]
    fn test_resolve_errors() {
        let registry = registry();
        let err = registry.resolve("nop.aaa", "workflow.run").unwrap_err();
        assert!(err
            .to_string()
            .contains("unknown nop.aaa service action at workflow.run"));

        let err = registry.resolve("aaa", "workflow.run").unwrap_err();
        assert!(err.to_string().contains("failed to lookup service: 'aaa'"));

        let err = registry.resolve("aaa.bbb", "workflow.run").unwrap_err();
        assert!(matches!(err, RunbookError::UnknownService { .. }));

        assert!(matches!(
            registry.resolve(".x", "t").unwrap_err(),
            RunbookError::InvalidActionId { .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_with_bound_client() {
        let registry = registry();
        let resolved = registry.resolve("count.add", "t").unwrap();
        let ctx = ActionContext::detached("count.add");
        let response = resolved.dispatch(&ctx, json!({"by": 2})).await.unwrap();
        assert_eq!(response, json!({"total": 42}));
    }

    #[tokio::test]
    async fn test_dispatch_decode_error() {
        let registry = registry();
        let resolved = registry.resolve("count.add", "t").unwrap();
        let ctx = ActionContext::detached("count.add");
        let err = resolved.dispatch(&ctx, json!({"by": "x"})).await.unwrap_err();
        assert_eq!(err.code(), "RB-031");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_builtin_namespaces() {
        let registry = Registry::with_builtins().unwrap();
        for ns in ["nop", "workflow", "validator", "exec", "http"] {
            assert!(registry.service(ns).is_some(), "missing {}", ns);
        }
        assert_eq!(
            registry.service("nop").unwrap().verbs(),
            vec!["fail", "nop", "parrot"]
        );
    }
}
