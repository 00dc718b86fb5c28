//! Explicit registration table mapping `(module, function)` to a handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::context::ServiceContext;
use crate::error::Result;

/// A registered service function.
pub type ServiceFn = Arc<dyn Fn(&ServiceContext, &[Value]) -> Result<Value> + Send + Sync>;

/// Outcome of [`ServiceRegistry::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The handler ran and returned this value.
    Completed(Value),
    /// No handler is registered under the requested name.
    NotRegistered,
}

impl Invocation {
    pub fn into_option(self) -> Option<Value> {
        match self {
            Invocation::Completed(value) => Some(value),
            Invocation::NotRegistered => None,
        }
    }
}

/// Populated at startup, then shared read-only.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    modules: BTreeMap<String, BTreeMap<String, ServiceFn>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as `module.function`, replacing any previous one.
    pub fn register<F>(&mut self, module: &str, function: &str, handler: F) -> &mut Self
    where
        F: Fn(&ServiceContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let previous = self
            .modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), Arc::new(handler));
        if previous.is_some() {
            tracing::warn!(module, function, "service function replaced");
        } else {
            tracing::debug!(module, function, "service function registered");
        }
        self
    }

    pub fn has(&self, module: &str, function: &str) -> bool {
        self.modules
            .get(module)
            .is_some_and(|functions| functions.contains_key(function))
    }

    /// All registered names as `module.function`, sorted.
    pub fn list(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, functions)| {
                functions
                    .keys()
                    .map(move |function| format!("{}.{}", module, function))
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    /// Call `module.function` with positional `args`.
    ///
    /// A missing module or function is logged and reported as
    /// `Invocation::NotRegistered`. Errors returned by the handler itself
    /// propagate unchanged.
    pub fn invoke(
        &self,
        module: &str,
        function: &str,
        ctx: &ServiceContext,
        args: &[Value],
    ) -> Result<Invocation> {
        let Some(handler) = self.modules.get(module).and_then(|m| m.get(function)) else {
            tracing::warn!(module, function, "service function not registered");
            return Ok(Invocation::NotRegistered);
        };
        tracing::debug!(module, function, args = args.len(), "invoking service function");
        handler(ctx, args).map(Invocation::Completed)
    }

    /// [`invoke`](Self::invoke) flattened to an option: `None` means "not implemented".
    pub fn safe_invoke(
        &self,
        module: &str,
        function: &str,
        ctx: &ServiceContext,
        args: &[Value],
    ) -> Result<Option<Value>> {
        self.invoke(module, function, ctx, args)
            .map(Invocation::into_option)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("functions", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackplaneError;
    use serde_json::json;

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry
            .register("math", "sum", |_, args| {
                Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
            })
            .register("math", "fail", |_, _| {
                Err(BackplaneError::InvalidInput("bad operand".to_string()))
            });
        registry
    }

    #[test]
    fn test_invoke_registered() {
        let result = registry()
            .invoke("math", "sum", &ServiceContext::new(), &[json!(2), json!(3)])
            .unwrap();
        assert_eq!(result, Invocation::Completed(json!(5)));
    }

    #[test]
    fn test_missing_module_or_function() {
        let registry = registry();
        let ctx = ServiceContext::new();
        assert_eq!(
            registry.safe_invoke("nonexistent.module", "fn", &ctx, &[]).unwrap(),
            None
        );
        assert_eq!(
            registry.invoke("math", "sqrt", &ctx, &[]).unwrap(),
            Invocation::NotRegistered
        );
    }

    #[test]
    fn test_handler_error_propagates() {
        let err = registry()
            .safe_invoke("math", "fail", &ServiceContext::new(), &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: bad operand");
    }

    #[test]
    fn test_introspection() {
        let registry = registry();
        assert!(registry.has("math", "sum"));
        assert!(!registry.has("math", "mul"));
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.list(), vec!["math.fail", "math.sum"]);
    }
}
