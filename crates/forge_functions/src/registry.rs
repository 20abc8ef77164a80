//! Provider registry and call dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::aws::AwsProvider;
use crate::error::{FunctionError, FunctionResult};
use crate::k8s::K8sProvider;
use crate::output::FnOutput;
use crate::reference::FunctionReference;

/// A source of `!fn` results for one domain (e.g. `aws`).
pub trait FunctionProvider: Send + Sync {
    /// The domain prefix this provider answers for.
    fn domain(&self) -> &str;

    /// Run `module` with the given parameters.
    ///
    /// Providers validate their own module names and required parameters.
    fn call(&self, module: &str, params: &[String]) -> FunctionResult<FnOutput>;
}

/// A registry of function providers keyed by domain.
#[derive(Default)]
pub struct FunctionRegistry {
    providers: HashMap<String, Arc<dyn FunctionProvider>>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with the built-in `aws` and `k8s` providers reading the
    /// process environment.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AwsProvider::from_environment()));
        registry.register(Arc::new(K8sProvider::from_environment()));
        registry
    }

    /// Register a provider under its `domain()`, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn FunctionProvider>) {
        let domain = provider.domain().to_string();
        debug!("Registering function provider: {}", domain);
        self.providers.insert(domain, provider);
    }

    /// Get a provider by domain.
    pub fn get(&self, domain: &str) -> Option<Arc<dyn FunctionProvider>> {
        self.providers.get(domain).cloned()
    }

    /// Check if a domain is registered.
    pub fn contains(&self, domain: &str) -> bool {
        self.providers.contains_key(domain)
    }

    /// All registered domains, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        domains.sort_unstable();
        domains
    }

    /// Parse and resolve a reference such as `aws.regions(ecs)[0]`.
    pub fn call(&self, reference: &str) -> FunctionResult<Vec<String>> {
        let parsed = FunctionReference::parse(reference)?;
        self.call_reference(&parsed)
    }

    /// Resolve an already parsed reference.
    pub fn call_reference(&self, reference: &FunctionReference) -> FunctionResult<Vec<String>> {
        let provider = self
            .get(&reference.domain)
            .ok_or_else(|| FunctionError::UnknownDomain(reference.domain.clone()))?;

        debug!("Calling function {}", reference);
        let output = provider.call(&reference.module, &reference.params)?;
        output.select(&reference.selector)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("providers", &self.domains())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    impl FunctionProvider for EchoProvider {
        fn domain(&self) -> &str {
            "echo"
        }

        fn call(&self, module: &str, params: &[String]) -> FunctionResult<FnOutput> {
            match module {
                "list" => Ok(FnOutput::List(params.to_vec())),
                _ => Err(FunctionError::UnknownModule {
                    domain: "echo".into(),
                    module: module.into(),
                }),
            }
        }
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(EchoProvider));
        registry
    }

    #[test]
    fn test_dispatch_and_index() {
        let registry = registry();
        assert_eq!(registry.call("echo.list(a, b)").unwrap(), vec!["a", "b"]);
        assert_eq!(registry.call("echo.list(a, b)[1]").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_unknown_domain() {
        let err = registry().call("gcp.regions(x)").unwrap_err();
        assert!(err.to_string().contains("unknown function type"));
    }

    #[test]
    fn test_unknown_module() {
        let err = registry().call("echo.nope()").unwrap_err();
        assert!(matches!(err, FunctionError::UnknownModule { .. }));
    }

    #[test]
    fn test_defaults_registered() {
        let registry = FunctionRegistry::with_defaults();
        assert_eq!(registry.domains(), vec!["aws", "k8s"]);
        assert!(format!("{:?}", registry).contains("aws"));
    }
}
