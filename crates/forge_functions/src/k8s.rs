//! `k8s` function provider.
//!
//! `k8s.config([context])` reads the local kubeconfig and exposes the
//! selected context's cluster and user as a record. An absent or
//! unreadable kubeconfig is reported as `IsAvailable: false`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FunctionError, FunctionResult};
use crate::output::FnOutput;
use crate::registry::FunctionProvider;

const DOMAIN: &str = "k8s";

#[derive(Debug, Default, Deserialize)]
struct KubeConfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(rename = "current-context", default)]
    current_context: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    #[serde(default)]
    cluster: KubeCluster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeCluster {
    #[serde(default)]
    server: String,
    #[serde(default)]
    certificate_authority_data: String,
    #[serde(default, rename = "insecure-skip-tls-verify")]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    #[serde(default)]
    context: KubeContext,
}

#[derive(Debug, Default, Deserialize)]
struct KubeContext {
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: KubeUser,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeUser {
    #[serde(default)]
    client_certificate_data: String,
    #[serde(default)]
    client_key_data: String,
    #[serde(default)]
    token: String,
}

/// Cluster section of a resolved context.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterInfo {
    pub server: String,
    pub certificate_authority_data: String,
    #[serde(rename = "InsecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
}

/// Context section of a resolved context.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ContextInfo {
    pub name: String,
    pub cluster: String,
    pub namespace: String,
    pub user: String,
}

/// User section of a resolved context.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UserInfo {
    pub client_certificate_data: String,
    pub client_key_data: String,
    pub token: String,
}

/// A kubeconfig context flattened into one record.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct K8sConfig {
    pub cluster: ClusterInfo,
    pub context: ContextInfo,
    pub user: UserInfo,
    pub is_available: bool,
}

/// The `k8s` provider.
#[derive(Debug, Clone, Default)]
pub struct K8sProvider {
    kubeconfig: Option<PathBuf>,
}

impl K8sProvider {
    /// Create a provider reading the given kubeconfig file.
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }

    /// Use `KUBECONFIG` (first entry) or `~/.kube/config`.
    pub fn from_environment() -> Self {
        let from_env = std::env::var_os("KUBECONFIG")
            .and_then(|paths| std::env::split_paths(&paths).next())
            .filter(|path| !path.as_os_str().is_empty());
        let kubeconfig =
            from_env.or_else(|| dirs::home_dir().map(|home| home.join(".kube").join("config")));
        Self::new(kubeconfig)
    }

    /// Resolve `context`, or the current context when `None`.
    pub fn config(&self, context: Option<&str>) -> K8sConfig {
        let Some(path) = self.kubeconfig.as_deref() else {
            debug!("No kubeconfig location known");
            return K8sConfig::default();
        };

        match load_kubeconfig(path) {
            Ok(config) => resolve_context(&config, context).unwrap_or_else(|| {
                warn!(
                    "Kubernetes context '{}' not found in {:?}",
                    context.unwrap_or(&config.current_context),
                    path
                );
                K8sConfig::default()
            }),
            Err(e) => {
                warn!("Cannot load kubeconfig {:?}: {}", path, e);
                K8sConfig::default()
            }
        }
    }
}

impl FunctionProvider for K8sProvider {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn call(&self, module: &str, params: &[String]) -> FunctionResult<FnOutput> {
        match module.to_lowercase().as_str() {
            "config" => {
                let context = params.first().map(String::as_str).filter(|c| !c.is_empty());
                Ok(FnOutput::Record(serde_json::to_value(self.config(context))?))
            }
            _ => Err(FunctionError::UnknownModule {
                domain: DOMAIN.to_string(),
                module: module.to_string(),
            }),
        }
    }
}

fn load_kubeconfig(path: &Path) -> FunctionResult<KubeConfig> {
    debug!("Loading kubeconfig from {:?}", path);
    let content = fs::read_to_string(path).map_err(|source| FunctionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

fn resolve_context(config: &KubeConfig, requested: Option<&str>) -> Option<K8sConfig> {
    let name = requested.unwrap_or(&config.current_context);
    let context = config.contexts.iter().find(|c| c.name == name)?;
    let cluster = config
        .clusters
        .iter()
        .find(|c| c.name == context.context.cluster)
        .map(|c| &c.cluster);
    let user = config
        .users
        .iter()
        .find(|u| u.name == context.context.user)
        .map(|u| &u.user);

    let cluster = cluster
        .map(|c| ClusterInfo {
            server: c.server.clone(),
            certificate_authority_data: c.certificate_authority_data.clone(),
            insecure_skip_tls_verify: c.insecure_skip_tls_verify,
        })
        .unwrap_or_default();
    let user = user
        .map(|u| UserInfo {
            client_certificate_data: u.client_certificate_data.clone(),
            client_key_data: u.client_key_data.clone(),
            token: u.token.clone(),
        })
        .unwrap_or_default();

    let is_available = !cluster.server.is_empty()
        && (!user.client_certificate_data.is_empty() || !user.token.is_empty());

    Some(K8sConfig {
        cluster,
        context: ContextInfo {
            name: context.name.clone(),
            cluster: context.context.cluster.clone(),
            namespace: context.context.namespace.clone(),
            user: context.context.user.clone(),
        },
        user,
        is_available,
    })
}
