//! # forge_functions
//!
//! Function-call resolution for Blueprint Forge.
//!
//! Blueprint fields tagged with `!fn` hold a reference such as
//! `aws.regions(ecs)[0]` or `k8s.config().cluster.server`. This crate parses
//! those references and dispatches them to pluggable providers:
//!
//! - `aws`: region lookup and credential discovery
//! - `k8s`: kubeconfig context inspection
//!
//! ## Example
//!
//! ```rust,no_run
//! use forge_functions::FunctionRegistry;
//!
//! let registry = FunctionRegistry::with_defaults();
//! let regions = registry.call("aws.regions(ecs)").unwrap();
//! let first = registry.call("aws.regions(ecs)[0]").unwrap();
//! assert_eq!(first[0], regions[0]);
//! ```

pub mod aws;
pub mod error;
pub mod k8s;
pub mod output;
pub mod reference;
pub mod registry;

pub use aws::{AwsCredentials, AwsProvider};
pub use error::{FunctionError, FunctionResult};
pub use k8s::{K8sConfig, K8sProvider};
pub use output::FnOutput;
pub use reference::{FunctionReference, Selector};
pub use registry::{FunctionProvider, FunctionRegistry};
