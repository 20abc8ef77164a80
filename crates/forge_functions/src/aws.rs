//! `aws` function provider.
//!
//! Modules:
//! - `regions(service)`: sorted region names where the service is offered
//! - `credentials()`: the active credential set as a record

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FunctionError, FunctionResult};
use crate::output::FnOutput;
use crate::registry::FunctionProvider;

const DOMAIN: &str = "aws";

/// Commercial-partition regions.
const STANDARD_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// Services known to the offline endpoint table.
const KNOWN_SERVICES: &[&str] = &[
    "cloudformation",
    "dynamodb",
    "ec2",
    "ecr",
    "ecs",
    "eks",
    "elasticloadbalancing",
    "lambda",
    "rds",
    "s3",
    "sns",
    "sqs",
];

/// Regions a service is not offered in.
const UNAVAILABLE: &[(&str, &[&str])] = &[("eks", &["us-west-1"])];

/// Resolved AWS credentials.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AwsCredentials {
    #[serde(rename = "AccessKeyID")]
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub provider_name: String,
    pub is_available: bool,
}

/// The `aws` provider.
#[derive(Debug, Clone, Default)]
pub struct AwsProvider {
    env: HashMap<String, String>,
    credentials_file: Option<PathBuf>,
}

impl AwsProvider {
    /// Create a provider from explicit environment values and an optional
    /// shared credentials file.
    pub fn new(env: HashMap<String, String>, credentials_file: Option<PathBuf>) -> Self {
        Self {
            env,
            credentials_file,
        }
    }

    /// Create a provider from the process environment.
    pub fn from_environment() -> Self {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("AWS_"))
            .collect();
        let credentials_file = env
            .get("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")));
        Self::new(env, credentials_file)
    }

    /// Regions offering `service`, sorted.
    pub fn regions(&self, service: &str) -> FunctionResult<Vec<String>> {
        let service = service.to_lowercase();
        if !KNOWN_SERVICES.contains(&service.as_str()) {
            return Err(FunctionError::Provider {
                domain: DOMAIN.to_string(),
                message: format!("no region information for service '{}'", service),
            });
        }

        let excluded: &[&str] = UNAVAILABLE
            .iter()
            .find(|(name, _)| *name == service)
            .map(|(_, regions)| *regions)
            .unwrap_or(&[]);

        let mut regions: Vec<String> = STANDARD_REGIONS
            .iter()
            .filter(|region| !excluded.contains(*region))
            .map(|region| region.to_string())
            .collect();
        regions.sort();
        Ok(regions)
    }

    /// Look up credentials.
    ///
    /// Environment variables win over the shared credentials file. Missing
    /// credentials are a legitimate state and yield an unavailable record.
    pub fn credentials(&self) -> AwsCredentials {
        if let (Some(key), Some(secret)) = (
            self.env.get("AWS_ACCESS_KEY_ID"),
            self.env.get("AWS_SECRET_ACCESS_KEY"),
        ) {
            debug!("Using AWS credentials from environment");
            return AwsCredentials {
                access_key_id: key.clone(),
                secret_access_key: secret.clone(),
                session_token: self.env.get("AWS_SESSION_TOKEN").cloned().unwrap_or_default(),
                provider_name: "EnvProvider".to_string(),
                is_available: true,
            };
        }

        let profile = self
            .env
            .get("AWS_PROFILE")
            .map(String::as_str)
            .unwrap_or("default");

        match self.shared_credentials(profile) {
            Some(credentials) => credentials,
            None => {
                warn!("No AWS credentials found for profile '{}'", profile);
                AwsCredentials::default()
            }
        }
    }

    fn shared_credentials(&self, profile: &str) -> Option<AwsCredentials> {
        let path = self.credentials_file.as_ref()?;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Cannot read AWS credentials file {:?}: {}", path, e);
                return None;
            }
        };

        let section = parse_profile(&content, profile)?;
        let key = section.get("aws_access_key_id")?;
        let secret = section.get("aws_secret_access_key")?;
        Some(AwsCredentials {
            access_key_id: key.clone(),
            secret_access_key: secret.clone(),
            session_token: section.get("aws_session_token").cloned().unwrap_or_default(),
            provider_name: "SharedCredentialsProvider".to_string(),
            is_available: true,
        })
    }
}

impl FunctionProvider for AwsProvider {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn call(&self, module: &str, params: &[String]) -> FunctionResult<FnOutput> {
        match module.to_lowercase().as_str() {
            "regions" => {
                let service = params
                    .first()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| FunctionError::MissingParameter {
                        domain: DOMAIN.to_string(),
                        module: module.to_string(),
                        parameter: "service".to_string(),
                    })?;
                Ok(FnOutput::List(self.regions(service)?))
            }
            "credentials" => Ok(FnOutput::Record(serde_json::to_value(self.credentials())?)),
            _ => Err(FunctionError::UnknownModule {
                domain: DOMAIN.to_string(),
                module: module.to_string(),
            }),
        }
    }
}

/// Extract one `[profile]` section of an INI-style credentials file.
fn parse_profile(content: &str, profile: &str) -> Option<HashMap<String, String>> {
    let mut current: Option<&str> = None;
    let mut section: Option<HashMap<String, String>> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            current = Some(name.strip_prefix("profile ").unwrap_or(name).trim());
            if current == Some(profile) && section.is_none() {
                section = Some(HashMap::new());
            }
            continue;
        }
        if current != Some(profile) {
            continue;
        }
        if let (Some((key, value)), Some(section)) = (line.split_once('='), section.as_mut()) {
            section.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_regions_sorted_and_filtered() {
        let provider = AwsProvider::default();
        let ecs = provider.regions("ecs").unwrap();
        let mut sorted = ecs.clone();
        sorted.sort();
        assert_eq!(ecs, sorted);
        assert!(ecs.contains(&"us-west-1".to_string()));

        let eks = provider.regions("EKS").unwrap();
        assert!(!eks.contains(&"us-west-1".to_string()));
    }

    #[test]
    fn test_module_names_ignore_case() {
        let provider = AwsProvider::default();
        let output = provider.call("Regions", &["ecs".to_string()]).unwrap();
        assert_eq!(
            output.select(&crate::reference::Selector::All).unwrap(),
            provider.regions("ecs").unwrap()
        );
        assert!(provider.call("CREDENTIALS", &[]).is_ok());
    }

    #[test]
    fn test_regions_requires_service() {
        let provider = AwsProvider::default();
        let err = provider.call("regions", &[]).unwrap_err();
        assert!(matches!(err, FunctionError::MissingParameter { .. }));
        let err = provider.call("regions", &["".to_string()]).unwrap_err();
        assert!(matches!(err, FunctionError::MissingParameter { .. }));
    }

    #[test]
    fn test_credentials_from_env() {
        let provider = AwsProvider::new(
            env(&[("AWS_ACCESS_KEY_ID", "AKIA"), ("AWS_SECRET_ACCESS_KEY", "s3cr3t")]),
            None,
        );
        let creds = provider.credentials();
        assert!(creds.is_available);
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(creds.provider_name, "EnvProvider");
    }

    #[test]
    fn test_credentials_from_shared_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[default]\naws_access_key_id = DEF\naws_secret_access_key = one\n\n[profile work]\naws_access_key_id = WORK\naws_secret_access_key = two"
        )
        .unwrap();

        let provider = AwsProvider::new(
            env(&[("AWS_PROFILE", "work")]),
            Some(file.path().to_path_buf()),
        );
        let creds = provider.credentials();
        assert_eq!(creds.access_key_id, "WORK");
        assert_eq!(creds.secret_access_key, "two");
        assert_eq!(creds.provider_name, "SharedCredentialsProvider");
    }

    #[test]
    fn test_missing_credentials_are_not_an_error() {
        let provider = AwsProvider::new(HashMap::new(), Some(PathBuf::from("/nonexistent/creds")));
        let output = provider.call("credentials", &[]).unwrap();
        let available = output
            .select(&crate::reference::Selector::Attribute(vec!["IsAvailable".into()]))
            .unwrap();
        assert_eq!(available, vec!["false"]);
    }

    #[test]
    fn test_unknown_module() {
        let err = AwsProvider::default().call("buckets", &[]).unwrap_err();
        assert_eq!(err.to_string(), "buckets is not a valid aws module");
    }
}
