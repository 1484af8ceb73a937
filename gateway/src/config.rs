use actions_api::{DEFAULT_API_URL, RunFilter};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variables with this prefix contribute to the token table.
/// `GITHUB_TOKEN_RELEASES=...` defines the token `releases`.
pub const ENV_TOKEN_PREFIX: &str = "GITHUB_TOKEN_";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("target '{0}' requires an API token")]
    MissingToken(String),

    #[error("token with id '{token}' of target '{target}' not found in tokens list or environment variables")]
    UnknownToken { target: String, token: String },

    #[error("target '{target}' has an empty {field}")]
    EmptyField { target: String, field: &'static str },
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for download requests
    pub listener: Listener,
    /// Optional listener serving /health and /ready
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Path prefix of every route
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Remote API settings shared by all targets
    #[serde(default)]
    pub github: GithubSettings,
    /// Token id to bearer token. Merged with `GITHUB_TOKEN_*` from the environment.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// Target name to target definition
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

fn default_base_path() -> String {
    "/".into()
}

impl Config {
    /// Adds tokens from `GITHUB_TOKEN_<ID>` variables. The id is lower-cased and
    /// environment values replace file values with the same id.
    pub fn merge_env_tokens<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(id) = key.strip_prefix(ENV_TOKEN_PREFIX) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            self.tokens.insert(id.to_lowercase(), value);
        }
    }

    /// Brings `base_path` into the form `/prefix` (or `/` when empty).
    pub fn normalize(&mut self) {
        let trimmed = self.base_path.trim().trim_matches('/');
        self.base_path = format!("/{trimmed}");
    }

    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }

        for (name, target) in &self.targets {
            target.validate(name, &self.tokens)?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GithubSettings {
    pub api_url: Url,
    /// Lifetime of a resolved run before it is fetched again
    pub cache_ttl_secs: u64,
    /// Upper bound for waiting on a busy target
    pub lock_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Permanent redirects followed while resolving a download location
    pub max_redirects: u8,
}

impl Default for GithubSettings {
    fn default() -> Self {
        GithubSettings {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API url is valid"),
            cache_ttl_secs: 300,
            lock_timeout_secs: 30,
            request_timeout_secs: 30,
            max_redirects: 3,
        }
    }
}

impl GithubSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A tenant: one repository workflow and the token used to query it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TargetConfig {
    pub token: Option<String>,
    pub owner: String,
    pub repo: String,
    /// Workflow file name, e.g. `build.yml`
    pub filename: String,
    /// Constraints applied when resolving the `latest` run
    #[serde(default)]
    pub latest_filter: Option<RunFilter>,
}

impl TargetConfig {
    fn validate(
        &self,
        name: &str,
        tokens: &HashMap<String, String>,
    ) -> Result<(), ValidationError> {
        for (field, value) in [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("filename", &self.filename),
        ] {
            if value.is_empty() {
                return Err(ValidationError::EmptyField {
                    target: name.to_string(),
                    field,
                });
            }
        }

        let token = self
            .token
            .as_ref()
            .ok_or_else(|| ValidationError::MissingToken(name.to_string()))?;

        if !tokens.contains_key(token) {
            return Err(ValidationError::UnknownToken {
                target: name.to_string(),
                token: token.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
listener:
    host: "0.0.0.0"
    port: 8080
admin_listener:
    host: "127.0.0.1"
    port: 8081
base_path: artifacts/
github:
    cache_ttl_secs: 60
tokens:
    main: ghp_file
targets:
    ci:
        token: main
        owner: acme
        repo: widgets
        filename: build.yml
        latest_filter:
            branch: main
            status: success
    nightly:
        token: nightly
        owner: acme
        repo: widgets
        filename: nightly.yml
"#;

    fn test_config() -> Config {
        serde_yaml::from_str(YAML).unwrap()
    }

    #[test]
    fn test_parse_valid_config() {
        let mut config = test_config();
        config.merge_env_tokens([("GITHUB_TOKEN_NIGHTLY".to_string(), "ghp_env".to_string())]);
        config.normalize();
        assert!(config.validate().is_ok());

        assert_eq!(config.base_path, "/artifacts");
        assert_eq!(config.github.cache_ttl(), Duration::from_secs(60));
        // unset settings keep their defaults
        assert_eq!(config.github.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.github.max_redirects, 3);
        assert_eq!(config.github.api_url.as_str(), "https://api.github.com/");

        let ci = &config.targets["ci"];
        let filter = ci.latest_filter.as_ref().unwrap();
        assert_eq!(filter.branch.as_deref(), Some("main"));
        assert_eq!(filter.event, None);
        assert_eq!(filter.status.as_deref(), Some("success"));
        assert_eq!(config.targets["nightly"].latest_filter, None);
    }

    #[test]
    fn test_env_tokens() {
        let mut config = test_config();
        config.merge_env_tokens([
            ("GITHUB_TOKEN_MAIN".to_string(), "ghp_env".to_string()),
            ("GITHUB_TOKEN_Other".to_string(), "ghp_other".to_string()),
            ("GITHUB_TOKEN_".to_string(), "ignored".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);

        // environment wins over the file
        assert_eq!(config.tokens["main"], "ghp_env");
        assert_eq!(config.tokens["other"], "ghp_other");
        assert_eq!(config.tokens.len(), 2);
    }

    #[test]
    fn test_normalize_base_path() {
        let mut config = test_config();
        for (raw, expected) in [("/", "/"), ("", "/"), ("/a/b/", "/a/b"), ("a", "/a")] {
            config.base_path = raw.into();
            config.normalize();
            assert_eq!(config.base_path, expected);
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut base_config = test_config();
        base_config.merge_env_tokens([("GITHUB_TOKEN_NIGHTLY".into(), "ghp_env".into())]);

        // Unknown token
        let config = test_config();
        assert_eq!(
            config.validate().unwrap_err(),
            ValidationError::UnknownToken {
                target: "nightly".into(),
                token: "nightly".into()
            }
        );

        // Missing token
        let mut config = base_config.clone();
        config.targets.get_mut("ci").unwrap().token = None;
        assert_eq!(
            config.validate().unwrap_err(),
            ValidationError::MissingToken("ci".into())
        );

        // Empty coordinates
        let mut config = base_config.clone();
        config.targets.get_mut("ci").unwrap().filename = String::new();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::EmptyField {
                field: "filename",
                ..
            }
        ));

        // Invalid port
        let mut config = base_config;
        config.admin_listener.as_mut().unwrap().port = 0;
        assert_eq!(config.validate().unwrap_err(), ValidationError::InvalidPort);
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid API url
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 8080}
github: {api_url: "not-a-url"}
"#
            )
            .is_err()
        );

        // Missing listener
        assert!(serde_yaml::from_str::<Config>("targets: {}").is_err());

        // Missing target coordinates
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 8080}
targets: {ci: {token: main, owner: acme}}
"#
            )
            .is_err()
        );
    }
}
