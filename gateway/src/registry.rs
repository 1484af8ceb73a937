use crate::targets::Target;
use actions_api::{ActionsApi, ApiError, ClientConfig, GithubClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("token '{0}' is not defined")]
    UnknownToken(String),
    #[error("could not create API client: {0}")]
    Client(#[from] ApiError),
}

/// Builds API clients for a bearer token.
pub trait ClientFactory: Send + Sync {
    fn create(&self, token: &str) -> Result<Arc<dyn ActionsApi>, ApiError>;
}

pub struct GithubClientFactory {
    api_url: Url,
    timeout: Duration,
}

impl GithubClientFactory {
    pub fn new(api_url: Url, timeout: Duration) -> Self {
        GithubClientFactory { api_url, timeout }
    }
}

impl ClientFactory for GithubClientFactory {
    fn create(&self, token: &str) -> Result<Arc<dyn ActionsApi>, ApiError> {
        let client = GithubClient::new(ClientConfig {
            api_url: self.api_url.clone(),
            token: Some(token.to_string()),
            timeout: self.timeout,
        })?;
        Ok(Arc::new(client))
    }
}

/// Resolves token ids to credentials and hands out one API client per
/// target, created on first use and shared afterwards.
///
/// Lookups take the read lock. The write lock is only taken to install a
/// missing client and is never held while a client is in use.
pub struct ClientRegistry {
    tokens: HashMap<String, String>,
    factory: Box<dyn ClientFactory>,
    clients: RwLock<HashMap<String, Arc<dyn ActionsApi>>>,
}

impl ClientRegistry {
    pub fn new(tokens: HashMap<String, String>, factory: Box<dyn ClientFactory>) -> Self {
        ClientRegistry {
            tokens,
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn credential(&self, token_id: &str) -> Option<&str> {
        self.tokens.get(token_id).map(String::as_str)
    }

    pub fn client_for(&self, target: &Target) -> Result<Arc<dyn ActionsApi>, RegistryError> {
        if let Some(client) = self.clients.read().get(target.name()) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write();
        // Another request may have installed the client between the two locks.
        if let Some(client) = clients.get(target.name()) {
            return Ok(client.clone());
        }

        let token = self
            .credential(target.token())
            .ok_or_else(|| RegistryError::UnknownToken(target.token().to_string()))?;
        let client = self.factory.create(token)?;
        tracing::debug!(target_name = target.name(), "created API client");

        clients.insert(target.name().to_string(), client.clone());
        Ok(client)
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // tokens are secrets
        f.debug_struct("ClientRegistry")
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .field("clients", &self.clients.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FakeApi, FakeFactory};
    use actions_api::{Repo, RunFilter};

    fn target(name: &str, token: &str) -> Target {
        Target::new(
            name,
            Repo::new("acme", "widgets"),
            "build.yml",
            RunFilter::default(),
            token,
        )
    }

    fn registry(factory: FakeFactory) -> ClientRegistry {
        ClientRegistry::new(
            HashMap::from([("main".to_string(), "ghp_main".to_string())]),
            Box::new(factory),
        )
    }

    #[test]
    fn test_client_is_created_once_per_target() {
        let factory = FakeFactory::new(Arc::new(FakeApi::default()));
        let created = factory.created.clone();
        let registry = registry(factory);

        let ci = target("ci", "main");
        let nightly = target("nightly", "main");

        registry.client_for(&ci).unwrap();
        registry.client_for(&ci).unwrap();
        assert_eq!(*created.lock(), vec!["ghp_main".to_string()]);

        registry.client_for(&nightly).unwrap();
        assert_eq!(created.lock().len(), 2);
    }

    #[test]
    fn test_concurrent_first_use() {
        let factory = FakeFactory::new(Arc::new(FakeApi::default()));
        let created = factory.created.clone();
        let registry = Arc::new(registry(factory));
        let ci = Arc::new(target("ci", "main"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let ci = ci.clone();
                std::thread::spawn(move || registry.client_for(&ci).map(|_| ()))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(created.lock().len(), 1);
    }

    #[test]
    fn test_unknown_token() {
        let registry = registry(FakeFactory::new(Arc::new(FakeApi::default())));
        assert!(matches!(
            registry.client_for(&target("ci", "missing")),
            Err(RegistryError::UnknownToken(token)) if token == "missing"
        ));
        assert_eq!(registry.credential("main"), Some("ghp_main"));
        assert!(!format!("{registry:?}").contains("ghp_main"));
    }

    #[test]
    fn test_github_factory() {
        let factory = GithubClientFactory::new(
            Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_secs(1),
        );
        assert!(factory.create("ghp_main").is_ok());
    }
}
