use crate::arbiter::TargetArbiter;
use crate::config::{TargetConfig, ValidationError};
use actions_api::{Repo, RunFilter};
use std::collections::HashMap;
use std::sync::Arc;

/// A configured tenant together with its permit and run cache.
#[derive(Debug)]
pub struct Target {
    name: String,
    repo: Repo,
    workflow_file: String,
    latest_filter: RunFilter,
    token: String,
    arbiter: TargetArbiter,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        repo: Repo,
        workflow_file: impl Into<String>,
        latest_filter: RunFilter,
        token: impl Into<String>,
    ) -> Self {
        Target {
            name: name.into(),
            repo,
            workflow_file: workflow_file.into(),
            latest_filter,
            token: token.into(),
            arbiter: TargetArbiter::new(),
        }
    }

    pub fn from_config(name: &str, config: &TargetConfig) -> Result<Self, ValidationError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| ValidationError::MissingToken(name.to_string()))?;

        Ok(Target::new(
            name,
            Repo::new(&config.owner, &config.repo),
            &config.filename,
            config.latest_filter.clone().unwrap_or_default(),
            token,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn workflow_file(&self) -> &str {
        &self.workflow_file
    }

    /// Constraints for resolving `latest`. An unconfigured filter is empty.
    pub fn latest_filter(&self) -> &RunFilter {
        &self.latest_filter
    }

    /// Id of the token in the credential table.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn arbiter(&self) -> &TargetArbiter {
        &self.arbiter
    }
}

/// Name to target mapping. Built once at startup and read-only afterwards,
/// so lookups need no locking.
#[derive(Debug, Default)]
pub struct TargetStore {
    targets: HashMap<String, Arc<Target>>,
}

impl TargetStore {
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Self {
        TargetStore {
            targets: targets
                .into_iter()
                .map(|target| (target.name.clone(), Arc::new(target)))
                .collect(),
        }
    }

    pub fn from_config(config: &HashMap<String, TargetConfig>) -> Result<Self, ValidationError> {
        let targets = config
            .iter()
            .map(|(name, target)| Target::from_config(name, target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TargetStore::new(targets))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Target>> {
        self.targets.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
