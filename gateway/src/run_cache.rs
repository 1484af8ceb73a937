use actions_api::Artifact;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A resolved run and the artifacts it produced, as of `fetched_at`.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedRun {
    pub run_id: u64,
    /// Artifacts in the order the API returned them.
    pub artifacts: Vec<Artifact>,
    pub fetched_at: Instant,
}

impl CachedRun {
    pub fn new(run_id: u64, artifacts: Vec<Artifact>) -> Self {
        CachedRun {
            run_id,
            artifacts,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }

    /// Returns the id of the first artifact called `name`.
    ///
    /// Duplicate names resolve to the earliest entry in upstream order. If that
    /// entry carries no id the lookup fails; later duplicates are not consulted.
    pub fn find_artifact(&self, name: &str) -> Option<u64> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.name.as_deref() == Some(name))
            .and_then(|artifact| artifact.id)
    }
}

/// Per-target map from run key (`latest` or a run id as requested) to the
/// last resolution for that key.
///
/// Entries are never evicted. Staleness is evaluated on lookup and a stale
/// entry stays in place until the next successful resolution overwrites it.
#[derive(Debug, Default)]
pub struct RunCache {
    runs: HashMap<String, Arc<CachedRun>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `run_key` if it is no older than `ttl`.
    pub fn get_fresh(&self, run_key: &str, ttl: Duration) -> Option<Arc<CachedRun>> {
        self.runs
            .get(run_key)
            .filter(|run| run.is_fresh(ttl))
            .cloned()
    }

    /// Returns the entry for `run_key` regardless of its age.
    pub fn get(&self, run_key: &str) -> Option<Arc<CachedRun>> {
        self.runs.get(run_key).cloned()
    }

    pub fn insert(&mut self, run_key: &str, run: CachedRun) -> Arc<CachedRun> {
        let run = Arc::new(run);
        self.runs.insert(run_key.to_string(), run.clone());
        run
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
