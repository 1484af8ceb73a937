use serde::Deserialize;
use std::fmt;

/// Owner/name coordinates of a repository.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new<O, N>(owner: O, name: N) -> Self
    where
        O: Into<String>,
        N: Into<String>,
    {
        Repo {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Constraints applied when listing the runs of a workflow.
///
/// Unset fields are left out of the query entirely rather than being sent empty.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct RunFilter {
    pub branch: Option<String>,
    pub event: Option<String>,
    pub status: Option<String>,
}

impl RunFilter {
    /// Query parameters for the configured fields, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("branch", self.branch.as_deref()),
            ("event", self.event.as_deref()),
            ("status", self.status.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRuns {
    pub workflow_runs: Vec<WorkflowRun>,
}

/// An artifact as reported by the API. Both the id and the name are optional
/// on the wire, so callers have to cope with either being absent.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Artifact {
    pub fn new<N: Into<String>>(id: u64, name: N) -> Self {
        Artifact {
            id: Some(id),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Artifacts {
    pub artifacts: Vec<Artifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_query_pairs_skip_unset_fields() {
        let filter = RunFilter {
            branch: Some("main".into()),
            event: None,
            status: Some("success".into()),
        };
        assert_eq!(
            filter.query_pairs(),
            vec![("branch", "main"), ("status", "success")]
        );
        assert!(RunFilter::default().query_pairs().is_empty());
    }

    #[test]
    fn test_artifact_with_missing_fields() {
        let artifacts: Artifacts = serde_json::from_str(
            r#"{"total_count": 2, "artifacts": [{"id": 9, "name": "build-logs"}, {"name": "no-id"}]}"#,
        )
        .unwrap();
        assert_eq!(artifacts.artifacts[0], Artifact::new(9, "build-logs"));
        assert_eq!(artifacts.artifacts[1].id, None);
    }
}
