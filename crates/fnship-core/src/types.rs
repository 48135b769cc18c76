//! Shared types describing provisioned remote state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag marking functions created by this tool.
pub const TAG_MANAGER: &str = "manager";
/// Value of [`TAG_MANAGER`] on managed functions.
pub const MANAGER_VALUE: &str = "fnship";
/// Unix time the function was provisioned.
pub const TAG_CREATED: &str = "created";
/// Deployment id of the target.
pub const TAG_ID: &str = "id";
/// Artifact key the function currently runs.
pub const TAG_ARTIFACT: &str = "artifact";

/// Remote compute function state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub arn: String,
    pub runtime: String,
    pub memory_mb: i32,
    pub role: String,
    /// Latest published version, if the provider reported one.
    pub version: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl FunctionRecord {
    /// Whether the provenance tags mark this function as ours.
    pub fn is_managed(&self) -> bool {
        self.tags.get(TAG_MANAGER).map(String::as_str) == Some(MANAGER_VALUE)
    }

    /// Current code pointer, as recorded in the artifact tag.
    pub fn artifact(&self) -> Option<&str> {
        self.tags.get(TAG_ARTIFACT).map(String::as_str)
    }
}

/// HTTP entry point created once at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBinding {
    pub api_id: String,
    pub resource_id: String,
    pub stage: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tags: &[(&str, &str)]) -> FunctionRecord {
        FunctionRecord {
            name: "api-abc".into(),
            arn: "arn:aws:lambda:eu-west-3:123:function:api-abc".into(),
            runtime: "provided.al2023".into(),
            memory_mb: 256,
            role: "arn:aws:iam::123:role/service-role/api-abc".into(),
            version: None,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_managed_tag() {
        assert!(record(&[(TAG_MANAGER, MANAGER_VALUE)]).is_managed());
        assert!(!record(&[(TAG_MANAGER, "someone-else")]).is_managed());
        assert!(!record(&[]).is_managed());
    }

    #[test]
    fn test_artifact_tag() {
        let r = record(&[(TAG_ARTIFACT, "1700-abc.zip")]);
        assert_eq!(r.artifact(), Some("1700-abc.zip"));
    }
}
