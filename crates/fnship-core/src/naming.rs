//! Deployment targets and the resource names derived from them.
//!
//! A target `{name, id}` maps to the resource name `name-id`, which is used
//! as the bucket name, the function name, the execution role name, and the
//! route path segment. It therefore has to satisfy the strictest of those
//! namespaces (S3 bucket naming).

use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{CoreError, CoreResult};

/// Length of generated deployment ids.
pub const GENERATED_ID_LEN: usize = 12;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 63;

/// A named deployment and its instance id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub name: String,
    pub id: String,
}

impl DeploymentTarget {
    /// Build a target from user input, validating the derived resource name.
    pub fn new(name: &str, id: &str) -> CoreResult<Self> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
            return Err(CoreError::InvalidId { id: id.to_string() });
        }
        let target = Self {
            name: name.to_string(),
            id: id.to_string(),
        };
        validate_resource_name(&format!("{name}-{id}"))?;
        Ok(target)
    }

    /// Build a target with a freshly generated id.
    pub fn generate(name: &str) -> CoreResult<Self> {
        Self::new(name, &random_id(GENERATED_ID_LEN))
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName(format!("{}-{}", self.name, self.id))
    }
}

/// `name-id`, shared by the bucket, the function, the role, and the route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    /// Wrap an existing provider-side name (e.g. from a function listing).
    pub fn from_existing(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name of the REST API fronting this resource.
    pub fn api_name(&self) -> String {
        format!("{}-API", self.0)
    }

    /// Split back into `(name, id)` on the last `-`.
    ///
    /// Names not created by this tool may have no `-`; they are returned
    /// whole with an empty id.
    pub fn split(&self) -> (&str, &str) {
        self.0.rsplit_once('-').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_resource_name(name: &str) -> CoreResult<()> {
    let invalid = |reason: &str| CoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(invalid("must be between 3 and 63 characters including the id"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    let first = name.as_bytes()[0];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(invalid("must start with a letter or digit"));
    }
    Ok(())
}

/// Random lowercase alphanumeric id.
pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
