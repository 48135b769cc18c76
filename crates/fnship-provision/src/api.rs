//! Provider traits the provisioner is written against.
//!
//! Each trait covers one remote service and stays close to its API surface.
//! Sequencing, naming, and retries live in the provisioner.

use std::collections::BTreeMap;

use async_trait::async_trait;
use fnship_core::FunctionRecord;

use crate::error::ProviderResult;

/// Where the function's code archive is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLocation {
    pub bucket: String,
    pub key: String,
}

/// Everything needed to create a function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    pub role_arn: String,
    pub runtime: String,
    pub handler: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub code: CodeLocation,
    pub tags: BTreeMap<String, String>,
}

/// Permission for the HTTP gateway to invoke a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeGrant {
    pub function_name: String,
    pub statement_id: String,
    pub source_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSummary {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait RoleApi: Send + Sync {
    /// Account owning the credentials in use.
    async fn account_id(&self) -> ProviderResult<String>;

    /// Create the function's execution role and return its ARN.
    async fn create_role(&self, name: &str, tags: &BTreeMap<String, String>) -> ProviderResult<String>;

    async fn delete_role(&self, name: &str) -> ProviderResult<()>;
}

#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn get_function(&self, name: &str) -> ProviderResult<Option<FunctionRecord>>;

    /// Every function in the region, with its tags.
    async fn list_functions(&self) -> ProviderResult<Vec<FunctionRecord>>;

    async fn create_function(&self, spec: &FunctionSpec) -> ProviderResult<FunctionRecord>;

    /// Point the function at a new archive and publish a version.
    async fn update_function_code(&self, name: &str, code: &CodeLocation) -> ProviderResult<FunctionRecord>;

    async fn tag_function(&self, arn: &str, tags: &BTreeMap<String, String>) -> ProviderResult<()>;

    async fn grant_invoke(&self, grant: &InvokeGrant) -> ProviderResult<()>;

    async fn delete_function(&self, name: &str) -> ProviderResult<()>;
}

#[async_trait]
pub trait GatewayApi: Send + Sync {
    /// Create a REST API and return its id.
    async fn create_api(&self, name: &str) -> ProviderResult<String>;

    /// Ids of the API's resources. A fresh API has exactly one, the root.
    async fn root_resources(&self, api_id: &str) -> ProviderResult<Vec<String>>;

    async fn create_resource(&self, api_id: &str, parent_id: &str, path_part: &str) -> ProviderResult<String>;

    /// `ANY` method with no authorization.
    async fn put_proxy_method(&self, api_id: &str, resource_id: &str) -> ProviderResult<()>;

    /// Lambda proxy integration targeting `function_arn`.
    async fn put_proxy_integration(&self, api_id: &str, resource_id: &str, function_arn: &str) -> ProviderResult<()>;

    /// Map every integration response to a 200 method response.
    async fn put_success_response(&self, api_id: &str, resource_id: &str) -> ProviderResult<()>;

    async fn deploy_stage(&self, api_id: &str, stage: &str) -> ProviderResult<()>;

    async fn list_apis(&self) -> ProviderResult<Vec<ApiSummary>>;

    async fn delete_api(&self, api_id: &str) -> ProviderResult<()>;
}

/// A provider offering every service the provisioner needs.
pub trait CloudProvider: RoleApi + FunctionApi + GatewayApi {}

impl<T: RoleApi + FunctionApi + GatewayApi> CloudProvider for T {}
