//! In-memory cloud provider.
//!
//! Keeps roles, functions, and REST APIs in process memory with the same
//! not-found and conflict behavior as the real services. Every call is
//! recorded, and failures can be injected per operation.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use fnship_core::FunctionRecord;
use tokio::sync::Mutex;

use crate::api::{ApiSummary, CodeLocation, FunctionApi, FunctionSpec, GatewayApi, InvokeGrant, RoleApi};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};

pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";
pub const DEFAULT_REGION: &str = "eu-west-3";

#[derive(Debug, Default)]
struct MemoryApi {
    name: String,
    /// `(resource id, path part)`; the root has an empty path part.
    resources: Vec<(String, String)>,
    methods: BTreeSet<String>,
    integrations: BTreeMap<String, String>,
    responses: BTreeSet<String>,
    stages: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    roles: BTreeMap<String, String>,
    functions: BTreeMap<String, FunctionRecord>,
    code: BTreeMap<String, CodeLocation>,
    grants: Vec<InvokeGrant>,
    apis: BTreeMap<String, MemoryApi>,
    next_id: u64,
    extra_resources: usize,
    calls: Vec<&'static str>,
    failures: BTreeMap<&'static str, (ProviderErrorKind, u32)>,
}

impl State {
    /// Record a call and return an injected failure, if one is pending.
    fn enter(&mut self, operation: &'static str) -> ProviderResult<()> {
        self.calls.push(operation);
        if let Some((kind, remaining)) = self.failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::new(operation, *kind, "injected failure"));
            }
        }
        Ok(())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:06}", self.next_id)
    }
}

#[derive(Debug)]
pub struct InMemoryProvider {
    region: String,
    account_id: String,
    state: Mutex<State>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::with_account(DEFAULT_REGION, DEFAULT_ACCOUNT_ID)
    }

    pub fn with_account(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Make the next `times` calls to `operation` fail with `kind`.
    pub async fn fail(&self, operation: &'static str, kind: ProviderErrorKind, times: u32) {
        self.state.lock().await.failures.insert(operation, (kind, times));
    }

    /// Give every API created from now on `count` extra resources next to the root.
    pub async fn set_extra_resources_on_create(&self, count: usize) {
        self.state.lock().await.extra_resources = count;
    }

    /// Add a function that carries no management tags.
    pub async fn insert_unmanaged(&self, name: &str) {
        let record = FunctionRecord {
            name: name.to_string(),
            arn: self.function_arn(name),
            runtime: "python3.12".to_string(),
            memory_mb: 128,
            role: self.role_arn(name),
            version: None,
            tags: BTreeMap::new(),
        };
        self.state.lock().await.functions.insert(name.to_string(), record);
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    pub async fn role_exists(&self, name: &str) -> bool {
        self.state.lock().await.roles.contains_key(name)
    }

    pub async fn function(&self, name: &str) -> Option<FunctionRecord> {
        self.state.lock().await.functions.get(name).cloned()
    }

    pub async fn code_of(&self, name: &str) -> Option<CodeLocation> {
        self.state.lock().await.code.get(name).cloned()
    }

    pub async fn grants(&self) -> Vec<InvokeGrant> {
        self.state.lock().await.grants.clone()
    }

    pub async fn apis(&self) -> Vec<ApiSummary> {
        self.state
            .lock()
            .await
            .apis
            .iter()
            .map(|(id, api)| ApiSummary {
                id: id.clone(),
                name: api.name.clone(),
            })
            .collect()
    }

    /// Non-root path parts of an API.
    pub async fn route_paths(&self, api_id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .apis
            .get(api_id)
            .map(|api| {
                api.resources
                    .iter()
                    .filter(|(_, path)| !path.is_empty())
                    .map(|(_, path)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn stages(&self, api_id: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .apis
            .get(api_id)
            .map(|api| api.stages.clone())
            .unwrap_or_default()
    }

    fn role_arn(&self, name: &str) -> String {
        format!("arn:aws:iam::{}:role/service-role/{name}", self.account_id)
    }

    fn function_arn(&self, name: &str) -> String {
        format!("arn:aws:lambda:{}:{}:function:{name}", self.region, self.account_id)
    }
}

fn api_mut<'a>(
    state: &'a mut State,
    operation: &'static str,
    api_id: &str,
) -> ProviderResult<&'a mut MemoryApi> {
    state
        .apis
        .get_mut(api_id)
        .ok_or_else(|| ProviderError::not_found(operation, format!("no rest api {api_id}")))
}

fn require_resource(api: &MemoryApi, operation: &'static str, resource_id: &str) -> ProviderResult<()> {
    if api.resources.iter().any(|(id, _)| id == resource_id) {
        Ok(())
    } else {
        Err(ProviderError::not_found(operation, format!("no resource {resource_id}")))
    }
}

#[async_trait]
impl RoleApi for InMemoryProvider {
    async fn account_id(&self) -> ProviderResult<String> {
        self.state.lock().await.enter("get_caller_identity")?;
        Ok(self.account_id.clone())
    }

    async fn create_role(&self, name: &str, _tags: &BTreeMap<String, String>) -> ProviderResult<String> {
        let mut state = self.state.lock().await;
        state.enter("create_role")?;
        if state.roles.contains_key(name) {
            return Err(ProviderError::other("create_role", format!("role {name} already exists")));
        }
        let arn = self.role_arn(name);
        state.roles.insert(name.to_string(), arn.clone());
        Ok(arn)
    }

    async fn delete_role(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("delete_role")?;
        state
            .roles
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found("delete_role", format!("no role {name}")))
    }
}

#[async_trait]
impl FunctionApi for InMemoryProvider {
    async fn get_function(&self, name: &str) -> ProviderResult<Option<FunctionRecord>> {
        let mut state = self.state.lock().await;
        state.enter("get_function")?;
        Ok(state.functions.get(name).cloned())
    }

    async fn list_functions(&self) -> ProviderResult<Vec<FunctionRecord>> {
        let mut state = self.state.lock().await;
        state.enter("list_functions")?;
        Ok(state.functions.values().cloned().collect())
    }

    async fn create_function(&self, spec: &FunctionSpec) -> ProviderResult<FunctionRecord> {
        let mut state = self.state.lock().await;
        state.enter("create_function")?;
        if state.functions.contains_key(&spec.name) {
            return Err(ProviderError::other(
                "create_function",
                format!("function {} already exists", spec.name),
            ));
        }
        if !state.roles.values().any(|arn| *arn == spec.role_arn) {
            return Err(ProviderError::other(
                "create_function",
                format!("role {} cannot be assumed", spec.role_arn),
            ));
        }
        let record = FunctionRecord {
            name: spec.name.clone(),
            arn: self.function_arn(&spec.name),
            runtime: spec.runtime.clone(),
            memory_mb: spec.memory_mb,
            role: spec.role_arn.clone(),
            version: Some("1".to_string()),
            tags: spec.tags.clone(),
        };
        state.functions.insert(spec.name.clone(), record.clone());
        state.code.insert(spec.name.clone(), spec.code.clone());
        Ok(record)
    }

    async fn update_function_code(&self, name: &str, code: &CodeLocation) -> ProviderResult<FunctionRecord> {
        let mut state = self.state.lock().await;
        state.enter("update_function_code")?;
        let record = state.functions.get_mut(name).ok_or_else(|| {
            ProviderError::not_found("update_function_code", format!("no function {name}"))
        })?;
        let next = record
            .version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        record.version = Some(next.to_string());
        let record = record.clone();
        state.code.insert(name.to_string(), code.clone());
        Ok(record)
    }

    async fn tag_function(&self, arn: &str, tags: &BTreeMap<String, String>) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("tag_function")?;
        let record = state
            .functions
            .values_mut()
            .find(|f| f.arn == arn)
            .ok_or_else(|| ProviderError::not_found("tag_function", format!("no function {arn}")))?;
        record.tags.extend(tags.clone());
        Ok(())
    }

    async fn grant_invoke(&self, grant: &InvokeGrant) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("add_permission")?;
        if !state.functions.contains_key(&grant.function_name) {
            return Err(ProviderError::not_found(
                "add_permission",
                format!("no function {}", grant.function_name),
            ));
        }
        state.grants.push(grant.clone());
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("delete_function")?;
        if state.functions.remove(name).is_none() {
            return Err(ProviderError::not_found("delete_function", format!("no function {name}")));
        }
        state.code.remove(name);
        state.grants.retain(|g| g.function_name != name);
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for InMemoryProvider {
    async fn create_api(&self, name: &str) -> ProviderResult<String> {
        let mut state = self.state.lock().await;
        state.enter("create_rest_api")?;
        let api_id = state.next_id("api");
        let mut resources = vec![(state.next_id("res"), String::new())];
        for i in 0..state.extra_resources {
            resources.push((state.next_id("res"), format!("extra{i}")));
        }
        state.apis.insert(
            api_id.clone(),
            MemoryApi {
                name: name.to_string(),
                resources,
                ..MemoryApi::default()
            },
        );
        Ok(api_id)
    }

    async fn root_resources(&self, api_id: &str) -> ProviderResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.enter("get_resources")?;
        let api = api_mut(&mut state, "get_resources", api_id)?;
        Ok(api.resources.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn create_resource(&self, api_id: &str, parent_id: &str, path_part: &str) -> ProviderResult<String> {
        let mut state = self.state.lock().await;
        state.enter("create_resource")?;
        let resource_id = state.next_id("res");
        let api = api_mut(&mut state, "create_resource", api_id)?;
        require_resource(api, "create_resource", parent_id)?;
        api.resources.push((resource_id.clone(), path_part.to_string()));
        Ok(resource_id)
    }

    async fn put_proxy_method(&self, api_id: &str, resource_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("put_method")?;
        let api = api_mut(&mut state, "put_method", api_id)?;
        require_resource(api, "put_method", resource_id)?;
        api.methods.insert(resource_id.to_string());
        Ok(())
    }

    async fn put_proxy_integration(&self, api_id: &str, resource_id: &str, function_arn: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("put_integration")?;
        let api = api_mut(&mut state, "put_integration", api_id)?;
        if !api.methods.contains(resource_id) {
            return Err(ProviderError::not_found(
                "put_integration",
                format!("no method on resource {resource_id}"),
            ));
        }
        api.integrations.insert(resource_id.to_string(), function_arn.to_string());
        Ok(())
    }

    async fn put_success_response(&self, api_id: &str, resource_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("put_integration_response")?;
        let api = api_mut(&mut state, "put_integration_response", api_id)?;
        if !api.integrations.contains_key(resource_id) {
            return Err(ProviderError::not_found(
                "put_integration_response",
                format!("no integration on resource {resource_id}"),
            ));
        }
        api.responses.insert(resource_id.to_string());
        Ok(())
    }

    async fn deploy_stage(&self, api_id: &str, stage: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("create_deployment")?;
        let api = api_mut(&mut state, "create_deployment", api_id)?;
        api.stages.push(stage.to_string());
        Ok(())
    }

    async fn list_apis(&self) -> ProviderResult<Vec<ApiSummary>> {
        self.state.lock().await.enter("get_rest_apis")?;
        Ok(self.apis().await)
    }

    async fn delete_api(&self, api_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state.enter("delete_rest_api")?;
        state
            .apis
            .remove(api_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found("delete_rest_api", format!("no rest api {api_id}")))
    }
}
