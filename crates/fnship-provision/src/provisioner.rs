//! Provisioner: creates, updates, and removes a deployment target.
//!
//! A target without a function goes through the full [`ProvisionStep`]
//! sequence. A target that already has one only gets its code pointer moved.
//! The HTTP route is created once and never touched again.

use std::collections::BTreeMap;
use std::time::Duration;

use fnship_core::{
    DeploymentTarget, FnshipConfig, FunctionRecord, MANAGER_VALUE, ResourceName, RouteBinding,
    TAG_ARTIFACT, TAG_CREATED, TAG_ID, TAG_MANAGER,
};
use tracing::{debug, info, warn};

use crate::api::{CloudProvider, CodeLocation, FunctionSpec, InvokeGrant};
use crate::backoff::Backoff;
use crate::error::{ProviderError, ProviderResult, ProvisionError, ProvisionResult};
use crate::machine::{ProvisionRun, ProvisionStep};

/// Knobs that shape newly provisioned resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionSettings {
    pub region: String,
    pub runtime: String,
    pub handler: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub stage: String,
    pub settle_delay: Duration,
    pub backoff: Backoff,
}

impl ProvisionSettings {
    pub fn from_config(config: &FnshipConfig) -> Self {
        Self {
            region: config.region.clone(),
            runtime: config.function.runtime.clone(),
            handler: config.function.handler.clone(),
            memory_mb: config.function.memory_mb,
            timeout_secs: config.function.timeout_secs,
            stage: config.gateway.stage.clone(),
            settle_delay: config.provision.settle_delay(),
            backoff: Backoff::from_config(&config.provision),
        }
    }
}

/// What a deploy did to the target.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployOutcome {
    /// First deployment: every resource was created.
    Provisioned {
        function: FunctionRecord,
        route: RouteBinding,
    },
    /// The function existed; only its code changed.
    Updated { function: FunctionRecord },
}

impl DeployOutcome {
    pub fn function(&self) -> &FunctionRecord {
        match self {
            Self::Provisioned { function, .. } | Self::Updated { function } => function,
        }
    }
}

/// Which parts of a target a removal actually deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub role_removed: bool,
    pub function_removed: bool,
    pub apis_removed: Vec<String>,
}

/// Public URL of a provisioned route.
pub fn invoke_url(api_id: &str, region: &str, stage: &str, path: &str) -> String {
    format!("https://{api_id}.execute-api.{region}.amazonaws.com/{stage}/{path}")
}

/// Source ARN allowed to invoke the function through the gateway.
pub fn execute_arn(region: &str, account_id: &str, api_id: &str, path: &str) -> String {
    format!("arn:aws:execute-api:{region}:{account_id}:{api_id}/*/*/{path}")
}

pub struct Provisioner<P> {
    provider: P,
    settings: ProvisionSettings,
}

impl<P: CloudProvider> Provisioner<P> {
    pub fn new(provider: P, settings: ProvisionSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    pub async fn lookup(&self, name: &ResourceName) -> ProvisionResult<Option<FunctionRecord>> {
        Ok(self.provider.get_function(name.as_str()).await?)
    }

    /// Provision the target if it has no function yet, otherwise update its code.
    pub async fn deploy(
        &self,
        target: &DeploymentTarget,
        code: &CodeLocation,
    ) -> ProvisionResult<DeployOutcome> {
        self.deploy_with_runtime(target, code, None).await
    }

    /// [`deploy`](Self::deploy) with a runtime overriding the configured one.
    ///
    /// The runtime only applies when the function is created.
    pub async fn deploy_with_runtime(
        &self,
        target: &DeploymentTarget,
        code: &CodeLocation,
        runtime: Option<&str>,
    ) -> ProvisionResult<DeployOutcome> {
        let name = target.resource_name();
        match self.lookup(&name).await? {
            None => {
                let runtime = runtime.unwrap_or(&self.settings.runtime);
                let (function, route) = self.provision(target, code, runtime).await?;
                Ok(DeployOutcome::Provisioned { function, route })
            }
            Some(existing) => {
                if let Some(runtime) = runtime.filter(|r| *r != existing.runtime) {
                    warn!(
                        function = %name,
                        requested = runtime,
                        current = %existing.runtime,
                        "runtime of an existing function is left unchanged"
                    );
                }
                debug!(function = %name, arn = %existing.arn, "function exists, updating code");
                let function = self.update_code(&name, code).await?;
                Ok(DeployOutcome::Updated { function })
            }
        }
    }

    /// Walk every provisioning step for a target that has no function yet.
    ///
    /// A failing step stops the run. Resources created by earlier steps are
    /// left in place and listed in [`ProvisionError::Interrupted`].
    pub async fn provision(
        &self,
        target: &DeploymentTarget,
        code: &CodeLocation,
        runtime: &str,
    ) -> ProvisionResult<(FunctionRecord, RouteBinding)> {
        let mut run = ProvisionRun::new(target.resource_name());
        let tags = provenance_tags(target, code);
        run.start();

        while let Some(step) = run.current_step() {
            info!(function = %run.target, step = %step, "provisioning");
            if let Err(source) = self.execute(step, &mut run, code, runtime, &tags).await {
                run.interrupt();
                warn!(
                    function = %run.target,
                    step = %step,
                    completed = run.completed.len(),
                    error = %source,
                    "provisioning interrupted"
                );
                return Err(ProvisionError::Interrupted {
                    step,
                    completed: run.completed,
                    source,
                });
            }
            run.advance();
        }

        match (run.function, run.route) {
            (Some(function), Some(route)) => {
                info!(function = %function.name, url = %route.url, "provisioned");
                Ok((function, route))
            }
            _ => Err(ProviderError::malformed(
                "provision",
                "run finished without a function and a route",
            )
            .into()),
        }
    }

    async fn execute(
        &self,
        step: ProvisionStep,
        run: &mut ProvisionRun,
        code: &CodeLocation,
        runtime: &str,
        tags: &BTreeMap<String, String>,
    ) -> ProviderResult<()> {
        let name = run.target.clone();
        match step {
            ProvisionStep::CreateRole => {
                let arn = self.provider.create_role(name.as_str(), tags).await?;
                debug!(role = %arn, "execution role created");
                run.role_arn = Some(arn);
            }
            ProvisionStep::SettleRole => {
                tokio::time::sleep(self.settings.settle_delay).await;
            }
            ProvisionStep::CreateFunction => {
                let spec = FunctionSpec {
                    name: name.to_string(),
                    role_arn: required(&run.role_arn, step)?.to_string(),
                    runtime: runtime.to_string(),
                    handler: self.settings.handler.clone(),
                    memory_mb: self.settings.memory_mb,
                    timeout_secs: self.settings.timeout_secs,
                    code: code.clone(),
                    tags: tags.clone(),
                };
                let function = self
                    .settings
                    .backoff
                    .retry("create_function", || self.provider.create_function(&spec))
                    .await?;
                run.function = Some(function);
            }
            ProvisionStep::CreateApi => {
                run.api_id = Some(self.provider.create_api(&name.api_name()).await?);
            }
            ProvisionStep::FetchRootResource => {
                let api_id = required(&run.api_id, step)?;
                let resources = self.provider.root_resources(api_id).await?;
                let [root] = resources.as_slice() else {
                    return Err(ProviderError::malformed(
                        "get_resources",
                        format!(
                            "bad api gateway construction: expected 1 resource on {api_id}, found {}",
                            resources.len()
                        ),
                    ));
                };
                run.root_id = Some(root.clone());
            }
            ProvisionStep::CreateRouteResource => {
                let api_id = required(&run.api_id, step)?;
                let root_id = required(&run.root_id, step)?;
                let resource_id = self
                    .provider
                    .create_resource(api_id, root_id, name.as_str())
                    .await?;
                run.resource_id = Some(resource_id);
            }
            ProvisionStep::AttachMethod => {
                let api_id = required(&run.api_id, step)?;
                let resource_id = required(&run.resource_id, step)?;
                self.provider.put_proxy_method(api_id, resource_id).await?;
            }
            ProvisionStep::AttachIntegration => {
                let api_id = required(&run.api_id, step)?;
                let resource_id = required(&run.resource_id, step)?;
                let function = run.function.as_ref().ok_or_else(|| missing(step))?;
                self.provider
                    .put_proxy_integration(api_id, resource_id, &function.arn)
                    .await?;
            }
            ProvisionStep::MapResponses => {
                let api_id = required(&run.api_id, step)?;
                let resource_id = required(&run.resource_id, step)?;
                self.provider.put_success_response(api_id, resource_id).await?;
            }
            ProvisionStep::DeployStage => {
                let api_id = required(&run.api_id, step)?.to_string();
                let resource_id = required(&run.resource_id, step)?.to_string();
                self.provider.deploy_stage(&api_id, &self.settings.stage).await?;
                run.route = Some(RouteBinding {
                    url: invoke_url(&api_id, &self.settings.region, &self.settings.stage, name.as_str()),
                    api_id,
                    resource_id,
                    stage: self.settings.stage.clone(),
                });
            }
            ProvisionStep::GrantInvoke => {
                let account_id = self.provider.account_id().await?;
                let api_id = required(&run.api_id, step)?;
                let grant = InvokeGrant {
                    function_name: name.to_string(),
                    statement_id: name.api_name(),
                    source_arn: execute_arn(&self.settings.region, &account_id, api_id, name.as_str()),
                };
                self.provider.grant_invoke(&grant).await?;
                run.account_id = Some(account_id);
            }
        }
        Ok(())
    }

    /// Publish new code for an existing function and record the new artifact.
    pub async fn update_code(
        &self,
        name: &ResourceName,
        code: &CodeLocation,
    ) -> ProvisionResult<FunctionRecord> {
        let mut function = match self.provider.update_function_code(name.as_str(), code).await {
            Ok(function) => function,
            Err(err) if err.is_not_found() => {
                return Err(ProvisionError::FunctionNotFound(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let tags = BTreeMap::from([(TAG_ARTIFACT.to_string(), code.key.clone())]);
        self.provider.tag_function(&function.arn, &tags).await?;
        function.tags.extend(tags);

        info!(
            function = %name,
            artifact = %code.key,
            version = function.version.as_deref().unwrap_or("-"),
            "function code updated"
        );
        Ok(function)
    }

    /// Delete the role, the function, and every API named after the target.
    ///
    /// A role or function that is already gone is skipped, so a partially
    /// removed target can be removed again.
    pub async fn remove(&self, name: &ResourceName) -> ProvisionResult<RemovalReport> {
        let mut report = RemovalReport {
            role_removed: tolerate_missing(self.provider.delete_role(name.as_str()).await)?,
            function_removed: tolerate_missing(self.provider.delete_function(name.as_str()).await)?,
            apis_removed: Vec::new(),
        };

        let api_name = name.api_name();
        for api in self.provider.list_apis().await? {
            if api.name == api_name {
                self.provider.delete_api(&api.id).await?;
                debug!(api = %api.id, "api removed");
                report.apis_removed.push(api.id);
            }
        }

        info!(
            function = %name,
            role = report.role_removed,
            function_removed = report.function_removed,
            apis = report.apis_removed.len(),
            "target removed"
        );
        Ok(report)
    }

    /// Functions sorted by name; only those this tool manages unless `all`.
    pub async fn list(&self, all: bool) -> ProvisionResult<Vec<FunctionRecord>> {
        let mut functions: Vec<FunctionRecord> = self
            .provider
            .list_functions()
            .await?
            .into_iter()
            .filter(|f| all || f.is_managed())
            .collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(functions)
    }
}

fn provenance_tags(target: &DeploymentTarget, code: &CodeLocation) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TAG_MANAGER.to_string(), MANAGER_VALUE.to_string()),
        (TAG_CREATED.to_string(), chrono::Utc::now().timestamp().to_string()),
        (TAG_ID.to_string(), target.id.clone()),
        (TAG_ARTIFACT.to_string(), code.key.clone()),
    ])
}

fn missing(step: ProvisionStep) -> ProviderError {
    ProviderError::malformed("provision", format!("{step} ran before its inputs were produced"))
}

fn required(value: &Option<String>, step: ProvisionStep) -> ProviderResult<&str> {
    value.as_deref().ok_or_else(|| missing(step))
}

fn tolerate_missing(result: ProviderResult<()>) -> ProviderResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_not_found() => {
            warn!(operation = err.operation, "already removed");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FunctionApi;
    use crate::error::ProviderErrorKind;
    use crate::memory::InMemoryProvider;

    fn settings() -> ProvisionSettings {
        let mut config = FnshipConfig::default();
        config.provision.settle_secs = 0;
        config.provision.retry_initial_ms = 0;
        config.provision.retry_max_ms = 0;
        ProvisionSettings::from_config(&config)
    }

    fn provisioner() -> Provisioner<InMemoryProvider> {
        Provisioner::new(InMemoryProvider::new(), settings())
    }

    fn target() -> DeploymentTarget {
        DeploymentTarget::new("api", "abc123").unwrap()
    }

    fn code(key: &str) -> CodeLocation {
        CodeLocation {
            bucket: "api-abc123".into(),
            key: key.into(),
        }
    }

    #[test]
    fn test_url_and_source_arn_layout() {
        assert_eq!(
            invoke_url("a1b2", "eu-west-3", "default", "api-abc123"),
            "https://a1b2.execute-api.eu-west-3.amazonaws.com/default/api-abc123"
        );
        assert_eq!(
            execute_arn("eu-west-3", "123456789012", "a1b2", "api-abc123"),
            "arn:aws:execute-api:eu-west-3:123456789012:a1b2/*/*/api-abc123"
        );
    }

    #[tokio::test]
    async fn test_first_deploy_provisions_everything() {
        let p = provisioner();
        let outcome = p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();

        let DeployOutcome::Provisioned { function, route } = outcome else {
            panic!("expected a fresh provisioning");
        };
        assert_eq!(function.name, "api-abc123");
        assert!(function.is_managed());
        assert_eq!(function.tags.get(TAG_ID).map(String::as_str), Some("abc123"));
        assert_eq!(function.artifact(), Some("1700-abc.zip"));
        assert_eq!(route.stage, "default");
        assert_eq!(
            route.url,
            format!(
                "https://{}.execute-api.eu-west-3.amazonaws.com/default/api-abc123",
                route.api_id
            )
        );

        let provider = p.provider();
        assert!(provider.role_exists("api-abc123").await);
        let apis = provider.apis().await;
        assert_eq!(apis.len(), 1);
        assert_eq!(apis[0].name, "api-abc123-API");
        assert_eq!(provider.route_paths(&route.api_id).await, vec!["api-abc123"]);
        assert_eq!(provider.stages(&route.api_id).await, vec!["default"]);

        let grants = provider.grants().await;
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].statement_id, "api-abc123-API");
        assert!(grants[0].source_arn.ends_with("/*/*/api-abc123"));
    }

    #[tokio::test]
    async fn test_runtime_override_applies_on_creation_only() {
        let p = provisioner();
        p.deploy_with_runtime(&target(), &code("1700-abc.zip"), Some("python3.12"))
            .await
            .unwrap();
        let created = p.provider().function("api-abc123").await.unwrap();
        assert_eq!(created.runtime, "python3.12");

        p.deploy_with_runtime(&target(), &code("1800-def.zip"), Some("nodejs20.x"))
            .await
            .unwrap();
        let updated = p.provider().function("api-abc123").await.unwrap();
        assert_eq!(updated.runtime, "python3.12");
    }

    #[tokio::test]
    async fn test_default_runtime_comes_from_settings() {
        let p = provisioner();
        p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();
        let created = p.provider().function("api-abc123").await.unwrap();
        assert_eq!(created.runtime, "provided.al2023");
    }

    #[tokio::test]
    async fn test_second_deploy_updates_code_only() {
        let p = provisioner();
        let first = p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();
        let calls_before = p.provider().calls().await.len();

        let second = p.deploy(&target(), &code("1800-def.zip")).await.unwrap();
        let DeployOutcome::Updated { function } = second else {
            panic!("expected an update");
        };
        assert_eq!(function.arn, first.function().arn);
        assert_eq!(function.artifact(), Some("1800-def.zip"));

        let provider = p.provider();
        assert_eq!(provider.code_of("api-abc123").await, Some(code("1800-def.zip")));
        assert_eq!(provider.apis().await.len(), 1);
        assert_eq!(provider.grants().await.len(), 1);
        let new_calls: Vec<&str> = provider.calls().await[calls_before..].to_vec();
        assert_eq!(new_calls, vec!["get_function", "update_function_code", "tag_function"]);
    }

    #[tokio::test]
    async fn test_failure_leaves_earlier_resources() {
        let p = provisioner();
        p.provider()
            .fail("create_rest_api", ProviderErrorKind::Other, 1)
            .await;

        let err = p.deploy(&target(), &code("1700-abc.zip")).await.unwrap_err();
        match &err {
            ProvisionError::Interrupted {
                step, completed, ..
            } => {
                assert_eq!(*step, ProvisionStep::CreateApi);
                assert_eq!(
                    completed,
                    &vec![
                        ProvisionStep::CreateRole,
                        ProvisionStep::SettleRole,
                        ProvisionStep::CreateFunction
                    ]
                );
            }
            other => panic!("expected interruption, got {other:?}"),
        }

        let provider = p.provider();
        assert!(provider.role_exists("api-abc123").await);
        assert!(provider.function("api-abc123").await.is_some());
        assert!(provider.apis().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_function_retries_transient_errors() {
        let p = provisioner();
        p.provider()
            .fail("create_function", ProviderErrorKind::Transient, 2)
            .await;

        p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();
        let attempts = p
            .provider()
            .calls()
            .await
            .into_iter()
            .filter(|c| *c == "create_function")
            .count();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_create_function_backoff_exhaustion() {
        let p = provisioner();
        p.provider()
            .fail("create_function", ProviderErrorKind::Transient, 10)
            .await;

        let err = p.deploy(&target(), &code("1700-abc.zip")).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Interrupted {
                step: ProvisionStep::CreateFunction,
                ..
            }
        ));
        assert_eq!(err.completed_steps().len(), 2);
        assert!(p.provider().role_exists("api-abc123").await);
    }

    #[tokio::test]
    async fn test_root_resource_must_be_unique() {
        let p = provisioner();
        p.provider().set_extra_resources_on_create(1).await;

        let err = p.deploy(&target(), &code("1700-abc.zip")).await.unwrap_err();
        match err {
            ProvisionError::Interrupted { step, source, .. } => {
                assert_eq!(step, ProvisionStep::FetchRootResource);
                assert!(source.message.contains("bad api gateway construction"));
            }
            other => panic!("expected interruption, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_unknown_function() {
        let p = provisioner();
        let name = target().resource_name();
        let err = p.update_code(&name, &code("1700-abc.zip")).await.unwrap_err();
        assert!(matches!(err, ProvisionError::FunctionNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_deletes_everything() {
        let p = provisioner();
        p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();

        let report = p.remove(&target().resource_name()).await.unwrap();
        assert!(report.role_removed);
        assert!(report.function_removed);
        assert_eq!(report.apis_removed.len(), 1);

        let provider = p.provider();
        assert!(!provider.role_exists("api-abc123").await);
        assert!(provider.function("api-abc123").await.is_none());
        assert!(provider.apis().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_half_removed_target() {
        let p = provisioner();
        p.provider()
            .fail("create_rest_api", ProviderErrorKind::Other, 1)
            .await;
        p.deploy(&target(), &code("1700-abc.zip")).await.unwrap_err();
        p.provider().delete_function("api-abc123").await.unwrap();

        let report = p.remove(&target().resource_name()).await.unwrap();
        assert!(report.role_removed);
        assert!(!report.function_removed);
        assert!(report.apis_removed.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_unmanaged() {
        let p = provisioner();
        p.deploy(&target(), &code("1700-abc.zip")).await.unwrap();
        p.provider().insert_unmanaged("legacy-handler").await;

        let managed = p.list(false).await.unwrap();
        assert_eq!(managed.len(), 1);
        assert_eq!(managed[0].name, "api-abc123");

        let all = p.list(true).await.unwrap();
        let names: Vec<&str> = all.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["api-abc123", "legacy-handler"]);
    }
}
