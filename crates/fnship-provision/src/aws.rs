//! AWS provider: IAM roles, Lambda functions, and API Gateway REST APIs.
//!
//! SDK errors are classified into [`ProviderErrorKind`] here so the
//! provisioner never has to look at service-specific error types.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_apigateway::types::{ApiKeySourceType, EndpointConfiguration, EndpointType, IntegrationType};
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::{FunctionCode, Runtime};
use fnship_core::FunctionRecord;
use serde_json::json;
use tracing::debug;

use crate::api::{ApiSummary, CodeLocation, FunctionApi, FunctionSpec, GatewayApi, InvokeGrant, RoleApi};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};

const ROLE_PATH: &str = "/service-role/";
const ROLE_MAX_SESSION_SECS: i32 = 3600;
const PROXY_METHOD: &str = "ANY";
const INTEGRATION_TIMEOUT_MS: i32 = 29_000;
const GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

#[derive(Debug, Clone)]
pub struct AwsProvider {
    iam: aws_sdk_iam::Client,
    lambda: aws_sdk_lambda::Client,
    gateway: aws_sdk_apigateway::Client,
    sts: aws_sdk_sts::Client,
    region: String,
}

impl AwsProvider {
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self {
            iam: aws_sdk_iam::Client::new(config),
            lambda: aws_sdk_lambda::Client::new(config),
            gateway: aws_sdk_apigateway::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
            region: config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| fnship_core::config::DEFAULT_REGION.to_string()),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn integration_uri(&self, function_arn: &str) -> String {
        format!(
            "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{function_arn}/invocations",
            self.region
        )
    }

    async fn function_tags(&self, arn: &str) -> ProviderResult<BTreeMap<String, String>> {
        let output = self
            .lambda
            .list_tags()
            .resource(arn)
            .send()
            .await
            .map_err(|e| sdk_error("list_tags", ProviderErrorKind::Other, e))?;
        Ok(output
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

/// Wrap an SDK error with its full display context.
fn sdk_error<E>(operation: &'static str, kind: ProviderErrorKind, err: E) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ProviderError::new(operation, kind, DisplayErrorContext(&err).to_string()).with_source(err)
}

fn hash_tags(tags: &BTreeMap<String, String>) -> HashMap<String, String> {
    tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn assume_role_policy() -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {
                "Service": [
                    "apigateway.amazonaws.com",
                    "logs.amazonaws.com",
                    "lambda.amazonaws.com"
                ]
            },
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

/// Build a [`FunctionRecord`] from any Lambda output carrying a function configuration.
macro_rules! function_record {
    ($config:expr, $tags:expr) => {{
        let config = $config;
        FunctionRecord {
            name: config.function_name().unwrap_or_default().to_string(),
            arn: config.function_arn().unwrap_or_default().to_string(),
            runtime: config
                .runtime()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            memory_mb: config.memory_size().unwrap_or_default(),
            role: config.role().unwrap_or_default().to_string(),
            version: config.version().map(str::to_string),
            tags: $tags,
        }
    }};
}

#[async_trait]
impl RoleApi for AwsProvider {
    async fn account_id(&self) -> ProviderResult<String> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("get_caller_identity", ProviderErrorKind::Other, e))?;
        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::malformed("get_caller_identity", "no account in caller identity"))
    }

    async fn create_role(&self, name: &str, tags: &BTreeMap<String, String>) -> ProviderResult<String> {
        let tags = tags
            .iter()
            .map(|(k, v)| aws_sdk_iam::types::Tag::builder().key(k).value(v).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sdk_error("create_role", ProviderErrorKind::Malformed, e))?;

        let output = self
            .iam
            .create_role()
            .role_name(name)
            .path(ROLE_PATH)
            .max_session_duration(ROLE_MAX_SESSION_SECS)
            .assume_role_policy_document(assume_role_policy())
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| sdk_error("create_role", ProviderErrorKind::Other, e))?;

        let arn = output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| ProviderError::malformed("create_role", "no role in response"))?;
        debug!(role = %name, %arn, "iam role created");
        Ok(arn)
    }

    async fn delete_role(&self, name: &str) -> ProviderResult<()> {
        match self.iam.delete_role().role_name(name).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let kind = if err.as_service_error().is_some_and(|e| e.is_no_such_entity_exception()) {
                    ProviderErrorKind::NotFound
                } else {
                    ProviderErrorKind::Other
                };
                Err(sdk_error("delete_role", kind, err))
            }
        }
    }
}

#[async_trait]
impl FunctionApi for AwsProvider {
    async fn get_function(&self, name: &str) -> ProviderResult<Option<FunctionRecord>> {
        let output = match self.lambda.get_function().function_name(name).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_resource_not_found_exception()) => {
                return Ok(None);
            }
            Err(err) => return Err(sdk_error("get_function", ProviderErrorKind::Other, err)),
        };
        let tags = output
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Ok(output.configuration().map(|config| function_record!(config, tags)))
    }

    async fn list_functions(&self) -> ProviderResult<Vec<FunctionRecord>> {
        let mut pages = self.lambda.list_functions().into_paginator().send();
        let mut records = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("list_functions", ProviderErrorKind::Other, e))?;
            for config in page.functions() {
                let tags = match config.function_arn() {
                    Some(arn) => self.function_tags(arn).await?,
                    None => BTreeMap::new(),
                };
                records.push(function_record!(config, tags));
            }
        }
        Ok(records)
    }

    async fn create_function(&self, spec: &FunctionSpec) -> ProviderResult<FunctionRecord> {
        let code = FunctionCode::builder()
            .s3_bucket(&spec.code.bucket)
            .s3_key(&spec.code.key)
            .build();

        let output = self
            .lambda
            .create_function()
            .function_name(&spec.name)
            .role(&spec.role_arn)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .memory_size(spec.memory_mb)
            .timeout(spec.timeout_secs)
            .publish(true)
            .code(code)
            .set_tags(Some(hash_tags(&spec.tags)))
            .send()
            .await
            .map_err(|err| {
                let kind = match err.as_service_error() {
                    Some(e)
                        if e.is_invalid_parameter_value_exception()
                            || e.is_too_many_requests_exception()
                            || e.is_resource_conflict_exception() =>
                    {
                        ProviderErrorKind::Transient
                    }
                    _ => ProviderErrorKind::Other,
                };
                sdk_error("create_function", kind, err)
            })?;

        Ok(function_record!(&output, spec.tags.clone()))
    }

    async fn update_function_code(&self, name: &str, code: &CodeLocation) -> ProviderResult<FunctionRecord> {
        let output = self
            .lambda
            .update_function_code()
            .function_name(name)
            .s3_bucket(&code.bucket)
            .s3_key(&code.key)
            .publish(true)
            .send()
            .await
            .map_err(|err| {
                let kind = if err.as_service_error().is_some_and(|e| e.is_resource_not_found_exception()) {
                    ProviderErrorKind::NotFound
                } else {
                    ProviderErrorKind::Other
                };
                sdk_error("update_function_code", kind, err)
            })?;

        let tags = match output.function_arn() {
            Some(arn) => self.function_tags(arn).await?,
            None => BTreeMap::new(),
        };
        Ok(function_record!(&output, tags))
    }

    async fn tag_function(&self, arn: &str, tags: &BTreeMap<String, String>) -> ProviderResult<()> {
        self.lambda
            .tag_resource()
            .resource(arn)
            .set_tags(Some(hash_tags(tags)))
            .send()
            .await
            .map_err(|e| sdk_error("tag_resource", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn grant_invoke(&self, grant: &InvokeGrant) -> ProviderResult<()> {
        self.lambda
            .add_permission()
            .function_name(&grant.function_name)
            .statement_id(&grant.statement_id)
            .action("lambda:InvokeFunction")
            .principal(GATEWAY_PRINCIPAL)
            .source_arn(&grant.source_arn)
            .send()
            .await
            .map_err(|e| sdk_error("add_permission", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> ProviderResult<()> {
        match self.lambda.delete_function().function_name(name).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let kind = if err.as_service_error().is_some_and(|e| e.is_resource_not_found_exception()) {
                    ProviderErrorKind::NotFound
                } else {
                    ProviderErrorKind::Other
                };
                Err(sdk_error("delete_function", kind, err))
            }
        }
    }
}

#[async_trait]
impl GatewayApi for AwsProvider {
    async fn create_api(&self, name: &str) -> ProviderResult<String> {
        let output = self
            .gateway
            .create_rest_api()
            .name(name)
            .api_key_source(ApiKeySourceType::Header)
            .binary_media_types("*/*")
            .endpoint_configuration(EndpointConfiguration::builder().types(EndpointType::Regional).build())
            .send()
            .await
            .map_err(|e| sdk_error("create_rest_api", ProviderErrorKind::Other, e))?;
        output
            .id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::malformed("create_rest_api", "no id in response"))
    }

    async fn root_resources(&self, api_id: &str) -> ProviderResult<Vec<String>> {
        let output = self
            .gateway
            .get_resources()
            .rest_api_id(api_id)
            .send()
            .await
            .map_err(|e| sdk_error("get_resources", ProviderErrorKind::Other, e))?;
        Ok(output
            .items()
            .iter()
            .filter_map(|r| r.id().map(str::to_string))
            .collect())
    }

    async fn create_resource(&self, api_id: &str, parent_id: &str, path_part: &str) -> ProviderResult<String> {
        let output = self
            .gateway
            .create_resource()
            .rest_api_id(api_id)
            .parent_id(parent_id)
            .path_part(path_part)
            .send()
            .await
            .map_err(|e| sdk_error("create_resource", ProviderErrorKind::Other, e))?;
        output
            .id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::malformed("create_resource", "no id in response"))
    }

    async fn put_proxy_method(&self, api_id: &str, resource_id: &str) -> ProviderResult<()> {
        self.gateway
            .put_method()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(PROXY_METHOD)
            .authorization_type("NONE")
            .send()
            .await
            .map_err(|e| sdk_error("put_method", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn put_proxy_integration(&self, api_id: &str, resource_id: &str, function_arn: &str) -> ProviderResult<()> {
        self.gateway
            .put_integration()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(PROXY_METHOD)
            .integration_http_method("POST")
            .passthrough_behavior("WHEN_NO_MATCH")
            .timeout_in_millis(INTEGRATION_TIMEOUT_MS)
            .r#type(IntegrationType::AwsProxy)
            .uri(self.integration_uri(function_arn))
            .send()
            .await
            .map_err(|e| sdk_error("put_integration", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn put_success_response(&self, api_id: &str, resource_id: &str) -> ProviderResult<()> {
        self.gateway
            .put_integration_response()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(PROXY_METHOD)
            .status_code("200")
            .selection_pattern(".*")
            .send()
            .await
            .map_err(|e| sdk_error("put_integration_response", ProviderErrorKind::Other, e))?;
        self.gateway
            .put_method_response()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method(PROXY_METHOD)
            .status_code("200")
            .send()
            .await
            .map_err(|e| sdk_error("put_method_response", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn deploy_stage(&self, api_id: &str, stage: &str) -> ProviderResult<()> {
        self.gateway
            .create_deployment()
            .rest_api_id(api_id)
            .stage_name(stage)
            .send()
            .await
            .map_err(|e| sdk_error("create_deployment", ProviderErrorKind::Other, e))?;
        Ok(())
    }

    async fn list_apis(&self) -> ProviderResult<Vec<ApiSummary>> {
        let mut pages = self.gateway.get_rest_apis().into_paginator().send();
        let mut apis = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("get_rest_apis", ProviderErrorKind::Other, e))?;
            for api in page.items() {
                if let (Some(id), Some(name)) = (api.id(), api.name()) {
                    apis.push(ApiSummary {
                        id: id.to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(apis)
    }

    async fn delete_api(&self, api_id: &str) -> ProviderResult<()> {
        match self.gateway.delete_rest_api().rest_api_id(api_id).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let kind = if err.as_service_error().is_some_and(|e| e.is_not_found_exception()) {
                    ProviderErrorKind::NotFound
                } else if err.as_service_error().is_some_and(|e| e.is_too_many_requests_exception()) {
                    ProviderErrorKind::Transient
                } else {
                    ProviderErrorKind::Other
                };
                Err(sdk_error("delete_rest_api", kind, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_role_policy_names_every_service() {
        let policy: serde_json::Value = serde_json::from_str(&assume_role_policy()).unwrap();
        let services = &policy["Statement"][0]["Principal"]["Service"];
        assert_eq!(services.as_array().map(Vec::len), Some(3));
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
