use std::path::Path;

use anyhow::{Result, bail};
use fnship_core::{ArtifactKey, DeploymentTarget};
use fnship_provision::{CloudProvider, CodeLocation, DeployOutcome};
use fnship_store::ObjectBackend;
use tracing::{debug, info, warn};

use super::action;
use crate::context::AppContext;

pub struct DeployArgs<'a> {
    pub name: &'a str,
    pub folder: &'a Path,
    pub force: bool,
    pub id: Option<&'a str>,
    /// Runtime for a newly created function, instead of the configured one.
    pub runtime: Option<&'a str>,
}

#[derive(Debug)]
pub struct DeployReport {
    pub target: DeploymentTarget,
    pub key: ArtifactKey,
    pub outcome: DeployOutcome,
}

impl DeployReport {
    /// Print the deployment id and URL of a new target, or the new code pointer.
    pub fn print(&self) {
        match &self.outcome {
            DeployOutcome::Provisioned { route, .. } => {
                println!("id: {}", self.target.id);
                println!("url: {}", route.url);
            }
            DeployOutcome::Updated { function } => {
                debug!(version = ?function.version, "published");
                println!("{} now runs {}", function.name, self.key);
            }
        }
    }
}

pub async fn deploy<B, P>(ctx: &AppContext<B, P>, args: &DeployArgs<'_>) -> Result<DeployReport>
where
    B: ObjectBackend,
    P: CloudProvider,
{
    let target = match args.id {
        Some(id) => DeploymentTarget::new(args.name, id)?,
        None => DeploymentTarget::generate(args.name)?,
    };
    let container = target.resource_name();
    info!(function = %container, region = %ctx.config.region, "deploying");

    let packed = action(&format!("Packaging {}", args.folder.display()), async {
        Ok(fnship_pack::pack_to_temp(args.folder)?)
    })
    .await?;

    let uploaded = action(&format!("Uploading artifact {}", packed.digest.short()), async {
        if ctx.store.exists(&container).await? {
            if !args.force && ctx.store.has_digest(&container, &packed.digest).await? {
                bail!(
                    "artifact with digest {} already exists for {container}, use --force to deploy it anyway",
                    packed.digest
                );
            }
        } else {
            ctx.store.create(&container).await?;
        }
        Ok(ctx.store.put(&container, &packed.digest, &packed.archive_path).await?)
    })
    .await;

    if let Err(e) = std::fs::remove_file(&packed.archive_path) {
        warn!(path = %packed.archive_path.display(), error = %e, "could not remove local archive");
    }
    let key = uploaded?;

    let code = CodeLocation {
        bucket: container.to_string(),
        key: key.to_string(),
    };
    let outcome = action(&format!("Deploying function {container}"), async {
        Ok(ctx
            .provisioner
            .deploy_with_runtime(&target, &code, args.runtime)
            .await?)
    })
    .await?;

    Ok(DeployReport {
        target,
        key,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{context, source_dir};

    fn args<'a>(folder: &'a Path, force: bool) -> DeployArgs<'a> {
        DeployArgs {
            name: "api",
            folder,
            force,
            id: Some("abc123"),
            runtime: None,
        }
    }

    #[tokio::test]
    async fn test_first_deploy_provisions_and_uploads() {
        let ctx = context();
        let src = source_dir("deploy: first");

        let report = deploy(&ctx, &args(src.path(), false)).await.unwrap();
        let DeployOutcome::Provisioned { function, route } = &report.outcome else {
            panic!("expected provisioning");
        };
        assert_eq!(function.name, "api-abc123");
        assert!(route.url.ends_with("/default/api-abc123"));

        let container = report.target.resource_name();
        let stored = ctx.store.list(&container).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key, report.key);
        assert_eq!(
            ctx.provisioner.provider().code_of("api-abc123").await.unwrap().key,
            report.key.to_string()
        );
    }

    #[tokio::test]
    async fn test_generated_id_is_used_for_every_resource() {
        let ctx = context();
        let src = source_dir("deploy: generated id");
        let report = deploy(
            &ctx,
            &DeployArgs {
                name: "svc",
                folder: src.path(),
                force: false,
                id: None,
                runtime: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.target.id.len(), fnship_core::naming::GENERATED_ID_LEN);
        let name = report.target.resource_name();
        assert!(ctx.store.exists(&name).await.unwrap());
        assert!(ctx.provisioner.provider().role_exists(name.as_str()).await);
    }

    #[tokio::test]
    async fn test_duplicate_digest_needs_force() {
        let ctx = context();
        let src = source_dir("deploy: duplicate");
        deploy(&ctx, &args(src.path(), false)).await.unwrap();

        let err = deploy(&ctx, &args(src.path(), false)).await.unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        let container = fnship_core::ResourceName::from_existing("api-abc123");
        assert_eq!(ctx.store.list(&container).await.unwrap().len(), 1);

        let report = deploy(&ctx, &args(src.path(), true)).await.unwrap();
        assert!(matches!(report.outcome, DeployOutcome::Updated { .. }));
        assert_eq!(ctx.store.list(&container).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_runtime_flag_reaches_new_function() {
        let ctx = context();
        let src = source_dir("deploy: runtime");
        deploy(
            &ctx,
            &DeployArgs {
                runtime: Some("python3.12"),
                ..args(src.path(), false)
            },
        )
        .await
        .unwrap();

        let function = ctx.provisioner.provider().function("api-abc123").await.unwrap();
        assert_eq!(function.runtime, "python3.12");
        assert_eq!(ctx.config.function.runtime, "provided.al2023");
    }

    #[tokio::test]
    async fn test_changed_code_updates_without_new_route() {
        let ctx = context();
        let v1 = source_dir("deploy: v1");
        let v2 = source_dir("deploy: v2");
        deploy(&ctx, &args(v1.path(), false)).await.unwrap();
        let report = deploy(&ctx, &args(v2.path(), false)).await.unwrap();

        let DeployOutcome::Updated { function } = &report.outcome else {
            panic!("expected an update");
        };
        assert_eq!(function.artifact(), Some(report.key.to_string().as_str()));
        assert_eq!(ctx.provisioner.provider().apis().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_folder_touches_nothing() {
        let ctx = context();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(deploy(&ctx, &args(&missing, false)).await.is_err());
        let container = fnship_core::ResourceName::from_existing("api-abc123");
        assert!(!ctx.store.exists(&container).await.unwrap());
        assert!(ctx.provisioner.provider().calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let ctx = context();
        let src = source_dir("deploy: invalid");
        let err = deploy(
            &ctx,
            &DeployArgs {
                name: "Bad_Name",
                folder: src.path(),
                force: false,
                id: Some("abc"),
                runtime: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Bad_Name"), "{err}");
        assert!(ctx.provisioner.provider().calls().await.is_empty());
    }
}
