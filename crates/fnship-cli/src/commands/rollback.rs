use anyhow::Result;
use fnship_core::{ArtifactKey, DeploymentTarget};
use fnship_provision::{CloudProvider, CodeLocation};
use fnship_store::ObjectBackend;

use super::action;
use crate::context::AppContext;

/// Re-point the function at the stored artifact matching `prefix`.
pub async fn rollback<B, P>(
    ctx: &AppContext<B, P>,
    name: &str,
    id: &str,
    prefix: &str,
    time: Option<i64>,
) -> Result<ArtifactKey>
where
    B: ObjectBackend,
    P: CloudProvider,
{
    let target = DeploymentTarget::new(name, id)?;
    let container = target.resource_name();
    let key = ctx.store.resolve(&container, prefix, time).await?;

    let code = CodeLocation {
        bucket: container.to_string(),
        key: key.to_string(),
    };
    action(&format!("Rolling back {container} to {key}"), async {
        ctx.provisioner.update_code(&container, &code).await?;
        Ok(())
    })
    .await?;
    Ok(key)
}
