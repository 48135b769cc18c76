use anyhow::Result;
use fnship_core::DeploymentTarget;
use fnship_provision::{CloudProvider, RemovalReport};
use fnship_store::ObjectBackend;
use tracing::info;

use super::action;
use crate::context::AppContext;

/// Remove the function, its role and API, and the artifact bucket if `storage`.
pub async fn remove<B, P>(
    ctx: &AppContext<B, P>,
    name: &str,
    id: &str,
    storage: bool,
) -> Result<RemovalReport>
where
    B: ObjectBackend,
    P: CloudProvider,
{
    let target = DeploymentTarget::new(name, id)?;
    let container = target.resource_name();

    let report = action(&format!("Removing function {container}"), async {
        Ok(ctx.provisioner.remove(&container).await?)
    })
    .await?;

    if !storage {
        info!(%container, "keeping artifact storage");
    } else if ctx.store.exists(&container).await? {
        action(&format!("Removing storage {container}"), async {
            ctx.store.destroy(&container).await?;
            Ok(())
        })
        .await?;
    } else {
        info!(%container, "no artifact storage to remove");
    }

    Ok(report)
}
