use anyhow::Result;
use fnship_core::{DeploymentTarget, FunctionRecord, ResourceName, TAG_ID};
use fnship_provision::CloudProvider;
use fnship_store::{ObjectBackend, StoredArtifact};

use crate::context::AppContext;
use crate::report::{Table, format_unix_time, human_bytes};

pub async fn list<B, P>(ctx: &AppContext<B, P>, all: bool) -> Result<String>
where
    B: ObjectBackend,
    P: CloudProvider,
{
    let functions = ctx.provisioner.list(all).await?;
    let table = render_functions(&functions);
    print!("{table}");
    Ok(table)
}

pub async fn list_version<B, P>(
    ctx: &AppContext<B, P>,
    name: &str,
    id: &str,
    full: bool,
) -> Result<String>
where
    B: ObjectBackend,
    P: CloudProvider,
{
    let target = DeploymentTarget::new(name, id)?;
    let container = target.resource_name();

    let current = ctx
        .provisioner
        .lookup(&container)
        .await?
        .and_then(|f| f.artifact().map(str::to_string));
    let artifacts = ctx.store.list(&container).await?;

    let table = render_versions(&artifacts, current.as_deref(), full);
    print!("{table}");
    Ok(table)
}

pub fn render_functions(functions: &[FunctionRecord]) -> String {
    let mut table = Table::new(["NAME", "ID", "RUNTIME", "MEMORY", "ARN"]);
    for function in functions {
        let (name, id) = split_name(function);
        // Memory is configured in MB.
        let memory = human_bytes(u64::try_from(function.memory_mb).unwrap_or(0) * 1_000_000);
        table.row([name, id, function.runtime.clone(), memory, function.arn.clone()]);
    }
    table.render()
}

/// `name` and `id` for functions carrying an id tag; whole name and `-` otherwise.
fn split_name(function: &FunctionRecord) -> (String, String) {
    let resource = ResourceName::from_existing(function.name.clone());
    match (resource.split(), function.tags.get(TAG_ID)) {
        ((name, id), Some(tag)) if id == tag => (name.to_string(), id.to_string()),
        _ => (function.name.clone(), "-".to_string()),
    }
}

/// Artifacts oldest first; `*` marks the one the function currently runs.
pub fn render_versions(artifacts: &[StoredArtifact], current: Option<&str>, full: bool) -> String {
    let mut table = Table::new(["SHA256 ID", "SIZE", "CREATED AT"]);
    for artifact in artifacts {
        let key = &artifact.key;
        let mut digest = if full {
            key.digest.to_string()
        } else {
            key.digest.short().to_string()
        };
        if current == Some(key.to_string().as_str()) {
            digest.push_str(" *");
        }
        let created = if full {
            key.timestamp.to_string()
        } else {
            format_unix_time(key.timestamp)
        };
        table.row([digest, human_bytes(artifact.size_bytes), created]);
    }
    table.render()
}
