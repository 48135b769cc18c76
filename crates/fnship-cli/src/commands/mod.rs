use std::future::Future;

pub mod deploy;
pub mod list;
pub mod remove;
pub mod rollback;

/// Print `message`, run `step`, and confirm with `✓ OK` once it succeeds.
pub async fn action<T, F>(message: &str, step: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    println!("{message}");
    let value = step.await?;
    println!("  ✓ OK");
    Ok(value)
}
