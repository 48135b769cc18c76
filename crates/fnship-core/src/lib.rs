pub mod artifact;
pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use artifact::{ArtifactKey, ContentDigest};
pub use config::FnshipConfig;
pub use error::{CoreError, CoreResult};
pub use naming::{DeploymentTarget, ResourceName};
pub use types::*;
