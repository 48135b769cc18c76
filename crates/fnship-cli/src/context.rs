//! Process-wide state, built once in `main` and passed to every command.

use aws_config::{BehaviorVersion, Region};
use fnship_core::FnshipConfig;
use fnship_provision::{AwsProvider, CloudProvider, ProvisionSettings, Provisioner};
use fnship_store::{ObjectBackend, S3Backend, VersionStore};
use tracing::debug;

pub struct AppContext<B, P> {
    pub config: FnshipConfig,
    pub store: VersionStore<B>,
    pub provisioner: Provisioner<P>,
}

impl<B: ObjectBackend, P: CloudProvider> AppContext<B, P> {
    pub fn new(config: FnshipConfig, backend: B, provider: P) -> Self {
        let settings = ProvisionSettings::from_config(&config);
        Self {
            config,
            store: VersionStore::new(backend),
            provisioner: Provisioner::new(provider, settings),
        }
    }
}

impl AppContext<S3Backend, AwsProvider> {
    /// Load AWS credentials from the default provider chain for the configured region.
    pub async fn connect(config: FnshipConfig) -> Self {
        let sdk = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        debug!(region = %config.region, "aws session ready");
        let backend = S3Backend::from_conf(&sdk);
        let provider = AwsProvider::from_conf(&sdk);
        Self::new(config, backend, provider)
    }
}
