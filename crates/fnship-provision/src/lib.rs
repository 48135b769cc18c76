//! fnship-provision: function, role, and route lifecycle.
//!
//! ```text
//! Provisioner<P: CloudProvider>
//!   ├── deploy      Absent → Provisioning → Provisioned
//!   │               Provisioned → Updated (code pointer only)
//!   ├── remove      role, function, every "<name>-API"
//!   └── list        managed functions (or all)
//! ```
//!
//! Provisioning is a named step sequence ([`ProvisionStep`]). A failing step
//! stops the run without compensating the steps already done. Only function
//! creation is retried, and only on transient provider errors.

pub mod api;
pub mod aws;
pub mod backoff;
pub mod error;
pub mod machine;
pub mod memory;
pub mod provisioner;

pub use api::{ApiSummary, CloudProvider, CodeLocation, FunctionApi, FunctionSpec, GatewayApi, InvokeGrant, RoleApi};
pub use aws::AwsProvider;
pub use backoff::Backoff;
pub use error::{ProviderError, ProviderErrorKind, ProviderResult, ProvisionError, ProvisionResult};
pub use machine::{ProvisionPhase, ProvisionRun, ProvisionStep};
pub use memory::InMemoryProvider;
pub use provisioner::{DeployOutcome, ProvisionSettings, Provisioner, RemovalReport};
