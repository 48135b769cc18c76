//! Provisioning state machine.
//!
//! A first deployment walks a fixed list of named steps. The run records
//! which steps completed and the identifiers each step produced, so a failure
//! can report exactly how far provisioning got. Nothing is rolled back.

use std::fmt;

use fnship_core::{FunctionRecord, ResourceName, RouteBinding};
use tracing::debug;

/// One remote mutation (or wait) in the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    CreateRole,
    SettleRole,
    CreateFunction,
    CreateApi,
    FetchRootResource,
    CreateRouteResource,
    AttachMethod,
    AttachIntegration,
    MapResponses,
    DeployStage,
    GrantInvoke,
}

impl ProvisionStep {
    /// Every step, in execution order.
    pub const ALL: [ProvisionStep; 11] = [
        ProvisionStep::CreateRole,
        ProvisionStep::SettleRole,
        ProvisionStep::CreateFunction,
        ProvisionStep::CreateApi,
        ProvisionStep::FetchRootResource,
        ProvisionStep::CreateRouteResource,
        ProvisionStep::AttachMethod,
        ProvisionStep::AttachIntegration,
        ProvisionStep::MapResponses,
        ProvisionStep::DeployStage,
        ProvisionStep::GrantInvoke,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CreateRole => "create-role",
            Self::SettleRole => "settle-role",
            Self::CreateFunction => "create-function",
            Self::CreateApi => "create-api",
            Self::FetchRootResource => "fetch-root-resource",
            Self::CreateRouteResource => "create-route-resource",
            Self::AttachMethod => "attach-method",
            Self::AttachIntegration => "attach-integration",
            Self::MapResponses => "map-responses",
            Self::DeployStage => "deploy-stage",
            Self::GrantInvoke => "grant-invoke",
        }
    }

    /// The step that follows this one, or `None` for the last step.
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a target is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionPhase {
    /// No function exists yet.
    Absent,
    /// Walking the step list; `step` is the one about to run.
    Provisioning { step: ProvisionStep },
    /// Every step completed.
    Provisioned,
    /// A step failed; earlier steps stay in place.
    Interrupted { step: ProvisionStep },
}

/// A single provisioning run and everything it has created so far.
#[derive(Debug, Clone)]
pub struct ProvisionRun {
    pub target: ResourceName,
    pub phase: ProvisionPhase,
    pub completed: Vec<ProvisionStep>,
    pub account_id: Option<String>,
    pub role_arn: Option<String>,
    pub function: Option<FunctionRecord>,
    pub api_id: Option<String>,
    pub root_id: Option<String>,
    pub resource_id: Option<String>,
    pub route: Option<RouteBinding>,
}

impl ProvisionRun {
    pub fn new(target: ResourceName) -> Self {
        Self {
            target,
            phase: ProvisionPhase::Absent,
            completed: Vec::new(),
            account_id: None,
            role_arn: None,
            function: None,
            api_id: None,
            root_id: None,
            resource_id: None,
            route: None,
        }
    }

    pub fn start(&mut self) {
        self.phase = ProvisionPhase::Provisioning {
            step: ProvisionStep::ALL[0],
        };
        debug!(target_name = %self.target, "provisioning started");
    }

    /// The step to run next, if the run is still in progress.
    pub fn current_step(&self) -> Option<ProvisionStep> {
        match self.phase {
            ProvisionPhase::Provisioning { step } => Some(step),
            _ => None,
        }
    }

    /// Mark the current step done and move to the next one.
    pub fn advance(&mut self) {
        let ProvisionPhase::Provisioning { step } = self.phase else {
            return;
        };
        self.completed.push(step);
        self.phase = match step.next() {
            Some(next) => ProvisionPhase::Provisioning { step: next },
            None => ProvisionPhase::Provisioned,
        };
    }

    /// Stop the run at the current step.
    pub fn interrupt(&mut self) {
        if let ProvisionPhase::Provisioning { step } = self.phase {
            self.phase = ProvisionPhase::Interrupted { step };
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.phase == ProvisionPhase::Provisioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_chain_in_order() {
        let mut step = ProvisionStep::CreateRole;
        let mut walked = vec![step];
        while let Some(next) = step.next() {
            walked.push(next);
            step = next;
        }
        assert_eq!(walked, ProvisionStep::ALL);
    }

    #[test]
    fn test_run_walks_to_provisioned() {
        let mut run = ProvisionRun::new(ResourceName::from_existing("api-abc"));
        assert_eq!(run.current_step(), None);

        run.start();
        let mut seen = Vec::new();
        while let Some(step) = run.current_step() {
            seen.push(step);
            run.advance();
        }
        assert!(run.is_provisioned());
        assert_eq!(seen, ProvisionStep::ALL);
        assert_eq!(run.completed, ProvisionStep::ALL);
    }

    #[test]
    fn test_interrupt_freezes_progress() {
        let mut run = ProvisionRun::new(ResourceName::from_existing("api-abc"));
        run.start();
        run.advance();
        run.advance();
        run.interrupt();

        assert_eq!(
            run.phase,
            ProvisionPhase::Interrupted {
                step: ProvisionStep::CreateFunction
            }
        );
        assert_eq!(run.current_step(), None);
        run.advance();
        assert_eq!(run.completed.len(), 2);
    }

    #[test]
    fn test_labels_are_kebab_case() {
        assert_eq!(ProvisionStep::FetchRootResource.to_string(), "fetch-root-resource");
    }
}
