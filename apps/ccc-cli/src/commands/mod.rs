pub mod config;
pub mod oneshot;
pub mod settings;
pub mod watch;

use ccc_core::{ActionPlan, ActionType, Coordinator, Intent, IntentOutcome};
use clap::Args;

pub use config::ConfigCmd;
pub use settings::SettingsCmd;
pub use watch::WatchArgs;

/// Action plan overrides shared by the one-shot commands.
#[derive(Args, Clone, Debug, Default)]
pub struct PlanArgs {
    /// none | discount | priority_support | proactive_outreach
    #[arg(long)]
    pub action: Option<ActionType>,
    /// Days until the action (0-60)
    #[arg(long)]
    pub timing: Option<u32>,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    /// Apply the overrides on top of the coordinator's plan.
    pub async fn apply(&self, coord: &Coordinator) -> anyhow::Result<ActionPlan> {
        if self.action.is_none() && self.timing.is_none() {
            return Ok(coord.plan());
        }
        let current = coord.plan();
        let plan = ActionPlan {
            action_type: self.action.unwrap_or(current.action_type),
            timing_days: self.timing.unwrap_or(current.timing_days),
        };
        match coord.handle(Intent::SetPlan(plan)).await {
            IntentOutcome::PlanChanged(plan) => Ok(plan),
            IntentOutcome::Rejected(reason) => anyhow::bail!(reason),
            other => anyhow::bail!("unexpected outcome {other:?}"),
        }
    }
}
