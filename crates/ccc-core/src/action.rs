//! Feature-flagged downstream trigger for the customers at the top of the regret table.

use ccc_events::topics;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::context::Shared;
use crate::error::Precondition;
use crate::model::{CustomerId, TriggerRequest};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Triggered(Vec<CustomerId>),
    Disabled,
    NothingLoaded,
    Failed(String),
}

pub async fn trigger(shared: &Shared) -> TriggerOutcome {
    if !shared.settings.slack_enabled().await {
        shared.view.warn("Slack trigger disabled.");
        return TriggerOutcome::Disabled;
    }
    let ids: Vec<CustomerId> = shared
        .view
        .regret()
        .rows()
        .iter()
        .take(shared.config.trigger_batch_limit())
        .map(|row| row.customer_id)
        .collect();
    if ids.is_empty() {
        shared.view.warn(Precondition::NothingLoaded.to_string());
        return TriggerOutcome::NothingLoaded;
    }
    let plan = shared.plan();
    let req = TriggerRequest {
        customer_ids: ids.clone(),
        timing_days: plan.timing_days,
        action_type: plan.action_type,
    };
    match shared.api.trigger_action(&req).await {
        Ok(()) => {
            let listed = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            info!(count = ids.len(), action = %plan.action_type, "action triggered");
            shared.view.publish(
                topics::TOPIC_ACTION_TRIGGERED,
                &json!({
                    "customer_ids": &ids,
                    "action_type": plan.action_type,
                    "timing_days": plan.timing_days,
                }),
            );
            shared.view.info(format!("Triggered Slack for: {listed}"));
            TriggerOutcome::Triggered(ids)
        }
        Err(err) => {
            let detail = err.detail();
            warn!(error = %detail, "action trigger failed");
            shared.view.error(format!("Trigger failed: {detail}"));
            TriggerOutcome::Failed(detail)
        }
    }
}
