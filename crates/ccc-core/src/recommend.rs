use serde::Serialize;
use tracing::{info, warn};

use crate::context::Shared;
use crate::error::Precondition;
use crate::model::{ActionPlan, Recommendation, MAX_TIMING_DAYS};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecommendOutcome {
    Applied(Recommendation),
    NoImprovement,
    NotReady(Precondition),
    Stale,
    Failed(String),
}

/// Ask the backend for the best plan for the loaded customer and adopt it when it
/// improves on doing nothing.
pub async fn apply(shared: &Shared) -> RecommendOutcome {
    let settled = shared
        .session
        .with(|ctx| ctx.settled_customer().map(|id| (ctx.generation(), id)));
    let (generation, customer_id) = match settled {
        Ok(settled) => settled,
        Err(missing) => {
            shared.view.info(missing.to_string());
            return RecommendOutcome::NotReady(missing);
        }
    };
    shared
        .view
        .info("AI is calculating optimal strategy...");
    let result = shared.api.recommend(customer_id).await;
    let applied = shared.session.apply_if_current(generation, |ctx| {
        if ctx.settled_customer() != Ok(customer_id) {
            return None;
        }
        Some(match result {
            Ok(rec) if rec.is_actionable() => {
                shared.set_plan(ActionPlan {
                    action_type: rec.best_action,
                    timing_days: rec.best_timing.min(MAX_TIMING_DAYS),
                });
                shared.view.show_recommendation(rec.clone());
                shared.view.info("Optimal strategy identified!");
                info!(%customer_id, action = %rec.best_action, timing = rec.best_timing, "recommendation applied");
                RecommendOutcome::Applied(rec)
            }
            Ok(_) => {
                shared.view.info("No significant improvement found.");
                RecommendOutcome::NoImprovement
            }
            Err(err) => {
                let detail = err.detail();
                warn!(%customer_id, error = %detail, "recommendation failed");
                shared.view.error(format!("AI optimization failed: {detail}"));
                RecommendOutcome::Failed(detail)
            }
        })
    });
    applied.flatten().unwrap_or(RecommendOutcome::Stale)
}
