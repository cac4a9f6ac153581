//! Analyze-customer pipeline: authoritative record, then metadata and counterfactual
//! side by side, then a single generation-checked commit.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::Shared;
use crate::model::{CounterfactualRequest, CustomerId, CustomerRecord};
use crate::session::Generation;
use crate::simulation::{self, SimulationOutcome};
use crate::view::SelectedSummary;

#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub customer_id: CustomerId,
    pub generation: Generation,
    /// Row snapshot from the selection, used only when the record fetch fails.
    pub provisional: Option<CustomerRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Applied {
        customer_id: CustomerId,
        degraded: bool,
        failures: Vec<String>,
        simulation: SimulationOutcome,
    },
    Stale {
        customer_id: CustomerId,
    },
    Failed {
        customer_id: CustomerId,
        reason: String,
    },
}

pub async fn run(shared: &Shared, req: AnalysisRequest) -> PipelineOutcome {
    let AnalysisRequest {
        customer_id,
        generation,
        provisional,
    } = req;
    let started = shared.session.apply_if_current(generation, |_| {
        shared
            .view
            .info(format!("Analyzing Customer {customer_id}..."));
    });
    if started.is_none() {
        return PipelineOutcome::Stale { customer_id };
    }

    let mut failures = Vec::new();
    let (record, degraded) = match shared.api.customer(customer_id).await {
        Ok(record) => (record, false),
        Err(err) => match provisional {
            Some(snapshot) => {
                warn!(%customer_id, %generation, error = %err, "record fetch failed, using selected row");
                failures.push(format!("customer record: {} (using selected row)", err.detail()));
                (snapshot, true)
            }
            None => {
                let reason = format!("Analysis failed: {}", err.detail());
                let applied = shared.session.apply_if_current(generation, |ctx| {
                    ctx.revert_pending();
                    shared.view.error(reason.clone());
                });
                return match applied {
                    Some(()) => PipelineOutcome::Failed {
                        customer_id,
                        reason,
                    },
                    None => PipelineOutcome::Stale { customer_id },
                };
            }
        },
    };

    let plan = shared.plan();
    let cf_req = CounterfactualRequest {
        customer_id,
        timing_days: plan.timing_days,
        action_type: plan.action_type,
    };
    let (metadata, counterfactual) = tokio::join!(
        shared.api.feature_metadata(),
        shared.api.counterfactual(&cf_req)
    );
    if let Err(err) = &counterfactual {
        failures.push(format!("counterfactual: {}", err.detail()));
    }
    if let Err(err) = &metadata {
        failures.push(format!("feature metadata: {}", err.detail()));
    }

    let top_k = shared.config.importance_top_k();
    let committed = shared.session.apply_if_current(generation, |ctx| {
        ctx.load(record);
        shared.view.clear_analysis();
        shared.view.show_overrides(ctx.overrides());
        if let Ok(cf) = &counterfactual {
            shared.view.show_selected(SelectedSummary::from_counterfactual(cf));
        }
        if let Ok(features) = metadata {
            shared
                .view
                .show_importance(features.into_iter().take(top_k).collect());
        }
        if failures.is_empty() {
            shared
                .view
                .info(format!("Analysis complete for {customer_id}"));
        } else {
            shared.view.warn(format!(
                "Analysis incomplete for {customer_id}: {}",
                failures.join("; ")
            ));
        }
    });
    if committed.is_none() {
        debug!(%customer_id, %generation, "analysis superseded, results discarded");
        return PipelineOutcome::Stale { customer_id };
    }
    info!(%customer_id, %generation, degraded, "analysis applied");

    let simulation = simulation::evaluate(shared).await;
    PipelineOutcome::Applied {
        customer_id,
        degraded,
        failures,
        simulation,
    }
}
