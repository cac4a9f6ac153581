//! Top-regret batch loader for the current action plan.

use serde::Serialize;
use tracing::{debug, warn};

use crate::context::Shared;
use crate::model::BatchRequest;
use crate::view::RegretTable;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RegretOutcome {
    Loaded(usize),
    Empty,
    /// An identical load was already running; this is the table it left behind.
    Joined(RegretTable),
    Stale,
    Failed(String),
}

pub async fn load(shared: &Shared) -> RegretOutcome {
    let plan = shared.plan();
    let key = format!("regret:{}:{}", plan.action_type, plan.timing_days);
    let flight = shared.flights.begin(&key);
    if !flight.is_leader() {
        debug!(%key, "regret load already in flight, joining");
        flight.wait().await;
        return RegretOutcome::Joined(shared.view.regret());
    }

    let ticket = shared.regret_ticket.issue();
    shared
        .view
        .info(format!("Loading from {}...", shared.api.base()));
    let req = BatchRequest {
        timing_days: plan.timing_days,
        action_type: plan.action_type,
        top_n: shared.config.regret_top_n(),
    };
    let result = shared.api.batch_counterfactual(&req).await;
    if !shared.regret_ticket.is_latest(ticket) {
        debug!(%key, "newer regret load started, dropping response");
        return RegretOutcome::Stale;
    }
    match result {
        Ok(rows) => {
            let count = rows.len();
            shared.view.show_regret(RegretTable::from_rows(rows));
            if count == 0 {
                shared.view.info("No data available.");
                RegretOutcome::Empty
            } else {
                shared.view.info(format!("Loaded {count} customers."));
                RegretOutcome::Loaded(count)
            }
        }
        Err(err) => {
            let detail = err.detail();
            warn!(%key, error = %detail, "regret load failed");
            shared.view.error(format!("Failed: {detail}"));
            RegretOutcome::Failed(detail)
        }
    }
}
