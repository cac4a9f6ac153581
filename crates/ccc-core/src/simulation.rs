//! Debounced what-if loop over the two sliders.
//!
//! Slider events are absorbed into the session immediately; the prediction call runs
//! once the input has been quiet for the configured window.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::context::Shared;
use crate::error::Precondition;
use crate::model::SliderInput;
use crate::tasks::TaskHandle;
use crate::view::GaugeReading;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SimulationOutcome {
    NotReady(Precondition),
    Rendered(GaugeReading),
    Stale,
    Failed(String),
}

/// One live prediction for the loaded customer with the current overrides.
pub async fn evaluate(shared: &Shared) -> SimulationOutcome {
    let input = match shared.session.with(|ctx| ctx.simulation_input()) {
        Ok(input) => input,
        Err(missing) => return SimulationOutcome::NotReady(missing),
    };
    let ticket = shared.sim_ticket.issue();
    let result = shared.api.predict(&input.record, input.overrides).await;
    let applied = shared.session.apply_if_current(input.generation, |ctx| {
        if !shared.sim_ticket.is_latest(ticket) {
            return None;
        }
        Some(match result {
            Ok(risk) => {
                let gauge = GaugeReading::from_risk(risk);
                shared.view.show_gauge(gauge.clone(), ctx.overrides());
                SimulationOutcome::Rendered(gauge)
            }
            Err(err) => {
                let detail = err.detail();
                warn!(customer_id = %input.record.id(), error = %detail, "prediction failed");
                shared.view.warn(format!("Simulation failed: {detail}"));
                SimulationOutcome::Failed(detail)
            }
        })
    });
    applied.flatten().unwrap_or(SimulationOutcome::Stale)
}

/// Sender side of the debounce loop.
#[derive(Clone, Debug)]
pub struct SimulationHandle {
    tx: mpsc::UnboundedSender<SliderInput>,
}

impl SimulationHandle {
    /// Queue a slider event; `false` once the loop has stopped.
    pub fn input(&self, input: SliderInput) -> bool {
        self.tx.send(input).is_ok()
    }
}

fn absorb(shared: &Shared, input: &SliderInput) {
    match shared.session.with_mut(|ctx| ctx.apply_slider(input)) {
        Ok(overrides) => shared.view.show_overrides(overrides),
        Err(missing) => debug!(%missing, "slider ignored"),
    }
}

/// Start the trailing-edge debounce loop.
pub fn spawn(shared: Arc<Shared>) -> (SimulationHandle, TaskHandle) {
    let (tx, mut rx) = mpsc::unbounded_channel::<SliderInput>();
    let window = shared.config.debounce();
    let handle = tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            absorb(&shared, &first);
            let mut coalesced = 1usize;
            let mut closed = false;
            loop {
                match tokio::time::timeout(window, rx.recv()).await {
                    Ok(Some(next)) => {
                        absorb(&shared, &next);
                        coalesced += 1;
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
            let outcome = evaluate(&shared).await;
            if let SimulationOutcome::NotReady(missing) = &outcome {
                shared.view.info(missing.to_string());
            }
            debug!(coalesced, ?outcome, "simulation evaluated");
            if closed {
                break;
            }
        }
    });
    (SimulationHandle { tx }, TaskHandle::new("simulation", handle))
}
