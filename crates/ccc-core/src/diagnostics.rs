//! Backend reachability probe, on demand and optionally on a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::context::Shared;
use crate::tasks::TaskHandle;
use crate::view::Reachability;

const PROBE_KEY: &str = "probe";

/// Classify the backend as reachable or not. Concurrent probes share one request.
pub async fn probe(shared: &Shared) -> Reachability {
    let flight = shared.flights.begin(PROBE_KEY);
    if !flight.is_leader() {
        flight.wait().await;
        return shared.view.backend();
    }
    let base = shared.api.base();
    let reach = match shared.api.health(shared.config.probe_timeout()).await {
        Ok(elapsed) => {
            let latency_ms = elapsed.as_millis() as u64;
            debug!(%base, latency_ms, "backend reachable");
            Reachability::Reachable { base, latency_ms }
        }
        Err(err) => {
            let detail = err.detail();
            warn!(%base, error = %detail, "backend unreachable");
            Reachability::Unreachable { base, detail }
        }
    };
    shared.view.show_backend(reach.clone());
    reach
}

/// Human-readable line for an explicit probe.
pub fn describe(reach: &Reachability) -> String {
    match reach {
        Reachability::Unknown => "Backend not probed yet.".to_string(),
        Reachability::Reachable { base, latency_ms } => {
            format!("Backend reachable at {base} ({latency_ms} ms)")
        }
        Reachability::Unreachable { base, detail } => {
            format!("Backend unreachable at {base}: {detail}")
        }
    }
}

/// Probe every `every`; results only update the backend panel, never the status line.
pub fn spawn_periodic(shared: Arc<Shared>, every: Duration) -> TaskHandle {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let reach = probe(&shared).await;
            debug!(?reach, "periodic probe");
        }
    });
    info!(every_secs = every.as_secs(), "periodic backend probe enabled");
    TaskHandle::new("probe", handle)
}
