//! The single "current customer" context and its generation counter.
//!
//! Every intent (selection change, explicit analysis, reset) bumps the generation.
//! Async work captures the generation when it starts and may only mutate shared
//! state through [`Session::apply_if_current`], which checks and applies under one lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Precondition;
use crate::model::{CustomerId, CustomerRecord, SimulationOverrides, SliderInput};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    customer_id: Option<CustomerId>,
    record: Option<CustomerRecord>,
    overrides: SimulationOverrides,
    generation: Generation,
}

impl SessionContext {
    pub fn begin_new_intent(&mut self) -> Generation {
        self.generation = Generation(self.generation.0 + 1);
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The customer the latest intent is about; may be ahead of `record` while loading.
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn record(&self) -> Option<&CustomerRecord> {
        self.record.as_ref()
    }

    pub fn overrides(&self) -> SimulationOverrides {
        self.overrides
    }

    pub(crate) fn set_pending(&mut self, id: CustomerId) {
        self.customer_id = Some(id);
    }

    /// Install a freshly loaded record and seed the sliders from it.
    pub(crate) fn load(&mut self, record: CustomerRecord) {
        self.customer_id = Some(record.id());
        self.overrides = SimulationOverrides::from_record(&record);
        self.record = Some(record);
    }

    /// Abandon a pending customer and fall back to whatever is still loaded.
    pub(crate) fn revert_pending(&mut self) {
        self.customer_id = self.record.as_ref().map(|r| r.id());
    }

    /// Move the sliders of the settled customer.
    pub(crate) fn apply_slider(
        &mut self,
        input: &SliderInput,
    ) -> Result<SimulationOverrides, Precondition> {
        self.settled_customer()?;
        input.apply(&mut self.overrides);
        Ok(self.overrides)
    }

    /// The loaded customer, provided no other customer is still being analyzed.
    pub fn settled_customer(&self) -> Result<CustomerId, Precondition> {
        let loaded = self.record.as_ref().map(|r| r.id());
        match (self.customer_id, loaded) {
            (Some(pending), loaded) if loaded != Some(pending) => {
                Err(Precondition::AnalysisPending(pending))
            }
            (_, Some(id)) => Ok(id),
            (_, None) => Err(Precondition::NoCustomer),
        }
    }

    /// Inputs for a live prediction of the settled customer.
    pub fn simulation_input(&self) -> Result<SimulationInput, Precondition> {
        self.settled_customer()?;
        let record = self.record.clone().ok_or(Precondition::NoCustomer)?;
        Ok(SimulationInput {
            generation: self.generation,
            record,
            overrides: self.overrides,
        })
    }
}

#[derive(Clone, Debug)]
pub struct SimulationInput {
    pub generation: Generation,
    pub record: CustomerRecord,
    pub overrides: SimulationOverrides,
}

/// Shared handle to the process-wide [`SessionContext`].
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionContext>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_new_intent(&self) -> Generation {
        self.inner.lock().begin_new_intent()
    }

    /// Start an intent about `id`: bump the generation and mark `id` pending.
    pub fn begin_for(&self, id: CustomerId) -> Generation {
        let mut ctx = self.inner.lock();
        let generation = ctx.begin_new_intent();
        ctx.set_pending(id);
        generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.inner.lock().is_current(generation)
    }

    /// Run `f` only when `generation` is still current. The check and the mutation
    /// happen under the same lock, so a newer intent cannot slip in between.
    pub fn apply_if_current<R>(
        &self,
        generation: Generation,
        f: impl FnOnce(&mut SessionContext) -> R,
    ) -> Option<R> {
        let mut ctx = self.inner.lock();
        if !ctx.is_current(generation) {
            return None;
        }
        Some(f(&mut ctx))
    }

    pub fn with<R>(&self, f: impl FnOnce(&SessionContext) -> R) -> R {
        f(&self.inner.lock())
    }

    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn snapshot(&self) -> SessionContext {
        self.inner.lock().clone()
    }
}

/// Latest-request-wins ticketing for work that is not tied to a selection intent.
#[derive(Debug, Default)]
pub struct LatestOnly {
    counter: AtomicU64,
}

impl LatestOnly {
    pub fn issue(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.counter.load(Ordering::Acquire) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64) -> CustomerRecord {
        serde_json::from_value(json!({"customer_id": id, "usage_drop_30d_pct": 10, "tickets_30d": 1}))
            .unwrap()
    }

    #[test]
    fn generation_increments_by_one_per_intent() {
        let session = Session::new();
        let g1 = session.begin_new_intent();
        let g2 = session.begin_for(CustomerId(4));
        assert_eq!(g2.value(), g1.value() + 1);
        assert!(!session.is_current(g1));
        assert!(session.is_current(g2));
    }

    #[test]
    fn stale_generation_cannot_apply() {
        let session = Session::new();
        let old = session.begin_for(CustomerId(1));
        let new = session.begin_for(CustomerId(2));
        assert!(session.apply_if_current(old, |ctx| ctx.load(record(1))).is_none());
        assert!(session.apply_if_current(new, |ctx| ctx.load(record(2))).is_some());
        assert_eq!(session.snapshot().record().map(|r| r.id()), Some(CustomerId(2)));
    }

    #[test]
    fn simulation_waits_for_pending_customer() {
        let session = Session::new();
        assert_eq!(
            session.with(|ctx| ctx.simulation_input()).err(),
            Some(Precondition::NoCustomer)
        );
        let g = session.begin_for(CustomerId(1));
        session.apply_if_current(g, |ctx| ctx.load(record(1)));
        let input = session.with(|ctx| ctx.simulation_input()).expect("input");
        assert_eq!(input.overrides.usage_drop_pct, 10.0);
        session.begin_for(CustomerId(2));
        assert_eq!(
            session.with(|ctx| ctx.simulation_input()).err(),
            Some(Precondition::AnalysisPending(CustomerId(2)))
        );
        session.with_mut(|ctx| ctx.revert_pending());
        assert!(session.with(|ctx| ctx.simulation_input()).is_ok());
    }

    #[test]
    fn settled_customer_ignores_a_pending_switch() {
        let session = Session::new();
        let g = session.begin_for(CustomerId(1));
        assert_eq!(
            session.with(|ctx| ctx.settled_customer()),
            Err(Precondition::AnalysisPending(CustomerId(1)))
        );
        session.apply_if_current(g, |ctx| ctx.load(record(1)));
        assert_eq!(session.with(|ctx| ctx.settled_customer()), Ok(CustomerId(1)));

        session.begin_for(CustomerId(2));
        let moved = session.with_mut(|ctx| {
            ctx.apply_slider(&SliderInput {
                usage_drop_pct: Some(70.0),
                tickets_30d: None,
            })
        });
        assert_eq!(moved, Err(Precondition::AnalysisPending(CustomerId(2))));
        assert_eq!(session.snapshot().overrides().usage_drop_pct, 10.0);
    }

    #[test]
    fn latest_only_tracks_newest_ticket() {
        let t = LatestOnly::default();
        let a = t.issue();
        let b = t.issue();
        assert!(!t.is_latest(a));
        assert!(t.is_latest(b));
    }
}
