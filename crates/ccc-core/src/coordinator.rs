//! Single entry point for every host and user intent.
//!
//! Intents that start a new customer analysis bump the generation synchronously in
//! [`Coordinator::dispatch`], so generation order always follows arrival order even
//! when the spawned tasks run in a different order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ccc_events::{topics, Bus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::{self, TriggerOutcome};
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::context::Shared;
use crate::diagnostics;
use crate::error::ApiError;
use crate::model::{ActionPlan, CustomerId, SliderInput, MAX_TIMING_DAYS};
use crate::pipeline::{self, AnalysisRequest, PipelineOutcome};
use crate::recommend::{self, RecommendOutcome};
use crate::regret::{self, RegretOutcome};
use crate::selection::{self, SelectionSource, TabularResult};
use crate::session::SessionContext;
use crate::settings::{FileSettings, MemorySettings, Settings, SettingsGateway, SettingsStore};
use crate::simulation::{self, SimulationHandle};
use crate::tasks::TaskManager;
use crate::view::{Reachability, StatusLevel, ViewModel, ViewState};

const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Everything the host or the analyst can ask the core to do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Selection(TabularResult),
    Analyze { customer_id: CustomerId },
    Slider(SliderInput),
    SetPlan(ActionPlan),
    RefreshRegret,
    Recommend,
    TriggerAction,
    Probe,
    SaveSettings(Settings),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum IntentOutcome {
    NoSelection,
    Rejected(String),
    Analysis(PipelineOutcome),
    SliderQueued,
    PlanChanged(ActionPlan),
    Regret(RegretOutcome),
    Recommendation(RecommendOutcome),
    Trigger(TriggerOutcome),
    Probe(Reachability),
    SettingsSaved(Reachability),
    SettingsFailed(String),
}

enum Prepared {
    Done(IntentOutcome),
    Analysis(AnalysisRequest),
    Regret,
    Recommend,
    Trigger,
    Probe,
    SaveSettings(Settings),
}

struct Inner {
    shared: Arc<Shared>,
    simulation: SimulationHandle,
    tasks: Mutex<TaskManager>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Start with settings backed by `config.settings_path`, or in memory when unset.
    pub async fn from_config(config: ClientConfig, bus: Bus) -> Result<Self> {
        let store: Box<dyn SettingsStore> = match config.settings_path.as_deref() {
            Some(path) => Box::new(FileSettings::open(path)?),
            None => Box::new(MemorySettings::default()),
        };
        Self::start(config, store, bus).await
    }

    /// Build the shared context and spawn the background loops. Must run inside a
    /// tokio runtime.
    pub async fn start(config: ClientConfig, store: Box<dyn SettingsStore>, bus: Bus) -> Result<Self> {
        let settings = SettingsGateway::new(store);
        let persisted = settings.load().await;
        let api = ApiClient::new(&config).context("building API client")?;
        if let Some(base) = persisted.api_base.as_deref() {
            api.set_base(base);
        }
        let view = ViewModel::new(bus, config.initial_plan());
        let shared = Arc::new(Shared::new(config, api, view, settings));

        let mut tasks = TaskManager::new();
        let (simulation, sim_task) = simulation::spawn(Arc::clone(&shared));
        tasks.push(sim_task);
        if let Some(every) = shared.config.probe_interval() {
            tasks.push(diagnostics::spawn_periodic(Arc::clone(&shared), every));
        }
        info!(base = %shared.api.base(), tasks = ?tasks.names(), "coordinator started");
        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                simulation,
                tasks: Mutex::new(tasks),
            }),
        })
    }

    fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    /// Accept `intent` now and finish it on a spawned task.
    pub fn dispatch(&self, intent: Intent) -> JoinHandle<IntentOutcome> {
        let prepared = self.prepare(intent);
        let this = self.clone();
        tokio::spawn(async move { this.run(prepared).await })
    }

    /// Accept and finish `intent` inline.
    pub async fn handle(&self, intent: Intent) -> IntentOutcome {
        let prepared = self.prepare(intent);
        self.run(prepared).await
    }

    /// Pull the current selection from a host adapter and analyze it.
    pub async fn on_selection(&self, source: &dyn SelectionSource) -> IntentOutcome {
        match source.selection().await {
            Ok(result) => self.handle(Intent::Selection(result)).await,
            Err(err) => {
                let message = format!("Selection error: {err:#}");
                self.shared().view.error(message.clone());
                IntentOutcome::Rejected(message)
            }
        }
    }

    fn prepare(&self, intent: Intent) -> Prepared {
        let shared = self.shared();
        match intent {
            Intent::Selection(result) => match selection::extract(&result) {
                Ok(None) => {
                    debug!("empty selection ignored");
                    Prepared::Done(IntentOutcome::NoSelection)
                }
                Ok(Some(sel)) => {
                    if sel.ignored_rows > 0 {
                        debug!(ignored = sel.ignored_rows, "only the first selected row is analyzed");
                    }
                    let generation = shared.session.begin_for(sel.customer_id);
                    debug!(customer_id = %sel.customer_id, column = %sel.id_column, %generation, "selection accepted");
                    Prepared::Analysis(AnalysisRequest {
                        customer_id: sel.customer_id,
                        generation,
                        provisional: Some(sel.provisional),
                    })
                }
                Err(err) => {
                    let message = err.to_string();
                    shared.view.error(format!("Error: {message}"));
                    Prepared::Done(IntentOutcome::Rejected(message))
                }
            },
            Intent::Analyze { customer_id } => {
                if customer_id.0 == 0 {
                    return self.reject("customer_id must be at least 1".to_string());
                }
                let generation = shared.session.begin_for(customer_id);
                Prepared::Analysis(AnalysisRequest {
                    customer_id,
                    generation,
                    provisional: None,
                })
            }
            Intent::Slider(input) => {
                if self.inner.simulation.input(input) {
                    Prepared::Done(IntentOutcome::SliderQueued)
                } else {
                    self.reject("simulation loop has stopped".to_string())
                }
            }
            Intent::SetPlan(plan) => {
                if plan.timing_days > MAX_TIMING_DAYS {
                    return self.reject(format!(
                        "timing_days must be within 0..={MAX_TIMING_DAYS}, got {}",
                        plan.timing_days
                    ));
                }
                shared.set_plan(plan);
                Prepared::Done(IntentOutcome::PlanChanged(plan))
            }
            Intent::RefreshRegret => Prepared::Regret,
            Intent::Recommend => Prepared::Recommend,
            Intent::TriggerAction => Prepared::Trigger,
            Intent::Probe => Prepared::Probe,
            Intent::SaveSettings(settings) => {
                if let Some(base) = settings
                    .api_base
                    .as_deref()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                {
                    if let Err(err) = reqwest::Url::parse(base) {
                        return self.reject(format!("invalid API base {base:?}: {err}"));
                    }
                }
                Prepared::SaveSettings(settings)
            }
        }
    }

    fn reject(&self, message: String) -> Prepared {
        warn!(%message, "intent rejected");
        self.shared().view.error(message.clone());
        Prepared::Done(IntentOutcome::Rejected(message))
    }

    async fn run(&self, prepared: Prepared) -> IntentOutcome {
        let shared = self.shared();
        match prepared {
            Prepared::Done(outcome) => outcome,
            Prepared::Analysis(req) => IntentOutcome::Analysis(pipeline::run(shared, req).await),
            Prepared::Regret => IntentOutcome::Regret(regret::load(shared).await),
            Prepared::Recommend => IntentOutcome::Recommendation(recommend::apply(shared).await),
            Prepared::Trigger => IntentOutcome::Trigger(action::trigger(shared).await),
            Prepared::Probe => {
                let reach = diagnostics::probe(shared).await;
                let level = match reach {
                    Reachability::Reachable { .. } => StatusLevel::Info,
                    _ => StatusLevel::Warn,
                };
                shared.view.set_status(level, diagnostics::describe(&reach));
                IntentOutcome::Probe(reach)
            }
            Prepared::SaveSettings(settings) => save_settings(shared, settings).await,
        }
    }

    pub fn view(&self) -> ViewState {
        self.shared().view.snapshot()
    }

    pub fn session(&self) -> SessionContext {
        self.shared().session.snapshot()
    }

    pub fn plan(&self) -> ActionPlan {
        self.shared().plan()
    }

    pub fn bus(&self) -> &Bus {
        self.shared().view.bus()
    }

    pub fn api_base(&self) -> String {
        self.shared().api.base()
    }

    /// Point this session at `base` without persisting it.
    pub fn repoint(&self, base: &str) {
        self.shared().api.set_base(base);
    }

    pub async fn settings(&self) -> Settings {
        self.shared().settings.load().await
    }

    /// Customer ids the backend knows about.
    pub async fn customers(&self) -> Result<Vec<CustomerId>, ApiError> {
        self.shared().api.list_customers().await
    }

    /// Stop background loops, giving each a short grace period.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        tasks.shutdown_with_grace(SHUTDOWN_GRACE).await;
    }
}

async fn save_settings(shared: &Shared, settings: Settings) -> IntentOutcome {
    if let Err(err) = shared.settings.save(&settings).await {
        let detail = format!("{err:#}");
        warn!(error = %detail, "saving settings failed");
        shared.view.error(format!("Saving settings failed: {detail}"));
        return IntentOutcome::SettingsFailed(detail);
    }
    match settings
        .api_base
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
    {
        Some(base) => shared.api.set_base(base),
        None => shared.api.set_base(&shared.config.api_base()),
    }
    shared.view.publish(
        topics::TOPIC_SETTINGS_SAVED,
        &json!({
            "api_base": shared.api.base(),
            "slack_enabled": settings.slack_enabled,
        }),
    );
    shared.view.info("Saved settings.");
    info!(base = %shared.api.base(), slack = settings.slack_enabled, "settings saved");
    IntentOutcome::SettingsSaved(diagnostics::probe(shared).await)
}
