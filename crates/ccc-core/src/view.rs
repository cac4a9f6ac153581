//! Display state the core guarantees to renderers.
//!
//! The core never draws. It keeps a [`ViewState`] snapshot and publishes every change
//! on the bus so any renderer (terminal, web bridge, test) can follow along.

use ccc_events::{topics, Bus};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{
    ActionPlan, CounterfactualResult, CustomerId, FeatureImportance, Recommendation, RegretRow,
    SimulationOverrides, HIGH_RISK_THRESHOLD,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTone {
    High,
    Low,
}

impl RiskTone {
    pub fn of(risk: f64) -> Self {
        if risk >= HIGH_RISK_THRESHOLD {
            RiskTone::High
        } else {
            RiskTone::Low
        }
    }

    pub fn badge(&self) -> &'static str {
        match self {
            RiskTone::High => "HIGH RISK",
            RiskTone::Low => "LOW RISK",
        }
    }
}

/// Header for the analyzed customer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectedSummary {
    pub customer_id: CustomerId,
    pub tone: RiskTone,
    pub badge: String,
    pub base_pct: String,
    pub with_action_pct: String,
    pub delta: f64,
}

impl SelectedSummary {
    pub fn from_counterfactual(cf: &CounterfactualResult) -> Self {
        let tone = RiskTone::of(cf.churn_risk_base);
        Self {
            customer_id: cf.customer_id,
            tone,
            badge: tone.badge().to_string(),
            base_pct: format!("{:.1}%", cf.churn_risk_base * 100.0),
            with_action_pct: format!("{:.1}%", cf.churn_risk_counterfactual * 100.0),
            delta: cf.delta(),
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "Customer {} [{}] Base Risk: {} | With Action: {}",
            self.customer_id, self.badge, self.base_pct, self.with_action_pct
        )
    }
}

/// Live risk gauge. The angle maps risk 0 to -90 degrees and risk 1 to +90 degrees.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GaugeReading {
    #[default]
    Idle,
    Unavailable,
    Available {
        risk: f64,
        percent: u32,
        angle_degrees: f64,
        tone: RiskTone,
    },
}

impl GaugeReading {
    pub fn from_risk(risk: Option<f64>) -> Self {
        match risk {
            Some(r) if r.is_finite() => {
                let risk = r.clamp(0.0, 1.0);
                GaugeReading::Available {
                    risk,
                    percent: (risk * 100.0).round() as u32,
                    angle_degrees: gauge_angle(risk),
                    tone: RiskTone::of(risk),
                }
            }
            _ => GaugeReading::Unavailable,
        }
    }

    pub fn label(&self) -> String {
        match self {
            GaugeReading::Idle => "--".to_string(),
            GaugeReading::Unavailable => "not available".to_string(),
            GaugeReading::Available {
                percent,
                angle_degrees,
                ..
            } => format!("{percent}% ({angle_degrees:+.1}°)"),
        }
    }
}

pub fn gauge_angle(risk: f64) -> f64 {
    -90.0 + risk * 180.0
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "rows", rename_all = "snake_case")]
pub enum RegretTable {
    #[default]
    NotLoaded,
    Empty,
    Rows(Vec<RegretRow>),
}

impl RegretTable {
    pub fn from_rows(rows: Vec<RegretRow>) -> Self {
        if rows.is_empty() {
            RegretTable::Empty
        } else {
            RegretTable::Rows(rows)
        }
    }

    pub fn rows(&self) -> &[RegretRow] {
        match self {
            RegretTable::Rows(rows) => rows,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Reachable {
        base: String,
        latency_ms: u64,
    },
    Unreachable {
        base: String,
        detail: String,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ViewState {
    pub status: StatusLine,
    pub selected: Option<SelectedSummary>,
    pub importance: Vec<FeatureImportance>,
    pub gauge: GaugeReading,
    pub overrides: SimulationOverrides,
    pub plan: ActionPlan,
    pub regret: RegretTable,
    pub recommendation: Option<Recommendation>,
    pub backend: Reachability,
}

/// Owner of the display snapshot and publisher of its changes.
pub struct ViewModel {
    state: Mutex<ViewState>,
    bus: Bus,
}

impl ViewModel {
    pub fn new(bus: Bus, plan: ActionPlan) -> Self {
        Self {
            state: Mutex::new(ViewState {
                plan,
                ..ViewState::default()
            }),
            bus,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> StatusLine {
        self.state.lock().status.clone()
    }

    pub fn set_status(&self, level: StatusLevel, message: impl Into<String>) {
        let line = StatusLine {
            level,
            message: message.into(),
        };
        match level {
            StatusLevel::Info => info!(target: "ccc.status", "{}", line.message),
            StatusLevel::Warn | StatusLevel::Error => {
                warn!(target: "ccc.status", "{}", line.message)
            }
        }
        self.state.lock().status = line.clone();
        self.bus.publish(topics::TOPIC_STATUS, &line);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.set_status(StatusLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.set_status(StatusLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.set_status(StatusLevel::Error, message);
    }

    /// Drop per-customer panels before a new customer is shown.
    pub(crate) fn clear_analysis(&self) {
        let mut state = self.state.lock();
        state.selected = None;
        state.gauge = GaugeReading::Idle;
        state.recommendation = None;
    }

    pub(crate) fn show_selected(&self, summary: SelectedSummary) {
        self.bus.publish(topics::TOPIC_SELECTION_ANALYZED, &summary);
        self.state.lock().selected = Some(summary);
    }

    pub(crate) fn show_importance(&self, features: Vec<FeatureImportance>) {
        self.bus.publish(topics::TOPIC_IMPORTANCE_UPDATED, &features);
        self.state.lock().importance = features;
    }

    pub(crate) fn show_overrides(&self, overrides: SimulationOverrides) {
        self.state.lock().overrides = overrides;
    }

    pub(crate) fn show_gauge(&self, gauge: GaugeReading, overrides: SimulationOverrides) {
        self.bus.publish(
            topics::TOPIC_SIMULATION_UPDATED,
            &serde_json::json!({ "gauge": &gauge, "overrides": overrides }),
        );
        let mut state = self.state.lock();
        state.gauge = gauge;
        state.overrides = overrides;
    }

    pub(crate) fn show_plan(&self, plan: ActionPlan) {
        self.bus.publish(topics::TOPIC_PLAN_CHANGED, &plan);
        self.state.lock().plan = plan;
    }

    pub(crate) fn show_regret(&self, table: RegretTable) {
        self.bus.publish(topics::TOPIC_REGRET_LOADED, &table);
        self.state.lock().regret = table;
    }

    pub fn regret(&self) -> RegretTable {
        self.state.lock().regret.clone()
    }

    pub(crate) fn show_recommendation(&self, rec: Recommendation) {
        self.bus.publish(topics::TOPIC_RECOMMENDATION_APPLIED, &rec);
        self.state.lock().recommendation = Some(rec);
    }

    pub(crate) fn show_backend(&self, reach: Reachability) {
        self.bus.publish(topics::TOPIC_BACKEND_PROBE, &reach);
        self.state.lock().backend = reach;
    }

    pub fn backend(&self) -> Reachability {
        self.state.lock().backend.clone()
    }

    pub(crate) fn publish<T: Serialize>(&self, topic: &str, payload: &T) {
        self.bus.publish(topic, payload);
    }
}
