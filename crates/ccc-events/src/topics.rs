//! Canonical view topics published by the orchestration core.
//!
//! Renderers subscribe to the bus and switch on these names. Keep the list
//! alphabetized within sections and favor dot.case names.

// Analysis
pub const TOPIC_IMPORTANCE_UPDATED: &str = "ccc.importance.updated";
pub const TOPIC_SELECTION_ANALYZED: &str = "ccc.selection.analyzed";
pub const TOPIC_SIMULATION_UPDATED: &str = "ccc.simulation.updated";

// Batch / actions
pub const TOPIC_ACTION_TRIGGERED: &str = "ccc.action.triggered";
pub const TOPIC_PLAN_CHANGED: &str = "ccc.plan.changed";
pub const TOPIC_RECOMMENDATION_APPLIED: &str = "ccc.recommendation.applied";
pub const TOPIC_REGRET_LOADED: &str = "ccc.regret.loaded";

// Operator
pub const TOPIC_BACKEND_PROBE: &str = "ccc.backend.probe";
pub const TOPIC_SETTINGS_SAVED: &str = "ccc.settings.saved";
pub const TOPIC_STATUS: &str = "ccc.status";
