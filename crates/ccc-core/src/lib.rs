//! Orchestration core for the Counterfactual Command Center dashboard client.
//!
//! The core turns host selection events, slider input and analyst actions into
//! generation-checked calls against the churn backend, and keeps a [`view::ViewState`]
//! that always reflects the most recent intent. Rendering happens elsewhere: every
//! view change is published on a [`ccc_events::Bus`].

pub mod action;
pub mod api;
mod config;
pub use config::{
    config_schema_json, load_config, parse_config, write_schema_file, ClientConfig,
    DEFAULT_API_BASE,
};
pub mod context;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod http_client;
pub mod model;
pub mod pipeline;
pub mod recommend;
pub mod regret;
pub mod selection;
pub mod session;
pub mod settings;
pub mod simulation;
pub mod singleflight;
pub mod tasks;
pub mod view;

pub use api::ApiClient;
pub use coordinator::{Coordinator, Intent, IntentOutcome};
pub use error::{ApiError, CoreError, Precondition, RecordError};
pub use model::{ActionPlan, ActionType, CustomerId, CustomerRecord, SliderInput};
pub use selection::{SelectionSource, TabularResult};
pub use settings::{FileSettings, MemorySettings, Settings, SettingsStore};
pub use view::{GaugeReading, RegretTable, StatusLevel, ViewState};
