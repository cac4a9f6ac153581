use parking_lot::RwLock;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::model::ActionPlan;
use crate::session::{LatestOnly, Session};
use crate::settings::SettingsGateway;
use crate::singleflight::Singleflight;
use crate::view::ViewModel;

/// Everything the components share, passed by reference into each of them.
///
/// Lock order when nesting: session, then plan, then view.
pub struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) api: ApiClient,
    pub(crate) session: Session,
    pub(crate) plan: RwLock<ActionPlan>,
    pub(crate) view: ViewModel,
    pub(crate) settings: SettingsGateway,
    pub(crate) flights: Singleflight,
    pub(crate) sim_ticket: LatestOnly,
    pub(crate) regret_ticket: LatestOnly,
}

impl Shared {
    pub(crate) fn new(
        config: ClientConfig,
        api: ApiClient,
        view: ViewModel,
        settings: SettingsGateway,
    ) -> Self {
        let plan = config.initial_plan();
        Self {
            config,
            api,
            session: Session::new(),
            plan: RwLock::new(plan),
            view,
            settings,
            flights: Singleflight::default(),
            sim_ticket: LatestOnly::default(),
            regret_ticket: LatestOnly::default(),
        }
    }

    pub fn plan(&self) -> ActionPlan {
        *self.plan.read()
    }

    pub(crate) fn set_plan(&self, plan: ActionPlan) {
        *self.plan.write() = plan;
        self.view.show_plan(plan);
    }
}
