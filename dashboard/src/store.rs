use std::sync::Arc;

use dashboard_common::{Action, DashboardState, ErrorPropagation};
use tokio::sync::watch;
use tracing::debug;

/// Single owner of the dashboard state. Mutation only happens through
/// [`StateStore::dispatch`]; surfaces observe via [`StateStore::subscribe`].
#[derive(Clone)]
pub struct StateStore {
    sender: Arc<watch::Sender<DashboardState>>,
    propagation: ErrorPropagation,
}

impl StateStore {
    pub fn new(propagation: ErrorPropagation) -> Self {
        let (sender, _) = watch::channel(DashboardState::default());
        Self {
            sender: Arc::new(sender),
            propagation,
        }
    }

    pub fn dispatch(&self, action: Action) {
        debug!("dispatch {action:?}");
        let propagation = self.propagation;
        self.sender
            .send_modify(|state| state.apply(action, propagation));
    }

    pub fn snapshot(&self) -> DashboardState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.sender.subscribe()
    }
}
