/// Supervisory/health label for the outer process, distinct from the
/// wake/session `State::{OFF, ON}` machine owned by `yatagarasu-session`.
/// Purely observational; transitions here never gate core behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Starting,
    Running,
    Reconnecting,
    Stopping,
    Stopped,
}

pub struct AppStateCell {
    state: parking_lot::RwLock<AppState>,
}

impl AppStateCell {
    pub fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(AppState::Starting),
        }
    }

    pub fn set(&self, state: AppState) {
        tracing::debug!(?state, "app state transition");
        *self.state.write() = state;
    }

    pub fn get(&self) -> AppState {
        self.state.read().clone()
    }
}

impl Default for AppStateCell {
    fn default() -> Self {
        Self::new()
    }
}
