pub mod clock;
pub mod error;
pub mod shutdown;
pub mod state;
pub mod telemetry;

pub use clock::{elapsed_since, MonotonicClock};
pub use error::{
    AudioError, ConfigError, DispatchError, FeedbackError, SttError, YatagarasuError,
};
pub use shutdown::{ShutdownGuard, ShutdownHandler};
pub use state::{AppState, AppStateCell};
pub use telemetry::PipelineMetrics;
