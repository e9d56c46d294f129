pub mod dispatcher;
pub mod feedback;
pub mod state_machine;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use feedback::{FeedbackConfig, FeedbackSpeaker};
pub use state_machine::{IdleOutcome, SessionConfig, State, StateMachine, TranscriptOutcome};
