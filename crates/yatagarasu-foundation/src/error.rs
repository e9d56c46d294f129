use std::time::Duration;
use thiserror::Error;

/// Top-level error roll-up. Only the `Config`, `ModelInit`, and `DecoderSpawn`
/// variants are allowed to escape the top-level `run()` function; everything
/// else is caught at its component boundary and degrades to a logged, handled
/// condition.
#[derive(Error, Debug)]
pub enum YatagarasuError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error("model initialization failed: {0}")]
    ModelInit(String),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },
}

impl YatagarasuError {
    /// Maps this error to the process exit code contract from the spec:
    /// 0 normal stop, 1 exceeded reconnect attempts, 2 configuration/model-init error.
    pub fn exit_code(&self) -> i32 {
        match self {
            YatagarasuError::ReconnectExhausted { .. } => 1,
            YatagarasuError::Config(_) | YatagarasuError::ModelInit(_) => 2,
            YatagarasuError::Audio(AudioError::DecoderSpawn(_)) => 2,
            _ => 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration parsing error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("decoder binary not found or failed to spawn: {0}")]
    DecoderSpawn(String),

    #[error("transport probe failed for {transport}: {reason}")]
    TransportProbeFailed { transport: String, reason: String },

    #[error("no data received for {0:?}")]
    NoDataTimeout(Duration),

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("all transports exhausted this reconnect attempt")]
    AllTransportsExhausted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SttError {
    #[error("backend call failed: {0}")]
    BackendFailed(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to tokenize dispatch command: {0}")]
    Tokenize(String),

    #[error("failed to spawn dispatch command: {0}")]
    Spawn(String),

    #[error("dispatch command timed out after {0:?}")]
    Timeout(Duration),

    #[error("dispatch command exited non-zero: {0}")]
    NonZeroExit(i32),
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("tts stage {stage} failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },

    #[error("tts timed out after {0:?}")]
    Timeout(Duration),
}
