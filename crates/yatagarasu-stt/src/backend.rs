use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SttError {
    #[error("stt backend call failed: {0}")]
    Failed(String),
}

/// Parameters the general-purpose ASR backend (e.g. faster-whisper) accepts
/// per-call. The façade builds a different set of these for pass 1 and pass 2
/// of the anti-hallucination retry.
#[derive(Debug, Clone)]
pub struct GeneralAsrParams {
    pub beam_size: u32,
    pub best_of: Option<u32>,
    pub temperature: Vec<f32>,
    pub condition_on_previous_text: bool,
    pub no_speech_threshold: f32,
    pub log_prob_threshold: f32,
    pub compression_ratio_threshold: f32,
    pub language: Option<String>,
    pub initial_prompt: Option<String>,
    pub hotwords: Option<String>,
}

/// The domain-tuned backend (e.g. reazonspeech-k2) has no comparable
/// parameter surface; it is called with raw audio only.
#[async_trait]
pub trait GeneralAsrBackend: Send + Sync {
    async fn transcribe(
        &self,
        pcm_f32: &[f32],
        sample_rate: u32,
        params: &GeneralAsrParams,
    ) -> Result<String, SttError>;
}

#[async_trait]
pub trait DomainAsrBackend: Send + Sync {
    async fn transcribe(&self, pcm_f32: &[f32], sample_rate: u32) -> Result<String, SttError>;
}

/// Selects one of the two backend kinds at init; stored behind a tagged
/// variant so the façade never needs runtime backend-swapping.
pub enum BackendHandle {
    General(Box<dyn GeneralAsrBackend>),
    DomainTuned(Box<dyn DomainAsrBackend>),
}
