use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VadBackendError {
    #[error("vad backend call failed: {0}")]
    Failed(String),
}

/// The narrow capability the VAD engine is consumed through. Implementations
/// are expected to wrap a model such as Silero VAD; this crate never depends
/// on a concrete model.
#[async_trait]
pub trait VadBackend: Send + Sync {
    /// Scalar speech probability in `[0, 1]` for one frame of float PCM.
    async fn probability(&self, frame: &[f32], sample_rate: u32) -> Result<f32, VadBackendError>;

    /// Fallback used when `probability` fails: a timestamp-range query with
    /// `min_speech_duration_ms = 0` (overriding the backend's usual 250ms
    /// cutoff, which is longer than one 80ms frame). A non-empty result means
    /// speech was found somewhere in the frame.
    async fn has_speech_in_range(
        &self,
        frame: &[f32],
        sample_rate: u32,
    ) -> Result<bool, VadBackendError>;
}

/// Default VAD decision threshold.
pub const DEFAULT_VAD_THRESHOLD: f32 = 0.5;

/// Per-frame speech gate built on top of a `VadBackend`.
pub struct VoiceDetector<B: VadBackend> {
    backend: B,
    threshold: f32,
}

impl<B: VadBackend> VoiceDetector<B> {
    pub fn new(backend: B, threshold: f32) -> Self {
        Self { backend, threshold }
    }

    /// Converts int16 PCM to float in `[-1, 1]`, queries the backend for a
    /// probability, and gates at `threshold`. Falls back to the timestamp-range
    /// query if the direct probability call fails.
    pub async fn is_speech(&self, frame_i16: &[i16], sample_rate: u32) -> bool {
        let float_frame: Vec<f32> = frame_i16.iter().map(|&s| s as f32 / 32768.0).collect();

        match self.backend.probability(&float_frame, sample_rate).await {
            Ok(p) => p >= self.threshold,
            Err(e) => {
                tracing::warn!(error = %e, "vad probability call failed, falling back to range query");
                match self.backend.has_speech_in_range(&float_frame, sample_rate).await {
                    Ok(has_speech) => has_speech,
                    Err(e) => {
                        tracing::warn!(error = %e, "vad fallback also failed, treating frame as silence");
                        false
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        probability: Result<f32, ()>,
        fallback: bool,
    }

    #[async_trait]
    impl VadBackend for FixedBackend {
        async fn probability(&self, _frame: &[f32], _sample_rate: u32) -> Result<f32, VadBackendError> {
            self.probability
                .map_err(|_| VadBackendError::Failed("boom".into()))
        }

        async fn has_speech_in_range(
            &self,
            _frame: &[f32],
            _sample_rate: u32,
        ) -> Result<bool, VadBackendError> {
            Ok(self.fallback)
        }
    }

    #[tokio::test]
    async fn gates_at_threshold() {
        let vd = VoiceDetector::new(
            FixedBackend { probability: Ok(0.6), fallback: false },
            DEFAULT_VAD_THRESHOLD,
        );
        assert!(vd.is_speech(&[0i16; 10], 16_000).await);

        let vd = VoiceDetector::new(
            FixedBackend { probability: Ok(0.4), fallback: false },
            DEFAULT_VAD_THRESHOLD,
        );
        assert!(!vd.is_speech(&[0i16; 10], 16_000).await);
    }

    #[tokio::test]
    async fn falls_back_on_backend_error() {
        let vd = VoiceDetector::new(
            FixedBackend { probability: Err(()), fallback: true },
            DEFAULT_VAD_THRESHOLD,
        );
        assert!(vd.is_speech(&[0i16; 10], 16_000).await);
    }
}
