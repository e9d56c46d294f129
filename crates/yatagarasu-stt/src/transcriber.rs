use tracing::warn;

use crate::backend::{BackendHandle, GeneralAsrParams};

/// Segments longer than this are split into consecutive, non-overlapping
/// sub-ranges for the domain-tuned backend. Fixed, not configurable.
pub const MAX_SEGMENT_SEC: f64 = 28.0;

#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    pub sample_rate: u32,
    pub beam_size: u32,
    /// `None` means "auto" (no language hint passed to the backend).
    pub language: Option<String>,
    pub wake_words: Vec<String>,
    pub stop_words: Vec<String>,
}

/// Backend-agnostic façade over the general and domain-tuned ASR backends.
pub struct Transcriber {
    backend: BackendHandle,
    cfg: TranscriberConfig,
}

impl Transcriber {
    pub fn new(backend: BackendHandle, cfg: TranscriberConfig) -> Self {
        Self { backend, cfg }
    }

    /// Converts little-endian i16 PCM to float32 and dispatches to whichever
    /// backend is configured. `state_is_off` selects the hotwords hint used
    /// by the general backend's recovery pass.
    pub async fn transcribe(&self, pcm_i16_bytes: &[u8], state_is_off: bool) -> String {
        let samples: Vec<f32> = pcm_i16_bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
            .collect();

        match &self.backend {
            BackendHandle::General(backend) => {
                self.transcribe_general(backend.as_ref(), &samples, state_is_off)
                    .await
            }
            BackendHandle::DomainTuned(backend) => {
                self.transcribe_domain_tuned(backend.as_ref(), &samples).await
            }
        }
    }

    async fn transcribe_general(
        &self,
        backend: &dyn crate::backend::GeneralAsrBackend,
        samples: &[f32],
        state_is_off: bool,
    ) -> String {
        let pass1 = GeneralAsrParams {
            beam_size: self.cfg.beam_size.max(1),
            best_of: None,
            temperature: vec![0.0],
            condition_on_previous_text: false,
            no_speech_threshold: 0.70,
            log_prob_threshold: -1.5,
            compression_ratio_threshold: 2.8,
            language: self.cfg.language.clone(),
            initial_prompt: Some(format!(
                "次の単語を聞き取ってください: {}",
                self.cfg.wake_words.join("、")
            )),
            hotwords: None,
        };

        match backend
            .transcribe(samples, self.cfg.sample_rate, &pass1)
            .await
        {
            Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "general backend pass 1 failed"),
        }

        let hotwords = if state_is_off {
            let mut seen = std::collections::HashSet::new();
            let words: Vec<String> = self
                .cfg
                .wake_words
                .iter()
                .chain(self.cfg.stop_words.iter())
                .filter(|w| seen.insert((*w).clone()))
                .cloned()
                .collect();
            Some(words.join(","))
        } else {
            None
        };

        let pass2 = GeneralAsrParams {
            beam_size: self.cfg.beam_size.max(2),
            best_of: Some(self.cfg.beam_size.max(5)),
            temperature: vec![0.0, 0.2, 0.4, 0.6],
            condition_on_previous_text: false,
            no_speech_threshold: 0.85,
            log_prob_threshold: -2.5,
            compression_ratio_threshold: 4.0,
            language: self.cfg.language.clone(),
            initial_prompt: None,
            hotwords,
        };

        match backend
            .transcribe(samples, self.cfg.sample_rate, &pass2)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "general backend pass 2 failed");
                String::new()
            }
        }
    }

    async fn transcribe_domain_tuned(
        &self,
        backend: &dyn crate::backend::DomainAsrBackend,
        samples: &[f32],
    ) -> String {
        let max_samples = (MAX_SEGMENT_SEC * self.cfg.sample_rate as f64) as usize;
        if samples.len() <= max_samples {
            return match backend.transcribe(samples, self.cfg.sample_rate).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(error = %e, "domain-tuned backend failed");
                    String::new()
                }
            };
        }

        let mut parts = Vec::new();
        for chunk in samples.chunks(max_samples) {
            match backend.transcribe(chunk, self.cfg.sample_rate).await {
                Ok(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "domain-tuned backend failed on sub-range"),
            }
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DomainAsrBackend, GeneralAsrBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubGeneral {
        pass1: Option<String>,
        pass2: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeneralAsrBackend for StubGeneral {
        async fn transcribe(
            &self,
            _pcm: &[f32],
            _sample_rate: u32,
            params: &GeneralAsrParams,
        ) -> Result<String, SttError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if params.initial_prompt.is_some() {
                Ok(self.pass1.clone().unwrap_or_default())
            } else {
                Ok(self.pass2.clone())
            }
        }
    }

    struct StubDomain;

    #[async_trait]
    impl DomainAsrBackend for StubDomain {
        async fn transcribe(&self, pcm: &[f32], _sample_rate: u32) -> Result<String, SttError> {
            Ok(format!("chunk:{}", pcm.len()))
        }
    }

    fn cfg() -> TranscriberConfig {
        TranscriberConfig {
            sample_rate: 16_000,
            beam_size: 5,
            language: None,
            wake_words: vec!["ヤタガラス".to_string()],
            stop_words: vec!["ストップ".to_string()],
        }
    }

    #[tokio::test]
    async fn pass1_success_skips_pass2() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = BackendHandle::General(Box::new(StubGeneral {
            pass1: Some("ヤタガラス 天気".to_string()),
            pass2: "should not be used".to_string(),
            calls: calls.clone(),
        }));
        let transcriber = Transcriber::new(backend, cfg());
        let samples = vec![0u8; 1000];
        let text = transcriber.transcribe(&samples, false).await;
        assert_eq!(text, "ヤタガラス 天気");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_pass1_falls_through_to_pass2() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = BackendHandle::General(Box::new(StubGeneral {
            pass1: None,
            pass2: "recovered text".to_string(),
            calls: calls.clone(),
        }));
        let transcriber = Transcriber::new(backend, cfg());
        let samples = vec![0u8; 1000];
        let text = transcriber.transcribe(&samples, true).await;
        assert_eq!(text, "recovered text");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct HotwordsCapture {
        seen: Arc<std::sync::Mutex<Option<String>>>,
    }

    #[async_trait]
    impl GeneralAsrBackend for HotwordsCapture {
        async fn transcribe(
            &self,
            _pcm: &[f32],
            _sample_rate: u32,
            params: &GeneralAsrParams,
        ) -> Result<String, SttError> {
            if params.initial_prompt.is_some() {
                Ok(String::new())
            } else {
                *self.seen.lock().unwrap() = params.hotwords.clone();
                Ok("done".to_string())
            }
        }
    }

    #[tokio::test]
    async fn pass2_hotwords_dedup_non_adjacent_duplicates() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let backend = BackendHandle::General(Box::new(HotwordsCapture { seen: seen.clone() }));
        let mut cfg = cfg();
        cfg.wake_words = vec!["ヤタガラス".to_string(), "ストップ".to_string()];
        cfg.stop_words = vec!["ストップ".to_string(), "ヤタガラス".to_string()];
        let transcriber = Transcriber::new(backend, cfg);
        let samples = vec![0u8; 1000];
        let _ = transcriber.transcribe(&samples, true).await;
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some("ヤタガラス,ストップ".to_string())
        );
    }

    #[tokio::test]
    async fn domain_backend_splits_long_segments() {
        let backend = BackendHandle::DomainTuned(Box::new(StubDomain));
        let transcriber = Transcriber::new(backend, cfg());
        // 60 seconds of samples at 16kHz -> should split into 3 chunks (28+28+4s)
        let samples = vec![0u8; 60 * 16_000 * 2];
        let text = transcriber.transcribe(&samples, false).await;
        assert_eq!(text.split(' ').count(), 3);
    }

    #[tokio::test]
    async fn domain_backend_short_segment_not_split() {
        let backend = BackendHandle::DomainTuned(Box::new(StubDomain));
        let transcriber = Transcriber::new(backend, cfg());
        let samples = vec![0u8; 2 * 16_000 * 2];
        let text = transcriber.transcribe(&samples, false).await;
        assert_eq!(text.split(' ').count(), 1);
    }
}
