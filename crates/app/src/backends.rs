//! Reference adapters for the two external collaborators the core only
//! consumes through a narrow interface (VAD probability, ASR transcribe).
//! Neither the VAD model nor the ASR model is part of this crate's scope;
//! these adapters shell out to external tools over stdin/stdout, the same
//! way AudioSource, Dispatcher, and FeedbackSpeaker reach their subprocesses.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use yatagarasu_stt::backend::{DomainAsrBackend, GeneralAsrBackend, GeneralAsrParams, SttError};
use yatagarasu_vad::backend::{VadBackend, VadBackendError};

/// Energy-based speech gate: RMS of the frame mapped into `[0, 1]` via a
/// fixed reference level. Used when no external VAD model is configured;
/// coarser than a trained model but self-contained and always available.
pub struct EnergyVadBackend {
    /// RMS value (in `[0, 1]` float-sample units) that maps to probability 1.0.
    full_scale_rms: f32,
}

impl EnergyVadBackend {
    pub fn new() -> Self {
        Self {
            full_scale_rms: 0.05,
        }
    }

    fn rms(frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = frame.iter().map(|x| x * x).sum();
        (sum_sq / frame.len() as f32).sqrt()
    }
}

impl Default for EnergyVadBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VadBackend for EnergyVadBackend {
    async fn probability(&self, frame: &[f32], _sample_rate: u32) -> Result<f32, VadBackendError> {
        let p = Self::rms(frame) / self.full_scale_rms;
        Ok(p.clamp(0.0, 1.0))
    }

    async fn has_speech_in_range(
        &self,
        frame: &[f32],
        sample_rate: u32,
    ) -> Result<bool, VadBackendError> {
        Ok(self.probability(frame, sample_rate).await? >= 0.3)
    }
}

fn f32_samples_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

async fn run_transcriber_process(
    command: &str,
    sample_rate: u32,
    samples: &[f32],
    timeout_sec: f64,
    extra_args: &[String],
) -> Result<String, SttError> {
    let tokens = shell_words::split(command)
        .map_err(|e| SttError::Failed(format!("failed to tokenize stt command: {e}")))?;
    let (program, base_args) = tokens
        .split_first()
        .ok_or_else(|| SttError::Failed("empty stt command".to_string()))?;

    let mut child = Command::new(program)
        .args(base_args)
        .args(extra_args)
        .arg("--sample-rate")
        .arg(sample_rate.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SttError::Failed(format!("failed to spawn stt backend: {e}")))?;

    let payload = f32_samples_to_le_bytes(samples);
    let timeout = Duration::from_secs_f64(timeout_sec.max(1.0));

    if let Some(mut stdin) = child.stdin.take() {
        tokio::time::timeout(timeout, stdin.write_all(&payload))
            .await
            .map_err(|_| SttError::Failed("timed out writing pcm to stt backend".to_string()))?
            .map_err(|e| SttError::Failed(e.to_string()))?;
    }

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SttError::Failed("stt backend produced no stdout pipe".to_string()))?;
    let mut text = String::new();
    tokio::time::timeout(timeout, stdout.read_to_string(&mut text))
        .await
        .map_err(|_| SttError::Failed("timed out reading stt backend output".to_string()))?
        .map_err(|e| SttError::Failed(e.to_string()))?;

    let status = child
        .wait()
        .await
        .map_err(|e| SttError::Failed(e.to_string()))?;
    if !status.success() {
        return Err(SttError::Failed(format!(
            "stt backend exited with {status}"
        )));
    }

    Ok(text.trim().to_string())
}

/// Shells out to a `faster-whisper`-style CLI, passing the anti-hallucination
/// parameters as flags and the raw PCM on stdin.
pub struct ProcessGeneralAsrBackend {
    command: String,
    timeout_sec: f64,
}

impl ProcessGeneralAsrBackend {
    pub fn new(command: String, timeout_sec: f64) -> Self {
        Self {
            command,
            timeout_sec,
        }
    }
}

#[async_trait]
impl GeneralAsrBackend for ProcessGeneralAsrBackend {
    async fn transcribe(
        &self,
        pcm_f32: &[f32],
        sample_rate: u32,
        params: &GeneralAsrParams,
    ) -> Result<String, SttError> {
        let mut args = vec![
            "--beam-size".to_string(),
            params.beam_size.to_string(),
            "--no-speech-threshold".to_string(),
            params.no_speech_threshold.to_string(),
            "--log-prob-threshold".to_string(),
            params.log_prob_threshold.to_string(),
            "--compression-ratio-threshold".to_string(),
            params.compression_ratio_threshold.to_string(),
            "--temperature".to_string(),
            params
                .temperature
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(","),
        ];
        if !params.condition_on_previous_text {
            args.push("--no-condition-on-previous-text".to_string());
        }
        if let Some(best_of) = params.best_of {
            args.push("--best-of".to_string());
            args.push(best_of.to_string());
        }
        if let Some(language) = &params.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        if let Some(prompt) = &params.initial_prompt {
            args.push("--initial-prompt".to_string());
            args.push(prompt.clone());
        }
        if let Some(hotwords) = &params.hotwords {
            args.push("--hotwords".to_string());
            args.push(hotwords.clone());
        }

        run_transcriber_process(&self.command, sample_rate, pcm_f32, self.timeout_sec, &args).await
    }
}

/// Shells out to a `reazonspeech-k2`-style CLI with raw PCM on stdin, no
/// extra parameter surface.
pub struct ProcessDomainAsrBackend {
    command: String,
    timeout_sec: f64,
}

impl ProcessDomainAsrBackend {
    pub fn new(command: String, timeout_sec: f64) -> Self {
        Self {
            command,
            timeout_sec,
        }
    }
}

#[async_trait]
impl DomainAsrBackend for ProcessDomainAsrBackend {
    async fn transcribe(&self, pcm_f32: &[f32], sample_rate: u32) -> Result<String, SttError> {
        run_transcriber_process(&self.command, sample_rate, pcm_f32, self.timeout_sec, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn energy_backend_gates_silence_below_threshold() {
        let backend = EnergyVadBackend::new();
        let silence = vec![0.0f32; 1280];
        let p = backend.probability(&silence, 16_000).await.unwrap();
        assert!(p < 0.1);
    }

    #[tokio::test]
    async fn energy_backend_gates_loud_frame_above_threshold() {
        let backend = EnergyVadBackend::new();
        let loud: Vec<f32> = (0..1280)
            .map(|i| if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        let p = backend.probability(&loud, 16_000).await.unwrap();
        assert!(p >= 0.5);
    }
}
