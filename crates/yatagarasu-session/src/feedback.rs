use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use yatagarasu_foundation::FeedbackError;

#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub speaker_id: u32,
    pub timeout_sec: f64,
    pub zunda_bin: String,
    pub tapovoice_bin: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            speaker_id: 68,
            timeout_sec: 8.0,
            zunda_bin: "zunda".to_string(),
            tapovoice_bin: "tapovoice".to_string(),
        }
    }
}

/// Speaks a short acknowledgement or standby word through a two-stage piped
/// TTS: `zunda <word> --stdout -s <speaker_id>` synthesizes, piped straight
/// into `tapovoice` for playback. An empty word is a no-op that reports
/// success without spawning anything.
pub struct FeedbackSpeaker {
    cfg: FeedbackConfig,
}

impl FeedbackSpeaker {
    pub fn new(cfg: FeedbackConfig) -> Self {
        Self { cfg }
    }

    pub async fn speak(&self, word: &str) -> Result<(), FeedbackError> {
        if word.is_empty() {
            return Ok(());
        }

        let timeout = Duration::from_secs_f64(self.cfg.timeout_sec.max(1.0));
        tokio::time::timeout(timeout, self.run_pipeline(word))
            .await
            .map_err(|_| FeedbackError::Timeout(timeout))?
    }

    async fn run_pipeline(&self, word: &str) -> Result<(), FeedbackError> {
        let mut zunda = Command::new(&self.cfg.zunda_bin)
            .arg(word)
            .arg("--stdout")
            .arg("-s")
            .arg(self.cfg.speaker_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FeedbackError::StageFailed {
                stage: "zunda",
                reason: e.to_string(),
            })?;

        let synthesized = zunda
            .stdout
            .take()
            .ok_or_else(|| FeedbackError::StageFailed {
                stage: "zunda",
                reason: "no stdout pipe".to_string(),
            })?;

        let mut tapovoice = Command::new(&self.cfg.tapovoice_bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FeedbackError::StageFailed {
                stage: "tapovoice",
                reason: e.to_string(),
            })?;

        let mut tapovoice_stdin =
            tapovoice
                .stdin
                .take()
                .ok_or_else(|| FeedbackError::StageFailed {
                    stage: "tapovoice",
                    reason: "no stdin pipe".to_string(),
                })?;

        let mut synthesized = synthesized;
        let copy_result = tokio::io::copy(&mut synthesized, &mut tapovoice_stdin).await;
        drop(tapovoice_stdin);
        if let Err(e) = copy_result {
            warn!(error = %e, "failed piping zunda output into tapovoice");
        }

        let zunda_status = zunda.wait().await.map_err(|e| FeedbackError::StageFailed {
            stage: "zunda",
            reason: e.to_string(),
        })?;
        if !zunda_status.success() {
            return Err(FeedbackError::StageFailed {
                stage: "zunda",
                reason: format!("exited with {zunda_status}"),
            });
        }

        let tapovoice_status = tapovoice
            .wait()
            .await
            .map_err(|e| FeedbackError::StageFailed {
                stage: "tapovoice",
                reason: e.to_string(),
            })?;
        if !tapovoice_status.success() {
            return Err(FeedbackError::StageFailed {
                stage: "tapovoice",
                reason: format!("exited with {tapovoice_status}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_word_is_a_no_op_success() {
        let speaker = FeedbackSpeaker::new(FeedbackConfig::default());
        assert!(speaker.speak("").await.is_ok());
    }

    #[tokio::test]
    async fn timeout_floor_is_one_second() {
        let cfg = FeedbackConfig {
            speaker_id: 1,
            timeout_sec: 0.0,
            ..FeedbackConfig::default()
        };
        let speaker = FeedbackSpeaker::new(cfg);
        // The pipeline will fail fast (missing binaries in the test sandbox)
        // well within the floored 1s timeout; this exercises the floor logic
        // rather than actual synthesis.
        let _ = speaker.speak("hello").await;
    }
}
