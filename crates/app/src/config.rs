use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use yatagarasu_foundation::ConfigError;

fn default_rtsp_transport() -> String {
    "auto".to_string()
}
fn default_stt_backend() -> String {
    "faster-whisper".to_string()
}
fn default_stt_command() -> String {
    "faster-whisper-cli".to_string()
}
fn default_vad_threshold() -> f32 {
    0.5
}
fn default_min_segment_sec() -> f64 {
    0.35
}
fn default_off_transcribe_cooldown_sec() -> f64 {
    0.0
}
fn default_session_end_silence_sec() -> f64 {
    3.0
}
fn default_silence_timeout_sec() -> f64 {
    30.0
}
fn default_chunk_ms() -> u32 {
    80
}
fn default_sample_rate() -> u32 {
    16_000
}
fn default_channels() -> u16 {
    1
}
fn default_dispatch_cmd() -> String {
    "../bin/yatagarasu".to_string()
}
fn default_dispatch_timeout_sec() -> f64 {
    20.0
}
fn default_standby_word() -> String {
    "待機します。".to_string()
}
fn default_wake_ack_speaker_id() -> u32 {
    68
}
fn default_wake_ack_timeout_sec() -> f64 {
    8.0
}
fn default_zunda_bin() -> String {
    "zunda".to_string()
}
fn default_tapovoice_bin() -> String {
    "tapovoice".to_string()
}
fn default_reconnect_delay_sec() -> f64 {
    3.0
}
fn default_no_data_timeout_sec() -> f64 {
    10.0
}
fn default_heartbeat_sec() -> f64 {
    5.0
}
fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file_dir() -> String {
    "logs".to_string()
}
fn default_log_retention_days() -> u64 {
    7
}
fn default_metrics_log_interval_sec() -> u64 {
    30
}

/// Every recognized configuration key from the external-interfaces surface,
/// loaded from defaults, then an optional `config.toml`, then environment
/// variables prefixed `YATAGARASU_` (e.g. `YATAGARASU_RTSP_URL`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub rtsp_url: String,

    #[serde(default = "default_rtsp_transport")]
    pub rtsp_transport: String,

    #[serde(default = "default_stt_backend")]
    pub stt_backend: String,

    /// Command line for the external STT process adapter. Not a spec.md key:
    /// the spec treats the backend as an opaque external collaborator, so
    /// this is the minimal addition needed to actually launch one.
    #[serde(default = "default_stt_command")]
    pub stt_command: String,
    #[serde(default = "default_dispatch_timeout_sec")]
    pub stt_timeout_sec: f64,

    #[serde(default)]
    pub wake_words: String,

    #[serde(default)]
    pub stop_words: String,

    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f32,
    #[serde(default = "default_min_segment_sec")]
    pub min_segment_sec: f64,
    #[serde(default = "default_off_transcribe_cooldown_sec")]
    pub off_transcribe_cooldown_sec: f64,

    #[serde(default = "default_session_end_silence_sec")]
    pub session_end_silence_sec: f64,
    #[serde(default = "default_silence_timeout_sec")]
    pub silence_timeout_sec: f64,

    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_dispatch_cmd")]
    pub dispatch_cmd: String,
    #[serde(default = "default_dispatch_timeout_sec")]
    pub dispatch_timeout_sec: f64,

    #[serde(default)]
    pub wake_ack_word: String,
    #[serde(default = "default_standby_word")]
    pub standby_word: String,
    #[serde(default = "default_wake_ack_speaker_id")]
    pub wake_ack_speaker_id: u32,
    #[serde(default = "default_wake_ack_timeout_sec")]
    pub wake_ack_timeout_sec: f64,
    #[serde(default = "default_zunda_bin")]
    pub zunda_bin: String,
    #[serde(default = "default_tapovoice_bin")]
    pub tapovoice_bin: String,

    #[serde(default = "default_reconnect_delay_sec")]
    pub reconnect_delay_sec: f64,
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_no_data_timeout_sec")]
    pub no_data_timeout_sec: f64,
    #[serde(default = "default_heartbeat_sec")]
    pub heartbeat_sec: f64,
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_file_dir")]
    pub log_file_dir: String,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
    #[serde(default = "default_metrics_log_interval_sec")]
    pub metrics_log_interval_sec: u64,

    /// Not a recognized config key; not config-loaded itself: `YATAGARASU_CWD`
    /// (what Dispatcher exports to the dispatched command) defaults to the
    /// process working directory.
    #[serde(skip)]
    pub workspace_path: PathBuf,
}

impl Config {
    /// Defaults -> optional `config.toml` in the current directory ->
    /// `YATAGARASU_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("YATAGARASU").separator("__"));

        let raw = builder.build().map_err(ConfigError::Parse)?;
        let mut cfg: Config = raw.try_deserialize().map_err(ConfigError::Parse)?;
        cfg.workspace_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        cfg.validate()?;
        Ok(cfg)
    }

    /// Hard-fails on missing required fields; clamps and warns on out-of-range
    /// numeric values rather than rejecting the whole configuration.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.rtsp_url.trim().is_empty() {
            return Err(ConfigError::MissingField("rtsp_url".to_string()));
        }
        if self.wake_words().is_empty() {
            return Err(ConfigError::MissingField("wake_words".to_string()));
        }
        if self.stop_words().is_empty() {
            return Err(ConfigError::MissingField("stop_words".to_string()));
        }

        if !(0.0..=1.0).contains(&self.vad_threshold) {
            let clamped = self.vad_threshold.clamp(0.0, 1.0);
            tracing::warn!(
                field = "vad_threshold",
                value = self.vad_threshold,
                clamped,
                "vad_threshold out of [0, 1], clamping"
            );
            self.vad_threshold = clamped;
        }

        if self.channels == 0 {
            tracing::warn!(
                field = "channels",
                value = self.channels,
                clamped = 1,
                "channels must be at least 1, clamping"
            );
            self.channels = 1;
        }

        Ok(())
    }

    pub fn wake_words(&self) -> Vec<String> {
        split_vocabulary(&self.wake_words)
    }

    pub fn stop_words(&self) -> Vec<String> {
        split_vocabulary(&self.stop_words)
    }
}

/// Splits on both `,` and `、`, trims, and drops empty entries.
fn split_vocabulary(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '、')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_comma_and_japanese_comma() {
        let words = split_vocabulary("ヤタガラス,ストップ、終了");
        assert_eq!(words, vec!["ヤタガラス", "ストップ", "終了"]);
    }

    #[test]
    fn validate_rejects_missing_rtsp_url() {
        let mut cfg = default_config_for_test();
        cfg.rtsp_url = "".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingField(f)) if f == "rtsp_url"
        ));
    }

    #[test]
    fn validate_clamps_out_of_range_vad_threshold() {
        let mut cfg = default_config_for_test();
        cfg.vad_threshold = 1.5;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.vad_threshold, 1.0);
    }

    #[test]
    fn validate_clamps_zero_channels() {
        let mut cfg = default_config_for_test();
        cfg.channels = 0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.channels, 1);
    }

    fn default_config_for_test() -> Config {
        Config {
            rtsp_url: "rtsp://example.invalid/stream".to_string(),
            rtsp_transport: default_rtsp_transport(),
            stt_backend: default_stt_backend(),
            stt_command: default_stt_command(),
            stt_timeout_sec: default_dispatch_timeout_sec(),
            wake_words: "ヤタガラス".to_string(),
            stop_words: "ストップ".to_string(),
            vad_threshold: default_vad_threshold(),
            min_segment_sec: default_min_segment_sec(),
            off_transcribe_cooldown_sec: default_off_transcribe_cooldown_sec(),
            session_end_silence_sec: default_session_end_silence_sec(),
            silence_timeout_sec: default_silence_timeout_sec(),
            chunk_ms: default_chunk_ms(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            dispatch_cmd: default_dispatch_cmd(),
            dispatch_timeout_sec: default_dispatch_timeout_sec(),
            wake_ack_word: String::new(),
            standby_word: default_standby_word(),
            wake_ack_speaker_id: default_wake_ack_speaker_id(),
            wake_ack_timeout_sec: default_wake_ack_timeout_sec(),
            zunda_bin: default_zunda_bin(),
            tapovoice_bin: default_tapovoice_bin(),
            reconnect_delay_sec: default_reconnect_delay_sec(),
            max_reconnect_attempts: 0,
            no_data_timeout_sec: default_no_data_timeout_sec(),
            heartbeat_sec: default_heartbeat_sec(),
            ffmpeg_bin: default_ffmpeg_bin(),
            log_level: default_log_level(),
            log_file_dir: default_log_file_dir(),
            log_retention_days: default_log_retention_days(),
            metrics_log_interval_sec: default_metrics_log_interval_sec(),
            workspace_path: PathBuf::from("."),
        }
    }
}
