use std::process::Stdio;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time;
use tracing::{debug, info, warn};

use yatagarasu_foundation::error::AudioError;
use yatagarasu_foundation::telemetry::PipelineMetrics;

use crate::transport::{ConcreteTransport, Transport};

/// Audio filter applied to every decoder invocation. Fixed, not configurable.
pub const AUDIO_FILTER: &str = "highpass=f=120,lowpass=f=5000";
/// How long to wait for the decoder's stdout to become readable before
/// trying the next transport candidate.
pub const INITIAL_DATA_PROBE_SEC: u64 = 5;
const READINESS_POLL_MS: u64 = 500;
const SIGTERM_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    pub rtsp_url: String,
    pub transport: Transport,
    pub sample_rate: u32,
    pub channels: u16,
    pub reconnect_delay_sec: f64,
    /// 0 means unbounded.
    pub max_reconnect_attempts: u32,
    pub no_data_timeout_sec: f64,
    pub heartbeat_sec: f64,
    pub ffmpeg_bin: String,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            rtsp_url: String::new(),
            transport: Transport::Auto,
            sample_rate: 16_000,
            channels: 1,
            reconnect_delay_sec: 3.0,
            max_reconnect_attempts: 0,
            no_data_timeout_sec: 10.0,
            heartbeat_sec: 5.0,
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}

/// One scoped run of the decoder subprocess: owns the child process and its
/// stderr temp file for as long as the current transport connection lives.
/// Dropped (and the temp file unlinked) on every reconnect and on shutdown.
struct DecoderProcess {
    child: Child,
    stdout: ChildStdout,
    stderr_log: NamedTempFile,
    transport: ConcreteTransport,
}

impl DecoderProcess {
    async fn terminate(mut self) {
        if let Some(id) = self.child.id() {
            debug!(pid = id, "terminating decoder subprocess");
        }
        #[cfg(unix)]
        {
            use nix_signal_shim::send_sigterm;
            if let Some(id) = self.child.id() {
                send_sigterm(id);
            }
        }
        let waited = time::timeout(SIGTERM_GRACE, self.child.wait()).await;
        if waited.is_err() {
            warn!("decoder did not exit within grace period, sending SIGKILL");
            let _ = self.child.kill().await;
            let _ = self.child.wait().await;
        }
        // NamedTempFile unlinks on drop.
    }

    /// Tail of stderr (last up to 3 non-empty lines) for failure diagnostics.
    fn stderr_tail(&self) -> String {
        match std::fs::read_to_string(self.stderr_log.path()) {
            Ok(contents) => contents
                .lines()
                .filter(|l| !l.trim().is_empty())
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => String::new(),
        }
    }
}

/// A minimal SIGTERM helper kept as its own tiny module so the rest of the
/// file reads the same on unix and non-unix targets.
#[cfg(unix)]
mod nix_signal_shim {
    pub fn send_sigterm(pid: u32) {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

/// Launches and supervises the ffmpeg decoder subprocess that turns an RTSP
/// stream into raw PCM. Transparent reconnection and transport fallback are
/// handled internally; callers only see `read()` succeed or the reconnect
/// budget being exhausted.
pub struct AudioSource {
    cfg: AudioSourceConfig,
    process: Option<DecoderProcess>,
    reconnect_attempts: u32,
    last_data_at: Instant,
    last_heartbeat_at: Instant,
    metrics: PipelineMetrics,
    /// Set whenever `read()` reconnects after a stream interruption; the
    /// caller drains it with `take_reconnected()` to know when to drop the
    /// downstream `FrameAligner`'s partial tail.
    reconnected: bool,
    /// Bytes currently held in the caller's `FrameAligner`, reported via
    /// `set_buffered_bytes` for the heartbeat log.
    buffered_bytes: usize,
}

impl AudioSource {
    pub fn new(cfg: AudioSourceConfig, metrics: PipelineMetrics) -> Self {
        let now = Instant::now();
        Self {
            cfg,
            process: None,
            reconnect_attempts: 0,
            last_data_at: now,
            last_heartbeat_at: now,
            metrics,
            reconnected: false,
            buffered_bytes: 0,
        }
    }

    /// Drains and clears the stream-break flag set by `read()`.
    pub fn take_reconnected(&mut self) -> bool {
        std::mem::take(&mut self.reconnected)
    }

    /// Records the caller's current `FrameAligner` buffer length, reported on
    /// the next heartbeat line.
    pub fn set_buffered_bytes(&mut self, bytes: usize) {
        self.buffered_bytes = bytes;
    }

    fn build_command(&self, transport: ConcreteTransport) -> Command {
        let mut cmd = Command::new(&self.cfg.ffmpeg_bin);
        cmd.arg("-hide_banner").arg("-loglevel").arg("error");
        if transport.is_rtsp_transport_flag() {
            cmd.arg("-rtsp_transport").arg(transport.as_ffmpeg_value());
        }
        cmd.arg("-i")
            .arg(&self.cfg.rtsp_url)
            .arg("-vn")
            .arg("-af")
            .arg(AUDIO_FILTER)
            .arg("-f")
            .arg("s16le")
            .arg("-ac")
            .arg(self.cfg.channels.to_string())
            .arg("-ar")
            .arg(self.cfg.sample_rate.to_string())
            .arg("pipe:1");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Spawns the decoder for one transport candidate and runs the
    /// initial-data probe. Returns `Ok(None)` if the probe failed and the
    /// caller should try the next candidate.
    async fn try_transport(
        &self,
        transport: ConcreteTransport,
    ) -> Result<Option<DecoderProcess>, AudioError> {
        let mut cmd = self.build_command(transport);
        let stderr_log = NamedTempFile::new().map_err(AudioError::Io)?;
        let mut child = cmd
            .spawn()
            .map_err(|e| AudioError::DecoderSpawn(e.to_string()))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AudioError::DecoderSpawn("no stdout pipe".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AudioError::DecoderSpawn("no stderr pipe".into()))?;

        // Drain stderr into the temp file in the background for the lifetime
        // of this probe+connection attempt.
        let mut stderr_writer = stderr_log.reopen().map_err(AudioError::Io)?;
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        use std::io::Write;
                        let _ = stderr_writer.write_all(&buf[..n]);
                    }
                }
            }
        });

        let probe = time::timeout(
            Duration::from_secs(INITIAL_DATA_PROBE_SEC),
            wait_stdout_readable(&mut stdout, &mut child),
        )
        .await;

        match probe {
            Ok(Ok(true)) => {
                info!(transport = %transport, "committed to transport after initial-data probe");
                Ok(Some(DecoderProcess {
                    child,
                    stdout,
                    stderr_log,
                    transport,
                }))
            }
            Ok(Ok(false)) => {
                warn!(transport = %transport, "decoder exited before any data was readable");
                let _ = child.kill().await;
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(transport = %transport, "initial-data probe timed out");
                let _ = child.kill().await;
                Ok(None)
            }
        }
    }

    /// Tries every candidate transport for the configured strategy in order;
    /// on success leaves `self.process` populated. Does not sleep or loop —
    /// the outer reconnect loop in `read()` owns the retry delay.
    async fn connect(&mut self) -> Result<(), AudioError> {
        for transport in self.cfg.transport.candidates() {
            match self.try_transport(transport).await {
                Ok(Some(proc)) => {
                    self.process = Some(proc);
                    self.last_data_at = Instant::now();
                    return Ok(());
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(transport = %transport, error = %e, "transport probe errored");
                    continue;
                }
            }
        }
        Err(AudioError::AllTransportsExhausted)
    }

    /// Reads up to `max_bytes` of raw PCM. Transparently reconnects on
    /// stream interruption or no-data timeout, honoring `max_reconnect_attempts`.
    /// Returns `Err` only when the reconnect budget is exhausted.
    pub async fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioError> {
        loop {
            if self.process.is_none() {
                if let Err(e) = self.connect_with_retry().await {
                    return Err(e);
                }
            }

            self.maybe_heartbeat();

            let result = self.read_once(max_bytes).await;
            match result {
                Ok(bytes) => {
                    self.last_data_at = Instant::now();
                    self.reconnect_attempts = 0;
                    self.metrics.record_frame();
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(error = %e, "stream interrupted, reconnecting");
                    self.teardown_current().await;
                    self.metrics.record_reconnect();
                    self.reconnected = true;
                    continue;
                }
            }
        }
    }

    async fn read_once(&mut self, max_bytes: usize) -> Result<Vec<u8>, AudioError> {
        let no_data_timeout = Duration::from_secs_f64(self.cfg.no_data_timeout_sec.max(0.0));
        loop {
            let process = self.process.as_mut().expect("connected");

            let poll = time::timeout(
                Duration::from_millis(READINESS_POLL_MS),
                process.stdout.readable(),
            )
            .await;

            match poll {
                Ok(Ok(())) => {
                    let mut buf = vec![0u8; max_bytes];
                    match process.stdout.read(&mut buf).await {
                        Ok(0) => {
                            let tail = process.stderr_tail();
                            return Err(AudioError::StreamInterrupted(format!(
                                "decoder EOF; stderr tail: {tail}"
                            )));
                        }
                        Ok(n) => {
                            buf.truncate(n);
                            return Ok(buf);
                        }
                        Err(e) => return Err(AudioError::Io(e)),
                    }
                }
                Ok(Err(e)) => return Err(AudioError::Io(e)),
                Err(_) => {
                    // readiness poll timed out; check no-data timeout and exit status
                    if let Some(status) = self
                        .process
                        .as_mut()
                        .and_then(|p| p.child.try_wait().ok().flatten())
                    {
                        return Err(AudioError::StreamInterrupted(format!(
                            "decoder exited: {status}"
                        )));
                    }
                    if yatagarasu_foundation::elapsed_since(self.last_data_at) >= no_data_timeout {
                        return Err(AudioError::NoDataTimeout(no_data_timeout));
                    }
                }
            }
        }
    }

    async fn connect_with_retry(&mut self) -> Result<(), AudioError> {
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.reconnect_attempts += 1;
                    if self.cfg.max_reconnect_attempts > 0
                        && self.reconnect_attempts > self.cfg.max_reconnect_attempts
                    {
                        return Err(e);
                    }
                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_sec = self.cfg.reconnect_delay_sec,
                        "all transports failed this attempt, sleeping before retry"
                    );
                    time::sleep(Duration::from_secs_f64(self.cfg.reconnect_delay_sec.max(0.0)))
                        .await;
                }
            }
        }
    }

    fn maybe_heartbeat(&mut self) {
        let interval = Duration::from_secs_f64(self.cfg.heartbeat_sec.max(0.0));
        if interval.is_zero() {
            return;
        }
        if yatagarasu_foundation::elapsed_since(self.last_heartbeat_at) >= interval {
            self.last_heartbeat_at = Instant::now();
            info!(
                frames_since_last = self.metrics.take_heartbeat_frames(),
                frames_total = self.metrics.frames_total.load(std::sync::atomic::Ordering::Relaxed),
                connected = self.process.is_some(),
                buffered_bytes = self.buffered_bytes,
                "audio source heartbeat"
            );
        }
    }

    async fn teardown_current(&mut self) {
        if let Some(proc) = self.process.take() {
            proc.terminate().await;
        }
    }

    /// Terminates the decoder and unlinks its stderr temp file. Called on
    /// stop request.
    pub async fn shutdown(&mut self) {
        self.teardown_current().await;
    }
}

/// Waits for the decoder's stdout pipe to become readable without consuming
/// any bytes (consuming one byte would break 16-bit sample alignment).
/// Returns `Ok(false)` if the process exits before becoming readable.
async fn wait_stdout_readable(
    stdout: &mut ChildStdout,
    child: &mut Child,
) -> Result<bool, AudioError> {
    loop {
        tokio::select! {
            biased;
            status = child.wait() => {
                let status = status.map_err(AudioError::Io)?;
                debug!(%status, "decoder exited during probe");
                return Ok(false);
            }
            ready = stdout.readable() => {
                ready.map_err(AudioError::Io)?;
                return Ok(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = AudioSourceConfig::default();
        assert_eq!(cfg.sample_rate, 16_000);
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.reconnect_delay_sec, 3.0);
        assert_eq!(cfg.max_reconnect_attempts, 0);
        assert_eq!(cfg.no_data_timeout_sec, 10.0);
        assert_eq!(cfg.heartbeat_sec, 5.0);
    }

    #[test]
    fn audio_filter_is_fixed() {
        assert_eq!(AUDIO_FILTER, "highpass=f=120,lowpass=f=5000");
    }
}
