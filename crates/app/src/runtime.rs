use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info, warn};

use yatagarasu_audio::{frame_bytes_for, AudioSource, AudioSourceConfig, FrameAligner, Transport};
use yatagarasu_foundation::{AppState, AppStateCell, PipelineMetrics, ShutdownGuard, YatagarasuError};
use yatagarasu_session::{
    Dispatcher, DispatcherConfig, FeedbackConfig, FeedbackSpeaker, IdleOutcome, SessionConfig,
    State, StateMachine, TranscriptOutcome,
};
use yatagarasu_stt::{BackendHandle, Transcriber, TranscriberConfig};
use yatagarasu_vad::backend::VadBackend;
use yatagarasu_vad::{Segment, SegmentFilter, SegmentFilterConfig, Segmenter, VoiceDetector};

use crate::config::Config;

/// Words the two transition-effect TTS calls use; threaded separately from
/// `Config` so the segment/idle handlers don't need the whole config.
struct Words {
    wake_ack_word: String,
    standby_word: String,
}

/// Wires AudioSource -> FrameAligner -> VoiceDetector -> Segmenter ->
/// SegmentFilter -> Transcriber -> MatchNormalizer+StateMachine ->
/// {Dispatcher, FeedbackSpeaker} into the single cooperative control loop.
pub async fn run<B: VadBackend>(
    cfg: Config,
    metrics: PipelineMetrics,
    shutdown: ShutdownGuard,
    app_state: std::sync::Arc<AppStateCell>,
    vad_backend: B,
    stt_backend: BackendHandle,
) -> Result<(), YatagarasuError> {
    let transport: Transport = cfg
        .rtsp_transport
        .parse()
        .map_err(YatagarasuError::ModelInit)?;

    let mut audio_source = AudioSource::new(
        AudioSourceConfig {
            rtsp_url: cfg.rtsp_url.clone(),
            transport,
            sample_rate: cfg.sample_rate,
            channels: cfg.channels,
            reconnect_delay_sec: cfg.reconnect_delay_sec,
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            no_data_timeout_sec: cfg.no_data_timeout_sec,
            heartbeat_sec: cfg.heartbeat_sec,
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
        },
        metrics.clone(),
    );

    let frame_bytes = frame_bytes_for(cfg.chunk_ms, cfg.sample_rate, cfg.channels);
    let mut aligner = FrameAligner::new(frame_bytes);
    let voice_detector = VoiceDetector::new(vad_backend, cfg.vad_threshold);
    let mut segmenter = Segmenter::new(cfg.sample_rate);
    let segment_filter = SegmentFilter::new(SegmentFilterConfig {
        min_segment_sec: cfg.min_segment_sec,
        off_transcribe_cooldown_sec: cfg.off_transcribe_cooldown_sec,
    });

    let transcriber = Transcriber::new(
        stt_backend,
        TranscriberConfig {
            sample_rate: cfg.sample_rate,
            beam_size: 5,
            language: None,
            wake_words: cfg.wake_words(),
            stop_words: cfg.stop_words(),
        },
    );

    let mut state_machine = StateMachine::new(
        SessionConfig {
            session_end_silence_sec: cfg.session_end_silence_sec,
            silence_timeout_sec: cfg.silence_timeout_sec,
            wake_words: cfg.wake_words(),
            stop_words: cfg.stop_words(),
        },
        Instant::now(),
    );

    let dispatcher = Dispatcher::new(DispatcherConfig {
        command: cfg.dispatch_cmd.clone(),
        timeout_sec: cfg.dispatch_timeout_sec,
        cwd: cfg.workspace_path.clone(),
    });

    let feedback = FeedbackSpeaker::new(FeedbackConfig {
        speaker_id: cfg.wake_ack_speaker_id,
        timeout_sec: cfg.wake_ack_timeout_sec,
        zunda_bin: cfg.zunda_bin.clone(),
        tapovoice_bin: cfg.tapovoice_bin.clone(),
    });

    let words = Words {
        wake_ack_word: cfg.wake_ack_word.clone(),
        standby_word: cfg.standby_word.clone(),
    };

    let mut last_metrics_log_at = Instant::now();
    let metrics_interval = std::time::Duration::from_secs(cfg.metrics_log_interval_sec);

    app_state.set(AppState::Running);

    loop {
        if shutdown.is_stop_requested() {
            break;
        }

        let bytes = audio_source.read(frame_bytes * 8).await?;
        if audio_source.take_reconnected() {
            aligner.reset_on_stream_break();
        }
        let frames = aligner.push(&bytes);
        audio_source.set_buffered_bytes(aligner.buffered_len());

        for frame in frames {
            let frame_i16: Vec<i16> = frame
                .bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            let is_speech = voice_detector.is_speech(&frame_i16, cfg.sample_rate).await;
            let outcome = segmenter.process(&frame.bytes, is_speech);
            state_machine.on_frame(Instant::now(), outcome.voice_activity);

            if let Some(segment) = outcome.finalized {
                handle_segment(
                    segment,
                    &segment_filter,
                    &transcriber,
                    &mut state_machine,
                    &dispatcher,
                    &feedback,
                    &words,
                    &metrics,
                )
                .await;
            } else if !is_speech && !segmenter.in_segment() && state_machine.state() == State::On {
                handle_idle(
                    Instant::now(),
                    &mut state_machine,
                    &dispatcher,
                    &feedback,
                    &words,
                    &metrics,
                )
                .await;
            }
        }

        if last_metrics_log_at.elapsed() >= metrics_interval {
            last_metrics_log_at = Instant::now();
            info!(
                segments_emitted = metrics.segments_emitted.load(Ordering::Relaxed),
                segments_filtered = metrics.segments_filtered.load(Ordering::Relaxed),
                dispatches = metrics.dispatches.load(Ordering::Relaxed),
                dispatch_failures = metrics.dispatch_failures.load(Ordering::Relaxed),
                "periodic metrics"
            );
        }
    }

    info!("stop requested, flushing and shutting down");
    app_state.set(AppState::Stopping);
    audio_source.shutdown().await;

    if segmenter.in_segment() {
        if let Some(segment) = segmenter.force_finalize() {
            handle_segment(
                segment,
                &segment_filter,
                &transcriber,
                &mut state_machine,
                &dispatcher,
                &feedback,
                &words,
                &metrics,
            )
            .await;
        }
    }

    if let Some(text) = state_machine.shutdown_flush() {
        info!("shutdown flush dispatch");
        match dispatcher.dispatch(&text).await {
            Ok(()) => metrics.record_dispatch(true),
            Err(e) => {
                warn!(error = %e, "shutdown flush dispatch failed");
                metrics.record_dispatch(false);
            }
        }
    }

    app_state.set(AppState::Stopped);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_segment(
    segment: Segment,
    segment_filter: &SegmentFilter,
    transcriber: &Transcriber,
    state_machine: &mut StateMachine,
    dispatcher: &Dispatcher,
    feedback: &FeedbackSpeaker,
    words: &Words,
    metrics: &PipelineMetrics,
) {
    let now = Instant::now();
    let verdict = segment_filter.check(
        &segment,
        state_machine.is_off(),
        state_machine.last_off_transcribe_at(),
        now,
    );

    if !verdict.passed() {
        debug!(?verdict, "segment dropped by filter");
        metrics.record_segment_filtered();
        return;
    }
    metrics.record_segment_emitted();

    let text = transcriber
        .transcribe(&segment.bytes, state_machine.is_off())
        .await;
    if text.is_empty() {
        return;
    }

    match state_machine.on_transcribed_segment(&text, now) {
        TranscriptOutcome::WokeUp => {
            info!(text = %text, "wake word detected, session open");
            let tts_ok = feedback.speak(&words.wake_ack_word).await.is_ok();
            metrics.record_tts(tts_ok);
            state_machine.finish_wake_transition(Instant::now(), tts_ok);
        }
        TranscriptOutcome::StoppedByWord => {
            info!("stop word detected, session closed");
            let tts_ok = feedback.speak(&words.standby_word).await.is_ok();
            metrics.record_tts(tts_ok);
            let _ = dispatcher; // no dispatch on stop-word close, per spec 4.8
        }
        TranscriptOutcome::Continued => {
            debug!(text = %text, "appended to session");
        }
        TranscriptOutcome::Ignored => {
            debug!(text = %text, "segment ignored by state machine");
        }
    }
}

async fn handle_idle(
    now: Instant,
    state_machine: &mut StateMachine,
    dispatcher: &Dispatcher,
    feedback: &FeedbackSpeaker,
    words: &Words,
    metrics: &PipelineMetrics,
) {
    match state_machine.on_idle_tick(now) {
        IdleOutcome::Dispatch(text) => {
            if state_machine.wake_ack_pending() {
                let ok = feedback.speak(&words.wake_ack_word).await.is_ok();
                metrics.record_tts(ok);
                if ok {
                    state_machine.clear_wake_ack_pending();
                }
            }
            info!(text = %text, "dispatching session");
            match dispatcher.dispatch(&text).await {
                Ok(()) => metrics.record_dispatch(true),
                Err(e) => {
                    warn!(error = %e, "dispatch failed");
                    metrics.record_dispatch(false);
                }
            }
        }
        IdleOutcome::CancelledByTimeout => {
            info!("session cancelled after full silence timeout");
        }
        IdleOutcome::None => {}
    }
}
