use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters surfaced by the AudioSource heartbeat (spec.md 4.1) and
/// the runtime's periodic stats tick. Purely observational; never consulted
/// by control flow.
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    pub frames_total: Arc<AtomicU64>,
    pub frames_since_heartbeat: Arc<AtomicU64>,
    pub reconnects: Arc<AtomicU64>,
    pub segments_emitted: Arc<AtomicU64>,
    pub segments_filtered: Arc<AtomicU64>,
    pub dispatches: Arc<AtomicU64>,
    pub dispatch_failures: Arc<AtomicU64>,
    pub tts_successes: Arc<AtomicU64>,
    pub tts_failures: Arc<AtomicU64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_heartbeat.fetch_add(1, Ordering::Relaxed);
    }

    pub fn take_heartbeat_frames(&self) -> u64 {
        self.frames_since_heartbeat.swap(0, Ordering::Relaxed)
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment_emitted(&self) {
        self.segments_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segment_filtered(&self) {
        self.segments_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, ok: bool) {
        if ok {
            self.dispatches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tts(&self, ok: bool) {
        if ok {
            self.tts_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tts_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
