use std::time::{Duration, Instant};

use crate::segmenter::Segment;

/// Loudness floor below which a segment is treated as too quiet to transcribe.
pub const MIN_TRANSCRIBE_RMS_DBFS: f64 = -50.0;

#[derive(Debug, Clone)]
pub struct SegmentFilterConfig {
    pub min_segment_sec: f64,
    pub off_transcribe_cooldown_sec: f64,
}

impl Default for SegmentFilterConfig {
    fn default() -> Self {
        Self {
            min_segment_sec: 0.35,
            off_transcribe_cooldown_sec: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    DroppedDuration,
    DroppedLoudness,
    DroppedOffCooldown,
}

impl FilterVerdict {
    pub fn passed(self) -> bool {
        matches!(self, FilterVerdict::Pass)
    }
}

/// Applies duration, loudness, and OFF-state cooldown gates, in that order,
/// before a segment is allowed to reach the transcriber.
pub struct SegmentFilter {
    cfg: SegmentFilterConfig,
}

impl SegmentFilter {
    pub fn new(cfg: SegmentFilterConfig) -> Self {
        Self { cfg }
    }

    pub fn check(
        &self,
        segment: &Segment,
        state_is_off: bool,
        last_off_transcribe_at: Option<Instant>,
        now: Instant,
    ) -> FilterVerdict {
        if segment.duration_sec() < self.cfg.min_segment_sec {
            tracing::debug!(
                duration_sec = segment.duration_sec(),
                min = self.cfg.min_segment_sec,
                "segment dropped: below minimum duration"
            );
            return FilterVerdict::DroppedDuration;
        }

        if segment.rms_dbfs() < MIN_TRANSCRIBE_RMS_DBFS {
            tracing::debug!(
                dbfs = segment.rms_dbfs(),
                "segment dropped: below loudness floor"
            );
            return FilterVerdict::DroppedLoudness;
        }

        if state_is_off && self.cfg.off_transcribe_cooldown_sec > 0.0 {
            if let Some(last) = last_off_transcribe_at {
                let cooldown = Duration::from_secs_f64(self.cfg.off_transcribe_cooldown_sec);
                if now.saturating_duration_since(last) < cooldown {
                    tracing::debug!("segment dropped: OFF-state cooldown active");
                    return FilterVerdict::DroppedOffCooldown;
                }
            }
        }

        FilterVerdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg_of(duration_sec: f64, sample_rate: u32, amplitude: i16) -> Segment {
        let samples = (duration_sec * sample_rate as f64).round() as usize;
        let mut bytes = Vec::with_capacity(samples * 2);
        for _ in 0..samples {
            bytes.extend_from_slice(&amplitude.to_le_bytes());
        }
        Segment { bytes, sample_rate }
    }

    #[test]
    fn duration_exactly_at_minimum_passes() {
        let filter = SegmentFilter::new(SegmentFilterConfig::default());
        let seg = seg_of(0.35, 16_000, 10_000);
        let now = Instant::now();
        assert_eq!(filter.check(&seg, false, None, now), FilterVerdict::Pass);
    }

    #[test]
    fn duration_just_under_minimum_drops() {
        let filter = SegmentFilter::new(SegmentFilterConfig::default());
        let seg = seg_of(0.34, 16_000, 10_000);
        let now = Instant::now();
        assert_eq!(
            filter.check(&seg, false, None, now),
            FilterVerdict::DroppedDuration
        );
    }

    #[test]
    fn off_cooldown_gate_drops_within_window() {
        let cfg = SegmentFilterConfig {
            min_segment_sec: 0.0,
            off_transcribe_cooldown_sec: 5.0,
        };
        let filter = SegmentFilter::new(cfg);
        let seg = seg_of(1.0, 16_000, 10_000);
        let now = Instant::now();
        assert_eq!(
            filter.check(&seg, true, Some(now), now),
            FilterVerdict::DroppedOffCooldown
        );
    }

    #[test]
    fn off_cooldown_gate_ignored_when_on() {
        let cfg = SegmentFilterConfig {
            min_segment_sec: 0.0,
            off_transcribe_cooldown_sec: 5.0,
        };
        let filter = SegmentFilter::new(cfg);
        let seg = seg_of(1.0, 16_000, 10_000);
        let now = Instant::now();
        assert_eq!(filter.check(&seg, false, Some(now), now), FilterVerdict::Pass);
    }
}
