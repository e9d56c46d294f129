/// Number of consecutive silence frames after speech still folded into the
/// segment to bridge short intra-phrase dropouts. Fixed, not configurable.
pub const VAD_HANGOVER_FRAMES: u32 = 6;
/// Number of consecutive trailing-silence frames (post-hangover) required to
/// close a segment. Fixed, not configurable.
pub const SEGMENT_END_SILENCE_FRAMES: u32 = 5;

/// An append-only byte buffer of consecutive frames that began on a speech
/// frame and ended after `SEGMENT_END_SILENCE_FRAMES` trailing-silence
/// frames. Bytes are always a whole multiple of `bytes_per_sample * channels`.
#[derive(Debug, Clone)]
pub struct Segment {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
}

impl Segment {
    fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn duration_sec(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate as f64
    }

    /// RMS level in dBFS: `x = samples/32768`, `rms = sqrt(mean(x^2))`,
    /// `dBFS = 20*log10(rms)`, floored at -120 for a silent buffer.
    pub fn rms_dbfs(&self) -> f64 {
        if self.bytes.len() < 2 {
            return -120.0;
        }
        let samples: Vec<i16> = self
            .bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        let sum_sq: f64 = samples
            .iter()
            .map(|&s| {
                let x = s as f64 / 32768.0;
                x * x
            })
            .sum();
        let rms = (sum_sq / samples.len() as f64).sqrt();
        if rms <= 1e-9 {
            -120.0
        } else {
            20.0 * rms.log10()
        }
    }
}

/// Outcome of feeding one frame through the segmenter.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    /// True if this frame counts as voice activity for session idle timing
    /// (speech frames, and silence frames absorbed by the hangover window).
    pub voice_activity: bool,
    /// Set when this frame closed out a segment.
    pub finalized: Option<Segment>,
}

/// From a stream of `(frame_bytes, is_speech)`, produces variable-length
/// speech segments using a hangover policy and trailing-silence terminator.
pub struct Segmenter {
    sample_rate: u32,
    in_segment: bool,
    trailing_silence_frames: u32,
    hangover_remaining: u32,
    buffer: Vec<u8>,
}

impl Segmenter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            in_segment: false,
            trailing_silence_frames: 0,
            hangover_remaining: 0,
            buffer: Vec::new(),
        }
    }

    pub fn in_segment(&self) -> bool {
        self.in_segment
    }

    /// Feeds one frame. `frame_bytes` is the frame's raw PCM bytes.
    pub fn process(&mut self, frame_bytes: &[u8], is_speech: bool) -> FrameOutcome {
        if is_speech {
            self.in_segment = true;
            self.trailing_silence_frames = 0;
            self.buffer.extend_from_slice(frame_bytes);
            self.hangover_remaining = VAD_HANGOVER_FRAMES;
            return FrameOutcome {
                voice_activity: true,
                finalized: None,
            };
        }

        if !self.in_segment {
            return FrameOutcome::default();
        }

        if self.hangover_remaining > 0 {
            self.hangover_remaining -= 1;
            self.buffer.extend_from_slice(frame_bytes);
            self.trailing_silence_frames = 0;
            return FrameOutcome {
                voice_activity: true,
                finalized: None,
            };
        }

        self.buffer.extend_from_slice(frame_bytes);
        self.trailing_silence_frames += 1;

        if self.trailing_silence_frames >= SEGMENT_END_SILENCE_FRAMES {
            return FrameOutcome {
                voice_activity: false,
                finalized: Some(self.finalize()),
            };
        }

        FrameOutcome::default()
    }

    fn finalize(&mut self) -> Segment {
        let segment = Segment {
            bytes: std::mem::take(&mut self.buffer),
            sample_rate: self.sample_rate,
        };
        self.in_segment = false;
        self.trailing_silence_frames = 0;
        self.hangover_remaining = 0;
        segment
    }

    /// Forces a finalize of an in-progress segment, used on shutdown flush.
    pub fn force_finalize(&mut self) -> Option<Segment> {
        if self.in_segment {
            Some(self.finalize())
        } else {
            None
        }
    }
}
