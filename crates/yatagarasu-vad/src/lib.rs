pub mod backend;
pub mod filter;
pub mod segmenter;

pub use backend::{VadBackend, VadBackendError, VoiceDetector, DEFAULT_VAD_THRESHOLD};
pub use filter::{FilterVerdict, SegmentFilter, SegmentFilterConfig, MIN_TRANSCRIBE_RMS_DBFS};
pub use segmenter::{
    FrameOutcome, Segment, Segmenter, SEGMENT_END_SILENCE_FRAMES, VAD_HANGOVER_FRAMES,
};
