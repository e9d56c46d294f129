pub mod aligner;
pub mod source;
pub mod transport;

pub use aligner::{frame_bytes_for, Frame, FrameAligner};
pub use source::{AudioSource, AudioSourceConfig, AUDIO_FILTER, INITIAL_DATA_PROBE_SEC};
pub use transport::{ConcreteTransport, Transport};
