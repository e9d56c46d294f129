pub mod backend;
pub mod normalize;
pub mod transcriber;

pub use backend::{BackendHandle, DomainAsrBackend, GeneralAsrBackend, GeneralAsrParams, SttError};
pub use normalize::{match_vocabulary, normalize, strip_vocabulary};
pub use transcriber::{Transcriber, TranscriberConfig, MAX_SEGMENT_SEC};
