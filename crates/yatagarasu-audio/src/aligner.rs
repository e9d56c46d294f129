use std::collections::VecDeque;

/// A fixed-size block of mono PCM samples, immutable once formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
}

/// Accumulates arbitrary-sized byte reads from `AudioSource` and emits
/// fixed-size PCM frames on exact sample boundaries. The tail (< `frame_bytes`)
/// is preserved across reads but discarded on stream break/reconnect so a
/// reconnect never glues unrelated audio together across a sample boundary.
pub struct FrameAligner {
    buffer: VecDeque<u8>,
    frame_bytes: usize,
}

impl FrameAligner {
    /// `frame_bytes` must be a whole multiple of `bytes_per_sample * channels`
    /// (2 for mono 16-bit PCM); the caller computes it from `chunk_ms`.
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(frame_bytes * 2),
            frame_bytes,
        }
    }

    /// Feeds newly-read bytes in and drains as many complete frames as are
    /// available.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend(bytes.iter().copied());
        let mut out = Vec::new();
        while self.buffer.len() >= self.frame_bytes {
            let frame_bytes: Vec<u8> = self.buffer.drain(..self.frame_bytes).collect();
            out.push(Frame { bytes: frame_bytes });
        }
        out
    }

    /// Drops any partial tail buffered across a stream break/reconnect.
    pub fn reset_on_stream_break(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                dropped_bytes = self.buffer.len(),
                "discarding partial frame tail on stream break"
            );
            self.buffer.clear();
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Bytes currently held in the partial-tail buffer, for heartbeat reporting.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Computes `frame_bytes` from `chunk_ms`, `sample_rate`, and `channels`, per
/// the PCM contract (16-bit little-endian samples).
pub fn frame_bytes_for(chunk_ms: u32, sample_rate: u32, channels: u16) -> usize {
    let samples_per_frame = (sample_rate as u64 * chunk_ms as u64 / 1000) as usize;
    samples_per_frame * 2 * channels as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_size_matches_spec() {
        // 80ms @ 16kHz mono -> 1280 samples -> 2560 bytes
        assert_eq!(frame_bytes_for(80, 16_000, 1), 2560);
    }

    #[test]
    fn emits_frames_on_exact_multiples() {
        let mut aligner = FrameAligner::new(4);
        let frames = aligner.push(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes, vec![1, 2, 3, 4]);

        let frames = aligner.push(&[7, 8]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes, vec![5, 6, 7, 8]);
    }

    #[test]
    fn every_emitted_frame_is_a_whole_multiple_of_frame_bytes() {
        let mut aligner = FrameAligner::new(3);
        let mut all: Vec<u8> = Vec::new();
        for chunk_len in [1usize, 2, 5, 7, 11, 0, 3] {
            let chunk: Vec<u8> = (0..chunk_len as u8).collect();
            for f in aligner.push(&chunk) {
                assert_eq!(f.bytes.len() % 3, 0);
                all.extend(f.bytes);
            }
        }
        assert_eq!(all.len() % 3, 0);
    }

    #[test]
    fn partial_tail_is_dropped_on_stream_break() {
        let mut aligner = FrameAligner::new(4);
        let _ = aligner.push(&[1, 2, 3]);
        assert_eq!(aligner.buffer.len(), 3);
        aligner.reset_on_stream_break();
        assert_eq!(aligner.buffer.len(), 0);
    }
}
