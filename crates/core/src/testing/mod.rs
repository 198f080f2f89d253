//! Testing utilities and mock implementations.
//!
//! The mock engine lets the conversion pipeline run end to end (staging,
//! read back, cleanup) without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaforge_core::testing::{fixtures, MockEngine};
//!
//! let engine = Arc::new(MockEngine::new());
//! engine.set_run_duration(Duration::from_millis(50)).await;
//!
//! let result = service.convert(&fixtures::wav(), "toAudio", options).await?;
//! ```

mod mock_engine;

pub use mock_engine::{MockEngine, RecordedInvocation};

/// Test fixtures: minimal buffers that sniff as a given format.
///
/// They carry valid signatures but are not decodable media; use them with
/// [`MockEngine`], not with a real engine.
pub mod fixtures {
    /// A WAV header (RIFF/WAVE, PCM, stereo).
    pub fn wav() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 2, 0]); // PCM, 2 channels
        bytes.extend_from_slice(&44100u32.to_le_bytes());
        bytes.extend_from_slice(&(44100u32 * 4).to_le_bytes());
        bytes.extend_from_slice(&[4, 0, 16, 0]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    /// A PNG signature followed by an IHDR chunk header.
    pub fn png() -> Vec<u8> {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&64u32.to_be_bytes());
        bytes.extend_from_slice(&64u32.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    /// An ISO base media header with an `isom` brand.
    pub fn mp4() -> Vec<u8> {
        let mut bytes = 24u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&512u32.to_be_bytes());
        bytes.extend_from_slice(b"isomiso2");
        bytes
    }

    /// Bytes with no known signature.
    pub fn garbage() -> Vec<u8> {
        b"definitely not a media file".to_vec()
    }
}
