//! Format sniffing for incoming media buffers.
//!
//! Identification only looks at the leading magic bytes of a buffer; file
//! names and caller hints are never consulted. Sniffing has no side effects
//! and always runs before anything is written to the staging directory.

mod formats;

pub use formats::{demuxer_for, output_container, output_containers, OutputContainer};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Broad kind of a media buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        };
        f.write_str(name)
    }
}

/// Errors raised while identifying a buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SniffError {
    /// Nothing to inspect.
    #[error("empty buffer")]
    Empty,

    /// No known signature matched the leading bytes.
    #[error("no known signature in the first {inspected} bytes")]
    Unrecognized { inspected: usize },

    /// A signature matched, but it is not media the engine can read.
    #[error("{media_type} ({extension}) is not a supported media format")]
    Unsupported {
        extension: &'static str,
        media_type: &'static str,
    },
}

/// Container/codec identity of a sniffed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SniffedFormat {
    /// Canonical file extension (e.g. `mp4`, `png`).
    pub extension: &'static str,
    /// Media type as detected (e.g. `video/mp4`).
    pub media_type: &'static str,
    /// Broad media kind.
    pub kind: MediaKind,
    /// Engine demuxer used as the explicit input format hint.
    pub demuxer: &'static str,
}

/// Number of leading bytes quoted in `Unrecognized` errors.
const INSPECT_WINDOW: usize = 64;

/// Identifies a buffer from its magic bytes.
pub fn sniff(buffer: &[u8]) -> Result<SniffedFormat, SniffError> {
    if buffer.is_empty() {
        return Err(SniffError::Empty);
    }

    let detected = infer::get(buffer).ok_or(SniffError::Unrecognized {
        inspected: buffer.len().min(INSPECT_WINDOW),
    })?;

    let extension = detected.extension();
    let media_type = detected.mime_type();

    let kind = match detected.matcher_type() {
        infer::MatcherType::Image => MediaKind::Image,
        infer::MatcherType::Audio => MediaKind::Audio,
        infer::MatcherType::Video => MediaKind::Video,
        _ => {
            return Err(SniffError::Unsupported {
                extension,
                media_type,
            })
        }
    };

    let demuxer = demuxer_for(extension).ok_or(SniffError::Unsupported {
        extension,
        media_type,
    })?;

    Ok(SniffedFormat {
        extension,
        media_type,
        kind,
        demuxer,
    })
}

/// Raw bytes together with their sniffed identity.
///
/// Only constructible through [`MediaBuffer::sniff`], so every buffer that
/// reaches staging has a known format.
#[derive(Debug, Clone)]
pub struct MediaBuffer {
    bytes: Vec<u8>,
    format: SniffedFormat,
}

impl MediaBuffer {
    /// Sniffs `bytes` and wraps them on success.
    pub fn sniff(bytes: impl Into<Vec<u8>>) -> Result<Self, SniffError> {
        let bytes = bytes.into();
        let format = sniff(&bytes)?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> &SniffedFormat {
        &self.format
    }

    pub fn kind(&self) -> MediaKind {
        self.format.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
