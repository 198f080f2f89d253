//! Container tables shared by input sniffing and output selection.

/// Maps a sniffed extension to the engine demuxer that reads it.
///
/// The engine is always told which demuxer to use, so the input file
/// extension never decides how a staged buffer is parsed.
pub fn demuxer_for(extension: &str) -> Option<&'static str> {
    let demuxer = match extension {
        // Images
        "jpg" | "jpeg" => "jpeg_pipe",
        "png" => "png_pipe",
        "webp" => "webp_pipe",
        "bmp" => "bmp_pipe",
        "tif" | "tiff" => "tiff_pipe",
        "gif" => "gif",
        // Video
        "mp4" | "m4v" | "m4a" | "mov" | "3gp" => "mov",
        "mkv" | "webm" => "matroska",
        "avi" => "avi",
        "flv" => "flv",
        "mpg" | "mpeg" => "mpeg",
        "wmv" => "asf",
        // Audio
        "mp3" => "mp3",
        "ogg" | "opus" => "ogg",
        "flac" => "flac",
        "wav" => "wav",
        "amr" => "amr",
        "aac" => "aac",
        "aiff" => "aiff",
        _ => return None,
    };
    Some(demuxer)
}

/// An output container the engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputContainer {
    /// File extension used for the reserved output path.
    pub extension: &'static str,
    /// Engine muxer name passed with `-f`.
    pub muxer: &'static str,
    /// Media type reported to callers.
    pub media_type: &'static str,
}

const OUTPUT_CONTAINERS: &[OutputContainer] = &[
    OutputContainer { extension: "mp3", muxer: "mp3", media_type: "audio/mpeg" },
    OutputContainer { extension: "ogg", muxer: "ogg", media_type: "audio/ogg" },
    OutputContainer { extension: "opus", muxer: "opus", media_type: "audio/ogg" },
    OutputContainer { extension: "wav", muxer: "wav", media_type: "audio/wav" },
    OutputContainer { extension: "flac", muxer: "flac", media_type: "audio/flac" },
    OutputContainer { extension: "m4a", muxer: "ipod", media_type: "audio/mp4" },
    OutputContainer { extension: "aac", muxer: "adts", media_type: "audio/aac" },
    OutputContainer { extension: "mp4", muxer: "mp4", media_type: "video/mp4" },
    OutputContainer { extension: "mov", muxer: "mov", media_type: "video/quicktime" },
    OutputContainer { extension: "mkv", muxer: "matroska", media_type: "video/x-matroska" },
    OutputContainer { extension: "webm", muxer: "webm", media_type: "video/webm" },
    OutputContainer { extension: "avi", muxer: "avi", media_type: "video/x-msvideo" },
    OutputContainer { extension: "gif", muxer: "gif", media_type: "image/gif" },
    OutputContainer { extension: "webp", muxer: "webp", media_type: "image/webp" },
    OutputContainer { extension: "png", muxer: "image2", media_type: "image/png" },
    OutputContainer { extension: "jpg", muxer: "image2", media_type: "image/jpeg" },
];

/// Looks up an output container by extension (case-insensitive, leading dot allowed).
pub fn output_container(name: &str) -> Option<OutputContainer> {
    let name = name.trim().trim_start_matches('.');
    OUTPUT_CONTAINERS
        .iter()
        .find(|c| c.extension.eq_ignore_ascii_case(name))
        .copied()
}

/// All writable output containers.
pub fn output_containers() -> &'static [OutputContainer] {
    OUTPUT_CONTAINERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demuxer_for_known_extensions() {
        assert_eq!(demuxer_for("mp4"), Some("mov"));
        assert_eq!(demuxer_for("webm"), Some("matroska"));
        assert_eq!(demuxer_for("mp3"), Some("mp3"));
        assert_eq!(demuxer_for("png"), Some("png_pipe"));
    }

    #[test]
    fn test_demuxer_for_unknown_extension() {
        assert_eq!(demuxer_for("mid"), None);
        assert_eq!(demuxer_for("zip"), None);
    }

    #[test]
    fn test_output_container_lookup() {
        let mkv = output_container("MKV").unwrap();
        assert_eq!(mkv.muxer, "matroska");
        assert_eq!(mkv.extension, "mkv");

        let webp = output_container(".webp").unwrap();
        assert_eq!(webp.media_type, "image/webp");

        assert!(output_container("docx").is_none());
    }
}
