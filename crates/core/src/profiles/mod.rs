//! Registry of named conversion profiles.
//!
//! The registry is a fixed table compiled into the binary. It is never
//! mutated at runtime, so it can be read from any number of concurrent
//! requests without locking.

use serde::Serialize;

use crate::sniffer::MediaKind;

/// Crops odd pixel dimensions away so yuv420p encoders accept the frame.
const EVEN_CROP: &str = "crop=floor(iw/2)*2:floor(ih/2)*2";

/// Fit within 320x320, pad to a transparent square, palette with a reserved
/// transparent entry.
const STICKER_GRAPH: &str = "scale='min(320,iw)':'min(320,ih)':force_original_aspect_ratio=decrease,\
pad=320:320:-1:-1:color=white@0.0,\
split[a][b];[a]palettegen=reserve_transparent=on:transparency_color=ffffff[p];[b][p]paletteuse";

/// Same as [`STICKER_GRAPH`] resampled to 15 fps first.
const ANIMATED_STICKER_GRAPH: &str = "fps=15,\
scale='min(320,iw)':'min(320,ih)':force_original_aspect_ratio=decrease,\
pad=320:320:-1:-1:color=white@0.0,\
split[a][b];[a]palettegen=reserve_transparent=on:transparency_color=ffffff[p];[b][p]paletteuse";

const AUDIO_MP3_ARGS: &[&str] = &[
    "-vn",
    "-ar", "44100",
    "-ac", "2",
    "-c:a", "libmp3lame",
    "-b:a", "128k",
    "-q:a", "5",
];

/// A named, fixed set of output container, codec and filter arguments.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionProfile {
    /// Lookup name.
    pub name: &'static str,
    /// Human readable summary.
    pub description: &'static str,
    /// Output file extension.
    pub extension: &'static str,
    /// Output media type.
    pub media_type: &'static str,
    /// Engine muxer for the output.
    pub muxer: &'static str,
    /// Source media kinds the profile can convert.
    pub accepts: &'static [MediaKind],
    /// Video filter graph, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_filter: Option<&'static str>,
    /// Audio filter chain, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_filter: Option<&'static str>,
    /// Codec and muxing arguments, in order.
    pub args: &'static [&'static str],
    /// Whether callers may pick another output container.
    pub container_override: bool,
}

static PROFILES: &[ConversionProfile] = &[
    ConversionProfile {
        name: "toAudio",
        description: "MP3, 44.1 kHz stereo, 128 kbps",
        extension: "mp3",
        media_type: "audio/mpeg",
        muxer: "mp3",
        accepts: &[MediaKind::Audio, MediaKind::Video],
        video_filter: None,
        audio_filter: None,
        args: AUDIO_MP3_ARGS,
        container_override: false,
    },
    ConversionProfile {
        name: "toAudio8k",
        description: "MP3 like toAudio with a 0.125 Hz amplitude pulse",
        extension: "mp3",
        media_type: "audio/mpeg",
        muxer: "mp3",
        accepts: &[MediaKind::Audio, MediaKind::Video],
        video_filter: None,
        audio_filter: Some("apulsator=hz=0.125"),
        args: AUDIO_MP3_ARGS,
        container_override: false,
    },
    ConversionProfile {
        name: "toPTT",
        description: "Opus voice note in Ogg, 128 kbps VBR",
        extension: "ogg",
        media_type: "audio/ogg; codecs=opus",
        muxer: "ogg",
        accepts: &[MediaKind::Audio, MediaKind::Video],
        video_filter: None,
        audio_filter: None,
        args: &["-vn", "-c:a", "libopus", "-b:a", "128k", "-vbr", "on"],
        container_override: false,
    },
    ConversionProfile {
        name: "toVideo",
        description: "H.264/AAC MP4, CRF 32, slow preset",
        extension: "mp4",
        media_type: "video/mp4",
        muxer: "mp4",
        accepts: &[MediaKind::Video, MediaKind::Image],
        video_filter: Some(EVEN_CROP),
        audio_filter: None,
        args: &[
            "-c:v", "libx264",
            "-crf", "32",
            "-preset", "slow",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-b:a", "128k",
            "-ar", "44100",
            "-movflags", "+faststart",
        ],
        container_override: false,
    },
    ConversionProfile {
        name: "toWebm",
        description: "Silent VP8 WebM capped at 1000 kbps",
        extension: "webm",
        media_type: "video/webm",
        muxer: "webm",
        accepts: &[MediaKind::Video, MediaKind::Image],
        video_filter: Some(EVEN_CROP),
        audio_filter: None,
        args: &[
            "-c:v", "libvpx",
            "-b:v", "1000k",
            "-minrate", "1000k",
            "-maxrate", "1000k",
            "-an",
        ],
        container_override: false,
    },
    ConversionProfile {
        name: "imageToWebp",
        description: "Static sticker, 320x320 transparent WebP",
        extension: "webp",
        media_type: "image/webp",
        muxer: "webp",
        accepts: &[MediaKind::Image],
        video_filter: Some(STICKER_GRAPH),
        audio_filter: None,
        args: &["-c:v", "libwebp", "-frames:v", "1"],
        container_override: false,
    },
    ConversionProfile {
        name: "videoToWebp",
        description: "Animated sticker, first 5 s at 15 fps, looping, silent",
        extension: "webp",
        media_type: "image/webp",
        muxer: "webp",
        accepts: &[MediaKind::Video, MediaKind::Image],
        video_filter: Some(ANIMATED_STICKER_GRAPH),
        audio_filter: None,
        args: &[
            "-c:v", "libwebp",
            "-loop", "0",
            "-ss", "0",
            "-t", "5",
            "-preset", "default",
            "-an",
            "-fps_mode", "passthrough",
        ],
        container_override: false,
    },
    ConversionProfile {
        name: "videoConvert",
        description: "Generic re-encode at a fixed 1000 kbps, container chosen by caller",
        extension: "mp4",
        media_type: "video/mp4",
        muxer: "mp4",
        accepts: &[MediaKind::Video, MediaKind::Image],
        video_filter: None,
        audio_filter: None,
        args: &[
            "-b:v", "1000k",
            "-minrate", "1000k",
            "-maxrate", "1000k",
            "-bufsize", "2000k",
            "-threads", "3",
            "-flags", "+global_header",
        ],
        container_override: true,
    },
];

/// Finds a profile by name, ignoring ASCII case.
pub fn find(name: &str) -> Option<&'static ConversionProfile> {
    let name = name.trim();
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// All registered profiles.
pub fn all() -> &'static [ConversionProfile] {
    PROFILES
}

impl ConversionProfile {
    /// Whether the profile can convert sources of `kind`.
    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.accepts.contains(&kind)
    }
}
