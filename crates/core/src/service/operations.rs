//! Ad-hoc operations.
//!
//! Each operation is a value that renders to a [`TranscodePlan`] as a pure
//! function of its parameters and the source media kind. Operations compose
//! with [`Operation::and_then`].

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineInput;
use crate::sniffer::{output_container, MediaKind, OutputContainer};

use super::error::ConversionError;
use super::plan::TranscodePlan;

const VISUAL: &[MediaKind] = &[MediaKind::Image, MediaKind::Video];
const TIMED: &[MediaKind] = &[MediaKind::Audio, MediaKind::Video];

/// Pixel margin between a watermark and the frame edge.
const WATERMARK_MARGIN: u32 = 10;

/// Motion JPEG stream produced by frame extraction.
pub const MJPEG_OUTPUT: OutputContainer = OutputContainer {
    extension: "mjpeg",
    muxer: "mjpeg",
    media_type: "video/x-motion-jpeg",
};

const PNG_OUTPUT: OutputContainer = OutputContainer {
    extension: "png",
    muxer: "image2",
    media_type: "image/png",
};

/// Where a watermark is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl Position {
    /// `overlay` filter coordinates.
    fn overlay_xy(self) -> String {
        let m = WATERMARK_MARGIN;
        match self {
            Self::TopLeft => format!("{m}:{m}"),
            Self::TopRight => format!("main_w-overlay_w-{m}:{m}"),
            Self::BottomLeft => format!("{m}:main_h-overlay_h-{m}"),
            Self::BottomRight => format!("main_w-overlay_w-{m}:main_h-overlay_h-{m}"),
            Self::Center => "(main_w-overlay_w)/2:(main_h-overlay_h)/2".to_string(),
        }
    }
}

/// An ad-hoc transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Crop {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    },
    /// Missing sides keep the aspect ratio.
    Scale {
        width: Option<u32>,
        height: Option<u32>,
    },
    Trim {
        start: Duration,
        end: Duration,
    },
    Container {
        name: String,
    },
    Watermark {
        image: PathBuf,
        position: Position,
    },
    /// Appends `others` after the source, in order.
    Concat {
        others: Vec<PathBuf>,
        audio: bool,
    },
    ExtractFrames {
        rate: f64,
        max_frames: Option<u32>,
    },
    ExtractFrame {
        at: Duration,
    },
    Waveform {
        width: u32,
        height: u32,
    },
    Reverse,
    Chain(Vec<Operation>),
}

impl Operation {
    pub fn crop(width: u32, height: u32, x: u32, y: u32) -> Self {
        Self::Crop {
            width,
            height,
            x,
            y,
        }
    }

    pub fn scale_to(width: Option<u32>, height: Option<u32>) -> Self {
        Self::Scale { width, height }
    }

    pub fn trim_range(start: Duration, end: Duration) -> Self {
        Self::Trim { start, end }
    }

    pub fn to_container(name: impl Into<String>) -> Self {
        Self::Container { name: name.into() }
    }

    pub fn watermark(image: impl Into<PathBuf>, position: Position) -> Self {
        Self::Watermark {
            image: image.into(),
            position,
        }
    }

    pub fn concat<I, P>(others: I, audio: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Concat {
            others: others.into_iter().map(Into::into).collect(),
            audio,
        }
    }

    pub fn extract_frames(rate: f64, max_frames: Option<u32>) -> Self {
        Self::ExtractFrames { rate, max_frames }
    }

    pub fn extract_frame(at: Duration) -> Self {
        Self::ExtractFrame { at }
    }

    pub fn waveform(width: u32, height: u32) -> Self {
        Self::Waveform { width, height }
    }

    pub fn reverse() -> Self {
        Self::Reverse
    }

    /// Runs `next` on the output of this operation, in a single engine run.
    pub fn and_then(self, next: Operation) -> Self {
        match self {
            Self::Chain(mut ops) => {
                ops.push(next);
                Self::Chain(ops)
            }
            first => Self::Chain(vec![first, next]),
        }
    }

    /// Name used in errors, logs and metrics.
    pub fn label(&self) -> String {
        match self {
            Self::Crop { .. } => "crop".to_string(),
            Self::Scale { .. } => "scale_to".to_string(),
            Self::Trim { .. } => "trim_range".to_string(),
            Self::Container { .. } => "to_container".to_string(),
            Self::Watermark { .. } => "watermark".to_string(),
            Self::Concat { .. } => "concat".to_string(),
            Self::ExtractFrames { .. } => "extract_frames".to_string(),
            Self::ExtractFrame { .. } => "extract_frame".to_string(),
            Self::Waveform { .. } => "waveform".to_string(),
            Self::Reverse => "reverse".to_string(),
            Self::Chain(ops) => ops.iter().map(Self::label).collect::<Vec<_>>().join("+"),
        }
    }

    /// Renders the operation for a source of `kind`.
    pub fn plan(&self, kind: MediaKind) -> Result<TranscodePlan, ConversionError> {
        let label = self.label();
        match self {
            Self::Crop {
                width,
                height,
                x,
                y,
            } => {
                if *width == 0 || *height == 0 {
                    return Err(ConversionError::invalid_operation(
                        "crop size must be non-zero",
                    ));
                }
                Ok(TranscodePlan::new(label)
                    .accepting(VISUAL)
                    .with_video_filter(format!("crop={width}:{height}:{x}:{y}")))
            }
            Self::Scale { width, height } => {
                if width.is_none() && height.is_none() {
                    return Err(ConversionError::invalid_operation(
                        "scale needs a width or a height",
                    ));
                }
                if *width == Some(0) || *height == Some(0) {
                    return Err(ConversionError::invalid_operation(
                        "scale dimensions must be non-zero",
                    ));
                }
                // -2 keeps the aspect ratio with an even size.
                let side = |v: &Option<u32>| v.map_or("-2".to_string(), |v| v.to_string());
                Ok(TranscodePlan::new(label)
                    .accepting(VISUAL)
                    .with_video_filter(format!("scale={}:{}", side(width), side(height))))
            }
            Self::Trim { start, end } => {
                if start >= end {
                    return Err(ConversionError::invalid_operation(format!(
                        "trim start {} must precede end {}",
                        seconds(*start),
                        seconds(*end)
                    )));
                }
                Ok(TranscodePlan::new(label).accepting(TIMED).with_args([
                    "-ss".to_string(),
                    seconds(*start),
                    "-to".to_string(),
                    seconds(*end),
                ]))
            }
            Self::Container { name } => {
                let container = output_container(name).ok_or_else(|| {
                    ConversionError::UnsupportedContainer { name: name.clone() }
                })?;
                let mut plan = TranscodePlan::new(label);
                plan.output = Some(container);
                if container.media_type.starts_with("audio/") {
                    plan = plan.accepting(TIMED).with_args(["-vn"]);
                } else if container.media_type.starts_with("image/")
                    && !matches!(container.extension, "gif" | "webp")
                {
                    plan = plan.accepting(VISUAL).with_args(["-frames:v", "1"]);
                }
                Ok(plan)
            }
            Self::Watermark { image, position } => {
                let mut plan = TranscodePlan::new(label).accepting(VISUAL);
                plan.extra_inputs.push(EngineInput::probed(image.clone()));
                plan.filter_complex = Some(format!(
                    "[0:v][1:v]overlay={}[v]",
                    position.overlay_xy()
                ));
                plan.maps = vec!["[v]".to_string(), "0:a?".to_string()];
                Ok(plan)
            }
            Self::Concat { others, audio } => {
                if others.is_empty() {
                    return Err(ConversionError::invalid_operation(
                        "concat needs at least one more input",
                    ));
                }
                let n = others.len() + 1;
                let (pads, streams, outputs) = match kind {
                    MediaKind::Video if *audio => ("[{i}:v][{i}:a]", "v=1:a=1", "[v][a]"),
                    MediaKind::Video => ("[{i}:v]", "v=1:a=0", "[v]"),
                    MediaKind::Audio => ("[{i}:a]", "v=0:a=1", "[a]"),
                    MediaKind::Image => {
                        return Err(ConversionError::IncompatibleInput {
                            operation: label,
                            kind,
                        })
                    }
                };
                let inputs: String = (0..n).map(|i| pads.replace("{i}", &i.to_string())).collect();

                let mut plan = TranscodePlan::new(label).accepting(TIMED);
                plan.extra_inputs = others.iter().map(EngineInput::probed).collect();
                plan.filter_complex = Some(format!("{inputs}concat=n={n}:{streams}{outputs}"));
                plan.maps = match outputs {
                    "[v][a]" => vec!["[v]".to_string(), "[a]".to_string()],
                    single => vec![single.to_string()],
                };
                Ok(plan)
            }
            Self::ExtractFrames { rate, max_frames } => {
                if !rate.is_finite() || *rate <= 0.0 {
                    return Err(ConversionError::invalid_operation(
                        "frame rate must be positive",
                    ));
                }
                if *max_frames == Some(0) {
                    return Err(ConversionError::invalid_operation(
                        "max frames must be non-zero",
                    ));
                }
                let mut plan = TranscodePlan::new(label)
                    .accepting(VISUAL)
                    .with_fixed_output(MJPEG_OUTPUT)
                    .with_video_filter(format!("fps={rate}"))
                    .with_args(["-an", "-c:v", "mjpeg", "-q:v", "2"]);
                if let Some(max) = max_frames {
                    plan = plan.with_args(["-frames:v".to_string(), max.to_string()]);
                }
                Ok(plan)
            }
            Self::ExtractFrame { at } => Ok(TranscodePlan::new(label)
                .accepting(VISUAL)
                .with_fixed_output(PNG_OUTPUT)
                .with_args([
                    "-ss".to_string(),
                    seconds(*at),
                    "-frames:v".to_string(),
                    "1".to_string(),
                    "-c:v".to_string(),
                    "png".to_string(),
                ])),
            Self::Waveform { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err(ConversionError::invalid_operation(
                        "waveform size must be non-zero",
                    ));
                }
                let mut plan = TranscodePlan::new(label)
                    .accepting(TIMED)
                    .with_fixed_output(PNG_OUTPUT)
                    .with_args(["-frames:v", "1", "-c:v", "png"]);
                plan.filter_complex = Some(format!("[0:a]showwavespic=s={width}x{height}[w]"));
                plan.maps = vec!["[w]".to_string()];
                Ok(plan)
            }
            Self::Reverse => match kind {
                MediaKind::Video => Ok(TranscodePlan::new(label)
                    .accepting(TIMED)
                    .with_video_filter("reverse")
                    .with_audio_filter("areverse")),
                MediaKind::Audio => Ok(TranscodePlan::new(label)
                    .accepting(TIMED)
                    .with_audio_filter("areverse")),
                MediaKind::Image => Err(ConversionError::IncompatibleInput {
                    operation: label,
                    kind,
                }),
            },
            Self::Chain(ops) => {
                let mut ops = ops.iter();
                let first = ops
                    .next()
                    .ok_or_else(|| ConversionError::invalid_operation("empty operation chain"))?;
                ops.try_fold(first.plan(kind)?, |plan, op| plan.then(op.plan(kind)?))
            }
        }
    }
}

/// Seconds with millisecond precision, as the engine's time syntax.
fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    fn args_for(op: Operation, kind: MediaKind) -> Vec<String> {
        let plan = op.plan(kind).unwrap();
        let muxer = plan.output.map(|o| o.muxer).unwrap_or("mp4");
        plan.to_args(muxer)
    }

    #[test]
    fn test_crop() {
        let args = args_for(Operation::crop(100, 50, 10, 20), MediaKind::Video);
        assert_eq!(flag_value(&args, "-vf"), Some("crop=100:50:10:20"));

        let err = Operation::crop(0, 50, 0, 0).plan(MediaKind::Video).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidOperation { .. }));
    }

    #[test]
    fn test_scale_keeps_aspect_for_missing_side() {
        let args = args_for(Operation::scale_to(Some(640), None), MediaKind::Image);
        assert_eq!(flag_value(&args, "-vf"), Some("scale=640:-2"));

        let args = args_for(Operation::scale_to(None, Some(360)), MediaKind::Video);
        assert_eq!(flag_value(&args, "-vf"), Some("scale=-2:360"));

        assert!(Operation::scale_to(None, None).plan(MediaKind::Video).is_err());
        assert!(Operation::scale_to(Some(0), None).plan(MediaKind::Video).is_err());
    }

    #[test]
    fn test_trim_range() {
        let op = Operation::trim_range(Duration::from_millis(1500), Duration::from_secs(4));
        let args = args_for(op, MediaKind::Audio);
        assert_eq!(flag_value(&args, "-ss"), Some("1.500"));
        assert_eq!(flag_value(&args, "-to"), Some("4.000"));

        let backwards = Operation::trim_range(Duration::from_secs(4), Duration::from_secs(4));
        assert!(backwards.plan(MediaKind::Audio).is_err());
    }

    #[test]
    fn test_to_container() {
        let plan = Operation::to_container("wav").plan(MediaKind::Video).unwrap();
        assert_eq!(plan.output.unwrap().muxer, "wav");
        assert!(plan.args.contains(&"-vn".to_string()));
        assert!(!plan.accepts(MediaKind::Image));

        let err = Operation::to_container("xyz").plan(MediaKind::Video).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedContainer { .. }));
    }

    #[test]
    fn test_watermark_graph_and_maps() {
        let op = Operation::watermark("/assets/logo.png", Position::TopRight);
        let plan = op.plan(MediaKind::Video).unwrap();
        assert_eq!(plan.extra_inputs, vec![EngineInput::probed("/assets/logo.png")]);

        let args = plan.to_args("mp4");
        assert_eq!(
            flag_value(&args, "-filter_complex"),
            Some("[0:v][1:v]overlay=main_w-overlay_w-10:10[v]")
        );
        let maps: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(maps, vec!["[v]", "0:a?"]);
    }

    #[test]
    fn test_concat_graph() {
        let op = Operation::concat(["/clips/b.mp4", "/clips/c.mp4"], true);
        let plan = op.plan(MediaKind::Video).unwrap();
        assert_eq!(plan.extra_inputs.len(), 2);
        assert_eq!(
            plan.filter_complex.as_deref(),
            Some("[0:v][0:a][1:v][1:a][2:v][2:a]concat=n=3:v=1:a=1[v][a]")
        );
        assert_eq!(plan.maps, vec!["[v]", "[a]"]);

        let audio = Operation::concat(["/clips/b.mp3"], false)
            .plan(MediaKind::Audio)
            .unwrap();
        assert_eq!(
            audio.filter_complex.as_deref(),
            Some("[0:a][1:a]concat=n=2:v=0:a=1[a]")
        );

        let lonely = Operation::concat(Vec::<PathBuf>::new(), true);
        assert!(lonely.plan(MediaKind::Video).is_err());
    }

    #[test]
    fn test_extract_frames_outputs_mjpeg() {
        let plan = Operation::extract_frames(2.0, Some(10))
            .plan(MediaKind::Video)
            .unwrap();
        assert_eq!(plan.output, Some(MJPEG_OUTPUT));
        assert!(!plan.container_override);
        let args = plan.to_args("mjpeg");
        assert_eq!(flag_value(&args, "-vf"), Some("fps=2"));
        assert_eq!(flag_value(&args, "-frames:v"), Some("10"));

        assert!(Operation::extract_frames(0.0, None).plan(MediaKind::Video).is_err());
        assert!(Operation::extract_frames(f64::NAN, None).plan(MediaKind::Video).is_err());
    }

    #[test]
    fn test_extract_frame_at_timestamp() {
        let plan = Operation::extract_frame(Duration::from_millis(2250))
            .plan(MediaKind::Video)
            .unwrap();
        assert_eq!(plan.output.unwrap().extension, "png");
        let args = plan.to_args("image2");
        assert_eq!(flag_value(&args, "-ss"), Some("2.250"));
        assert_eq!(flag_value(&args, "-frames:v"), Some("1"));
    }

    #[test]
    fn test_waveform() {
        let plan = Operation::waveform(640, 120).plan(MediaKind::Audio).unwrap();
        assert_eq!(
            plan.filter_complex.as_deref(),
            Some("[0:a]showwavespic=s=640x120[w]")
        );
        assert!(!plan.accepts(MediaKind::Image));
        assert!(Operation::waveform(0, 120).plan(MediaKind::Audio).is_err());
    }

    #[test]
    fn test_reverse_depends_on_kind() {
        let video = Operation::reverse().plan(MediaKind::Video).unwrap();
        assert_eq!(video.video_filters, vec!["reverse"]);
        assert_eq!(video.audio_filters, vec!["areverse"]);

        let audio = Operation::reverse().plan(MediaKind::Audio).unwrap();
        assert!(audio.video_filters.is_empty());
        assert_eq!(audio.audio_filters, vec!["areverse"]);

        let err = Operation::reverse().plan(MediaKind::Image).unwrap_err();
        assert!(matches!(err, ConversionError::IncompatibleInput { .. }));
    }

    #[test]
    fn test_chain_composes_plans() {
        let op = Operation::trim_range(Duration::ZERO, Duration::from_secs(2))
            .and_then(Operation::crop(64, 64, 0, 0))
            .and_then(Operation::to_container("webm"));
        assert_eq!(op.label(), "trim_range+crop+to_container");

        let plan = op.plan(MediaKind::Video).unwrap();
        assert_eq!(plan.output.unwrap().extension, "webm");
        assert_eq!(plan.accepts, vec![MediaKind::Video]);
        let args = plan.to_args("webm");
        assert_eq!(flag_value(&args, "-vf"), Some("crop=64:64:0:0"));
        assert_eq!(flag_value(&args, "-to"), Some("2.000"));
    }

    #[test]
    fn test_chain_rejects_two_graphs() {
        let op = Operation::waveform(10, 10).and_then(Operation::watermark("/a.png", Position::Center));
        assert!(matches!(
            op.plan(MediaKind::Video),
            Err(ConversionError::InvalidOperation { .. })
        ));
    }
}
