//! Flattened engine argument model.

use crate::engine::EngineInput;
use crate::profiles::ConversionProfile;
use crate::sniffer::{output_container, MediaKind, OutputContainer, SniffedFormat};

use super::error::ConversionError;
use super::types::ConversionOptions;

const ALL_KINDS: &[MediaKind] = &[MediaKind::Image, MediaKind::Audio, MediaKind::Video];

/// Everything the engine needs besides the primary input and output path.
///
/// Filters are kept as separate chains so profile filters, operation filters
/// and caller filters merge into a single `-vf`/`-af` each.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePlan {
    /// Profile or operation name, used in errors, logs and metrics.
    pub label: String,
    /// Output container; `None` keeps the source container.
    pub output: Option<OutputContainer>,
    /// Whether callers may pick another output container.
    pub container_override: bool,
    /// Source kinds the plan can handle.
    pub accepts: Vec<MediaKind>,
    /// Inputs after the primary one (`1:`, `2:`, ... in filter graphs).
    pub extra_inputs: Vec<EngineInput>,
    pub video_filters: Vec<String>,
    pub audio_filters: Vec<String>,
    /// Multi-input filter graph. Exclusive with the simple filter chains.
    pub filter_complex: Option<String>,
    /// `-map` targets, in order.
    pub maps: Vec<String>,
    /// Codec and muxing arguments.
    pub args: Vec<String>,
}

impl TranscodePlan {
    /// An empty plan that keeps the source container and accepts any kind.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            output: None,
            container_override: true,
            accepts: ALL_KINDS.to_vec(),
            extra_inputs: Vec::new(),
            video_filters: Vec::new(),
            audio_filters: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn from_profile(profile: &ConversionProfile) -> Self {
        Self {
            label: profile.name.to_string(),
            output: Some(OutputContainer {
                extension: profile.extension,
                muxer: profile.muxer,
                media_type: profile.media_type,
            }),
            container_override: profile.container_override,
            accepts: profile.accepts.to_vec(),
            extra_inputs: Vec::new(),
            video_filters: profile.video_filter.into_iter().map(str::to_string).collect(),
            audio_filters: profile.audio_filter.into_iter().map(str::to_string).collect(),
            filter_complex: None,
            maps: Vec::new(),
            args: profile.args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn accepting(mut self, kinds: &[MediaKind]) -> Self {
        self.accepts = kinds.to_vec();
        self
    }

    /// Fixes the output container and forbids overrides.
    pub fn with_fixed_output(mut self, output: OutputContainer) -> Self {
        self.output = Some(output);
        self.container_override = false;
        self
    }

    pub fn with_video_filter(mut self, filter: impl Into<String>) -> Self {
        self.video_filters.push(filter.into());
        self
    }

    pub fn with_audio_filter(mut self, filter: impl Into<String>) -> Self {
        self.audio_filters.push(filter.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.accepts.contains(&kind)
    }

    /// Runs `next` after this plan.
    ///
    /// Filter chains and arguments concatenate in order; the later output
    /// container wins. Two filter graphs, or a graph plus simple filters,
    /// cannot be combined.
    pub fn then(mut self, next: TranscodePlan) -> Result<Self, ConversionError> {
        if self.filter_complex.is_some() || next.filter_complex.is_some() {
            let simple = !self.video_filters.is_empty()
                || !self.audio_filters.is_empty()
                || !next.video_filters.is_empty()
                || !next.audio_filters.is_empty();
            if simple || (self.filter_complex.is_some() && next.filter_complex.is_some()) {
                return Err(ConversionError::invalid_operation(format!(
                    "{} cannot be combined with {}",
                    self.label, next.label
                )));
            }
        }
        if !self.extra_inputs.is_empty() && !next.extra_inputs.is_empty() {
            return Err(ConversionError::invalid_operation(format!(
                "{} and {} both need extra inputs",
                self.label, next.label
            )));
        }

        self.label = format!("{}+{}", self.label, next.label);
        if next.output.is_some() {
            self.output = next.output;
        }
        self.container_override &= next.container_override;
        self.accepts.retain(|k| next.accepts.contains(k));
        self.extra_inputs.extend(next.extra_inputs);
        self.video_filters.extend(next.video_filters);
        self.audio_filters.extend(next.audio_filters);
        self.filter_complex = self.filter_complex.or(next.filter_complex);
        self.maps.extend(next.maps);
        self.args.extend(next.args);
        Ok(self)
    }

    /// Merges caller options.
    ///
    /// Caller filters run before the plan's filters and caller arguments go
    /// after the plan's, so the plan's own flags are never dropped.
    pub fn merge_options(mut self, options: &ConversionOptions) -> Result<Self, ConversionError> {
        options.validate()?;

        if let Some(ref name) = options.container {
            let container = output_container(name).ok_or_else(|| {
                ConversionError::UnsupportedContainer { name: name.clone() }
            })?;
            let unchanged = self
                .output
                .is_some_and(|current| current.extension == container.extension);
            if !self.container_override && !unchanged {
                return Err(ConversionError::invalid_options(format!(
                    "{} has a fixed output container",
                    self.label
                )));
            }
            self.output = Some(container);
        }

        if self.filter_complex.is_some()
            && (!options.video_filters.is_empty() || !options.audio_filters.is_empty())
        {
            return Err(ConversionError::invalid_options(format!(
                "{} uses a filter graph; extra filters are not allowed",
                self.label
            )));
        }

        let mut video_filters = options.video_filters.clone();
        video_filters.append(&mut self.video_filters);
        self.video_filters = video_filters;

        let mut audio_filters = options.audio_filters.clone();
        audio_filters.append(&mut self.audio_filters);
        self.audio_filters = audio_filters;

        self.args.extend(options.extra_args.iter().cloned());
        Ok(self)
    }

    /// The output container, falling back to the source container.
    pub fn resolve_output(&self, source: &SniffedFormat) -> Result<OutputContainer, ConversionError> {
        match self.output {
            Some(output) => Ok(output),
            None => output_container(source.extension).ok_or_else(|| {
                ConversionError::UnsupportedContainer {
                    name: source.extension.to_string(),
                }
            }),
        }
    }

    /// Renders the output arguments as one flat list, ending in `-f <muxer>`.
    pub fn to_args(&self, muxer: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref graph) = self.filter_complex {
            args.extend(["-filter_complex".to_string(), graph.clone()]);
        }
        for target in &self.maps {
            args.extend(["-map".to_string(), target.clone()]);
        }
        if !self.video_filters.is_empty() {
            args.extend(["-vf".to_string(), self.video_filters.join(",")]);
        }
        if !self.audio_filters.is_empty() {
            args.extend(["-af".to_string(), self.audio_filters.join(",")]);
        }

        args.extend(self.args.iter().cloned());
        args.extend(["-f".to_string(), muxer.to_string()]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles;
    use crate::sniffer::sniff;

    fn profile_plan(name: &str) -> TranscodePlan {
        TranscodePlan::from_profile(profiles::find(name).unwrap())
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_profile_args_are_flat_and_end_with_muxer() {
        let plan = profile_plan("toAudio8k");
        let args = plan.to_args("mp3");

        assert_eq!(flag_value(&args, "-af"), Some("apulsator=hz=0.125"));
        assert_eq!(flag_value(&args, "-c:a"), Some("libmp3lame"));
        assert_eq!(&args[args.len() - 2..], ["-f", "mp3"]);
    }

    #[test]
    fn test_caller_filters_run_before_profile_filters() {
        let options = ConversionOptions::new()
            .with_video_filter("hflip")
            .with_arg_line("-pix_fmt yuv420p");
        let plan = profile_plan("toVideo").merge_options(&options).unwrap();
        let args = plan.to_args("mp4");

        assert_eq!(
            flag_value(&args, "-vf"),
            Some("hflip,crop=floor(iw/2)*2:floor(ih/2)*2")
        );
        // Profile flags survive, extra args come last before the muxer.
        assert_eq!(flag_value(&args, "-crf"), Some("32"));
        let pix = args.iter().position(|a| a == "-pix_fmt").unwrap();
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert!(pix > crf);
    }

    #[test]
    fn test_container_override_rules() {
        let options = ConversionOptions::new().with_container("mkv");

        let plan = profile_plan("videoConvert").merge_options(&options).unwrap();
        assert_eq!(plan.output.unwrap().muxer, "matroska");

        let err = profile_plan("toAudio").merge_options(&options).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidOptions { .. }));

        // Naming the profile's own container is not an override.
        let same = ConversionOptions::new().with_container("MP3");
        assert!(profile_plan("toAudio").merge_options(&same).is_ok());

        let unknown = ConversionOptions::new().with_container("docx");
        let err = profile_plan("videoConvert").merge_options(&unknown).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedContainer { .. }));
    }

    #[test]
    fn test_filter_graph_rejects_caller_filters() {
        let mut plan = TranscodePlan::new("graph");
        plan.filter_complex = Some("[0:a]showwavespic=s=640x120[w]".to_string());
        let options = ConversionOptions::new().with_video_filter("hflip");
        assert!(plan.merge_options(&options).is_err());
    }

    #[test]
    fn test_then_concatenates_chains() {
        let crop = TranscodePlan::new("crop")
            .accepting(&[MediaKind::Image, MediaKind::Video])
            .with_video_filter("crop=10:10:0:0");
        let reverse = TranscodePlan::new("reverse")
            .accepting(&[MediaKind::Audio, MediaKind::Video])
            .with_video_filter("reverse")
            .with_audio_filter("areverse");

        let plan = crop.then(reverse).unwrap();
        assert_eq!(plan.label, "crop+reverse");
        assert_eq!(plan.accepts, vec![MediaKind::Video]);
        let args = plan.to_args("mp4");
        assert_eq!(flag_value(&args, "-vf"), Some("crop=10:10:0:0,reverse"));
        assert_eq!(flag_value(&args, "-af"), Some("areverse"));
    }

    #[test]
    fn test_then_rejects_graph_with_simple_filters() {
        let mut graph = TranscodePlan::new("waveform");
        graph.filter_complex = Some("[0:a]showwavespic[w]".to_string());
        let crop = TranscodePlan::new("crop").with_video_filter("crop=1:1:0:0");
        assert!(matches!(
            crop.then(graph),
            Err(ConversionError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_resolve_output_falls_back_to_source() {
        let png = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52,
        ];
        let source = sniff(&png).unwrap();
        let output = TranscodePlan::new("crop").resolve_output(&source).unwrap();
        assert_eq!(output.extension, "png");
        assert_eq!(output.muxer, "image2");
    }
}
