// FormatSpec - declarative format selection shared by probe and execution
//
// A FormatSpec is resolved once from a SelectionRequest and then handed to the
// size probe, the pipe executor and the local fetch pipeline, so that what is
// measured is exactly what gets downloaded.
//
// Handles:
// - Quality ladder (1080p, 720p, 480p, 360p)
// - Ordered fallback chain (height-constrained → unconstrained best)
// - Audio-only extraction
// - Post-processing chain per media kind

use serde::{Deserialize, Serialize};

use super::models::{MediaKind, Quality, SelectionRequest};

/// Offered video heights, highest first
pub const QUALITY_LADDER: [u32; 4] = [1080, 720, 480, 360];

/// Target codec settings for audio transcoding
pub const AUDIO_CODEC: &str = "mp3";
pub const AUDIO_BITRATE: &str = "192K";

/// Container preferred for audio relayed without transcoding
pub const STREAM_AUDIO_EXT: &str = "m4a";

/// One entry of the fallback chain, evaluated in order by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatCandidate {
    /// Best video-only stream merged with best audio
    SeparateStreams { max_height: Option<u32> },
    /// Single file already carrying both video and audio
    Combined { max_height: Option<u32> },
    /// Best audio-only stream in the container relayed when streaming
    PreferredAudio,
    /// Best audio-only stream
    BestAudio,
}

impl FormatCandidate {
    /// yt-dlp selector fragment
    pub fn selector(&self) -> String {
        match self {
            Self::SeparateStreams { max_height: Some(h) } => format!("bv*[height<={}]+ba", h),
            Self::SeparateStreams { max_height: None } => "bv*+ba".to_string(),
            Self::Combined { max_height: Some(h) } => format!("b[height<={}]", h),
            Self::Combined { max_height: None } => "b".to_string(),
            Self::PreferredAudio => format!("ba[ext={}]", STREAM_AUDIO_EXT),
            Self::BestAudio => "ba".to_string(),
        }
    }
}

/// Post-processing applied after a local fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostProcessStep {
    /// Transcode to a fixed codec/bitrate
    Transcode { codec: String, bitrate: String },
    /// Merge separate streams into the given container (no re-encode)
    Remux { container: String },
    /// Write title/artist/album-style tags from extracted metadata
    WriteTags,
    /// Embed the fetched thumbnail as cover art / poster
    EmbedThumbnail,
}

impl PostProcessStep {
    /// yt-dlp postprocessor flags for this step
    pub fn ytdlp_args(&self) -> Vec<String> {
        match self {
            Self::Transcode { codec, bitrate } => vec![
                "-x".to_string(),
                "--audio-format".to_string(),
                codec.clone(),
                "--audio-quality".to_string(),
                bitrate.clone(),
            ],
            // Merge covers split streams; remux covers a single-file
            // fallback that arrived in another container
            Self::Remux { container } => vec![
                "--merge-output-format".to_string(),
                container.clone(),
                "--remux-video".to_string(),
                container.clone(),
            ],
            Self::WriteTags => vec!["--embed-metadata".to_string()],
            Self::EmbedThumbnail => vec![
                "--write-thumbnail".to_string(),
                "--convert-thumbnails".to_string(),
                "jpg".to_string(),
                "--embed-thumbnail".to_string(),
            ],
        }
    }
}

/// Resolved, immutable description of what to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub kind: MediaKind,
    /// Ladder rung the user picked, None for "best"
    pub max_height: Option<u32>,
    /// Tried in order; the last entry is always unconstrained
    pub candidates: Vec<FormatCandidate>,
    pub post_process: Vec<PostProcessStep>,
}

impl FormatSpec {
    pub fn resolve(request: &SelectionRequest) -> Self {
        match request.kind {
            MediaKind::Audio => Self::audio(),
            MediaKind::Video => Self::video(request.quality),
        }
    }

    /// Audio ignores quality: best available stream, transcoded afterwards
    pub fn audio() -> Self {
        Self {
            kind: MediaKind::Audio,
            max_height: None,
            candidates: vec![
                FormatCandidate::PreferredAudio,
                FormatCandidate::BestAudio,
                FormatCandidate::Combined { max_height: None },
            ],
            post_process: vec![
                PostProcessStep::Transcode {
                    codec: AUDIO_CODEC.to_string(),
                    bitrate: AUDIO_BITRATE.to_string(),
                },
                PostProcessStep::WriteTags,
                PostProcessStep::EmbedThumbnail,
            ],
        }
    }

    pub fn video(quality: Quality) -> Self {
        let max_height = match quality {
            Quality::Best => None,
            Quality::Height(h) => Some(h),
        };

        let mut candidates = Vec::new();
        if max_height.is_some() {
            candidates.push(FormatCandidate::SeparateStreams { max_height });
            candidates.push(FormatCandidate::Combined { max_height });
        }
        candidates.push(FormatCandidate::SeparateStreams { max_height: None });
        candidates.push(FormatCandidate::Combined { max_height: None });

        Self {
            kind: MediaKind::Video,
            max_height,
            candidates,
            post_process: vec![
                PostProcessStep::Remux {
                    container: MediaKind::Video.target_ext().to_string(),
                },
                PostProcessStep::WriteTags,
                PostProcessStep::EmbedThumbnail,
            ],
        }
    }

    /// Full yt-dlp `-f` argument: candidates joined by `/`
    pub fn selector(&self) -> String {
        self.candidates
            .iter()
            .map(|c| c.selector())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Extension of the file the post-processing chain produces
    pub fn output_ext(&self) -> &'static str {
        self.kind.target_ext()
    }

    /// Extensions a finished local fetch may carry, preferred first. Audio is
    /// always transcoded; video may keep a fallback container if remuxing
    /// was skipped.
    pub fn accepted_exts(&self) -> &'static [&'static str] {
        match self.kind {
            MediaKind::Audio => &["mp3"],
            MediaKind::Video => &["mp4", "mkv", "webm"],
        }
    }

    /// Extension of bytes relayed unprocessed on the streaming path
    pub fn stream_ext(&self) -> &'static str {
        match self.kind {
            MediaKind::Audio => STREAM_AUDIO_EXT,
            MediaKind::Video => self.kind.target_ext(),
        }
    }

    pub fn has_step(&self, step: &PostProcessStep) -> bool {
        self.post_process.contains(step)
    }

    /// All postprocessor flags, in chain order
    pub fn post_process_args(&self) -> Vec<String> {
        self.post_process
            .iter()
            .flat_map(|s| s.ytdlp_args())
            .collect()
    }
}
