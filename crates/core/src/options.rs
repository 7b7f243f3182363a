//! Render option types and submission-time validation.
//!
//! Options are an immutable snapshot taken when a job is created. Invalid
//! combinations (a container the codec cannot be muxed into, an fps outside
//! the supported range) are rejected before a job record exists, so they
//! can never reach the queue.

use serde::{Deserialize, Serialize};

/// Lowest supported frame rate.
pub const MIN_FPS: u32 = 1;

/// Highest supported frame rate.
pub const MAX_FPS: u32 = 120;

/// Default frame rate when the caller does not specify one.
pub const DEFAULT_FPS: u32 = 30;

/// Output resolution tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[serde(rename = "2160p")]
    Uhd2160,
}

impl Resolution {
    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Hd720 => (1280, 720),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Qhd1440 => (2560, 1440),
            Resolution::Uhd2160 => (3840, 2160),
        }
    }
}

/// Encoding quality tier. Affects bitrate selection in the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Mp4,
    Webm,
    Mov,
}

impl Format {
    /// File extension for the container.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Webm => "webm",
            Format::Mov => "mov",
        }
    }
}

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    H265,
    Vp9,
}

/// Audio codec for the narration/music track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Mp3,
    Opus,
}

/// Audio track settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOptions {
    pub codec: AudioCodec,
    /// e.g. `"128k"`.
    #[serde(default = "default_audio_bitrate")]
    pub bitrate: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_sample_rate() -> u32 {
    44_100
}

/// Immutable render configuration snapshot for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub resolution: Resolution,
    #[serde(default = "default_fps")]
    pub fps: u32,
    pub quality: Quality,
    pub format: Format,
    pub codec: Codec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioOptions>,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

impl RenderOptions {
    /// Validate the option combination.
    ///
    /// Returns every problem found, not just the first, so the submission
    /// response can list all of them.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !codec_supported(self.format, self.codec) {
            errors.push(format!(
                "codec {:?} cannot be muxed into a {:?} container",
                self.codec, self.format
            ));
        }

        if let Some(ref audio) = self.audio {
            if !audio_codec_supported(self.format, audio.codec) {
                errors.push(format!(
                    "audio codec {:?} cannot be muxed into a {:?} container",
                    audio.codec, self.format
                ));
            }
            if audio.bitrate.is_empty() {
                errors.push("audio bitrate must not be empty".to_string());
            }
        }

        if !(MIN_FPS..=MAX_FPS).contains(&self.fps) {
            errors.push(format!(
                "fps must be between {MIN_FPS} and {MAX_FPS}, got {}",
                self.fps
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Video codec / container compatibility.
fn codec_supported(format: Format, codec: Codec) -> bool {
    match format {
        Format::Mp4 | Format::Mov => matches!(codec, Codec::H264 | Codec::H265),
        Format::Webm => matches!(codec, Codec::Vp9),
    }
}

/// Audio codec / container compatibility.
fn audio_codec_supported(format: Format, codec: AudioCodec) -> bool {
    match format {
        Format::Mp4 => matches!(codec, AudioCodec::Aac | AudioCodec::Mp3),
        Format::Webm => matches!(codec, AudioCodec::Opus),
        Format::Mov => matches!(codec, AudioCodec::Aac),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(format: Format, codec: Codec) -> RenderOptions {
        RenderOptions {
            resolution: Resolution::Hd1080,
            fps: 30,
            quality: Quality::High,
            format,
            codec,
            audio: None,
        }
    }

    #[test]
    fn mp4_h264_is_valid() {
        assert!(opts(Format::Mp4, Codec::H264).validate().is_ok());
    }

    #[test]
    fn mp4_h265_is_valid() {
        assert!(opts(Format::Mp4, Codec::H265).validate().is_ok());
    }

    #[test]
    fn webm_vp9_is_valid() {
        assert!(opts(Format::Webm, Codec::Vp9).validate().is_ok());
    }

    #[test]
    fn webm_h264_is_rejected() {
        let errors = opts(Format::Webm, Codec::H264).validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Webm"));
    }

    #[test]
    fn mov_vp9_is_rejected() {
        assert!(opts(Format::Mov, Codec::Vp9).validate().is_err());
    }

    #[test]
    fn fps_out_of_range_is_rejected() {
        let mut o = opts(Format::Mp4, Codec::H264);
        o.fps = 0;
        assert!(o.validate().is_err());
        o.fps = 121;
        assert!(o.validate().is_err());
        o.fps = 120;
        assert!(o.validate().is_ok());
    }

    #[test]
    fn all_errors_are_reported_together() {
        let mut o = opts(Format::Webm, Codec::H264);
        o.fps = 500;
        o.audio = Some(AudioOptions {
            codec: AudioCodec::Aac,
            bitrate: "128k".to_string(),
            sample_rate: 44_100,
        });
        let errors = o.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn webm_opus_audio_is_valid() {
        let mut o = opts(Format::Webm, Codec::Vp9);
        o.audio = Some(AudioOptions {
            codec: AudioCodec::Opus,
            bitrate: "96k".to_string(),
            sample_rate: 48_000,
        });
        assert!(o.validate().is_ok());
    }

    #[test]
    fn serde_round_trip_uses_wire_names() {
        let o = opts(Format::Mp4, Codec::H264);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["resolution"], "1080p");
        assert_eq!(json["format"], "mp4");
        assert_eq!(json["codec"], "h264");
        assert_eq!(json["quality"], "high");
    }

    #[test]
    fn defaults_apply_when_fields_omitted() {
        let o: RenderOptions = serde_json::from_value(serde_json::json!({
            "resolution": "1080p",
            "quality": "high",
            "format": "mp4",
            "codec": "h264"
        }))
        .unwrap();
        assert_eq!(o.fps, DEFAULT_FPS);
        assert!(o.audio.is_none());
    }

    #[test]
    fn resolution_dimensions() {
        assert_eq!(Resolution::Hd720.dimensions(), (1280, 720));
        assert_eq!(Resolution::Uhd2160.dimensions(), (3840, 2160));
    }
}
