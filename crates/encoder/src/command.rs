//! ffmpeg argument builder.
//!
//! Maps render options onto the argument vector a process-spawning backend
//! passes to ffmpeg. Quality tiers select a CRF/preset pair; audio settings
//! are appended only when the job carries an audio track.

use estudio_core::{AudioCodec, Codec, Quality, RenderOptions};

/// ffmpeg encoder name for a video codec.
fn video_codec_arg(codec: Codec) -> &'static str {
    match codec {
        Codec::H264 => "libx264",
        Codec::H265 => "libx265",
        Codec::Vp9 => "libvpx-vp9",
    }
}

/// ffmpeg encoder name for an audio codec.
fn audio_codec_arg(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Aac => "aac",
        AudioCodec::Mp3 => "libmp3lame",
        AudioCodec::Opus => "libopus",
    }
}

/// Constant-rate-factor and speed preset for a quality tier.
fn quality_args(quality: Quality) -> (&'static str, &'static str) {
    match quality {
        Quality::Low => ("28", "ultrafast"),
        Quality::Medium => ("23", "fast"),
        Quality::High => ("18", "medium"),
        Quality::Ultra => ("15", "slow"),
    }
}

/// Build the full ffmpeg argument vector for one render.
///
/// `input` is the composed frame source (concat list or pipe), `output` the
/// destination path. The caller validated `options` at submission, so every
/// codec/container pairing reaching this point is muxable.
pub fn build_args(options: &RenderOptions, input: &str, output: &str) -> Vec<String> {
    let (width, height) = options.resolution.dimensions();
    let (crf, preset) = quality_args(options.quality);

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.into(),
        "-c:v".into(),
        video_codec_arg(options.codec).into(),
        "-vf".into(),
        format!("scale={width}:{height}"),
        "-r".into(),
        options.fps.to_string(),
        "-crf".into(),
        crf.into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];

    // vp9 takes -deadline/-row-mt instead of the x264/x265 presets.
    match options.codec {
        Codec::Vp9 => {
            args.push("-b:v".into());
            args.push("0".into());
            args.push("-row-mt".into());
            args.push("1".into());
        }
        Codec::H264 | Codec::H265 => {
            args.push("-preset".into());
            args.push(preset.into());
        }
    }

    match options.audio {
        Some(ref audio) => {
            args.push("-c:a".into());
            args.push(audio_codec_arg(audio.codec).into());
            args.push("-b:a".into());
            args.push(audio.bitrate.clone());
            args.push("-ar".into());
            args.push(audio.sample_rate.to_string());
        }
        None => args.push("-an".into()),
    }

    args.push(output.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use estudio_core::{AudioOptions, Format, Resolution};

    fn options() -> RenderOptions {
        RenderOptions {
            resolution: Resolution::Hd1080,
            fps: 30,
            quality: Quality::High,
            format: Format::Mp4,
            codec: Codec::H264,
            audio: None,
        }
    }

    fn pair(args: &[String], flag: &str) -> String {
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].clone()
    }

    #[test]
    fn h264_high_uses_crf_18_medium_preset() {
        let args = build_args(&options(), "frames.txt", "out.mp4");
        assert_eq!(pair(&args, "-c:v"), "libx264");
        assert_eq!(pair(&args, "-crf"), "18");
        assert_eq!(pair(&args, "-preset"), "medium");
        assert_eq!(pair(&args, "-vf"), "scale=1920:1080");
        assert_eq!(pair(&args, "-r"), "30");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn vp9_gets_row_mt_and_no_preset() {
        let mut o = options();
        o.format = Format::Webm;
        o.codec = Codec::Vp9;
        let args = build_args(&o, "frames.txt", "out.webm");
        assert_eq!(pair(&args, "-c:v"), "libvpx-vp9");
        assert_eq!(pair(&args, "-row-mt"), "1");
        assert!(!args.iter().any(|a| a == "-preset"));
    }

    #[test]
    fn no_audio_track_disables_audio() {
        let args = build_args(&options(), "in", "out.mp4");
        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn audio_options_map_to_codec_bitrate_samplerate() {
        let mut o = options();
        o.audio = Some(AudioOptions {
            codec: AudioCodec::Aac,
            bitrate: "128k".to_string(),
            sample_rate: 44_100,
        });
        let args = build_args(&o, "in", "out.mp4");
        assert_eq!(pair(&args, "-c:a"), "aac");
        assert_eq!(pair(&args, "-b:a"), "128k");
        assert_eq!(pair(&args, "-ar"), "44100");
        assert!(!args.iter().any(|a| a == "-an"));
    }

    #[test]
    fn quality_tiers_map_to_crf() {
        for (quality, crf) in [
            (Quality::Low, "28"),
            (Quality::Medium, "23"),
            (Quality::High, "18"),
            (Quality::Ultra, "15"),
        ] {
            let mut o = options();
            o.quality = quality;
            let args = build_args(&o, "in", "out.mp4");
            assert_eq!(pair(&args, "-crf"), crf);
        }
    }
}
