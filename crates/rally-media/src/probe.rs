//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate as advertised by the container, 0.0 if unknown
    pub fps: f64,
    /// Frame count as advertised by the container
    pub frame_count: Option<u64>,
    /// Video codec
    pub codec: String,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a video file for information.
///
/// Any failure to read the file as a video maps to [`MediaError::VideoOpen`].
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::video_open(path, "file does not exist"));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(MediaError::video_open(
            path,
            format!("ffprobe exited with {:?} {}", output.status.code(), stderr.trim()),
        ));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::video_open(path, format!("unreadable probe output: {}", e)))?;

    parse_probe(path, probe)
}

fn parse_probe(path: &Path, probe: FfprobeOutput) -> MediaResult<VideoInfo> {
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::video_open(path, "no video stream found"))?;

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::video_open(path, "video stream has no dimensions"));
    }

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video_stream.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        frame_count: video_stream.nb_frames.as_ref().and_then(|n| n.parse().ok()),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

/// Return `fps` if it is a usable rate, otherwise `default_fps`.
///
/// Rates at or below zero, above `max_fps`, or not finite are rejected.
pub fn sanitize_fps(fps: f64, max_fps: f64, default_fps: f64) -> (f64, bool) {
    if fps.is_finite() && fps > 0.0 && fps <= max_fps {
        (fps, true)
    } else {
        (default_fps, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_sanitize_fps() {
        assert_eq!(sanitize_fps(25.0, 120.0, 30.0), (25.0, true));
        assert_eq!(sanitize_fps(120.0, 120.0, 30.0), (120.0, true));
        assert_eq!(sanitize_fps(0.0, 120.0, 30.0), (30.0, false));
        assert_eq!(sanitize_fps(-5.0, 120.0, 30.0), (30.0, false));
        assert_eq!(sanitize_fps(240.0, 120.0, 30.0), (30.0, false));
        assert_eq!(sanitize_fps(f64::NAN, 120.0, 30.0), (30.0, false));
    }

    #[test]
    fn test_parse_probe_requires_video_stream() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{"format":{"duration":"1.0"},"streams":[{"codec_type":"audio"}]}"#,
        )
        .unwrap();
        let err = parse_probe(Path::new("x.mp4"), probe).unwrap_err();
        assert!(err.is_open_failure());
    }

    #[test]
    fn test_parse_probe_reads_stream() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{"format":{"duration":"10.0"},"streams":[{"codec_type":"video","codec_name":"h264",
               "width":300,"height":300,"avg_frame_rate":"30/1","nb_frames":"300"}]}"#,
        )
        .unwrap();
        let info = parse_probe(Path::new("x.mp4"), probe).unwrap();
        assert_eq!(info.width, 300);
        assert_eq!(info.frame_count, Some(300));
        assert!((info.fps - 30.0).abs() < 0.01);
    }
}
