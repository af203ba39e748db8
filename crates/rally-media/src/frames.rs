//! Frame-by-frame video I/O over FFmpeg rawvideo pipes.
//!
//! Decoding and encoding run as child FFmpeg processes exchanging `rgb24`
//! frames over stdin/stdout. Both ends are blocking and are meant to be
//! driven from a blocking thread.

use image::RgbImage;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

/// A sequential source of decoded RGB frames.
pub trait FrameSource: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> MediaResult<Option<RgbImage>>;
}

/// A sequential consumer of RGB frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()>;
    /// Flush and close the sink. Called exactly once after the last frame.
    fn finish(&mut self) -> MediaResult<()>;
}

/// Collects a child's stderr on a background thread so the pipe never fills.
struct StderrDrain(Option<JoinHandle<String>>);

impl StderrDrain {
    fn spawn(pipe: Option<ChildStderr>) -> Self {
        Self(pipe.map(|mut pipe| {
            std::thread::spawn(move || {
                let mut bytes = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut bytes) {
                    debug!("stderr drain stopped: {}", e);
                }
                String::from_utf8_lossy(&bytes).into_owned()
            })
        }))
    }

    /// Everything the child wrote, once it has exited.
    fn collect(&mut self) -> Option<String> {
        self.0
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Map a finished FFmpeg process to a result.
fn check_exit(status: ExitStatus, stderr: Option<String>, context: String) -> MediaResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(MediaError::ffmpeg_failed(context, stderr, status.code()))
}

/// Decodes a video file into raw RGB frames.
pub struct FfmpegFrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr: StderrDrain,
    source: PathBuf,
    width: u32,
    height: u32,
    frame_bytes: usize,
    exited: bool,
}

impl FfmpegFrameReader {
    /// Start decoding `path`. Dimensions come from a prior probe.
    pub fn open(path: &Path, width: u32, height: u32) -> MediaResult<Self> {
        check_ffmpeg()?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-vsync", "passthrough", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::video_open(path, format!("failed to spawn decoder: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::video_open(path, "decoder stdout not captured"))?;

        let stderr = StderrDrain::spawn(child.stderr.take());

        debug!(path = %path.display(), width, height, "Opened frame decoder");

        Ok(Self {
            child,
            stdout,
            stderr,
            source: path.to_path_buf(),
            width,
            height,
            frame_bytes: (width as usize) * (height as usize) * 3,
            exited: false,
        })
    }

    /// Reap the decoder after end of stream. A non-zero exit means the
    /// stream was cut short by a decode failure.
    fn reap(&mut self) -> MediaResult<()> {
        if self.exited {
            return Ok(());
        }
        let status = self.child.wait()?;
        self.exited = true;
        check_exit(
            status,
            self.stderr.collect(),
            format!("Decoder failed reading {}", self.source.display()),
        )
    }
}

impl FrameSource for FfmpegFrameReader {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        let mut buf = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            self.reap()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.reap()?;
            warn!(
                expected = buf.len(),
                got = filled,
                "Decoder ended mid-frame, dropping partial frame"
            );
            return Ok(None);
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| MediaError::internal("Failed to create frame buffer"))
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        if !self.exited {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Encodes raw RGB frames into a video file.
pub struct FfmpegFrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: StderrDrain,
    output: PathBuf,
    width: u32,
    height: u32,
}

impl FfmpegFrameWriter {
    /// Start an encoder writing MPEG-4 Part 2 video to `output`.
    pub fn create(output: &Path, width: u32, height: u32, fps: f64) -> MediaResult<Self> {
        check_ffmpeg()?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &format!("{:.3}", fps)])
            .args(["-i", "-"])
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", "mpeg4", "-q:v", "4", "-pix_fmt", "yuv420p"])
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn encoder: {}", e), None, None))?;

        let stdin = child.stdin.take();
        let stderr = StderrDrain::spawn(child.stderr.take());

        Ok(Self {
            child,
            stdin,
            stderr,
            output: output.to_path_buf(),
            width,
            height,
        })
    }
}

impl FrameSink for FfmpegFrameWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(MediaError::frame_write(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::frame_write("encoder already finished"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| MediaError::frame_write(format!("encoder pipe closed: {}", e)))
    }

    fn finish(&mut self) -> MediaResult<()> {
        drop(self.stdin.take());

        let status = self.child.wait()?;
        check_exit(
            status,
            self.stderr.collect(),
            format!("Encoder failed writing {}", self.output.display()),
        )?;
        debug!(output = %self.output.display(), "Encoder finished");
        Ok(())
    }
}

impl Drop for FfmpegFrameWriter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::check_ffprobe;

    fn have_ffmpeg() -> bool {
        check_ffmpeg().is_ok() && check_ffprobe().is_ok()
    }

    #[cfg(unix)]
    #[test]
    fn test_check_exit_maps_failure_with_stderr() {
        use std::os::unix::process::ExitStatusExt;

        assert!(check_exit(ExitStatus::from_raw(0), None, "ok".into()).is_ok());

        let err = check_exit(
            ExitStatus::from_raw(1 << 8),
            Some("Invalid data found when processing input".into()),
            "Decoder failed reading x.mp4".into(),
        )
        .unwrap_err();
        match err {
            MediaError::FfmpegFailed { message, stderr, exit_code } => {
                assert_eq!(message, "Decoder failed reading x.mp4");
                assert_eq!(exit_code, Some(1));
                assert!(stderr.unwrap().contains("Invalid data"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_stderr_drain_collects_output() {
        let mut child = Command::new("sh")
            .args(["-c", "echo decoder exploded >&2; exit 3"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let mut drain = StderrDrain::spawn(child.stderr.take());
        let status = child.wait().unwrap();
        let err = check_exit(status, drain.collect(), "failed".into()).unwrap_err();
        assert!(matches!(
            err,
            MediaError::FfmpegFailed { exit_code: Some(3), stderr: Some(ref s), .. } if s == "decoder exploded"
        ));
    }

    #[test]
    fn test_decoder_failure_is_an_error_not_end_of_stream() {
        if !have_ffmpeg() {
            eprintln!("ffmpeg not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, vec![0x5Au8; 4096]).unwrap();

        let mut reader = FfmpegFrameReader::open(&path, 64, 48).unwrap();
        let err = reader.next_frame().unwrap_err();
        assert!(matches!(
            err,
            MediaError::FfmpegFailed { stderr: Some(_), exit_code: Some(code), .. } if code != 0
        ));
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_round_trip_through_encoder_and_decoder() {
        if !have_ffmpeg() {
            eprintln!("ffmpeg not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegFrameWriter::create(&path, 64, 48, 10.0).unwrap();
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([200, 40, 40]));
        for _ in 0..5 {
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();
        assert!(writer.write_frame(&frame).is_err());

        let mut reader = FfmpegFrameReader::open(&path, 64, 48).unwrap();
        let mut count = 0;
        while let Some(decoded) = reader.next_frame().unwrap() {
            assert_eq!(decoded.dimensions(), (64, 48));
            count += 1;
        }
        assert_eq!(count, 5);
    }
}
