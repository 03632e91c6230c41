//! Sampled frame iteration over a video file.
//!
//! `ffmpeg` decodes the input, keeps every Nth frame with a `select` filter,
//! optionally downscales, and writes raw `rgb24` frames to stdout. Frames are
//! read one at a time and handed to a callback, so memory stays at one frame
//! regardless of video length.

use image::RgbImage;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{check_ffmpeg, probe_video, VideoInfo};

/// Default sampling interval.
pub const DEFAULT_FRAME_SKIP: u32 = 5;

/// How frames are picked from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOptions {
    /// Keep frames whose index is a multiple of this (>= 1)
    pub frame_skip: u32,
    /// Downscale wider frames to this width, keeping aspect ratio
    pub max_width: Option<u32>,
    /// Stop after this many sampled frames
    pub max_frames: Option<u64>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            max_width: None,
            max_frames: None,
        }
    }
}

impl SampleOptions {
    /// Size of the frames ffmpeg will emit for a source of `width` x `height`.
    /// Downscaled heights are rounded to an even number.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.max_width {
            Some(max_w) if max_w > 0 && width > max_w => {
                let h = (height as f64 * max_w as f64 / width as f64).round() as u32;
                let h = (h + h % 2).max(2);
                (max_w, h)
            }
            _ => (width, height),
        }
    }
}

/// One decoded sample.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Index of the frame in the source video
    pub index: u64,
    /// Position in seconds
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Why the frame loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEnd {
    /// The whole video was read
    Finished,
    /// `max_frames` was reached
    FrameCap,
    /// The cancel signal fired
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOutcome {
    pub frames: u64,
    pub end: SampleEnd,
}

/// Streams sampled frames out of a video through ffmpeg.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    input: PathBuf,
    options: SampleOptions,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FrameSampler {
    pub fn new(input: impl AsRef<Path>, options: SampleOptions) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            options: SampleOptions {
                frame_skip: options.frame_skip.max(1),
                ..options
            },
            cancel_rx: None,
        }
    }

    /// Stop between frames once the receiver reads `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn options(&self) -> &SampleOptions {
        &self.options
    }

    /// ffmpeg arguments producing `out_w` x `out_h` rgb24 frames on stdout.
    pub fn build_args(&self, out_w: u32, out_h: u32, source: (u32, u32)) -> Vec<String> {
        let mut filter = format!("select=not(mod(n\\,{}))", self.options.frame_skip);
        if (out_w, out_h) != source {
            filter.push_str(&format!(",scale={}:{}", out_w, out_h));
        }

        let mut args: Vec<String> = ["-nostdin", "-v", "error", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.input.to_string_lossy().to_string());
        args.extend(
            ["-vf", filter.as_str(), "-vsync", "vfr", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// Probe the input and feed every sampled frame to `on_frame`.
    ///
    /// An error from the callback aborts the loop and is returned.
    pub async fn run<F, Fut>(&self, on_frame: F) -> MediaResult<SampleOutcome>
    where
        F: FnMut(SampledFrame) -> Fut,
        Fut: Future<Output = MediaResult<()>>,
    {
        let info = probe_video(&self.input).await?;
        self.run_with_info(&info, on_frame).await
    }

    /// Same as [`run`](Self::run) with metadata already known.
    pub async fn run_with_info<F, Fut>(&self, info: &VideoInfo, mut on_frame: F) -> MediaResult<SampleOutcome>
    where
        F: FnMut(SampledFrame) -> Fut,
        Fut: Future<Output = MediaResult<()>>,
    {
        check_ffmpeg()?;

        let (out_w, out_h) = self.options.output_size(info.width, info.height);
        let frame_len = out_w as usize * out_h as usize * 3;
        let args = self.build_args(out_w, out_h, (info.width, info.height));
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout not captured"))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let mut reader = BufReader::with_capacity(frame_len.max(8192), stdout);
        let mut cancel_rx = self.cancel_rx.clone();
        let mut frames = 0u64;

        let end = loop {
            if let Some(max) = self.options.max_frames {
                if frames >= max {
                    break SampleEnd::FrameCap;
                }
            }
            if cancel_requested(&cancel_rx) {
                break SampleEnd::Stopped;
            }

            let mut buf = vec![0u8; frame_len];
            let read = match cancel_rx.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        r = reader.read_exact(&mut buf) => Some(r),
                        _ = wait_for_cancel(rx) => None,
                    }
                }
                None => Some(reader.read_exact(&mut buf).await),
            };

            match read {
                None => break SampleEnd::Stopped,
                Some(Ok(_)) => {}
                Some(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break SampleEnd::Finished,
                Some(Err(e)) => {
                    kill(&mut child).await;
                    return Err(e.into());
                }
            }

            let image = RgbImage::from_raw(out_w, out_h, buf)
                .ok_or_else(|| MediaError::internal("frame buffer size mismatch"))?;
            let index = frames * self.options.frame_skip as u64;
            let frame = SampledFrame {
                index,
                timestamp: index as f64 / info.fps,
                image,
            };

            if let Err(e) = on_frame(frame).await {
                kill(&mut child).await;
                return Err(e);
            }
            frames += 1;
        };

        if end != SampleEnd::Finished {
            info!(frames, end = ?end, "Stopping frame sampling early");
            kill(&mut child).await;
            return Ok(SampleOutcome { frames, end });
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() && frames == 0 {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg could not decode the video",
                Some(stderr),
                status.code(),
            ));
        }
        if !status.success() {
            warn!(frames, code = ?status.code(), "FFmpeg exited with an error after producing frames");
        }

        Ok(SampleOutcome { frames, end })
    }
}

fn cancel_requested(rx: &Option<watch::Receiver<bool>>) -> bool {
    rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Resolves once the flag reads `true`; never resolves if the sender is gone.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("ffmpeg already exited: {}", e);
    }
}
