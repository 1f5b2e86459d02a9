//! FrameSource / FrameProducer - Continuous visual frame acquisition
//!
//! ## Responsibilities
//!
//! - Decode a looping demo video into raw frames via ffmpeg, or synthesize
//!   a placeholder feed when no video is available (degraded mode)
//! - Refill the [`FrameBuffer`] at ~30 fps, independent of consumer cadence
//!
//! The producer runs in its own spawned task. Frame errors are logged and
//! skipped so the buffer keeps its last good frame.

use crate::error::{Error, Result};
use crate::frame_buffer::{FrameBuffer, Raster, FRAME_HEIGHT, FRAME_WIDTH};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Producer target rate in frames per second
pub const TARGET_FPS: u64 = 30;

const FRAME_BYTES: usize = (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize;

/// A continuous source of raster frames
#[async_trait]
pub trait FrameSource: Send {
    /// Produce the next frame
    async fn next_frame(&mut self) -> Result<Raster>;

    /// Short identifier for logs and the health endpoint
    fn describe(&self) -> &'static str;
}

/// File-backed looping video source
///
/// Spawns ffmpeg decoding the video to raw RGB24 at the standard
/// resolution and reads one frame per call off the pipe. `-stream_loop -1`
/// rewinds the file seamlessly, and `-re` paces decoding at native speed.
/// `kill_on_drop` guarantees the process dies with the source.
#[derive(Debug)]
pub struct VideoFileSource {
    path: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl VideoFileSource {
    /// Open a video file source
    ///
    /// Fails when the file does not exist so the caller can degrade to the
    /// synthetic source at startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::Config(format!(
                "video file not found: {}",
                path.display()
            )));
        }
        Ok(Self {
            path,
            child: None,
            stdout: None,
        })
    }

    fn spawn_decoder(&mut self) -> Result<()> {
        let mut child = Command::new("ffmpeg")
            .arg("-v")
            .arg("error")
            .arg("-stream_loop")
            .arg("-1")
            .arg("-re")
            .arg("-i")
            .arg(&self.path)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", FRAME_WIDTH, FRAME_HEIGHT))
            .arg("-r")
            .arg(TARGET_FPS.to_string())
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Frame(format!("failed to spawn ffmpeg: {}", e)))?;

        self.stdout = child.stdout.take();
        self.child = Some(child);
        tracing::info!(path = %self.path.display(), "ffmpeg decoder started");
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Raster> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::Frame("decoder pipe not open".to_string()))?;
        let mut pixels = vec![0u8; FRAME_BYTES];
        stdout
            .read_exact(&mut pixels)
            .await
            .map_err(|e| Error::Frame(format!("short read from decoder: {}", e)))?;
        Raster::from_rgb(FRAME_WIDTH, FRAME_HEIGHT, pixels)
            .ok_or_else(|| Error::Frame("decoder produced malformed frame".to_string()))
    }
}

#[async_trait]
impl FrameSource for VideoFileSource {
    async fn next_frame(&mut self) -> Result<Raster> {
        if self.child.is_none() {
            self.spawn_decoder()?;
        }
        match self.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                // Dead pipe: drop the old process (killed on drop) and retry
                // once with a fresh decoder.
                tracing::warn!(error = %e, "Decoder pipe failed, respawning ffmpeg");
                self.stdout = None;
                self.child = None;
                self.spawn_decoder()?;
                self.read_frame().await
            }
        }
    }

    fn describe(&self) -> &'static str {
        "video"
    }
}

/// Deterministic placeholder frame used when no video source is available
///
/// Mirrors the original demo fallback: green gradient, a few leaf blobs
/// and a "simulated feed" banner.
pub fn placeholder() -> Raster {
    let mut raster = Raster::new(FRAME_WIDTH, FRAME_HEIGHT, [30, 70, 25]);
    for y in 0..FRAME_HEIGHT {
        let g = 70 + (y * 40 / FRAME_HEIGHT) as u8;
        raster.fill_rect(0, y, FRAME_WIDTH, 1, [30, g, 25]);
    }
    raster.fill_ellipse(200, 200, 80, 120, [50, 140, 60]);
    raster.fill_ellipse(400, 250, 100, 140, [40, 130, 50]);
    raster.fill_ellipse(320, 350, 90, 110, [45, 135, 55]);
    raster.overlay_banner("SIMULATED CAMERA FEED", (150, 40), [255, 255, 255]);
    raster.overlay_banner("NO VIDEO SOURCE", (180, 440), [200, 200, 200]);
    raster
}

/// Synthetic frame generator (degraded mode)
///
/// Produces the placeholder scene with a small moving marker so the feed
/// is visibly live.
pub struct SyntheticSource {
    tick: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Raster> {
        let mut frame = placeholder();
        let x = ((self.tick * 8) % (FRAME_WIDTH as u64 - 16)) as u32;
        frame.fill_rect(x, 8, 16, 8, [255, 255, 255]);
        self.tick = self.tick.wrapping_add(1);
        Ok(frame)
    }

    fn describe(&self) -> &'static str {
        "synthetic"
    }
}

/// Background frame producer
///
/// Started once at process start; refills the shared buffer at
/// [`TARGET_FPS`] until stopped. Start and stop are idempotent.
pub struct FrameProducer {
    buffer: Arc<FrameBuffer>,
    running: Arc<RwLock<bool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FrameProducer {
    /// Create a producer writing into the given buffer
    pub fn new(buffer: Arc<FrameBuffer>) -> Self {
        Self {
            buffer,
            running: Arc::new(RwLock::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the production loop, consuming the frame source
    pub async fn start(&self, mut source: Box<dyn FrameSource>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Frame producer already running");
                return;
            }
            *running = true;
        }

        tracing::info!(source = source.describe(), "Starting frame producer");

        let buffer = self.buffer.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval(Duration::from_millis(1000 / TARGET_FPS));

            loop {
                interval.tick().await;

                {
                    let is_running = running.read().await;
                    if !*is_running {
                        break;
                    }
                }

                match source.next_frame().await {
                    Ok(frame) => buffer.write(frame).await,
                    Err(e) => {
                        // Buffer keeps its last good frame
                        tracing::warn!(error = %e, "Frame production failed, skipping frame");
                    }
                }
            }

            tracing::info!("Frame producer stopped");
        });

        let mut slot = self.handle.lock().await;
        *slot = Some(handle);
    }

    /// Stop the loop and join it; the source is released on drop
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        tracing::info!("Stopping frame producer");
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthetic_source_produces_standard_frames() {
        let mut source = SyntheticSource::new();
        let a = source.next_frame().await.unwrap();
        let b = source.next_frame().await.unwrap();
        assert_eq!(a.width(), FRAME_WIDTH);
        assert_eq!(a.height(), FRAME_HEIGHT);
        // The moving marker makes consecutive frames differ
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn producer_fills_buffer_and_stops_idempotently() {
        let buffer = Arc::new(FrameBuffer::new(placeholder()));
        let producer = FrameProducer::new(buffer.clone());

        producer.start(Box::new(SyntheticSource::new())).await;
        // Second start is a no-op
        producer.start(Box::new(SyntheticSource::new())).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(buffer.has_frame().await);

        producer.stop().await;
        producer.stop().await;
    }

    #[test]
    fn missing_video_file_is_a_config_error() {
        let err = VideoFileSource::open("/nonexistent/demo.mp4").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
