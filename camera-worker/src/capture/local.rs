use async_trait::async_trait;
use common::{Frame, Resolution};
use tracing::{debug, info};

use super::{CaptureError, FfmpegCommand, FfmpegReader, FrameSource};
use crate::config::WorkerSettings;

/// 本地摄像头，按设备序号打开
pub struct LocalCamera {
    index: u32,
    resolution: Resolution,
    fps: Option<u32>,
    settings: WorkerSettings,
    reader: Option<FfmpegReader>,
    pending: Option<Frame>,
}

impl LocalCamera {
    pub fn new(index: u32, resolution: Resolution, fps: Option<u32>, settings: WorkerSettings) -> Self {
        Self {
            index,
            resolution,
            fps,
            settings,
            reader: None,
            pending: None,
        }
    }

    fn command(&self) -> Result<FfmpegCommand, CaptureError> {
        let (format, device) = device_input(self.index)?;
        Ok(FfmpegCommand::device(
            &self.settings.ffmpeg_path,
            format,
            device,
            self.resolution,
            self.fps,
        ))
    }
}

#[cfg(target_os = "linux")]
fn device_input(index: u32) -> Result<(&'static str, String), CaptureError> {
    Ok(("v4l2", format!("/dev/video{}", index)))
}

#[cfg(target_os = "macos")]
fn device_input(index: u32) -> Result<(&'static str, String), CaptureError> {
    Ok(("avfoundation", index.to_string()))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn device_input(_index: u32) -> Result<(&'static str, String), CaptureError> {
    Err(CaptureError::Unsupported)
}

#[async_trait]
impl FrameSource for LocalCamera {
    fn describe(&self) -> String {
        format!("local device {}", self.index)
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        self.disconnect().await;

        let command = self.command()?;
        let (reader, first) = FfmpegReader::open(&command, self.settings.network_timeout).await?;
        info!(
            "Opened local device {} at {}x{}",
            self.index, self.resolution.width, self.resolution.height
        );

        self.reader = Some(reader);
        self.pending = Some(first);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.pending = None;
        if let Some(reader) = self.reader.take() {
            debug!("Releasing local device {}", self.index);
            reader.shutdown().await;
        }
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        match self.reader.as_mut() {
            Some(reader) => reader.read_frame().await,
            None => Err(CaptureError::NotConnected),
        }
    }
}
