//! 采集抽象
//!
//! 每种摄像头实现 `FrameSource`，工作单元只依赖这个 trait：
//!
//! - `LocalCamera`: 本地设备（v4l2 / avfoundation），通过 ffmpeg 读取
//! - `NetworkCamera`: ONVIF 解析 RTSP 地址后通过 ffmpeg 读取
//!
//! PTZ 之类只有网络摄像头才有的能力通过 `ptz_control` 暴露，本地摄像头返回 `None`。

mod ffmpeg;
mod local;
mod network;

pub use ffmpeg::{FfmpegCommand, FfmpegReader, StreamOptions};
pub use local::LocalCamera;
pub use network::{ConnectionHandle, NetworkCamera};

use async_trait::async_trait;
use common::{CameraConfig, CameraSource, Frame};
use std::time::Duration;
use thiserror::Error;

use crate::config::WorkerSettings;
use crate::onvif::OnvifError;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to start ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source is not connected")]
    NotConnected,

    #[error("No frame within {0:?}")]
    Timeout(Duration),

    #[error("Stream ended")]
    EndOfStream,

    #[error("Stream URI resolution failed: {0}")]
    Resolve(#[from] OnvifError),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Local capture is not supported on this platform")]
    Unsupported,
}

/// 云台控制能力
#[async_trait]
pub trait PtzControl: Send {
    /// 连续移动，各分量范围 [-1, 1]
    async fn continuous_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> anyhow::Result<()>;

    async fn stop(&mut self) -> anyhow::Result<()>;
}

/// 帧数据源
#[async_trait]
pub trait FrameSource: Send {
    /// 用于日志的简短描述
    fn describe(&self) -> String;

    async fn connect(&mut self) -> Result<(), CaptureError>;

    /// 释放底层资源，可重复调用
    async fn disconnect(&mut self);

    /// 读取一帧，失败只表示这一次没有拿到帧
    async fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    fn ptz_control(&self) -> Option<Box<dyn PtzControl>> {
        None
    }
}

/// 按摄像头种类创建数据源
pub fn create_source(
    config: &CameraConfig,
    settings: &WorkerSettings,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    let resolution = config.resolution.unwrap_or(settings.default_resolution);

    match &config.source {
        CameraSource::Local => {
            let index = config
                .device_index()
                .ok_or_else(|| CaptureError::InvalidDevice(config.id.clone()))?;
            Ok(Box::new(LocalCamera::new(
                index,
                resolution,
                config.fps,
                settings.clone(),
            )))
        }
        CameraSource::Network(net) => Ok(Box::new(NetworkCamera::new(
            config.id.clone(),
            net.clone(),
            resolution,
            config.fps,
            settings.clone(),
        )?)),
    }
}
