use async_trait::async_trait;
use common::{Frame, NetworkCameraConfig, Resolution};
use tracing::{debug, info};

use super::{CaptureError, FfmpegCommand, FfmpegReader, FrameSource, PtzControl, StreamOptions};
use crate::config::WorkerSettings;
use crate::onvif::{self, OnvifClient, OnvifPtz};

/// 一次成功连接的状态，断开时整体丢弃
pub struct ConnectionHandle {
    pub stream_uri: String,
    pub profile_token: Option<String>,
    reader: FfmpegReader,
    pending: Option<Frame>,
}

/// ONVIF / RTSP 网络摄像头
pub struct NetworkCamera {
    id: String,
    config: NetworkCameraConfig,
    resolution: Resolution,
    fps: Option<u32>,
    settings: WorkerSettings,
    onvif: OnvifClient,
    handle: Option<ConnectionHandle>,
}

impl NetworkCamera {
    pub fn new(
        id: String,
        config: NetworkCameraConfig,
        resolution: Resolution,
        fps: Option<u32>,
        settings: WorkerSettings,
    ) -> Result<Self, CaptureError> {
        let onvif = OnvifClient::from_config(&config, settings.network_timeout)?;
        Ok(Self {
            id,
            config,
            resolution,
            fps,
            settings,
            onvif,
            handle: None,
        })
    }

    /// 得到最终的 RTSP 地址；显式配置的地址不走 ONVIF
    async fn stream_uri(&self) -> Result<(String, Option<String>), CaptureError> {
        if let Some(explicit) = &self.config.stream_uri {
            let uri = onvif::inject_credentials(explicit, self.config.username(), self.config.password());
            return Ok((uri, self.config.profile_token.clone()));
        }
        let resolved = onvif::resolve_stream(&self.onvif, &self.config).await?;
        Ok((resolved.uri, Some(resolved.profile_token)))
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }
}

#[async_trait]
impl FrameSource for NetworkCamera {
    fn describe(&self) -> String {
        format!("network camera {} ({})", self.id, self.config.host)
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        self.disconnect().await;

        let (uri, profile_token) = self.stream_uri().await?;
        info!("Opening RTSP stream {}", onvif::redact(&uri));

        let options = StreamOptions {
            transport: self.config.transport,
            timeout: self.settings.network_timeout,
        };
        let command = FfmpegCommand::network(
            &self.settings.ffmpeg_path,
            &uri,
            options,
            self.resolution,
            self.fps,
        );
        let (reader, first) = FfmpegReader::open(&command, self.settings.network_timeout).await?;

        self.handle = Some(ConnectionHandle {
            stream_uri: uri,
            profile_token,
            reader,
            pending: Some(first),
        });
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Closing stream of {}", self.id);
            handle.reader.shutdown().await;
        }
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let handle = self.handle.as_mut().ok_or(CaptureError::NotConnected)?;
        if let Some(frame) = handle.pending.take() {
            return Ok(frame);
        }
        handle.reader.read_frame().await
    }

    fn ptz_control(&self) -> Option<Box<dyn PtzControl>> {
        let token = self
            .handle
            .as_ref()
            .and_then(|h| h.profile_token.clone())
            .or_else(|| self.config.profile_token.clone());
        Some(Box::new(OnvifPtz::new(self.onvif.clone(), token)))
    }
}
