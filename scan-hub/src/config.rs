use camera_worker::WorkerSettings;
use common::serde_helpers::millis;
use common::{CameraConfig, CameraKind, DecodeMode, Result, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "scan-hub.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// 启动时的读取模式
    pub decode_mode: DecodeMode,

    /// 编排器轮询间隔
    #[serde(with = "millis")]
    pub poll_interval: Duration,

    pub history_path: PathBuf,

    pub worker: WorkerSettings,

    pub cameras: Vec<CameraConfig>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            decode_mode: DecodeMode::All,
            poll_interval: Duration::from_millis(30),
            history_path: PathBuf::from("data/history.csv"),
            worker: WorkerSettings::default(),
            cameras: Vec::new(),
        }
    }
}

impl HubConfig {
    /// 读取配置文件；文件不存在时使用默认值
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HubConfig = toml::from_str(content)
            .map_err(|e| ScanError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(ScanError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for camera in &self.cameras {
            camera.validate()?;
            if !ids.insert(camera.id.as_str()) {
                return Err(ScanError::InvalidConfig(format!(
                    "duplicate camera id {}",
                    camera.id
                )));
            }
        }
        Ok(())
    }

    pub fn camera(&self, id: &str) -> Result<&CameraConfig> {
        self.cameras
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ScanError::CameraNotFound(id.to_string()))
    }

    /// 查找网络摄像头，本地摄像头没有 ONVIF 能力
    pub fn network_camera(&self, id: &str) -> Result<&CameraConfig> {
        let camera = self.camera(id)?;
        if camera.kind() != CameraKind::Network {
            return Err(ScanError::InvalidConfig(format!(
                "camera {} is not a network camera",
                id
            )));
        }
        Ok(camera)
    }
}
