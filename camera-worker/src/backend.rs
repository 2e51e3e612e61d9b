use common::CameraConfig;

use crate::capture::{self, CaptureError, FrameSource};
use crate::config::WorkerSettings;
use crate::decode::{default_detectors, Detector};

/// 工作单元依赖的外部资源：数据源与检测器
///
/// 编排器持有一个实现，测试里可以换成假的摄像头。
pub trait CameraBackend: Send + Sync {
    fn settings(&self) -> &WorkerSettings;

    fn open_source(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn detectors(&self) -> Vec<Box<dyn Detector>> {
        default_detectors()
    }
}

/// ffmpeg 采集 + rxing 识别
pub struct DefaultBackend {
    settings: WorkerSettings,
}

impl DefaultBackend {
    pub fn new(settings: WorkerSettings) -> Self {
        Self { settings }
    }
}

impl CameraBackend for DefaultBackend {
    fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    fn open_source(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        capture::create_source(config, &self.settings)
    }
}
