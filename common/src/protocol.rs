use crate::types::{CameraKind, DecodeHit, DecodeMode, Frame};

/// 发给单个摄像头工作单元的控制命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetDecodeMode(DecodeMode),
    PtzMove { pan: f32, tilt: f32, zoom: f32 },
    PtzStop,
}

impl Command {
    /// 构造 PTZ 移动命令，速度分量限制在 [-1, 1]
    pub fn ptz_move(pan: f32, tilt: f32, zoom: f32) -> Self {
        Command::PtzMove {
            pan: clamp_unit(pan),
            tilt: clamp_unit(tilt),
            zoom: clamp_unit(zoom),
        }
    }

    /// 变体字段是公开的，执行前把 PTZ 速度重新限制到 [-1, 1]
    pub fn clamped(self) -> Self {
        match self {
            Command::PtzMove { pan, tilt, zoom } => Command::ptz_move(pan, tilt, zoom),
            other => other,
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-1.0, 1.0)
    }
}

/// 一次识别结果；`is_new` 表示通过了去重窗口，需要写入历史
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub hit: DecodeHit,
    pub is_new: bool,
}

/// 每个采集周期产生的一批数据，即使没有识别到任何码也会发送
#[derive(Debug, Clone)]
pub struct FrameBatch {
    pub camera_id: String,
    pub kind: CameraKind,
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

impl FrameBatch {
    pub fn new_detections(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.is_new)
    }
}

/// 工作单元 → 编排器
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Frame(FrameBatch),
    Error { camera_id: String, message: String },
}

impl WorkerMessage {
    pub fn camera_id(&self) -> &str {
        match self {
            WorkerMessage::Frame(batch) => &batch.camera_id,
            WorkerMessage::Error { camera_id, .. } => camera_id,
        }
    }
}
