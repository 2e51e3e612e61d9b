//! 摄像头工作单元
//!
//! 每个摄像头一个异步任务：连接、取帧、灰度化、识别、去重，然后把结果发回编排器。
//! 网络摄像头的 RTSP 地址通过 ONVIF 解析，断流后按退避策略重连。

pub mod backend;
pub mod capture;
pub mod config;
pub mod decode;
pub mod dedup;
pub mod onvif;
pub mod reconnect;
pub mod worker;

pub use backend::{CameraBackend, DefaultBackend};
pub use capture::{CaptureError, FrameSource, PtzControl};
pub use config::WorkerSettings;
pub use decode::{DecodePipeline, Detector};
pub use dedup::DedupGate;
pub use reconnect::{LinkState, ReconnectPolicy, ReconnectingSource};
pub use worker::{run_camera, CameraWorker};

#[cfg(test)]
mod worker_test;
