//! 多摄像头扫码主程序
//!
//! 编排每个摄像头的工作任务，把识别结果分发到历史记录与叠加层。

pub mod app;
pub mod config;
pub mod console;
pub mod feed;
pub mod history;
pub mod orchestrator;
pub mod overlay;

pub use app::ScanHub;
pub use config::{HubConfig, DEFAULT_CONFIG_PATH};
