//! 编排器
//!
//! 每个摄像头一个 tokio 任务，通过两条无界通道通信：
//! 工作单元 → 编排器 (`WorkerMessage`)，编排器 → 工作单元 (`Command`)。
//! 任务是否存活由 `JoinHandle` 判断，panic 只影响对应的摄像头。

mod manager;
mod record;

pub use manager::{ProcessManager, STOP_GRACE};
pub use record::WorkerRecord;
