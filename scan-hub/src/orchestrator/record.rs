use common::{CameraConfig, Command, WorkerMessage};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 一个已启动的工作单元
pub struct WorkerRecord {
    pub config: CameraConfig,
    /// `stop` 取走句柄后为 None，记录保留到任务真正结束
    pub(super) handle: Option<JoinHandle<()>>,
    pub(super) cancel: CancellationToken,
    pub(super) outbound: UnboundedReceiver<WorkerMessage>,
    pub(super) inbound: UnboundedSender<Command>,
}

impl WorkerRecord {
    /// 任务结束（正常退出或 panic）或正在停止时即视为失效
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn is_stopping(&self) -> bool {
        self.handle.is_none()
    }
}
