use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{HistoryRecord, HistoryStore};

/// 后台写历史：记录按提交顺序逐条写入，文件 IO 在 blocking 线程池里执行
pub struct HistoryWriter {
    tx: UnboundedSender<HistoryRecord>,
    task: JoinHandle<()>,
}

impl HistoryWriter {
    /// 需要在 tokio 运行时内调用
    pub fn spawn(store: Arc<dyn HistoryStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<HistoryRecord>();
        let task = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let store = store.clone();
                let payload = record.payload.clone();
                match tokio::task::spawn_blocking(move || store.add_record(&record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to record {}: {}", payload, e),
                    Err(e) => error!("History write for {} panicked: {}", payload, e),
                }
            }
            debug!("History writer finished");
        });
        Self { tx, task }
    }

    pub fn submit(&self, record: HistoryRecord) {
        if let Err(e) = self.tx.send(record) {
            warn!("History writer is gone, dropping {}", e.0.payload);
        }
    }

    /// 关闭队列并等待已提交的记录全部写完
    pub async fn close(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            error!("History writer task failed: {}", e);
        }
    }
}
