use common::{CameraKind, Frame, WorkerMessage};
use std::sync::Arc;
use tracing::error;

use crate::history::{HistoryRecord, HistoryStore, HistoryWriter};
use crate::overlay::{annotate, Annotation};

/// 带绘制指令的一帧，交给显示层
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub camera_id: String,
    pub kind: CameraKind,
    pub frame: Frame,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub enum FeedEvent {
    Frame(AnnotatedFrame),
    Error { camera_id: String, message: String },
}

/// 把工作单元的消息分发给历史与显示
pub struct FeedRouter {
    history: HistoryWriter,
}

impl FeedRouter {
    /// 启动历史写入任务，需要在 tokio 运行时内调用
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            history: HistoryWriter::spawn(history),
        }
    }

    /// 等待排队的历史记录写完
    pub async fn close(self) {
        self.history.close().await;
    }

    pub fn route(&self, message: WorkerMessage) -> FeedEvent {
        match message {
            WorkerMessage::Error { camera_id, message } => {
                error!("[{}] {}", camera_id, message);
                FeedEvent::Error { camera_id, message }
            }
            WorkerMessage::Frame(batch) => {
                let mut annotations = Vec::with_capacity(batch.detections.len());
                for detection in &batch.detections {
                    annotations.push(annotate(&detection.hit, detection.is_new));
                    if detection.is_new {
                        self.history.submit(HistoryRecord::now(
                            batch.camera_id.clone(),
                            batch.kind,
                            detection.hit.data.clone(),
                        ));
                    }
                }
                FeedEvent::Frame(AnnotatedFrame {
                    camera_id: batch.camera_id,
                    kind: batch.kind,
                    frame: batch.frame,
                    annotations,
                })
            }
        }
    }
}
