use camera_worker::{run_camera, CameraBackend};
use common::{CameraConfig, CameraKind, Command, DecodeMode, WorkerMessage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::record::WorkerRecord;

/// 停止时等待工作单元自行退出的时间
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// 管理所有摄像头工作单元
#[derive(Clone)]
pub struct ProcessManager {
    workers: Arc<DashMap<String, WorkerRecord>>,
    backend: Arc<dyn CameraBackend>,
    decode_mode: Arc<RwLock<DecodeMode>>,
    grace: Duration,
}

impl ProcessManager {
    pub fn new(backend: Arc<dyn CameraBackend>, decode_mode: DecodeMode) -> Self {
        Self {
            workers: Arc::new(DashMap::new()),
            backend,
            decode_mode: Arc::new(RwLock::new(decode_mode)),
            grace: STOP_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn decode_mode(&self) -> DecodeMode {
        *self.decode_mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// 启动摄像头；同 id 的工作单元仍在运行时返回 false
    pub fn start(&self, config: CameraConfig) -> bool {
        if let Err(e) = config.validate() {
            warn!("Rejecting camera {:?}: {}", config.id, e);
            return false;
        }

        match self.workers.entry(config.id.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_stopping() {
                    warn!("Camera {} is still stopping", config.id);
                    return false;
                }
                if occupied.get().is_alive() {
                    warn!("Camera {} is already running", config.id);
                    return false;
                }
                debug!("Reaping stale worker for {}", config.id);
                let stale = occupied.insert(self.spawn(config));
                stale.cancel.cancel();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.spawn(config));
            }
        }
        true
    }

    fn spawn(&self, config: CameraConfig) -> WorkerRecord {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mode = self.decode_mode();

        info!("Starting {} camera {} (mode={})", config.kind(), config.id, mode);

        let span = info_span!("camera", id = %config.id, kind = %config.kind());
        let handle = tokio::spawn(
            run_camera(
                config.clone(),
                self.backend.clone(),
                mode,
                out_tx,
                cmd_rx,
                cancel.clone(),
            )
            .instrument(span),
        );

        WorkerRecord {
            config,
            handle: Some(handle),
            cancel,
            outbound: out_rx,
            inbound: cmd_tx,
        }
    }

    /// 先请求退出，超过宽限期后强制中止；任务结束后才移除记录，未知 id 忽略
    pub async fn stop(&self, camera_id: &str) {
        let handle = match self.workers.get_mut(camera_id) {
            Some(mut record) => {
                record.cancel.cancel();
                record.handle.take()
            }
            None => {
                debug!("stop: camera {} is not tracked", camera_id);
                return;
            }
        };
        let Some(mut handle) = handle else {
            debug!("stop: camera {} is already stopping", camera_id);
            return;
        };

        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(Ok(())) => info!("Camera {} stopped", camera_id),
            Ok(Err(e)) => warn!("Camera {} worker ended abnormally: {}", camera_id, e),
            Err(_) => {
                warn!(
                    "Camera {} did not stop within {:?}, aborting",
                    camera_id, self.grace
                );
                handle.abort();
                // 等待被中止的任务释放数据源
                let _ = handle.await;
            }
        }
        self.workers.remove(camera_id);
    }

    pub async fn stop_all(&self) {
        for camera_id in self.tracked_ids() {
            self.stop(&camera_id).await;
        }
    }

    /// 非阻塞地取走所有工作单元当前已发出的消息
    pub fn drain(&self) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        for mut record in self.workers.iter_mut() {
            while let Ok(message) = record.outbound.try_recv() {
                messages.push(message);
            }
        }
        messages
    }

    /// 发送命令；未知 id 忽略，返回是否送达
    pub fn send_command(&self, camera_id: &str, command: Command) -> bool {
        match self.workers.get(camera_id) {
            Some(record) => record.inbound.send(command).is_ok(),
            None => {
                debug!("Ignoring {:?} for unknown camera {}", command, camera_id);
                false
            }
        }
    }

    /// 修改读取模式：之后启动的摄像头使用新模式，已在运行的立即切换
    pub fn set_decode_mode_all(&self, mode: DecodeMode) {
        {
            let mut current = self.decode_mode.write().unwrap_or_else(|e| e.into_inner());
            *current = mode;
        }
        info!("Decode mode set to {}", mode);
        for record in self.workers.iter() {
            let _ = record.inbound.send(Command::SetDecodeMode(mode));
        }
    }

    /// 正在运行的某类摄像头，按 id 排序
    pub fn list_cameras_of_kind(&self, kind: CameraKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .workers
            .iter()
            .filter(|record| record.config.kind() == kind && record.is_alive())
            .map(|record| record.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, camera_id: &str) -> bool {
        self.workers
            .get(camera_id)
            .map(|record| record.is_alive())
            .unwrap_or(false)
    }

    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .workers
            .iter()
            .filter(|record| record.is_alive())
            .map(|record| record.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// 所有记录，包括已结束和正在停止的
    pub fn tracked_ids(&self) -> Vec<String> {
        self.workers.iter().map(|r| r.key().clone()).collect()
    }
}
