use chrono::Local;
use common::{
    CameraConfig, CameraKind, Command, DecodeMode, Detection, Frame, FrameBatch, WorkerMessage,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::backend::CameraBackend;
use crate::capture::{FrameSource, PtzControl};
use crate::config::WorkerSettings;
use crate::decode::DecodePipeline;
use crate::dedup::DedupGate;
use crate::reconnect::ReconnectingSource;

#[derive(Debug, Clone, Copy)]
enum PtzRequest {
    Move { pan: f32, tilt: f32, zoom: f32 },
    Stop,
}

/// 云台命令在独立任务里按顺序执行，不阻塞取帧循环
struct PtzDispatcher {
    tx: UnboundedSender<PtzRequest>,
    task: JoinHandle<()>,
}

impl PtzDispatcher {
    fn spawn(mut control: Box<dyn PtzControl>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PtzRequest>();
        let task = tokio::spawn(
            async move {
                while let Some(request) = rx.recv().await {
                    let result = match request {
                        PtzRequest::Move { pan, tilt, zoom } => {
                            control.continuous_move(pan, tilt, zoom).await
                        }
                        PtzRequest::Stop => control.stop().await,
                    };
                    if let Err(e) = result {
                        error!("PTZ {:?} failed: {:#}", request, e);
                    }
                }
            }
            .in_current_span(),
        );
        Self { tx, task }
    }

    fn send(&self, request: PtzRequest) {
        if self.tx.send(request).is_err() {
            warn!("PTZ dispatcher is gone, dropping {:?}", request);
        }
    }
}

impl Drop for PtzDispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 单个摄像头的采集 / 识别循环
pub struct CameraWorker {
    config: CameraConfig,
    source: ReconnectingSource,
    pipeline: DecodePipeline,
    gate: DedupGate,
    ptz: Option<PtzDispatcher>,
}

impl CameraWorker {
    pub fn new(
        config: CameraConfig,
        source: Box<dyn FrameSource>,
        pipeline: DecodePipeline,
        settings: &WorkerSettings,
    ) -> Self {
        Self {
            config,
            source: ReconnectingSource::new(source, settings),
            pipeline,
            gate: DedupGate::new(settings.dedup_window),
            ptz: None,
        }
    }

    pub fn kind(&self) -> CameraKind {
        self.config.kind()
    }

    pub fn decode_mode(&self) -> DecodeMode {
        self.pipeline.mode()
    }

    /// 运行到被取消为止；首次连接失败时上报错误后退出
    pub async fn run(
        mut self,
        outbound: UnboundedSender<WorkerMessage>,
        mut inbound: UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.source.connect() => result,
        };
        if let Err(e) = connected {
            error!("Failed to connect {}: {}", self.source.describe(), e);
            let _ = outbound.send(WorkerMessage::Error {
                camera_id: self.config.id.clone(),
                message: format!("camera {} connection failed: {}", self.config.id, e),
            });
            self.source.disconnect().await;
            return;
        }
        info!("Connected to {}, mode={}", self.source.describe(), self.pipeline.mode());

        loop {
            self.drain_commands(&mut inbound);

            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = self.source.capture_frame() => frame,
            };
            let Some(frame) = frame else { continue };

            let batch = self.process_frame(frame);
            if outbound.send(WorkerMessage::Frame(batch)).is_err() {
                debug!("Outbound channel closed");
                break;
            }
        }

        self.ptz = None;
        self.source.disconnect().await;
        info!("Worker for {} stopped", self.config.id);
    }

    fn drain_commands(&mut self, inbound: &mut UnboundedReceiver<Command>) {
        loop {
            match inbound.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply(&mut self, command: Command) {
        match command.clamped() {
            Command::SetDecodeMode(mode) => {
                if mode != self.pipeline.mode() {
                    info!("Decode mode {} -> {}", self.pipeline.mode(), mode);
                }
                self.pipeline.set_mode(mode);
            }
            Command::PtzMove { pan, tilt, zoom } => {
                self.dispatch_ptz(PtzRequest::Move { pan, tilt, zoom })
            }
            Command::PtzStop => self.dispatch_ptz(PtzRequest::Stop),
        }
    }

    fn dispatch_ptz(&mut self, request: PtzRequest) {
        if self.ptz.is_none() {
            match self.source.ptz_control() {
                Some(control) => self.ptz = Some(PtzDispatcher::spawn(control)),
                None => {
                    debug!("{} has no PTZ, ignoring {:?}", self.config.id, request);
                    return;
                }
            }
        }
        if let Some(ptz) = &self.ptz {
            ptz.send(request);
        }
    }

    fn process_frame(&mut self, frame: Frame) -> FrameBatch {
        let luma = frame.to_luma();
        let hits = self.pipeline.decode(&luma);
        let now = Instant::now();
        let kind = self.config.kind();

        let detections = hits
            .into_iter()
            .map(|hit| {
                let is_new = self.gate.should_promote(&hit.data, now);
                if is_new {
                    info!(
                        "[{}][{}][{}:{}] {}",
                        hit.symbology,
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        kind,
                        self.config.id,
                        hit.data
                    );
                }
                Detection { hit, is_new }
            })
            .collect();

        FrameBatch {
            camera_id: self.config.id.clone(),
            kind,
            frame,
            detections,
        }
    }
}

/// 按配置打开数据源并运行工作单元，打开失败同样以错误消息上报
pub async fn run_camera(
    config: CameraConfig,
    backend: Arc<dyn CameraBackend>,
    mode: DecodeMode,
    outbound: UnboundedSender<WorkerMessage>,
    inbound: UnboundedReceiver<Command>,
    cancel: CancellationToken,
) {
    let source = match backend.open_source(&config) {
        Ok(source) => source,
        Err(e) => {
            error!("Cannot create source for {}: {}", config.id, e);
            let _ = outbound.send(WorkerMessage::Error {
                camera_id: config.id.clone(),
                message: format!("camera {} connection failed: {}", config.id, e),
            });
            return;
        }
    };
    let pipeline = DecodePipeline::new(mode, backend.detectors());
    CameraWorker::new(config, source, pipeline, backend.settings())
        .run(outbound, inbound, cancel)
        .await
}
