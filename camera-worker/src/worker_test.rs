use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{
    CameraConfig, Command, DecodeHit, DecodeMode, Frame, LumaFrame, SymbolFamily, Symbology,
    WorkerMessage,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use crate::backend::CameraBackend;
use crate::capture::{CaptureError, FrameSource, PtzControl};
use crate::config::WorkerSettings;
use crate::decode::{DecodePipeline, Detector};
use crate::worker::{run_camera, CameraWorker};

#[derive(Default)]
struct SourceLog {
    disconnects: u32,
    ptz: Vec<String>,
}

struct FakeSource {
    connect_ok: bool,
    with_ptz: bool,
    log: Arc<Mutex<SourceLog>>,
}

impl FakeSource {
    fn new(connect_ok: bool, with_ptz: bool) -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        (
            Self {
                connect_ok,
                with_ptz,
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    fn describe(&self) -> String {
        "fake".to_string()
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        if self.connect_ok {
            Ok(())
        } else {
            Err(CaptureError::NotConnected)
        }
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Frame::new(2, 2, Bytes::from(vec![0u8; 12])))
    }

    fn ptz_control(&self) -> Option<Box<dyn PtzControl>> {
        if self.with_ptz {
            Some(Box::new(FakePtz(self.log.clone())))
        } else {
            None
        }
    }
}

struct FakePtz(Arc<Mutex<SourceLog>>);

#[async_trait]
impl PtzControl for FakePtz {
    async fn continuous_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> anyhow::Result<()> {
        self.0
            .lock()
            .unwrap()
            .ptz
            .push(format!("move {} {} {}", pan, tilt, zoom));
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.0.lock().unwrap().ptz.push("stop".to_string());
        Ok(())
    }
}

struct Always(SymbolFamily, Symbology, &'static str);

impl Detector for Always {
    fn family(&self) -> SymbolFamily {
        self.0
    }

    fn detect(&self, _frame: &LumaFrame) -> anyhow::Result<Vec<DecodeHit>> {
        Ok(vec![DecodeHit::new(self.2, self.1)])
    }
}

fn pipeline() -> DecodePipeline {
    DecodePipeline::new(
        DecodeMode::All,
        vec![
            Box::new(Always(SymbolFamily::DataMatrix, Symbology::DataMatrix, "DM-1")),
            Box::new(Always(SymbolFamily::Qr, Symbology::QrCode, "QR-1")),
        ],
    )
}

async fn next_batch(rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> common::FrameBatch {
    let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for worker")
        .expect("worker channel closed");
    match message {
        WorkerMessage::Frame(batch) => batch,
        other => panic!("unexpected message {:?}", other),
    }
}

#[tokio::test]
async fn test_detections_promoted_once_per_window() {
    let (source, log) = FakeSource::new(true, false);
    let worker = CameraWorker::new(
        CameraConfig::local(0),
        Box::new(source),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(out_tx, cmd_rx, cancel.clone()));

    let first = next_batch(&mut out_rx).await;
    assert_eq!(first.camera_id, "0");
    assert_eq!(first.detections.len(), 2);
    assert!(first.detections.iter().all(|d| d.is_new));

    let second = next_batch(&mut out_rx).await;
    assert_eq!(second.detections.len(), 2);
    assert_eq!(second.new_detections().count(), 0);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.lock().unwrap().disconnects, 1);
}

#[tokio::test]
async fn test_connect_failure_reports_error() {
    let (source, _) = FakeSource::new(false, false);
    let worker = CameraWorker::new(
        CameraConfig::local(3),
        Box::new(source),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    worker.run(out_tx, cmd_rx, CancellationToken::new()).await;

    match out_rx.recv().await {
        Some(WorkerMessage::Error { camera_id, message }) => {
            assert_eq!(camera_id, "3");
            assert!(message.contains("connection failed"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(out_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_queued_mode_applies_before_first_frame() {
    let (source, _) = FakeSource::new(true, false);
    let worker = CameraWorker::new(
        CameraConfig::local(0),
        Box::new(source),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    cmd_tx.send(Command::SetDecodeMode(DecodeMode::DataMatrix)).unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(out_tx, cmd_rx, cancel.clone()));

    for _ in 0..3 {
        let batch = next_batch(&mut out_rx).await;
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].hit.symbology, Symbology::DataMatrix);
    }

    cmd_tx.send(Command::SetDecodeMode(DecodeMode::QrCode)).unwrap();
    // 命令在下一次取帧前生效，最多再收到一帧旧模式的结果
    let mut saw_qr = false;
    for _ in 0..3 {
        let batch = next_batch(&mut out_rx).await;
        if batch.detections.iter().any(|d| d.hit.symbology == Symbology::QrCode) {
            saw_qr = true;
            break;
        }
    }
    assert!(saw_qr);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_ptz_commands_run_in_order() {
    let (source, log) = FakeSource::new(true, true);
    let worker = CameraWorker::new(
        CameraConfig::network("gate", common::NetworkCameraConfig::new("10.0.0.5")),
        Box::new(source),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(out_tx, cmd_rx, cancel.clone()));

    cmd_tx.send(Command::ptz_move(0.5, 0.0, 0.0)).unwrap();
    cmd_tx.send(Command::PtzStop).unwrap();
    // 直接构造的越界速度在执行前被限制
    cmd_tx
        .send(Command::PtzMove { pan: 3.0, tilt: -2.0, zoom: 0.25 })
        .unwrap();

    for _ in 0..100 {
        let _ = next_batch(&mut out_rx).await;
        if log.lock().unwrap().ptz.len() == 3 {
            break;
        }
    }
    assert_eq!(
        log.lock().unwrap().ptz,
        vec!["move 0.5 0 0", "stop", "move 1 -1 0.25"]
    );

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_ptz_ignored_without_capability() {
    let (source, log) = FakeSource::new(true, false);
    let worker = CameraWorker::new(
        CameraConfig::local(0),
        Box::new(source),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(out_tx, cmd_rx, cancel.clone()));

    cmd_tx.send(Command::ptz_move(1.0, 1.0, 0.0)).unwrap();
    next_batch(&mut out_rx).await;
    next_batch(&mut out_rx).await;
    assert!(log.lock().unwrap().ptz.is_empty());

    cancel.cancel();
    handle.await.unwrap();
}

struct BrokenBackend(WorkerSettings);

impl CameraBackend for BrokenBackend {
    fn settings(&self) -> &WorkerSettings {
        &self.0
    }

    fn open_source(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::InvalidDevice(config.id.clone()))
    }
}

#[tokio::test]
async fn test_run_camera_reports_open_failure() {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    run_camera(
        CameraConfig::local(7),
        Arc::new(BrokenBackend(WorkerSettings::default())),
        DecodeMode::All,
        out_tx,
        cmd_rx,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        out_rx.recv().await,
        Some(WorkerMessage::Error { camera_id, .. }) if camera_id == "7"
    ));
}

/// 首次连接成功，之后每次读帧和重连都失败
struct DeadAfterConnect {
    connects: Arc<AtomicU32>,
}

#[async_trait]
impl FrameSource for DeadAfterConnect {
    fn describe(&self) -> String {
        "dead camera".to_string()
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        if self.connects.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err(CaptureError::NotConnected)
        }
    }

    async fn disconnect(&mut self) {}

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(CaptureError::Timeout(Duration::from_millis(5)))
    }
}

#[tokio::test(start_paused = true)]
async fn test_lost_connection_keeps_worker_quiet() {
    let connects = Arc::new(AtomicU32::new(0));
    let worker = CameraWorker::new(
        CameraConfig::local(0),
        Box::new(DeadAfterConnect {
            connects: connects.clone(),
        }),
        pipeline(),
        &WorkerSettings::default(),
    );
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(out_tx, cmd_rx, cancel.clone()));

    // 退避总计 1+2+4+8+10 秒，留足余量
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connects.load(Ordering::SeqCst), 6);
    assert!(!handle.is_finished());
    assert!(matches!(out_rx.try_recv(), Err(TryRecvError::Empty)));

    // 失联后仍然接收命令，只是不产生任何输出
    cmd_tx.send(Command::SetDecodeMode(DecodeMode::Barcode)).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!handle.is_finished());
    assert!(matches!(out_rx.try_recv(), Err(TryRecvError::Empty)));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(out_rx.try_recv(), Err(TryRecvError::Disconnected)));
}
