use anyhow::Context;
use camera_worker::onvif::{MediaProfile, OnvifClient};
use camera_worker::{CameraBackend, DefaultBackend};
use std::path::Path;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::console::{self, ConsoleCommand};
use crate::feed::{FeedEvent, FeedRouter};
use crate::history::{export_csv, CsvHistoryStore, HistoryQuery, HistoryRecord, HistoryStore};
use crate::orchestrator::ProcessManager;

/// 多摄像头扫码主程序
pub struct ScanHub {
    config: HubConfig,
    manager: ProcessManager,
    router: FeedRouter,
}

impl ScanHub {
    /// 使用 ffmpeg / ONVIF 后端与 CSV 历史文件
    pub fn new(config: HubConfig) -> anyhow::Result<Self> {
        let history = CsvHistoryStore::open(&config.history_path)
            .with_context(|| format!("Failed to open history {:?}", config.history_path))?;
        let backend = Arc::new(DefaultBackend::new(config.worker.clone()));
        Ok(Self::with_parts(config, backend, Arc::new(history)))
    }

    /// 需要在 tokio 运行时内调用
    pub fn with_parts(
        config: HubConfig,
        backend: Arc<dyn CameraBackend>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let manager = ProcessManager::new(backend, config.decode_mode);
        Self {
            config,
            manager,
            router: FeedRouter::new(history),
        }
    }

    pub fn manager(&self) -> &ProcessManager {
        &self.manager
    }

    /// 启动配置中的全部摄像头，返回成功启动的数量
    pub fn start_all(&self) -> usize {
        let mut started = 0;
        for camera in &self.config.cameras {
            if self.manager.start(camera.clone()) {
                started += 1;
            } else {
                warn!("Camera {} was not started", camera.id);
            }
        }
        started
    }

    /// 一次轮询：取出所有排队消息并分发
    pub fn poll(&self) -> Vec<FeedEvent> {
        self.manager
            .drain()
            .into_iter()
            .map(|message| self.router.route(message))
            .collect()
    }

    /// 主循环，直到 Ctrl-C 或 quit
    pub async fn run(self) -> anyhow::Result<()> {
        let started = self.start_all();
        info!("✓ {} of {} cameras started", started, self.config.cameras.len());
        info!("Type 'help' for console commands, Ctrl-C to quit");

        let mut lines = console::spawn_stdin_reader();
        let mut stdin_open = true;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                    }
                    info!("Shutdown requested");
                    break;
                }
                line = lines.recv(), if stdin_open => match line {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match ConsoleCommand::parse(&line) {
                        Ok(command) => {
                            if !console::execute(&self.manager, &self.config, command).await {
                                break;
                            }
                        }
                        Err(e) => warn!("{}", e),
                    },
                    None => {
                        debug!("stdin closed, console disabled");
                        stdin_open = false;
                    }
                },
                _ = ticker.tick() => {
                    for event in self.poll() {
                        if let FeedEvent::Frame(frame) = event {
                            for annotation in &frame.annotations {
                                debug!(
                                    "[{}] {} at ({}, {})",
                                    frame.camera_id, annotation.label, annotation.anchor.x, annotation.anchor.y
                                );
                            }
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// 停止全部工作单元，分发剩余消息，等待历史写完
    pub async fn shutdown(self) {
        info!("Stopping {} camera workers", self.manager.running_ids().len());
        self.manager.stop_all().await;
        let leftover = self.poll().len();
        if leftover > 0 {
            debug!("Routed {} messages after stop", leftover);
        }
        self.router.close().await;
        info!("All camera workers stopped");
    }
}

fn onvif_client(config: &HubConfig, camera_id: &str) -> anyhow::Result<(OnvifClient, Option<String>)> {
    let camera = config.network_camera(camera_id)?;
    let network = camera
        .network_config()
        .context("network camera without network settings")?;
    let client = OnvifClient::from_config(network, config.worker.network_timeout)?;
    Ok((client, network.profile_token.clone()))
}

/// 列出网络摄像头的媒体 profile
pub async fn list_profiles(config: &HubConfig, camera_id: &str) -> anyhow::Result<Vec<MediaProfile>> {
    let (client, _) = onvif_client(config, camera_id)?;
    Ok(client.list_profiles().await?)
}

/// 抓取一张 JPEG 快照写入文件，返回字节数
pub async fn save_snapshot(config: &HubConfig, camera_id: &str, out: &Path) -> anyhow::Result<usize> {
    let (client, token) = onvif_client(config, camera_id)?;
    let jpeg = client.snapshot_jpeg(token.as_deref()).await?;
    tokio::fs::write(out, &jpeg)
        .await
        .with_context(|| format!("Failed to write {:?}", out))?;
    Ok(jpeg.len())
}

/// 查询历史；给出 `export` 时同时导出为 CSV
pub fn query_history(
    config: &HubConfig,
    query: &HistoryQuery,
    export: Option<&Path>,
) -> anyhow::Result<Vec<HistoryRecord>> {
    let store = CsvHistoryStore::open(&config.history_path)?;
    let rows = store.query(query)?;
    if let Some(path) = export {
        export_csv(path, &rows)?;
        info!("Exported {} rows to {:?}", rows.len(), path);
    }
    Ok(rows)
}
