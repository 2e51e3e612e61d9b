use common::serde_helpers::millis;
use common::Resolution;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// 工作单元的运行参数，所有摄像头共用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// 连续取帧失败多少次后触发重连
    pub failure_threshold: u32,

    pub reconnect: ReconnectPolicy,

    /// RTSP / ONVIF 网络超时
    #[serde(with = "millis")]
    pub network_timeout: Duration,

    /// 同一内容写入历史的最小间隔
    #[serde(with = "millis")]
    pub dedup_window: Duration,

    /// 未配置分辨率时的输出尺寸
    pub default_resolution: Resolution,

    /// 连接永久丢失后，空转时每次取帧的等待
    #[serde(with = "millis")]
    pub idle_poll: Duration,

    pub ffmpeg_path: PathBuf,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            reconnect: ReconnectPolicy::default(),
            network_timeout: Duration::from_secs(5),
            dedup_window: Duration::from_secs(15),
            default_resolution: Resolution::new(640, 480),
            idle_poll: Duration::from_millis(20),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}
