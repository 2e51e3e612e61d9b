use common::serde_helpers::millis;
use common::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureError, FrameSource, PtzControl};
use crate::config::WorkerSettings;

/// 重连退避策略
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// 每次尝试前的等待：base, 2*base, 4*base ... 不超过 max_delay
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max_delay = self.max_delay;
        let mut delay = self.base_delay.min(max_delay);
        (0..self.max_attempts).map(move |_| {
            let current = delay;
            delay = delay.saturating_mul(2).min(max_delay);
            current
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    /// 重连次数用尽，不再尝试
    Lost,
}

/// 在数据源外层加上失败计数与自动重连
pub struct ReconnectingSource {
    source: Box<dyn FrameSource>,
    policy: ReconnectPolicy,
    failure_threshold: u32,
    idle_poll: Duration,
    consecutive_failures: u32,
    state: LinkState,
}

impl ReconnectingSource {
    pub fn new(source: Box<dyn FrameSource>, settings: &WorkerSettings) -> Self {
        Self {
            source,
            policy: settings.reconnect.clone(),
            failure_threshold: settings.failure_threshold.max(1),
            idle_poll: settings.idle_poll,
            consecutive_failures: 0,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn ptz_control(&self) -> Option<Box<dyn PtzControl>> {
        self.source.ptz_control()
    }

    /// 首次连接，失败不重试
    pub async fn connect(&mut self) -> Result<(), CaptureError> {
        self.source.connect().await?;
        self.state = LinkState::Connected;
        self.consecutive_failures = 0;
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        self.source.disconnect().await;
        if self.state == LinkState::Connected {
            self.state = LinkState::Disconnected;
        }
    }

    /// 取一帧；连续失败达到阈值时在这里完成重连
    pub async fn capture_frame(&mut self) -> Option<Frame> {
        match self.state {
            LinkState::Connected => {}
            LinkState::Disconnected => return None,
            LinkState::Lost => {
                tokio::time::sleep(self.idle_poll).await;
                return None;
            }
        }

        match self.source.read_frame().await {
            Ok(frame) => {
                self.consecutive_failures = 0;
                Some(frame)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                debug!(
                    "Read failed ({}/{}): {}",
                    self.consecutive_failures, self.failure_threshold, e
                );
                if self.consecutive_failures >= self.failure_threshold {
                    warn!(
                        "{} failed {} reads in a row, reconnecting",
                        self.source.describe(),
                        self.consecutive_failures
                    );
                    self.reconnect().await;
                }
                None
            }
        }
    }

    async fn reconnect(&mut self) {
        self.source.disconnect().await;
        self.state = LinkState::Disconnected;

        for (attempt, delay) in self.policy.delays().enumerate() {
            info!(
                "Reconnect attempt {}/{} in {:?}",
                attempt + 1,
                self.policy.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;

            match self.source.connect().await {
                Ok(()) => {
                    info!("Reconnected to {}", self.source.describe());
                    self.consecutive_failures = 0;
                    self.state = LinkState::Connected;
                    return;
                }
                Err(e) => warn!("Reconnect attempt {} failed: {}", attempt + 1, e),
            }
        }

        error!(
            "Giving up on {} after {} reconnect attempts",
            self.source.describe(),
            self.policy.max_attempts
        );
        self.state = LinkState::Lost;
    }
}
