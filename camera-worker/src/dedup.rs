use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 去重：同一内容在窗口期内只提升一次
pub struct DedupGate {
    window: Duration,
    seen: HashMap<String, Instant>,
}

impl DedupGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// 返回 true 表示这是一次新的识别，需要记录
    pub fn should_promote(&mut self, payload: &str, now: Instant) -> bool {
        if payload.is_empty() {
            return false;
        }
        match self.seen.get(payload) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.seen.insert(payload.to_string(), now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
