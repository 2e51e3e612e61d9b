//! 识别历史
//!
//! 只有通过去重窗口的识别才会写入。`HistoryStore` 是存储的抽象，默认实现
//! 是追加写入的 CSV 文件。

mod csv_store;
mod writer;

pub use csv_store::{export_csv, CsvHistoryStore};
pub use writer::HistoryWriter;

use chrono::{Local, NaiveDateTime, Timelike};
use common::{CameraKind, Result};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_QUERY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(with = "timestamp")]
    pub ts: NaiveDateTime,
    pub camera_id: String,
    #[serde(rename = "camera_type")]
    pub camera_kind: CameraKind,
    pub payload: String,
}

impl HistoryRecord {
    pub fn new(
        ts: NaiveDateTime,
        camera_id: impl Into<String>,
        camera_kind: CameraKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            camera_id: camera_id.into(),
            camera_kind,
            payload: payload.into(),
        }
    }

    /// 以当前本地时间（精确到秒）创建
    pub fn now(camera_id: impl Into<String>, camera_kind: CameraKind, payload: impl Into<String>) -> Self {
        let ts = Local::now().naive_local();
        let ts = ts.with_nanosecond(0).unwrap_or(ts);
        Self::new(ts, camera_id, camera_kind, payload)
    }
}

/// 查询条件，全部为空时返回最新的 `limit` 条
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub camera_id: Option<String>,
    /// 内容包含的子串
    pub keyword: Option<String>,
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            camera_id: None,
            keyword: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl HistoryQuery {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        if self.from.map_or(false, |from| record.ts < from) {
            return false;
        }
        if self.to.map_or(false, |to| record.ts > to) {
            return false;
        }
        if let Some(camera_id) = self.camera_id.as_deref().filter(|c| !c.is_empty()) {
            if record.camera_id != camera_id {
                return false;
            }
        }
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            if !record.payload.contains(keyword) {
                return false;
            }
        }
        true
    }
}

pub trait HistoryStore: Send + Sync {
    fn add_record(&self, record: &HistoryRecord) -> Result<()>;

    /// 按时间倒序返回
    fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>>;
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|e| {
        common::ScanError::HistoryError(format!("bad timestamp {:?}: {}", value, e))
    })
}

mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
