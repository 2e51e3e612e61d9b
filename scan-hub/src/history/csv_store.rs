use common::{Result, ScanError};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{HistoryQuery, HistoryRecord, HistoryStore};

fn csv_error(e: csv::Error) -> ScanError {
    ScanError::HistoryError(e.to_string())
}

/// 追加写入的 CSV 历史文件，写入由互斥锁串行化
pub struct CsvHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvHistoryStore {
    /// 打开或创建文件，新文件写入表头
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if is_new {
            let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
            writer
                .write_record(["ts", "camera_id", "camera_type", "payload"])
                .map_err(csv_error)?;
            writer.flush()?;
            info!("Created history file {:?}", path);
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<HistoryRecord>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(csv_error)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<HistoryRecord>() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => debug!("Skipping malformed history row: {}", e),
            }
        }
        Ok(records)
    }
}

impl HistoryStore for CsvHistoryStore {
    fn add_record(&self, record: &HistoryRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record).map_err(csv_error)?;
        writer.flush()?;
        Ok(())
    }

    fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let mut records = {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            self.read_all()?
        };
        // 同一秒内后写入的排在前面
        records.reverse();
        records.retain(|r| query.matches(r));
        records.sort_by(|a, b| b.ts.cmp(&a.ts));
        records.truncate(query.limit);
        Ok(records)
    }
}

/// 导出为带表头的 CSV
pub fn export_csv(path: &Path, rows: &[HistoryRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    if rows.is_empty() {
        writer
            .write_record(["ts", "camera_id", "camera_type", "payload"])
            .map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::parse_timestamp;
    use common::CameraKind;
    use std::sync::Arc;

    fn record(ts: &str, camera: &str, payload: &str) -> HistoryRecord {
        HistoryRecord::new(parse_timestamp(ts).unwrap(), camera, CameraKind::Network, payload)
    }

    #[test]
    fn test_append_and_query_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::open(dir.path().join("data/history.csv")).unwrap();

        store.add_record(&record("2024-05-01 10:00:00", "gate", "A-1")).unwrap();
        store.add_record(&record("2024-05-01 11:00:00", "gate", "B-2")).unwrap();
        store.add_record(&record("2024-05-01 09:00:00", "dock", "A-3")).unwrap();

        let all = store.query(&HistoryQuery::default()).unwrap();
        let payloads: Vec<&str> = all.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["B-2", "A-1", "A-3"]);
        assert_eq!(all[0].camera_kind, CameraKind::Network);

        let filtered = store
            .query(&HistoryQuery {
                keyword: Some("A-".into()),
                limit: 1,
                ..HistoryQuery::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].payload, "A-1");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        let store = CsvHistoryStore::open(&path).unwrap();
        store.add_record(&record("2024-05-01 10:00:00", "0", "X")).unwrap();
        drop(store);
        let store = CsvHistoryStore::open(&path).unwrap();
        store.add_record(&record("2024-05-01 10:00:01", "0", "Y")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("ts,camera_id,camera_type,payload"));
        assert_eq!(text.matches("camera_type").count(), 1);
        assert!(text.contains("2024-05-01 10:00:00,0,network,X"));
        assert_eq!(store.query(&HistoryQuery::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_payload_with_comma_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHistoryStore::open(dir.path().join("h.csv")).unwrap();
        store.add_record(&record("2024-05-01 10:00:00", "0", "a,b\"c")).unwrap();
        let rows = store.query(&HistoryQuery::default()).unwrap();
        assert_eq!(rows[0].payload, "a,b\"c");
    }

    #[test]
    fn test_concurrent_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvHistoryStore::open(dir.path().join("h.csv")).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .add_record(&record("2024-05-01 10:00:00", &t.to_string(), &format!("P{}", i)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rows = store
            .query(&HistoryQuery {
                limit: 1000,
                ..HistoryQuery::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 100);
    }

    #[test]
    fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("export.csv");
        export_csv(&out, &[record("2024-05-01 10:00:00", "0", "X")]).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "ts,camera_id,camera_type,payload\n2024-05-01 10:00:00,0,network,X\n"
        );

        export_csv(&out, &[]).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "ts,camera_id,camera_type,payload\n");
    }
}
