//! 通知展示面 - 按身份键投递和撤销通知
//!
//! 同键投递即替换（后写者胜），没有合并。

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::result::{CompositionResult, NotificationKey};
use crate::error::Result;

/// 平台通知展示面
pub trait NotificationSurface: Send + Sync {
    /// 展示面名称（用于日志）
    fn name(&self) -> &str;

    /// 投递或替换一条通知
    fn post(&self, key: NotificationKey, result: &CompositionResult) -> Result<()>;

    /// 撤销一条通知，不存在时不报错
    fn cancel(&self, key: NotificationKey) -> Result<()>;
}

/// 展示面操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceOp {
    Post,
    Cancel,
}

/// 展示面日志记录（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRecord {
    pub ts: DateTime<Utc>,
    pub op: SurfaceOp,
    pub key: NotificationKey,
    /// 投递的完整内容，撤销时为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CompositionResult>,
}

const MAX_RECORDS: usize = 500;
const KEEP_AFTER_CLEANUP: usize = 200;
const CLEANUP_CHECK_INTERVAL: usize = 20;

/// 基于 JSONL 文件的展示面
pub struct JsonlSurface {
    path: PathBuf,
    writes: AtomicUsize,
}

impl JsonlSurface {
    /// 使用默认路径
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: AtomicUsize::new(0),
        }
    }

    /// 默认日志文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("conversation-notifier")
            .join("surface.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 锁文件路径；压缩会替换日志文件本身，所以锁放在旁边的固定文件上
    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    /// 追加一条记录，必要时在同一把锁内压缩
    fn append(&self, record: &SurfaceRecord) -> Result<()> {
        let lock = self.lock()?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        drop(file);

        let count = self.writes.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_CHECK_INTERVAL == 0 {
            if let Err(e) = self.compact() {
                debug!(path = %self.path.display(), error = %e, "Surface log cleanup failed");
            }
        }

        lock.unlock()?;
        Ok(())
    }

    fn read_all(&self) -> Vec<SurfaceRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        BufReader::new(file)
            .lines()
            .filter_map(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }

    /// 读取最近 N 条记录
    pub fn read_recent(&self, n: usize) -> Vec<SurfaceRecord> {
        let records = self.read_all();
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }

    /// 当前仍在展示的通知
    pub fn active(&self) -> BTreeMap<NotificationKey, CompositionResult> {
        fold_active(&self.read_all())
    }

    /// 超过上限时只保留最近的记录，仍在展示的通知一并保留
    pub fn cleanup(&self) -> Result<()> {
        let lock = self.lock()?;
        let result = self.compact();
        lock.unlock()?;
        result
    }

    /// 调用方必须持有锁
    fn compact(&self) -> Result<()> {
        let records = self.read_all();
        if records.len() <= MAX_RECORDS {
            return Ok(());
        }

        let start = records.len().saturating_sub(KEEP_AFTER_CLEANUP);
        let tail = &records[start..];
        let carried: Vec<SurfaceRecord> = fold_active(&records[..start])
            .into_iter()
            .filter(|(key, _)| !tail.iter().any(|r| r.key == *key))
            .map(|(key, result)| SurfaceRecord {
                ts: result.when,
                op: SurfaceOp::Post,
                key,
                result: Some(result),
            })
            .collect();

        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for record in carried.iter().chain(tail.iter()) {
                writeln!(temp_file, "{}", serde_json::to_string(record)?)?;
            }
        }
        fs::rename(&temp_path, &self.path)?;

        debug!(kept = carried.len() + tail.len(), "Surface log compacted");
        Ok(())
    }
}

impl Default for JsonlSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSurface for JsonlSurface {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn post(&self, key: NotificationKey, result: &CompositionResult) -> Result<()> {
        self.append(&SurfaceRecord {
            ts: Utc::now(),
            op: SurfaceOp::Post,
            key,
            result: Some(result.clone()),
        })
    }

    fn cancel(&self, key: NotificationKey) -> Result<()> {
        self.append(&SurfaceRecord {
            ts: Utc::now(),
            op: SurfaceOp::Cancel,
            key,
            result: None,
        })
    }
}

/// 按键折叠日志，后写者胜
fn fold_active(records: &[SurfaceRecord]) -> BTreeMap<NotificationKey, CompositionResult> {
    let mut active = BTreeMap::new();
    for record in records {
        match (record.op, &record.result) {
            (SurfaceOp::Post, Some(result)) => {
                active.insert(record.key, result.clone());
            }
            (SurfaceOp::Post, None) => {}
            (SurfaceOp::Cancel, _) => {
                active.remove(&record.key);
            }
        }
    }
    active
}
