//! 训练历史存储
//!
//! 只追加的 JSON 列表文件（单写者追加日志），内存缓存 + 异步 RwLock：
//! append 是唯一的变更并在写锁内落盘；read_recent 走读锁按时间倒序返回，
//! 并发运行间的追加由写锁串行化，保证 3 条回看窗口的倒序不变量。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::pipeline::types::normalize_muscle;

/// 一条训练历史记录；只追加，永不改写或删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutHistoryRecord {
    /// UTC 毫秒时间戳
    pub timestamp: i64,
    /// 归一化肌群名
    pub muscle: String,
    /// 本次训练的动作名（计划顺序）
    pub exercise_names: Vec<String>,
}

impl WorkoutHistoryRecord {
    pub fn new(muscle: &str, exercise_names: Vec<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            muscle: normalize_muscle(muscle),
            exercise_names,
        }
    }
}

/// 历史存储：文件路径 + 内存缓存
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: RwLock<Vec<WorkoutHistoryRecord>>,
}

impl HistoryStore {
    /// 打开历史文件；文件缺失返回空历史，内容损坏（非列表/解析失败）记录告警后按空历史处理
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Vec<WorkoutHistoryRecord>>(&data) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "history file corrupt, starting fresh");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        tracing::debug!(path = %path.display(), count = records.len(), "history opened");
        Self {
            path,
            records: RwLock::new(records),
        }
    }

    /// 追加一条记录并落盘；落盘失败时回滚内存追加，文件保持未损坏
    pub async fn append(&self, record: WorkoutHistoryRecord) -> Result<(), PipelineError> {
        let mut records = self.records.write().await;
        records.push(record);
        if let Err(e) = self.flush(&records) {
            records.pop();
            return Err(PipelineError::Persistence(e.to_string()));
        }
        tracing::info!(muscle = %records.last().map(|r| r.muscle.as_str()).unwrap_or(""), "workout history saved");
        Ok(())
    }

    /// 按时间倒序返回某肌群最近 limit 条记录
    pub async fn read_recent(&self, muscle: &str, limit: usize) -> Vec<WorkoutHistoryRecord> {
        let key = normalize_muscle(muscle);
        let records = self.records.read().await;
        records
            .iter()
            .rev()
            .filter(|r| r.muscle == key)
            .take(limit)
            .cloned()
            .collect()
    }

    /// 全量落盘：先写临时文件再原子改名，写一半失败不会破坏原文件
    fn flush(&self, records: &[WorkoutHistoryRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
