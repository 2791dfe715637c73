//! Memory 阶段
//!
//! 校验闸门之后的落盘点：把本次计划写入训练历史。写入失败由调用器
//! 映射为 Persistence 错误，历史文件本身保持未损坏。

use std::sync::Arc;

use async_trait::async_trait;

use crate::memory::HistoryStore;
use crate::stage::{Stage, StageContext, StageError, StageOutput};

/// Memory：确定性阶段，持有历史存储
pub struct PersistStage {
    store: Arc<HistoryStore>,
}

impl PersistStage {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PersistStage {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "appends the validated plan to the workout history log"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Persist { record } = ctx else {
            return Err(StageError::Malformed("memory expects Persist context".into()));
        };
        self.store
            .append(record)
            .await
            .map_err(|e| StageError::External(e.to_string()))?;
        Ok(StageOutput::Persisted)
    }
}
