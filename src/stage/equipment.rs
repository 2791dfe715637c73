//! Equipment 阶段
//!
//! 统一阶段边界下的薄封装：真正的解析逻辑在 equipment::EquipmentDb（纯函数）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::equipment::EquipmentDb;
use crate::stage::{Stage, StageContext, StageError, StageOutput};

/// Equipment：确定性阶段，持有只读器材库
pub struct EquipmentStage {
    db: Arc<EquipmentDb>,
}

impl EquipmentStage {
    pub fn new(db: Arc<EquipmentDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Stage for EquipmentStage {
    fn name(&self) -> &str {
        "equipment"
    }

    fn description(&self) -> &str {
        "resolves required/alternative equipment for the target muscle"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Equipment { muscle } = ctx else {
            return Err(StageError::Malformed("equipment expects Equipment context".into()));
        };
        Ok(StageOutput::Equipment(self.db.resolve(&muscle)))
    }
}
