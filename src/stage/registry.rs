//! 阶段注册表
//!
//! 按名称存储 Arc<dyn Stage>，编排器通过依赖图节点名查找并调用。

use std::collections::HashMap;
use std::sync::Arc;

use crate::stage::Stage;

/// 阶段注册表：register / get / stage_names
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: impl Stage + 'static) {
        let name = stage.name().to_string();
        tracing::debug!(stage = %name, description = stage.description(), "stage registered");
        self.stages.insert(name, Arc::new(stage));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.keys().cloned().collect()
    }
}
