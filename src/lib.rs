//! Coach - Rust 健身训练流水线智能体
//!
//! 把一句随口的训练请求变成结构化、通过安全校验、带器材建议且避开近期
//! 重复动作的训练计划。模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **dedup**: 去重引擎（回看训练历史，剔除近期用过的动作，LRU 放回托底）
//! - **equipment**: 器材解析（肌群 → 器材集，兜底集保证非空）
//! - **error**: 流水线错误分类
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 训练历史的只追加存储
//! - **pipeline**: 会话状态、阶段依赖图与波次编排器
//! - **pool**: 动作候选池（去重引擎的输入）
//! - **stage**: 统一的阶段边界（注册表 + 超时调用器 + 七个阶段）

pub mod config;
pub mod dedup;
pub mod equipment;
pub mod error;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod pool;
pub mod stage;

pub use error::PipelineError;
pub use pipeline::{create_llm_from_config, FinalReport, Pipeline};
