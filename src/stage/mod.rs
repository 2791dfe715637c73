//! 阶段层：统一的 Stage 能力边界
//!
//! 每个流水线阶段（生成型或确定型）都实现 Stage trait（name / execute），
//! 由 StageRegistry 按名注册与查找，StageInvoker 在调用时加超时并统一转
//! PipelineError。编排器只通过这一边界驱动阶段，不关心 prompt 内容。

pub mod aggregator;
pub mod decoder;
pub mod equipment;
pub mod invoker;
pub mod persist;
pub mod planner;
pub mod recommender;
pub mod registry;
pub mod validator;

use async_trait::async_trait;

use crate::memory::WorkoutHistoryRecord;
use crate::pipeline::types::{
    EquipmentResult, ExerciseEntry, FinalReport, SessionRequest, ValidationReport,
};

pub use aggregator::AggregatorStage;
pub use decoder::DecoderStage;
pub use equipment::EquipmentStage;
pub use invoker::StageInvoker;
pub use persist::PersistStage;
pub use planner::PlannerStage;
pub use recommender::RecommenderStage;
pub use registry::StageRegistry;
pub use validator::ValidatorStage;

/// 阶段输入：每个阶段只拿到它按依赖图应得的那一片会话状态
#[derive(Debug, Clone)]
pub enum StageContext {
    /// decoder：用户原始文本
    Decode { raw_input: String },
    /// planner：请求 + 去重后的候选池 + 累计排除集
    Plan {
        request: SessionRequest,
        candidates: Vec<ExerciseEntry>,
        exclusions: Vec<String>,
    },
    /// equipment：目标肌群
    Equipment { muscle: String },
    /// validator：请求 + 计划 + 器材（合并后的产物）
    Validate {
        request: SessionRequest,
        plan: Vec<ExerciseEntry>,
        equipment: EquipmentResult,
    },
    /// memory：待落盘的历史记录
    Persist { record: WorkoutHistoryRecord },
    /// recommender：请求 + 通过校验的计划
    Recommend {
        request: SessionRequest,
        plan: Vec<ExerciseEntry>,
    },
    /// aggregator：最终报告所需的全部切片
    Aggregate {
        request: SessionRequest,
        plan: Vec<ExerciseEntry>,
        equipment: EquipmentResult,
        recommendations: Vec<String>,
    },
}

/// 阶段输出：与 StageContext 对偶的结构化结果
#[derive(Debug, Clone)]
pub enum StageOutput {
    Request(SessionRequest),
    Plan(Vec<ExerciseEntry>),
    Equipment(EquipmentResult),
    Validation(ValidationReport),
    Persisted,
    Recommendations(Vec<String>),
    Report(FinalReport),
}

/// 阶段内部错误：外部调用失败 vs 输出不符合结构
///
/// Invoker 据此映射到 PipelineError：decoder 的 Malformed 是 Decode（意图不可解析），
/// memory 的失败是 Persistence，其它阶段的 Malformed 与 External 都算 Generation。
#[derive(Debug)]
pub enum StageError {
    /// 外部生成调用失败（网络、后端错误）
    External(String),
    /// 输出无法解析为规定结构，或输入切片类型不符
    Malformed(String),
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::External(msg) => write!(f, "external call failed: {msg}"),
            StageError::Malformed(msg) => write!(f, "malformed output: {msg}"),
        }
    }
}

/// 阶段 trait：名称、描述、异步执行
#[async_trait]
pub trait Stage: Send + Sync {
    /// 阶段名称（依赖图节点名）
    fn name(&self) -> &str;

    /// 阶段描述（日志与调试用）
    fn description(&self) -> &str;

    /// 执行阶段；输入切片类型不符时返回 Malformed
    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError>;
}

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 围栏或首尾花括号截取）
pub fn extract_json(output: &str) -> Result<&str, StageError> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Ok(rest
            .find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim()));
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(StageError::Malformed(format!(
            "no JSON object in output: {}",
            truncate(trimmed, 120)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_json() {
        let out = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(out).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_bare_json() {
        let out = "prefix {\"a\": {\"b\": 2}} suffix";
        assert_eq!(extract_json(out).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_extract_no_json_is_malformed() {
        assert!(matches!(
            extract_json("plain text only"),
            Err(StageError::Malformed(_))
        ));
    }
}
