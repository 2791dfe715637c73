//! 流水线类型定义
//!
//! 定义训练请求、动作条目、器材结果、运行阶段与会话状态等核心数据类型。

use serde::{Deserialize, Serialize};

/// 训练目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Strength,
    Hypertrophy,
    Endurance,
    FatLoss,
}

/// 训练组织方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStyle {
    StraightSets,
    Supersets,
    Circuits,
    Emom,
    Amrap,
}

/// 训练经验等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    Beginner,
    Intermediate,
    Advanced,
}

/// 解码后的训练请求；一经解码即不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// 目标肌群（原始文本，查表前统一折叠大小写与空白）
    pub muscle: String,
    pub goal: Goal,
    pub style: TrainingStyle,
    pub experience: Experience,
    /// 解码器提取的伤病/限制标记（如 lower_back、knee），可为空
    #[serde(default)]
    pub restrictions: Vec<String>,
}

/// 单个训练动作；由 Planner 产出，Validator 校验范围
/// 合法范围：sets 1-6、reps 1-30、rest_seconds 15-300
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub name: String,
    pub target_muscle: String,
    pub sets: u8,
    pub reps: u8,
    pub rest_seconds: u16,
    pub difficulty: Experience,
}

/// 器材解析结果；matched=false 表示使用了兜底器材集
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentResult {
    /// 首选器材，保证非空（兜底集托底）
    pub primary: Vec<String>,
    pub alternatives: Vec<String>,
    pub matched: bool,
}

/// 校验阶段的输出：通过与否及违规动作名
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    /// 违规动作名（重试时并入排除集）
    pub failing: Vec<String>,
    /// 人类可读的违规原因
    pub reasons: Vec<String>,
}

/// 单次运行的阶段状态机
///
/// Decoding → Planning → Validating → (RetryPlanning → Validating)? →
/// Persisting → Recommending → Aggregating → Done；任一阶段失败进入 Failed。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Decoding,
    Planning,
    Validating,
    RetryPlanning,
    Persisting,
    Recommending,
    Aggregating,
    Done,
    Failed,
}

/// 最终报告：结构化对象，文本渲染由二进制入口负责
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub muscle: String,
    pub goal: Goal,
    pub experience: Experience,
    pub exercises: Vec<ExerciseEntry>,
    pub equipment: EquipmentResult,
    pub recommendations: Vec<String>,
}

/// 会话状态：编排器在一次运行期间独占持有的可变聚合
///
/// 运行结束（报告产出）后即丢弃，只有 WorkoutHistoryRecord 落盘。
#[derive(Debug)]
pub struct SessionState {
    /// 运行 ID（日志关联用）
    pub run_id: String,
    pub phase: RunPhase,
    /// 用户原始输入
    pub raw_input: String,
    pub request: Option<SessionRequest>,
    /// 去重后的候选池（Planner 的输入）
    pub candidates: Vec<ExerciseEntry>,
    /// 本次运行累计的排除动作名（重试时追加）
    pub exclusions: Vec<String>,
    pub plan: Vec<ExerciseEntry>,
    pub equipment: Option<EquipmentResult>,
    pub validation: Option<ValidationReport>,
    /// 校验重试是否已用掉（上限恰好一次）
    pub retry_used: bool,
    /// Planner 生成失败重试是否已用掉（其它阶段生成失败一律终止）
    pub gen_retry_used: bool,
    pub recommendations: Vec<String>,
    pub report: Option<FinalReport>,
}

impl SessionState {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            phase: RunPhase::Decoding,
            raw_input: raw_input.into(),
            request: None,
            candidates: Vec::new(),
            exclusions: Vec::new(),
            plan: Vec::new(),
            equipment: None,
            validation: None,
            retry_used: false,
            gen_retry_used: false,
            recommendations: Vec::new(),
            report: None,
        }
    }

    /// 阶段迁移并输出结构化日志
    pub fn transition(&mut self, next: RunPhase) {
        tracing::debug!(run_id = %self.run_id, from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }
}

/// 肌群名归一化：折叠大小写与空白，内部空白压缩为单个下划线
///
/// 器材库、候选池与历史查询共用同一个归一化，避免三处各自为政。
pub fn normalize_muscle(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_muscle() {
        assert_eq!(normalize_muscle("  Chest "), "chest");
        assert_eq!(normalize_muscle("Lower  Back"), "lower_back");
        assert_eq!(normalize_muscle("LEGS"), "legs");
    }

    #[test]
    fn test_experience_ordering() {
        assert!(Experience::Beginner < Experience::Advanced);
    }

    #[test]
    fn test_request_roundtrip() {
        let json = r#"{"muscle":"chest","goal":"hypertrophy","style":"supersets","experience":"intermediate"}"#;
        let req: SessionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.muscle, "chest");
        assert_eq!(req.goal, Goal::Hypertrophy);
        assert_eq!(req.style, TrainingStyle::Supersets);
        assert!(req.restrictions.is_empty());
    }
}
