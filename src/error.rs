//! 流水线错误类型
//!
//! 按阶段失败的性质分类：Decode 终止、Generation 仅 Planner 可随校验重试一次、
//! Validation 触发单次有界重试、Persistence 终止但不破坏历史文件。

use thiserror::Error;

/// 一次流水线运行中可能出现的错误
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 用户意图无法解析为结构化请求，直接终止
    #[error("Decode failed: {0}")]
    Decode(String),

    /// 某个阶段的外部生成调用失败
    #[error("Stage '{stage}' generation failed: {message}")]
    Generation { stage: String, message: String },

    /// 阶段调用超时，视为该阶段失败而非挂起
    #[error("Stage '{0}' timed out")]
    StageTimeout(String),

    /// 安全规则校验失败；首次触发有界重试，第二次即终止
    #[error("Validation failed for exercises: {}", failing.join(", "))]
    Validation { failing: Vec<String> },

    /// 历史记录写入失败；终止但历史文件保持未损坏
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// 运行在阶段间被取消；不会留下半条历史记录
    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// 是否为校验失败（终端失败，调用方可提示用户调整请求后重试）
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_validation_distinguishes_terminal_kind() {
        let validation = PipelineError::Validation {
            failing: vec!["deadlift".to_string()],
        };
        assert!(validation.is_validation());
        assert!(!PipelineError::Cancelled.is_validation());
        assert!(!PipelineError::Decode("garbage".to_string()).is_validation());
    }
}
