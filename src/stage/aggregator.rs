//! Aggregator 阶段
//!
//! 把各阶段产物装配为结构化 FinalReport；确定性装配，不发生成调用。
//! 文本渲染是二进制入口的事，这里只产出结构。

use async_trait::async_trait;

use crate::pipeline::types::FinalReport;
use crate::stage::{Stage, StageContext, StageError, StageOutput};

/// Aggregator：确定性装配阶段
#[derive(Debug, Default)]
pub struct AggregatorStage;

impl AggregatorStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for AggregatorStage {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn description(&self) -> &str {
        "assembles the final structured report from all stage outputs"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Aggregate {
            request,
            plan,
            equipment,
            recommendations,
        } = ctx
        else {
            return Err(StageError::Malformed("aggregator expects Aggregate context".into()));
        };

        Ok(StageOutput::Report(FinalReport {
            muscle: request.muscle,
            goal: request.goal,
            experience: request.experience,
            exercises: plan,
            equipment,
            recommendations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::fallback_result;
    use crate::pipeline::types::{Experience, Goal, SessionRequest, TrainingStyle};

    #[tokio::test]
    async fn test_assembles_report() {
        let stage = AggregatorStage::new();
        let output = stage
            .execute(StageContext::Aggregate {
                request: SessionRequest {
                    muscle: "core".to_string(),
                    goal: Goal::Endurance,
                    style: TrainingStyle::Circuits,
                    experience: Experience::Beginner,
                    restrictions: vec![],
                },
                plan: vec![],
                equipment: fallback_result(),
                recommendations: vec!["rest well".to_string()],
            })
            .await
            .unwrap();
        let StageOutput::Report(report) = output else {
            panic!("expected Report output");
        };
        assert_eq!(report.muscle, "core");
        assert_eq!(report.recommendations.len(), 1);
    }
}
