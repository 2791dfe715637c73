//! Recommender 阶段
//!
//! 基于通过校验的计划给出 4-6 条恢复/营养/下次训练建议。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ChatMessage, LlmClient};
use crate::stage::{extract_json, Stage, StageContext, StageError, StageOutput};

const SYSTEM_PROMPT: &str = "STAGE: recommender\n\
You give post-workout advice. The INPUT JSON is the validated plan. Output ONLY a\n\
JSON object {\"recommendations\": [\"...\", ...]} with 4-6 short bullets covering\n\
recovery, post-workout nutrition, warm-up/cool-down and the next training day.\n\
No prose outside the JSON.";

#[derive(Debug, Deserialize)]
struct RecommenderPayload {
    recommendations: Vec<String>,
}

/// Recommender：生成型阶段，持有 LLM 客户端
pub struct RecommenderStage {
    llm: Arc<dyn LlmClient>,
}

impl RecommenderStage {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for RecommenderStage {
    fn name(&self) -> &str {
        "recommender"
    }

    fn description(&self) -> &str {
        "produces recovery and nutrition recommendations for the validated plan"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Recommend { request, plan } = ctx else {
            return Err(StageError::Malformed("recommender expects Recommend context".into()));
        };

        let input = json!({
            "muscle": request.muscle,
            "goal": request.goal,
            "experience": request.experience,
            "exercises": plan.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        });
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("INPUT:\n{input}")),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(StageError::External)?;

        let json = extract_json(&output)?;
        let payload: RecommenderPayload = serde_json::from_str(json)
            .map_err(|e| StageError::Malformed(format!("{e}: {json}")))?;

        if payload.recommendations.is_empty() {
            return Err(StageError::Malformed("empty recommendations".into()));
        }

        Ok(StageOutput::Recommendations(payload.recommendations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::pipeline::types::{Experience, Goal, SessionRequest, TrainingStyle};

    #[tokio::test]
    async fn test_recommend_with_mock() {
        let stage = RecommenderStage::new(Arc::new(MockLlmClient));
        let output = stage
            .execute(StageContext::Recommend {
                request: SessionRequest {
                    muscle: "legs".to_string(),
                    goal: Goal::Strength,
                    style: TrainingStyle::StraightSets,
                    experience: Experience::Advanced,
                    restrictions: vec![],
                },
                plan: vec![],
            })
            .await
            .unwrap();
        let StageOutput::Recommendations(recs) = output else {
            panic!("expected Recommendations output");
        };
        assert!((4..=6).contains(&recs.len()));
    }
}
