//! Decoder 阶段
//!
//! 把用户的自然语言请求解析为结构化 SessionRequest（muscle/goal/style/experience/
//! restrictions）。解析不出即 Malformed，由调用器映射为终止性的 Decode 错误。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient};
use crate::pipeline::types::SessionRequest;
use crate::stage::{extract_json, Stage, StageContext, StageError, StageOutput};

const SYSTEM_PROMPT: &str = "STAGE: decoder\n\
You extract workout intent. From the user's request, output ONLY a JSON object with keys:\n\
- muscle: target muscle group (chest/back/legs/shoulders/arms/core or the user's words)\n\
- goal: one of strength | hypertrophy | endurance | fat_loss\n\
- style: one of straight_sets | supersets | circuits | emom | amrap\n\
- experience: one of beginner | intermediate | advanced\n\
- restrictions: array of injury flags mentioned (e.g. knee, lower_back, shoulder), or []\n\
No prose, no markdown, just the JSON object.";

/// Decoder：生成型阶段，持有 LLM 客户端
pub struct DecoderStage {
    llm: Arc<dyn LlmClient>,
}

impl DecoderStage {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for DecoderStage {
    fn name(&self) -> &str {
        "decoder"
    }

    fn description(&self) -> &str {
        "parses a natural-language workout request into a structured SessionRequest"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Decode { raw_input } = ctx else {
            return Err(StageError::Malformed("decoder expects Decode context".into()));
        };

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(raw_input),
        ];
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(StageError::External)?;

        let json = extract_json(&output)?;
        let request: SessionRequest = serde_json::from_str(json)
            .map_err(|e| StageError::Malformed(format!("{e}: {json}")))?;

        if request.muscle.trim().is_empty() {
            return Err(StageError::Malformed("empty muscle in decoded request".into()));
        }

        Ok(StageOutput::Request(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::pipeline::types::{Goal, TrainingStyle};

    #[tokio::test]
    async fn test_decode_with_mock() {
        let stage = DecoderStage::new(Arc::new(MockLlmClient));
        let output = stage
            .execute(StageContext::Decode {
                raw_input: "chest day, going for size, supersets please".to_string(),
            })
            .await
            .unwrap();
        let StageOutput::Request(req) = output else {
            panic!("expected Request output");
        };
        assert_eq!(req.muscle, "chest");
        assert_eq!(req.goal, Goal::Hypertrophy);
        assert_eq!(req.style, TrainingStyle::Supersets);
    }

    struct GarbageLlm;

    #[async_trait]
    impl LlmClient for GarbageLlm {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, String> {
            Ok("I cannot help with that.".to_string())
        }
    }

    #[tokio::test]
    async fn test_unparseable_output_is_malformed() {
        let stage = DecoderStage::new(Arc::new(GarbageLlm));
        let result = stage
            .execute(StageContext::Decode {
                raw_input: "???".to_string(),
            })
            .await;
        assert!(matches!(result, Err(StageError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_wrong_context_rejected() {
        let stage = DecoderStage::new(Arc::new(MockLlmClient));
        let result = stage
            .execute(StageContext::Equipment {
                muscle: "chest".to_string(),
            })
            .await;
        assert!(matches!(result, Err(StageError::Malformed(_))));
    }
}
