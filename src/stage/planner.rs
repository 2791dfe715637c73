//! Planner 阶段
//!
//! 依据请求与去重后的候选池生成 6-8 个动作的训练计划。候选池是硬约束：
//! 产出的动作必须出自候选名单（排除集之外），防止生成端把刚练过的动作又排回来。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ChatMessage, LlmClient};
use crate::pipeline::types::ExerciseEntry;
use crate::stage::{extract_json, Stage, StageContext, StageError, StageOutput};

/// 计划的动作数范围
pub const MIN_EXERCISES: usize = 6;
pub const MAX_EXERCISES: usize = 8;

const SYSTEM_PROMPT: &str = "STAGE: planner\n\
You are a workout planner. The INPUT JSON gives the decoded request and the allowed\n\
candidate exercises (already deduplicated against recent history). Build a plan:\n\
- pick 6-8 exercises, ONLY from the candidates, never from the exclusions\n\
- sets/reps/rest appropriate for the goal (strength: heavy low-rep, long rest;\n\
  hypertrophy: moderate; endurance/fat_loss: lighter, short rest)\n\
- respect the experience level\n\
Output ONLY a JSON object: {\"exercises\": [{name, target_muscle, sets, reps,\n\
rest_seconds, difficulty}, ...]}. No prose, no markdown.";

#[derive(Debug, Deserialize)]
struct PlannerPayload {
    exercises: Vec<ExerciseEntry>,
}

/// Planner：生成型阶段，持有 LLM 客户端
pub struct PlannerStage {
    llm: Arc<dyn LlmClient>,
}

impl PlannerStage {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for PlannerStage {
    fn name(&self) -> &str {
        "planner"
    }

    fn description(&self) -> &str {
        "drafts a 6-8 exercise plan from the deduplicated candidate pool"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Plan {
            request,
            candidates,
            exclusions,
        } = ctx
        else {
            return Err(StageError::Malformed("planner expects Plan context".into()));
        };

        let input = json!({
            "muscle": request.muscle,
            "goal": request.goal,
            "style": request.style,
            "experience": request.experience,
            "candidates": candidates
                .iter()
                .map(|c| json!({ "name": c.name, "difficulty": c.difficulty }))
                .collect::<Vec<_>>(),
            "exclusions": exclusions,
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
        let payload: PlannerPayload = serde_json::from_str(json)
            .map_err(|e| StageError::Malformed(format!("{e}: {json}")))?;

        // 候选名单是硬约束：越界或排回已排除动作都按 Malformed 处理
        let allowed: HashSet<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        let banned: HashSet<&str> = exclusions.iter().map(String::as_str).collect();
        for entry in &payload.exercises {
            if banned.contains(entry.name.as_str()) {
                return Err(StageError::Malformed(format!(
                    "planner re-used excluded exercise '{}'",
                    entry.name
                )));
            }
            if !allowed.contains(entry.name.as_str()) {
                return Err(StageError::Malformed(format!(
                    "planner invented exercise '{}' outside the candidate pool",
                    entry.name
                )));
            }
        }

        let count = payload.exercises.len();
        if count < MIN_EXERCISES.min(candidates.len()) || count > MAX_EXERCISES {
            return Err(StageError::Malformed(format!(
                "planner produced {count} exercises, expected {MIN_EXERCISES}-{MAX_EXERCISES}"
            )));
        }

        Ok(StageOutput::Plan(payload.exercises))
    }
}
