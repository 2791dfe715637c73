//! Mock LLM 客户端（用于测试与无 Key 运行）
//!
//! 识别各生成型阶段 prompt 首行的 `STAGE:` 标记，返回确定性的结构化输出，
//! 便于本地跑通整条流水线：decoder 按关键词抽取字段，planner 从 prompt 内嵌的
//! 候选 JSON 里取前 6-8 个并按目标套 sets/reps，recommender 返回固定建议。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, LlmClient, Role};

/// Mock 客户端：按阶段标记返回固定的结构化输出
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, String> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        if system.starts_with("STAGE: decoder") {
            Ok(mock_decode(user))
        } else if system.starts_with("STAGE: planner") {
            mock_plan(user)
        } else if system.starts_with("STAGE: recommender") {
            Ok(mock_recommend())
        } else {
            Err(format!("MockLlmClient: unknown stage prompt: {}", system.lines().next().unwrap_or("")))
        }
    }
}

/// 关键词解码：从自然语言请求里抽 muscle/goal/style/experience/restrictions
fn mock_decode(text: &str) -> String {
    let lower = text.to_lowercase();
    let muscle = [
        ("chest", "chest"),
        ("pec", "chest"),
        ("back", "back"),
        ("lat", "back"),
        ("leg", "legs"),
        ("quad", "legs"),
        ("glute", "legs"),
        ("shoulder", "shoulders"),
        ("delt", "shoulders"),
        ("arm", "arms"),
        ("bicep", "arms"),
        ("tricep", "arms"),
        ("core", "core"),
        ("abs", "core"),
    ]
    .iter()
    .find(|(kw, _)| lower.contains(kw))
    .map(|(_, m)| *m)
    .unwrap_or("chest");

    let goal = if lower.contains("strength") || lower.contains("strong") {
        "strength"
    } else if lower.contains("endurance") || lower.contains("stamina") {
        "endurance"
    } else if lower.contains("fat") || lower.contains("lose weight") || lower.contains("lean") {
        "fat_loss"
    } else {
        "hypertrophy"
    };

    let style = if lower.contains("superset") {
        "supersets"
    } else if lower.contains("circuit") {
        "circuits"
    } else if lower.contains("emom") {
        "emom"
    } else if lower.contains("amrap") {
        "amrap"
    } else {
        "straight_sets"
    };

    let experience = if lower.contains("beginner") || lower.contains("new to") || lower.contains("first time") {
        "beginner"
    } else if lower.contains("advanced") || lower.contains("years of") {
        "advanced"
    } else {
        "intermediate"
    };

    let hurt = ["injur", "hurt", "pain", "bad "].iter().any(|w| lower.contains(w));
    let mut restrictions = Vec::new();
    if hurt {
        for (kw, flag) in [("knee", "knee"), ("lower back", "lower_back"), ("shoulder", "shoulder")] {
            if lower.contains(kw) {
                restrictions.push(flag);
            }
        }
    }

    json!({
        "muscle": muscle,
        "goal": goal,
        "style": style,
        "experience": experience,
        "restrictions": restrictions,
    })
    .to_string()
}

/// 从 planner prompt 内嵌的 INPUT JSON 取候选，按目标套 sets/reps 并按经验钳制
fn mock_plan(prompt: &str) -> Result<String, String> {
    let start = prompt.find('{').ok_or("mock planner: no input JSON in prompt")?;
    let end = prompt.rfind('}').ok_or("mock planner: no input JSON in prompt")?;
    let input: Value = serde_json::from_str(&prompt[start..=end])
        .map_err(|e| format!("mock planner: bad input JSON: {e}"))?;

    let muscle = input["muscle"].as_str().unwrap_or("chest").to_string();
    let goal = input["goal"].as_str().unwrap_or("hypertrophy");
    let experience = input["experience"].as_str().unwrap_or("intermediate");
    let candidates = input["candidates"]
        .as_array()
        .ok_or("mock planner: missing candidates")?;

    let (mut sets, mut reps, rest) = match goal {
        "strength" => (5u64, 5u64, 180u64),
        "endurance" => (3, 15, 45),
        "fat_loss" => (3, 12, 30),
        _ => (4, 10, 90),
    };
    if experience == "beginner" {
        sets = sets.min(4);
        reps = reps.min(15);
    }
    // 动作数跟着组数走，别把总组数顶穿校验上限
    let count = if sets >= 5 || experience == "beginner" { 6 } else { 8 };

    let exercises: Vec<Value> = candidates
        .iter()
        .take(count)
        .map(|c| {
            json!({
                "name": c["name"].as_str().unwrap_or(""),
                "target_muscle": muscle,
                "sets": sets,
                "reps": reps,
                "rest_seconds": rest,
                "difficulty": c["difficulty"].as_str().unwrap_or("beginner"),
            })
        })
        .collect();

    Ok(json!({ "exercises": exercises }).to_string())
}

fn mock_recommend() -> String {
    json!({
        "recommendations": [
            "Sleep 7-9 hours tonight; the target muscle grows during recovery, not in the gym",
            "Eat 20-40g of protein within two hours after the session",
            "Warm up 5-10 minutes before and stretch the trained muscle after",
            "Drink water throughout; add electrolytes if the session ran long",
            "Train a different muscle group tomorrow or take a rest day",
        ]
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_decoder_extracts_fields() {
        let client = MockLlmClient;
        let out = client
            .complete(&[
                ChatMessage::system("STAGE: decoder\nExtract fields."),
                ChatMessage::user("I want to build chest muscle with supersets, I'm intermediate"),
            ])
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["muscle"], "chest");
        assert_eq!(v["goal"], "hypertrophy");
        assert_eq!(v["style"], "supersets");
        assert_eq!(v["experience"], "intermediate");
        // Mock 无真实调用，token 统计走 trait 默认值
        assert_eq!(client.token_usage(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_mock_decoder_restrictions() {
        let client = MockLlmClient;
        let out = client
            .complete(&[
                ChatMessage::system("STAGE: decoder"),
                ChatMessage::user("leg day but my knee hurts, beginner here"),
            ])
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["muscle"], "legs");
        assert_eq!(v["experience"], "beginner");
        assert_eq!(v["restrictions"][0], "knee");
    }

    #[tokio::test]
    async fn test_mock_planner_respects_candidates() {
        let client = MockLlmClient;
        let input = json!({
            "muscle": "chest",
            "goal": "strength",
            "experience": "advanced",
            "candidates": (0..7).map(|i| json!({"name": format!("ex{i}"), "difficulty": "beginner"})).collect::<Vec<_>>(),
            "exclusions": [],
        });
        let out = client
            .complete(&[
                ChatMessage::system("STAGE: planner"),
                ChatMessage::user(format!("INPUT:\n{input}")),
            ])
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        let exercises = v["exercises"].as_array().unwrap();
        // 5 组的力量计划收缩到 6 个动作
        assert_eq!(exercises.len(), 6);
        assert_eq!(exercises[0]["sets"], 5);
        assert_eq!(exercises[0]["reps"], 5);
    }

    #[tokio::test]
    async fn test_mock_unknown_stage_errors() {
        let client = MockLlmClient;
        let result = client
            .complete(&[ChatMessage::system("STAGE: nonsense")])
            .await;
        assert!(result.is_err());
    }
}
