//! Validator 阶段（校验闸门）
//!
//! 对合并后的 Planner+Equipment 产物跑确定性安全规则：单动作范围、按经验等级的
//! 组数/次数上限、总量上限、伤病限制的禁忌动作。返回违规动作名清单，
//! 编排器据此决定放行、单次重试或终止。

use async_trait::async_trait;

use crate::pipeline::types::{Experience, ExerciseEntry, SessionRequest, ValidationReport};
use crate::stage::{Stage, StageContext, StageError, StageOutput};

/// 单动作合法范围
const SETS_RANGE: (u8, u8) = (1, 6);
const REPS_RANGE: (u8, u8) = (1, 30);
const REST_RANGE: (u16, u16) = (15, 300);

/// 伤病限制 → 禁忌动作名片段
const CONTRAINDICATIONS: &[(&str, &[&str])] = &[
    ("lower_back", &["deadlift", "good_morning", "bent_over", "barbell_row"]),
    ("knee", &["jump", "pistol", "lunge", "split_squat"]),
    ("shoulder", &["overhead", "upright_row", "arnold", "behind_neck"]),
];

/// 按经验等级的上限：(单动作组数, 单动作次数, 单次训练总组数)
fn limits(experience: Experience) -> (u8, u8, u32) {
    match experience {
        Experience::Beginner => (4, 15, 24),
        Experience::Intermediate => (5, 20, 32),
        Experience::Advanced => (6, 30, 40),
    }
}

/// Validator：确定性规则阶段，走统一的 Stage 边界
#[derive(Debug, Default)]
pub struct ValidatorStage;

impl ValidatorStage {
    pub fn new() -> Self {
        Self
    }
}

/// 对单个动作跑全部规则；违规时返回原因
fn check_entry(entry: &ExerciseEntry, request: &SessionRequest) -> Option<String> {
    if entry.sets < SETS_RANGE.0 || entry.sets > SETS_RANGE.1 {
        return Some(format!("{}: sets {} out of range", entry.name, entry.sets));
    }
    if entry.reps < REPS_RANGE.0 || entry.reps > REPS_RANGE.1 {
        return Some(format!("{}: reps {} out of range", entry.name, entry.reps));
    }
    if entry.rest_seconds < REST_RANGE.0 || entry.rest_seconds > REST_RANGE.1 {
        return Some(format!(
            "{}: rest {}s out of range",
            entry.name, entry.rest_seconds
        ));
    }

    let (max_sets, max_reps, _) = limits(request.experience);
    if entry.sets > max_sets || entry.reps > max_reps {
        return Some(format!(
            "{}: {}x{} exceeds {:?} ceiling",
            entry.name, entry.sets, entry.reps, request.experience
        ));
    }

    for (flag, banned) in CONTRAINDICATIONS {
        if request.restrictions.iter().any(|r| r == flag)
            && banned.iter().any(|b| entry.name.contains(b))
        {
            return Some(format!(
                "{}: contraindicated for '{}' restriction",
                entry.name, flag
            ));
        }
    }

    None
}

#[async_trait]
impl Stage for ValidatorStage {
    fn name(&self) -> &str {
        "validator"
    }

    fn description(&self) -> &str {
        "checks the merged plan against safety rules before persistence"
    }

    async fn execute(&self, ctx: StageContext) -> Result<StageOutput, StageError> {
        let StageContext::Validate {
            request,
            plan,
            equipment,
        } = ctx
        else {
            return Err(StageError::Malformed("validator expects Validate context".into()));
        };

        // 器材由 resolver 托底保证非空；空 primary 意味着上游合并出了问题
        if equipment.primary.is_empty() {
            return Err(StageError::Malformed("empty primary equipment set".into()));
        }

        let mut report = ValidationReport {
            passed: true,
            failing: Vec::new(),
            reasons: Vec::new(),
        };

        for entry in &plan {
            if let Some(reason) = check_entry(entry, &request) {
                report.failing.push(entry.name.clone());
                report.reasons.push(reason);
            }
        }

        let (_, _, volume_ceiling) = limits(request.experience);
        let volume: u32 = plan.iter().map(|e| e.sets as u32).sum();
        if volume > volume_ceiling {
            // 总组数超标：按贡献降序标记动作，直到剔除它们后低于上限
            let mut by_volume: Vec<&ExerciseEntry> = plan.iter().collect();
            by_volume.sort_by_key(|e| std::cmp::Reverse(e.sets));
            let mut remaining = volume;
            for entry in by_volume {
                if remaining <= volume_ceiling {
                    break;
                }
                if !report.failing.contains(&entry.name) {
                    report.failing.push(entry.name.clone());
                    report
                        .reasons
                        .push(format!("{}: trimmed to meet total-set ceiling", entry.name));
                }
                remaining -= entry.sets as u32;
            }
        }

        report.passed = report.failing.is_empty();
        if !report.passed {
            tracing::warn!(failing = ?report.failing, reasons = ?report.reasons, "validation failed");
        }

        Ok(StageOutput::Validation(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::fallback_result;
    use crate::pipeline::types::{Goal, TrainingStyle};

    fn request(experience: Experience, restrictions: &[&str]) -> SessionRequest {
        SessionRequest {
            muscle: "back".to_string(),
            goal: Goal::Hypertrophy,
            style: TrainingStyle::StraightSets,
            experience,
            restrictions: restrictions.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn entry(name: &str, sets: u8, reps: u8, rest: u16) -> ExerciseEntry {
        ExerciseEntry {
            name: name.to_string(),
            target_muscle: "back".to_string(),
            sets,
            reps,
            rest_seconds: rest,
            difficulty: Experience::Beginner,
        }
    }

    async fn validate(
        request: SessionRequest,
        plan: Vec<ExerciseEntry>,
    ) -> ValidationReport {
        let output = ValidatorStage::new()
            .execute(StageContext::Validate {
                request,
                plan,
                equipment: fallback_result(),
            })
            .await
            .unwrap();
        let StageOutput::Validation(report) = output else {
            panic!("expected Validation output");
        };
        report
    }

    #[tokio::test]
    async fn test_sane_plan_passes() {
        let plan = vec![entry("lat_pulldown", 4, 10, 90), entry("seated_cable_row", 3, 12, 60)];
        let report = validate(request(Experience::Intermediate, &[]), plan).await;
        assert!(report.passed);
    }

    #[tokio::test]
    async fn test_out_of_range_rest_fails() {
        let plan = vec![entry("lat_pulldown", 3, 10, 10)];
        let report = validate(request(Experience::Intermediate, &[]), plan).await;
        assert!(!report.passed);
        assert_eq!(report.failing, vec!["lat_pulldown"]);
    }

    #[tokio::test]
    async fn test_beginner_ceiling_enforced() {
        // 5x5 对 intermediate 合法，对 beginner 超出组数上限
        let plan = vec![entry("barbell_row", 5, 5, 120)];
        assert!(validate(request(Experience::Intermediate, &[]), plan.clone()).await.passed);
        assert!(!validate(request(Experience::Beginner, &[]), plan).await.passed);
    }

    #[tokio::test]
    async fn test_contraindication_flagged() {
        let plan = vec![entry("deadlift", 3, 8, 120), entry("lat_pulldown", 3, 10, 60)];
        let report = validate(request(Experience::Advanced, &["lower_back"]), plan).await;
        assert!(!report.passed);
        assert_eq!(report.failing, vec!["deadlift"]);
    }

    #[tokio::test]
    async fn test_volume_ceiling_marks_biggest_contributors() {
        // 7 个 5 组 = 35 组 > intermediate 上限 32，单动作范围合法但总量超标
        let plan: Vec<ExerciseEntry> = (0..7)
            .map(|i| entry(&format!("ex{i}"), 5, 10, 90))
            .collect();
        let report = validate(request(Experience::Intermediate, &[]), plan).await;
        assert!(!report.passed);
        assert!(!report.failing.is_empty());
    }
}
