//! 动作候选池
//!
//! 肌群 → 有序候选动作列表的只读映射，启动时加载一次。去重引擎消费的 full_pool
//! 即来自这里；条目携带基线 sets/reps/rest，由 Planner 按目标调整。

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::pipeline::types::{normalize_muscle, Experience, ExerciseEntry};

/// 候选池文件中的单个动作（对应 data/exercise_pools.json 的数组元素）
#[derive(Debug, Clone, Deserialize)]
pub struct PoolEntry {
    pub name: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Experience,
}

fn default_difficulty() -> Experience {
    Experience::Beginner
}

/// 候选池库：键为归一化肌群名，值为有序候选列表
#[derive(Debug)]
pub struct PoolDb {
    pools: HashMap<String, Vec<PoolEntry>>,
}

impl PoolDb {
    /// 从 JSON 文件加载；文件缺失或解析失败时记录告警并退回内建池
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, Vec<PoolEntry>>>(&data) {
                Ok(pools) => {
                    tracing::debug!(path = %path.display(), muscles = pools.len(), "exercise pools loaded");
                    Self { pools }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "exercise pools parse failed, using builtin");
                    Self::builtin()
                }
            },
            Err(_) => {
                tracing::warn!(path = %path.display(), "exercise pools not found, using builtin");
                Self::builtin()
            }
        }
    }

    /// 内建默认池：每个肌群至少 9 个候选
    pub fn builtin() -> Self {
        let mut pools = HashMap::new();
        let mut put = |muscle: &str, names: &[(&str, Experience)]| {
            pools.insert(
                muscle.to_string(),
                names
                    .iter()
                    .map(|(name, difficulty)| PoolEntry {
                        name: name.to_string(),
                        difficulty: *difficulty,
                    })
                    .collect(),
            );
        };
        use Experience::*;
        put(
            "chest",
            &[
                ("barbell_bench_press", Intermediate),
                ("incline_dumbbell_press", Intermediate),
                ("push_up", Beginner),
                ("cable_fly", Beginner),
                ("dips", Advanced),
                ("decline_press", Intermediate),
                ("dumbbell_pullover", Intermediate),
                ("machine_chest_press", Beginner),
                ("pec_deck", Beginner),
                ("close_grip_push_up", Intermediate),
            ],
        );
        put(
            "back",
            &[
                ("pull_up", Advanced),
                ("barbell_row", Intermediate),
                ("lat_pulldown", Beginner),
                ("seated_cable_row", Beginner),
                ("deadlift", Advanced),
                ("single_arm_dumbbell_row", Beginner),
                ("face_pull", Beginner),
                ("t_bar_row", Intermediate),
                ("straight_arm_pulldown", Beginner),
                ("inverted_row", Intermediate),
            ],
        );
        put(
            "legs",
            &[
                ("back_squat", Intermediate),
                ("leg_press", Beginner),
                ("romanian_deadlift", Intermediate),
                ("walking_lunge", Beginner),
                ("leg_extension", Beginner),
                ("leg_curl", Beginner),
                ("bulgarian_split_squat", Advanced),
                ("calf_raise", Beginner),
                ("goblet_squat", Beginner),
                ("hip_thrust", Intermediate),
            ],
        );
        put(
            "shoulders",
            &[
                ("overhead_press", Intermediate),
                ("lateral_raise", Beginner),
                ("front_raise", Beginner),
                ("rear_delt_fly", Beginner),
                ("arnold_press", Advanced),
                ("upright_row", Intermediate),
                ("shrug", Beginner),
                ("pike_push_up", Intermediate),
                ("cable_lateral_raise", Beginner),
            ],
        );
        put(
            "arms",
            &[
                ("barbell_curl", Beginner),
                ("hammer_curl", Beginner),
                ("preacher_curl", Intermediate),
                ("triceps_pushdown", Beginner),
                ("skull_crusher", Intermediate),
                ("overhead_triceps_extension", Beginner),
                ("concentration_curl", Beginner),
                ("diamond_push_up", Intermediate),
                ("cable_curl", Beginner),
            ],
        );
        put(
            "core",
            &[
                ("plank", Beginner),
                ("hanging_leg_raise", Advanced),
                ("cable_crunch", Beginner),
                ("russian_twist", Beginner),
                ("ab_wheel_rollout", Advanced),
                ("dead_bug", Beginner),
                ("side_plank", Beginner),
                ("mountain_climber", Beginner),
                ("bicycle_crunch", Beginner),
            ],
        );
        Self { pools }
    }

    /// 取某肌群的有序候选池；未收录的肌群退回通用自重池（与器材兜底同理，绝不给空池）
    ///
    /// 基线 sets/reps/rest 为中性值，Planner 按目标覆盖。
    pub fn candidates(&self, muscle: &str) -> Vec<ExerciseEntry> {
        let key = normalize_muscle(muscle);
        let entries = match self.pools.get(&key) {
            Some(entries) => entries.clone(),
            None => {
                tracing::debug!(muscle = %key, "no exercise pool, falling back to bodyweight pool");
                fallback_pool()
            }
        };
        entries
            .into_iter()
            .map(|e| ExerciseEntry {
                name: e.name,
                target_muscle: key.clone(),
                sets: 3,
                reps: 10,
                rest_seconds: 60,
                difficulty: e.difficulty,
            })
            .collect()
    }
}

/// 通用自重候选池：未收录肌群的兜底，保证去重引擎总有 ≥9 个候选可用
fn fallback_pool() -> Vec<PoolEntry> {
    use Experience::*;
    [
        ("push_up", Beginner),
        ("bodyweight_squat", Beginner),
        ("plank", Beginner),
        ("walking_lunge", Beginner),
        ("glute_bridge", Beginner),
        ("mountain_climber", Beginner),
        ("burpee", Intermediate),
        ("superman_hold", Beginner),
        ("side_plank", Beginner),
        ("inverted_row", Intermediate),
    ]
    .iter()
    .map(|(name, difficulty)| PoolEntry {
        name: name.to_string(),
        difficulty: *difficulty,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pools_have_at_least_nine() {
        let db = PoolDb::builtin();
        for muscle in ["chest", "back", "legs", "shoulders", "arms", "core"] {
            assert!(
                db.candidates(muscle).len() >= 9,
                "pool for {muscle} too small"
            );
        }
    }

    #[test]
    fn test_candidates_preserve_order() {
        let db = PoolDb::builtin();
        let pool = db.candidates("chest");
        assert_eq!(pool[0].name, "barbell_bench_press");
        assert_eq!(pool[2].name, "push_up");
    }

    #[test]
    fn test_unknown_muscle_gets_fallback_pool() {
        let db = PoolDb::builtin();
        let pool = db.candidates("neck");
        assert!(pool.len() >= 9);
        assert!(pool.iter().all(|e| e.target_muscle == "neck"));
    }
}
