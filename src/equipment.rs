//! 器材解析
//!
//! 肌群 → {首选器材, 替代器材} 的只读映射，启动时加载一次；
//! 查不到（含别名表兜底匹配失败）时返回保证非空的兜底器材集，matched=false。
//! resolve 为纯函数，永不失败。

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::pipeline::types::{normalize_muscle, EquipmentResult};

/// 别名表：常见俗称 → 肌群键
const ALIASES: &[(&str, &str)] = &[
    ("pecs", "chest"),
    ("pectorals", "chest"),
    ("lats", "back"),
    ("upper_back", "back"),
    ("lower_back", "back"),
    ("quads", "legs"),
    ("hamstrings", "legs"),
    ("glutes", "legs"),
    ("calves", "legs"),
    ("delts", "shoulders"),
    ("traps", "shoulders"),
    ("biceps", "arms"),
    ("triceps", "arms"),
    ("forearms", "arms"),
    ("abs", "core"),
    ("obliques", "core"),
];

/// 单个肌群的器材记录（对应 data/equipments_db.json 的值）
#[derive(Debug, Clone, Deserialize)]
pub struct EquipmentRecord {
    #[serde(default)]
    pub required_equipment: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// 器材库：键为归一化肌群名
#[derive(Debug)]
pub struct EquipmentDb {
    entries: HashMap<String, EquipmentRecord>,
}

impl EquipmentDb {
    /// 从 JSON 文件加载；文件缺失或解析失败时记录告警并退回内建表
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, EquipmentRecord>>(&data) {
                Ok(entries) => {
                    tracing::debug!(path = %path.display(), count = entries.len(), "equipment db loaded");
                    Self { entries }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "equipment db parse failed, using builtin");
                    Self::builtin()
                }
            },
            Err(_) => {
                tracing::warn!(path = %path.display(), "equipment db not found, using builtin");
                Self::builtin()
            }
        }
    }

    /// 内建默认表：六大肌群
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        let mut put = |muscle: &str, required: &[&str], alternatives: &[&str]| {
            entries.insert(
                muscle.to_string(),
                EquipmentRecord {
                    required_equipment: required.iter().map(|s| s.to_string()).collect(),
                    alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
                },
            );
        };
        put(
            "chest",
            &["barbell", "flat_bench", "dumbbells"],
            &["resistance_bands", "push_up_handles"],
        );
        put(
            "back",
            &["pull_up_bar", "barbell", "cable_machine"],
            &["resistance_bands", "dumbbells"],
        );
        put(
            "legs",
            &["squat_rack", "barbell", "leg_press"],
            &["dumbbells", "resistance_bands"],
        );
        put(
            "shoulders",
            &["dumbbells", "barbell"],
            &["resistance_bands", "kettlebell"],
        );
        put(
            "arms",
            &["dumbbells", "ez_bar", "cable_machine"],
            &["resistance_bands"],
        );
        put(
            "core",
            &["mat", "ab_wheel"],
            &["bodyweight", "medicine_ball"],
        );
        Self { entries }
    }

    /// 解析某肌群的器材；纯函数，永不失败
    ///
    /// 归一化 → 精确匹配 → 别名表匹配 → 兜底集（matched=false）。
    pub fn resolve(&self, muscle: &str) -> EquipmentResult {
        let key = normalize_muscle(muscle);
        let record = self.entries.get(&key).or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .and_then(|(_, canonical)| self.entries.get(*canonical))
        });

        match record {
            Some(rec) if !rec.required_equipment.is_empty() => EquipmentResult {
                primary: rec.required_equipment.clone(),
                alternatives: rec.alternatives.clone(),
                matched: true,
            },
            _ => {
                tracing::debug!(muscle = %key, "no equipment entry, falling back");
                fallback_result()
            }
        }
    }
}

/// 兜底器材集：保证 primary 非空
pub fn fallback_result() -> EquipmentResult {
    EquipmentResult {
        primary: vec![
            "dumbbells".to_string(),
            "resistance_bands".to_string(),
            "bodyweight".to_string(),
            "household_items".to_string(),
        ],
        alternatives: Vec::new(),
        matched: false,
    }
}
