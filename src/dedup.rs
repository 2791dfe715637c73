//! 去重引擎
//!
//! 从候选池中剔除最近 lookback 次同肌群训练已用过的动作；剔除后不足
//! MIN_POOL 时按「最久未用」顺序逐个放回（优雅降级，绝不产出空计划）。
//! 纯函数、无随机性：同样输入必得同样输出，保证校验重试的确定性。

use std::collections::HashSet;

use crate::memory::WorkoutHistoryRecord;
use crate::pipeline::types::{normalize_muscle, ExerciseEntry};

/// 去重回看窗口（最近几次训练）
pub const LOOKBACK: usize = 3;
/// 过滤后候选池的最小规模
pub const MIN_POOL: usize = 6;

/// 过滤候选池
///
/// - `history` 必须按时间倒序（最近在前）；顺序错误会悄悄产生过期排除
/// - `extra_exclusions` 为本次运行累计的强制排除（校验失败的动作名），
///   这些名字不参与放回——它们是因安全规则被拒的
/// - 输出保持 `full_pool` 的相对顺序
pub fn filter_candidates(
    muscle: &str,
    full_pool: &[ExerciseEntry],
    history: &[WorkoutHistoryRecord],
    lookback: usize,
    extra_exclusions: &[String],
) -> Vec<ExerciseEntry> {
    let key = normalize_muscle(muscle);
    let recent: Vec<&WorkoutHistoryRecord> = history
        .iter()
        .filter(|r| r.muscle == key)
        .take(lookback)
        .collect();

    let mut used: HashSet<&str> = recent
        .iter()
        .flat_map(|r| r.exercise_names.iter().map(String::as_str))
        .collect();
    let forced: HashSet<&str> = extra_exclusions.iter().map(String::as_str).collect();

    let remaining = full_pool
        .iter()
        .filter(|e| !used.contains(e.name.as_str()) && !forced.contains(e.name.as_str()))
        .count();

    if remaining < MIN_POOL {
        // 按每个动作「最近一次使用」的新旧排序：遍历倒序记录时首次出现即其
        // 最近一次使用，整体反转后最久未用在前。动作名跨记录重复时，
        // 以最近一次出现为准，刚练过的动作最后才被放回
        let mut seen: HashSet<&str> = HashSet::new();
        let mut by_recency: Vec<&str> = Vec::new();
        for record in &recent {
            for name in &record.exercise_names {
                if seen.insert(name.as_str()) {
                    by_recency.push(name.as_str());
                }
            }
        }
        let mut have = remaining;
        for name in by_recency.into_iter().rev() {
            if have >= MIN_POOL {
                break;
            }
            if forced.contains(name) {
                continue;
            }
            if used.remove(name) && full_pool.iter().any(|e| e.name == name) {
                have += 1;
                tracing::warn!(muscle = %key, exercise = %name, "pool below minimum, re-admitting least-recently-used");
            }
        }
    }

    full_pool
        .iter()
        .filter(|e| !used.contains(e.name.as_str()) && !forced.contains(e.name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Experience;

    fn entry(name: &str) -> ExerciseEntry {
        ExerciseEntry {
            name: name.to_string(),
            target_muscle: "chest".to_string(),
            sets: 3,
            reps: 10,
            rest_seconds: 60,
            difficulty: Experience::Beginner,
        }
    }

    fn pool(n: usize) -> Vec<ExerciseEntry> {
        (0..n).map(|i| entry(&format!("ex{i}"))).collect()
    }

    fn record(names: &[&str], ts: i64) -> WorkoutHistoryRecord {
        WorkoutHistoryRecord {
            timestamp: ts,
            muscle: "chest".to_string(),
            exercise_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_excludes_recent_names() {
        let pool = pool(10);
        // 倒序：最近在前
        let history = vec![record(&["ex0"], 3), record(&["ex1"], 2), record(&["ex2"], 1)];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        assert_eq!(filtered.len(), 7);
        assert!(filtered.iter().all(|e| !["ex0", "ex1", "ex2"].contains(&e.name.as_str())));
    }

    #[test]
    fn test_preserves_pool_order() {
        let pool = pool(10);
        let history = vec![record(&["ex3", "ex5"], 1)];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ex0", "ex1", "ex2", "ex4", "ex6", "ex7", "ex8", "ex9"]);
    }

    #[test]
    fn test_lookback_window_bounds_exclusions() {
        let pool = pool(10);
        // 4 条记录，只有最近 3 条生效；最旧的 ex9 不应被排除
        let history = vec![
            record(&["ex0"], 4),
            record(&["ex1"], 3),
            record(&["ex2"], 2),
            record(&["ex9"], 1),
        ];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        assert!(filtered.iter().any(|e| e.name == "ex9"));
    }

    #[test]
    fn test_readmission_keeps_minimum() {
        let pool = pool(7);
        // 排除 4 个后只剩 3 个，需按最久未用放回 3 个
        let history = vec![
            record(&["ex0", "ex1"], 3),
            record(&["ex2"], 2),
            record(&["ex3"], 1),
        ];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        assert_eq!(filtered.len(), MIN_POOL);
        // 最久未用优先放回：ex3（最旧记录）、ex2、然后最近记录里的 ex1
        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"ex3"));
        assert!(names.contains(&"ex2"));
        assert!(names.contains(&"ex1"));
    }

    #[test]
    fn test_readmission_ranks_by_last_use() {
        // exa 在最近一次和两次前都出现过，exb 只在上一次出现；
        // exa 的最近一次使用更新，需要放回一个时必须选 exb
        let pool: Vec<ExerciseEntry> = ["exa", "exb", "ex0", "ex1", "ex2", "ex3", "ex4"]
            .iter()
            .map(|n| entry(n))
            .collect();
        let history = vec![
            record(&["exa"], 3),
            record(&["exb"], 2),
            record(&["exa"], 1),
        ];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        assert_eq!(filtered.len(), MIN_POOL);
        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"exb"));
        assert!(!names.contains(&"exa"));
    }

    #[test]
    fn test_output_never_exceeds_pool() {
        let pool = pool(5);
        let history = vec![record(&["ex0", "ex1", "ex2", "ex3", "ex4"], 1)];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        // 池子本身就不足 6，放回全部后也只能是池子大小
        assert_eq!(filtered.len(), 5);
    }

    #[test]
    fn test_forced_exclusions_never_readmitted() {
        let pool = pool(7);
        let history = vec![record(&["ex0", "ex1", "ex2"], 1)];
        let forced = vec!["ex3".to_string(), "ex4".to_string()];
        let filtered = filter_candidates("chest", &pool, &history, LOOKBACK, &forced);
        // 剩 2 个，历史名可放回凑数，但 forced 的 ex3/ex4 永不回来
        assert!(filtered.iter().all(|e| e.name != "ex3" && e.name != "ex4"));
        assert_eq!(filtered.len(), 5); // 2 幸存 + 3 条历史名放回
    }

    #[test]
    fn test_deterministic() {
        let pool = pool(8);
        let history = vec![record(&["ex0", "ex1", "ex2"], 1)];
        let a = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        let b = filter_candidates("chest", &pool, &history, LOOKBACK, &[]);
        let names =
            |v: &[ExerciseEntry]| v.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn test_other_muscle_history_ignored() {
        let pool = pool(10);
        let mut rec = record(&["ex0"], 1);
        rec.muscle = "back".to_string();
        let filtered = filter_candidates("chest", &pool, &[rec], LOOKBACK, &[]);
        assert_eq!(filtered.len(), 10);
    }
}
