//! 阶段依赖图
//!
//! 使用邻接表和入度表实现 DAG 波次推导：入度为 0 的阶段组成一个可并行的波次，
//! 完成后削减后继入度得到下一波。Planner 与 Equipment 的并行由图结构自然得出，
//! 而不是靠读代码推断调用顺序。

use std::collections::{HashMap, HashSet};

/// 流水线中的阶段节点名
pub type StageId = String;

/// 图构造错误
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Cyclic dependency detected")]
    CyclicDependency,
    #[error("Edge references unknown stage: {0}")]
    UnknownStage(String),
}

/// 阶段依赖图
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// 邻接表：阶段 → 依赖该阶段的后继
    adjacency: HashMap<StageId, Vec<StageId>>,
    /// 入度表：阶段 → 未完成的依赖数
    in_degree: HashMap<StageId, usize>,
}

impl StageGraph {
    /// 由节点与依赖边构造；edges 为 (from, to) 即 to 依赖 from
    pub fn new(stages: &[&str], edges: &[(&str, &str)]) -> Result<Self, GraphError> {
        let known: HashSet<&str> = stages.iter().copied().collect();
        let mut adjacency: HashMap<StageId, Vec<StageId>> = HashMap::new();
        let mut in_degree: HashMap<StageId, usize> = HashMap::new();

        for stage in stages {
            adjacency.insert((*stage).to_string(), Vec::new());
            in_degree.insert((*stage).to_string(), 0);
        }

        for (from, to) in edges {
            if !known.contains(from) {
                return Err(GraphError::UnknownStage((*from).to_string()));
            }
            if !known.contains(to) {
                return Err(GraphError::UnknownStage((*to).to_string()));
            }
            adjacency
                .get_mut(*from)
                .expect("known stage")
                .push((*to).to_string());
            *in_degree.get_mut(*to).expect("known stage") += 1;
        }

        let graph = Self {
            adjacency,
            in_degree,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// 本流水线的固定阶段图
    ///
    /// decoder → {planner, equipment} → validator → memory → recommender → aggregator；
    /// 并发只发生在 planner ∥ equipment 一波，闸门之后各阶段严格串行
    /// （先落盘再建议，Persisting → Recommending 依次走过）
    pub fn workout() -> Self {
        Self::new(
            &[
                "decoder",
                "planner",
                "equipment",
                "validator",
                "memory",
                "recommender",
                "aggregator",
            ],
            &[
                ("decoder", "planner"),
                ("decoder", "equipment"),
                ("planner", "validator"),
                ("equipment", "validator"),
                ("validator", "memory"),
                ("validator", "recommender"),
                ("memory", "recommender"),
                ("memory", "aggregator"),
                ("recommender", "aggregator"),
            ],
        )
        .expect("fixed workout graph is acyclic")
    }

    /// 当前入度为 0 且未完成的阶段（一个可并行执行的波次），排序保证确定性
    pub fn ready_stages(&self, completed: &HashSet<StageId>) -> Vec<StageId> {
        let mut ready: Vec<StageId> = self
            .in_degree
            .iter()
            .filter(|(stage, degree)| **degree == 0 && !completed.contains(*stage))
            .map(|(stage, _)| stage.clone())
            .collect();
        ready.sort();
        ready
    }

    /// 标记阶段完成，削减后继入度
    pub fn mark_completed(&mut self, stage: &str) {
        if let Some(dependents) = self.adjacency.get(stage).cloned() {
            for dependent in dependents {
                if let Some(degree) = self.in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }
    }

    pub fn stage_count(&self) -> usize {
        self.in_degree.len()
    }

    /// Kahn 拓扑排序能否吃完所有节点；吃不完即有环
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut graph = self.clone();
        let mut completed: HashSet<StageId> = HashSet::new();
        loop {
            let ready = graph.ready_stages(&completed);
            if ready.is_empty() {
                break;
            }
            for stage in ready {
                graph.mark_completed(&stage);
                completed.insert(stage);
            }
        }
        if completed.len() == self.in_degree.len() {
            Ok(())
        } else {
            Err(GraphError::CyclicDependency)
        }
    }
}
