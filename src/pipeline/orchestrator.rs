//! 流水线编排器：主控循环
//!
//! 独占持有 SessionState，按阶段依赖图逐波执行：同一波内的阶段并发调用并在
//! 下一波前汇合（Planner ∥ Equipment 由图结构得出）。去重引擎在历史读取与
//! Planner 调用之间运行；校验闸门失败时带着违规动作名重试 Planner 恰好一次，
//! 历史落盘只发生在闸门通过之后（全有或全无）。

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::dedup::filter_candidates;
use crate::equipment::EquipmentDb;
use crate::error::PipelineError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{HistoryStore, WorkoutHistoryRecord};
use crate::pipeline::graph::StageGraph;
use crate::pipeline::types::{FinalReport, RunPhase, SessionState};
use crate::pool::PoolDb;
use crate::stage::{
    AggregatorStage, DecoderStage, EquipmentStage, PersistStage, PlannerStage, RecommenderStage,
    StageContext, StageInvoker, StageOutput, StageRegistry, ValidatorStage,
};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider != "mock" && std::env::var("OPENAI_API_KEY").is_ok() {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider=mock, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

/// 流水线：阶段调用器 + 去重所需的历史/候选池句柄
pub struct Pipeline {
    invoker: StageInvoker,
    history: Arc<HistoryStore>,
    pools: Arc<PoolDb>,
    lookback: usize,
}

impl Pipeline {
    /// 按配置装配整条流水线（器材库、候选池、历史存储、七个阶段）
    pub fn from_config(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        let equipment = Arc::new(EquipmentDb::load(&cfg.data.equipment_db));
        let pools = Arc::new(PoolDb::load(&cfg.data.exercise_pools));
        let history = Arc::new(HistoryStore::open(&cfg.memory.history_path));

        let mut registry = StageRegistry::new();
        registry.register(DecoderStage::new(llm.clone()));
        registry.register(PlannerStage::new(llm.clone()));
        registry.register(EquipmentStage::new(equipment));
        registry.register(ValidatorStage::new());
        registry.register(PersistStage::new(history.clone()));
        registry.register(RecommenderStage::new(llm));
        registry.register(AggregatorStage::new());

        let invoker = StageInvoker::new(registry, cfg.pipeline.stage_timeout_secs);
        let mut names = invoker.stage_names();
        names.sort();
        tracing::info!(stages = ?names, "pipeline assembled");

        Self {
            invoker,
            history,
            pools,
            lookback: cfg.pipeline.lookback,
        }
    }

    /// 跑一次完整运行（不带外部取消）
    pub async fn run(&self, raw_input: &str) -> Result<FinalReport, PipelineError> {
        self.run_cancellable(raw_input, CancellationToken::new()).await
    }

    /// 跑一次完整运行；取消只在波次边界生效，闸门前取消不会留下历史记录
    pub async fn run_cancellable(
        &self,
        raw_input: &str,
        cancel: CancellationToken,
    ) -> Result<FinalReport, PipelineError> {
        let mut state = SessionState::new(raw_input);
        tracing::info!(run_id = %state.run_id, "pipeline run started");

        let result = self.drive(&mut state, &cancel).await;
        match &result {
            Ok(_) => {
                state.transition(RunPhase::Done);
                tracing::info!(run_id = %state.run_id, "pipeline run done");
            }
            Err(e) => {
                state.transition(RunPhase::Failed);
                tracing::error!(run_id = %state.run_id, error = %e, "pipeline run failed");
            }
        }
        result
    }

    /// 波次主循环
    async fn drive(
        &self,
        state: &mut SessionState,
        cancel: &CancellationToken,
    ) -> Result<FinalReport, PipelineError> {
        let mut graph = StageGraph::workout();
        let mut completed: HashSet<String> = HashSet::new();

        while completed.len() < graph.stage_count() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let wave = graph.ready_stages(&completed);
            if wave.is_empty() {
                // 图构造时已查环，这里只是防御
                return Err(PipelineError::Generation {
                    stage: "orchestrator".to_string(),
                    message: "dependency graph stalled".to_string(),
                });
            }

            self.enter_phase(state, &wave);

            // 先为整波构造上下文（可能读历史、跑去重），再并发调用
            let mut invocations = Vec::with_capacity(wave.len());
            for stage in &wave {
                let ctx = self.context_for(stage, state).await?;
                invocations.push(async move {
                    (stage.clone(), self.invoker.invoke(stage, ctx).await)
                });
            }
            let results = futures_util::future::join_all(invocations).await;

            for (stage, result) in results {
                let output = match result {
                    Ok(output) => output,
                    // Planner 的生成失败/超时允许重试一次，其它阶段一律终止
                    Err(e) if stage == "planner" => self.retry_planner(e, state).await?,
                    Err(e) => return Err(e),
                };
                self.apply(state, &stage, output)?;
                graph.mark_completed(&stage);
                completed.insert(stage);
            }

            // 校验闸门：首败重试一次，再败终止
            if completed.contains("validator") && !completed.contains("memory") {
                self.enforce_validation_gate(state).await?;
            }
        }

        state
            .report
            .take()
            .ok_or_else(|| PipelineError::Generation {
                stage: "aggregator".to_string(),
                message: "no report produced".to_string(),
            })
    }

    /// Planner 的生成失败/超时在整次运行内允许重试恰好一次，波次路径与
    /// 闸门重试路径共用同一次额度；其它错误原样返回
    async fn retry_planner(
        &self,
        err: PipelineError,
        state: &mut SessionState,
    ) -> Result<StageOutput, PipelineError> {
        let transient = matches!(
            err,
            PipelineError::Generation { .. } | PipelineError::StageTimeout(_)
        );
        if state.gen_retry_used || !transient {
            return Err(err);
        }
        state.gen_retry_used = true;
        tracing::warn!(run_id = %state.run_id, error = %err, "planner call failed, retrying once");
        let ctx = self.context_for("planner", state).await?;
        self.invoker.invoke("planner", ctx).await
    }

    /// 校验未通过时的有界重试：排除违规动作，重跑去重 + Planner + Validator 恰好一次
    async fn enforce_validation_gate(
        &self,
        state: &mut SessionState,
    ) -> Result<(), PipelineError> {
        let failing = match &state.validation {
            Some(report) if !report.passed => report.failing.clone(),
            _ => return Ok(()),
        };

        if state.retry_used {
            return Err(PipelineError::Validation { failing });
        }
        state.retry_used = true;
        state.exclusions.extend(failing.clone());
        state.transition(RunPhase::RetryPlanning);
        tracing::warn!(run_id = %state.run_id, excluded = ?failing, "validation failed, retrying planner once");

        let ctx = self.context_for("planner", state).await?;
        let output = match self.invoker.invoke("planner", ctx).await {
            Ok(output) => output,
            Err(e) => self.retry_planner(e, state).await?,
        };
        self.apply(state, "planner", output)?;

        state.transition(RunPhase::Validating);
        let ctx = self.context_for("validator", state).await?;
        let output = self.invoker.invoke("validator", ctx).await?;
        self.apply(state, "validator", output)?;

        match &state.validation {
            Some(report) if report.passed => Ok(()),
            Some(report) => Err(PipelineError::Validation {
                failing: report.failing.clone(),
            }),
            None => Err(PipelineError::Generation {
                stage: "validator".to_string(),
                message: "no validation report".to_string(),
            }),
        }
    }

    /// 按波次内容迁移阶段状态机
    fn enter_phase(&self, state: &mut SessionState, wave: &[String]) {
        let has = |name: &str| wave.iter().any(|s| s == name);
        let phase = if has("decoder") {
            RunPhase::Decoding
        } else if has("planner") || has("equipment") {
            RunPhase::Planning
        } else if has("validator") {
            RunPhase::Validating
        } else if has("memory") {
            RunPhase::Persisting
        } else if has("recommender") {
            RunPhase::Recommending
        } else {
            RunPhase::Aggregating
        };
        state.transition(phase);
    }

    /// 为阶段切出它应得的那一片状态
    async fn context_for(
        &self,
        stage: &str,
        state: &mut SessionState,
    ) -> Result<StageContext, PipelineError> {
        let request = |state: &SessionState| {
            state.request.clone().ok_or_else(|| PipelineError::Generation {
                stage: stage.to_string(),
                message: "decoded request missing".to_string(),
            })
        };

        match stage {
            "decoder" => Ok(StageContext::Decode {
                raw_input: state.raw_input.clone(),
            }),
            "planner" => {
                let req = request(state)?;
                let pool = self.pools.candidates(&req.muscle);
                let history = self.history.read_recent(&req.muscle, self.lookback).await;
                let candidates = filter_candidates(
                    &req.muscle,
                    &pool,
                    &history,
                    self.lookback,
                    &state.exclusions,
                );
                state.candidates = candidates.clone();
                Ok(StageContext::Plan {
                    request: req,
                    candidates,
                    exclusions: state.exclusions.clone(),
                })
            }
            "equipment" => Ok(StageContext::Equipment {
                muscle: request(state)?.muscle,
            }),
            "validator" => {
                let equipment =
                    state
                        .equipment
                        .clone()
                        .ok_or_else(|| PipelineError::Generation {
                            stage: stage.to_string(),
                            message: "equipment result missing".to_string(),
                        })?;
                Ok(StageContext::Validate {
                    request: request(state)?,
                    plan: state.plan.clone(),
                    equipment,
                })
            }
            "memory" => {
                let req = request(state)?;
                let names = state.plan.iter().map(|e| e.name.clone()).collect();
                Ok(StageContext::Persist {
                    record: WorkoutHistoryRecord::new(&req.muscle, names),
                })
            }
            "recommender" => Ok(StageContext::Recommend {
                request: request(state)?,
                plan: state.plan.clone(),
            }),
            "aggregator" => {
                let equipment =
                    state
                        .equipment
                        .clone()
                        .ok_or_else(|| PipelineError::Generation {
                            stage: stage.to_string(),
                            message: "equipment result missing".to_string(),
                        })?;
                Ok(StageContext::Aggregate {
                    request: request(state)?,
                    plan: state.plan.clone(),
                    equipment,
                    recommendations: state.recommendations.clone(),
                })
            }
            other => Err(PipelineError::Generation {
                stage: other.to_string(),
                message: "unknown stage in graph".to_string(),
            }),
        }
    }

    /// 把阶段输出并入会话状态
    fn apply(
        &self,
        state: &mut SessionState,
        stage: &str,
        output: StageOutput,
    ) -> Result<(), PipelineError> {
        match output {
            StageOutput::Request(req) => state.request = Some(req),
            StageOutput::Plan(plan) => state.plan = plan,
            StageOutput::Equipment(result) => state.equipment = Some(result),
            StageOutput::Validation(report) => state.validation = Some(report),
            StageOutput::Persisted => {}
            StageOutput::Recommendations(recs) => state.recommendations = recs,
            StageOutput::Report(report) => state.report = Some(report),
        }
        tracing::debug!(run_id = %state.run_id, stage = %stage, "stage output merged");
        Ok(())
    }
}
