//! 阶段调用器
//!
//! 持有 StageRegistry 与单阶段超时，invoke(stage_name, ctx) 在超时内执行阶段，
//! 超时或失败时统一转 PipelineError；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::error::PipelineError;
use crate::stage::{StageContext, StageError, StageOutput, StageRegistry};

/// 阶段调用器：对每次阶段调用施加超时，并将结果映射为 PipelineError
pub struct StageInvoker {
    registry: StageRegistry,
    timeout: Duration,
}

impl StageInvoker {
    pub fn new(registry: StageRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 调用指定阶段；超时返回 StageTimeout，阶段自身的失败按性质映射；输出 JSON 审计日志
    pub async fn invoke(
        &self,
        stage_name: &str,
        ctx: StageContext,
    ) -> Result<StageOutput, PipelineError> {
        let stage = self.registry.get(stage_name).ok_or_else(|| {
            PipelineError::Generation {
                stage: stage_name.to_string(),
                message: "unknown stage".to_string(),
            }
        })?;

        let start = Instant::now();
        let result = timeout(self.timeout, stage.execute(ctx)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(StageError::External(_))) => (false, "external_error"),
            Ok(Err(StageError::Malformed(_))) => (false, "malformed"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "stage_audit",
            "stage": stage_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
        });
        tracing::info!(audit = %audit.to_string(), "stage");

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(map_stage_error(stage_name, e)),
            Err(_) => Err(PipelineError::StageTimeout(stage_name.to_string())),
        }
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.registry.stage_names()
    }
}

/// decoder 的 Malformed 是「意图不可解析」，memory 的失败是持久化错误，
/// 其余一律算生成失败
fn map_stage_error(stage_name: &str, err: StageError) -> PipelineError {
    match err {
        StageError::Malformed(msg) if stage_name == "decoder" => PipelineError::Decode(msg),
        StageError::Malformed(msg) | StageError::External(msg) => {
            if stage_name == "memory" {
                PipelineError::Persistence(msg)
            } else {
                PipelineError::Generation {
                    stage: stage_name.to_string(),
                    message: msg,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use async_trait::async_trait;

    struct SlowStage;

    #[async_trait]
    impl Stage for SlowStage {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps past the timeout"
        }

        async fn execute(&self, _ctx: StageContext) -> Result<StageOutput, StageError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(StageOutput::Persisted)
        }
    }

    struct FailingStage;

    #[async_trait]
    impl Stage for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails externally"
        }

        async fn execute(&self, _ctx: StageContext) -> Result<StageOutput, StageError> {
            Err(StageError::External("backend down".to_string()))
        }
    }

    fn ctx() -> StageContext {
        StageContext::Decode {
            raw_input: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_stage_timeout() {
        let mut registry = StageRegistry::new();
        registry.register(SlowStage);
        let invoker = StageInvoker::new(registry, 1);
        let err = invoker.invoke("slow", ctx()).await.unwrap_err();
        assert!(matches!(err, PipelineError::StageTimeout(name) if name == "slow"));
    }

    #[tokio::test]
    async fn test_external_error_maps_to_generation() {
        let mut registry = StageRegistry::new();
        registry.register(FailingStage);
        let invoker = StageInvoker::new(registry, 5);
        let err = invoker.invoke("failing", ctx()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation { stage, .. } if stage == "failing"));
    }

    #[tokio::test]
    async fn test_unknown_stage_errors() {
        let invoker = StageInvoker::new(StageRegistry::new(), 5);
        assert!(invoker.invoke("ghost", ctx()).await.is_err());
    }

    #[test]
    fn test_decoder_malformed_is_decode_error() {
        let err = map_stage_error("decoder", StageError::Malformed("gibberish".to_string()));
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}
