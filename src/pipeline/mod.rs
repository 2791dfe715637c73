//! 流水线层：会话类型、阶段依赖图、编排器

pub mod graph;
pub mod orchestrator;
pub mod types;

pub use graph::{GraphError, StageGraph};
pub use orchestrator::{create_llm_from_config, Pipeline};
pub use types::{
    EquipmentResult, Experience, ExerciseEntry, FinalReport, Goal, RunPhase, SessionRequest,
    SessionState, TrainingStyle, ValidationReport,
};
