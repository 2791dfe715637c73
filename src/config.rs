//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COACH__*` 覆盖（双下划线表示嵌套，
//! 如 `COACH__PIPELINE__STAGE_TIMEOUT_SECS=30`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub memory: MemorySection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与模型
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    /// 后端：openai 兼容端点或 mock；无 API Key 时自动退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [pipeline] 段：单阶段超时与去重回看窗口
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// 单次阶段调用超时（秒），超时按阶段失败处理
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    /// 去重回看的历史记录条数
    #[serde(default = "default_lookback")]
    pub lookback: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            lookback: default_lookback(),
        }
    }
}

fn default_stage_timeout_secs() -> u64 {
    60
}

fn default_lookback() -> usize {
    3
}

/// [data] 段：只读数据文件（器材库、候选池）
#[derive(Debug, Clone, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_equipment_db")]
    pub equipment_db: PathBuf,
    #[serde(default = "default_exercise_pools")]
    pub exercise_pools: PathBuf,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            equipment_db: default_equipment_db(),
            exercise_pools: default_exercise_pools(),
        }
    }
}

fn default_equipment_db() -> PathBuf {
    PathBuf::from("data/equipments_db.json")
}

fn default_exercise_pools() -> PathBuf {
    PathBuf::from("data/exercise_pools.json")
}

/// [memory] 段：训练历史文件
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("memory/workout_history.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            pipeline: PipelineSection::default(),
            data: DataSection::default(),
            memory: MemorySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 COACH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COACH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COACH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
