//! 记忆层：训练历史的只追加存储与回看读取

pub mod history;

pub use history::{HistoryStore, WorkoutHistoryRecord};
