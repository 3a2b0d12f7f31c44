pub mod config;
pub mod error;
pub mod level;
pub mod models;
pub mod correction;
pub mod vocabulary;
pub mod mastery;
pub mod prompt;
pub mod templates;
pub mod api;
pub mod database;
pub mod catalog;
pub mod engine;

pub use config::Config;
pub use error::{EngineError, Result};
pub use level::{CefrLevel, DEFAULT_LEVEL};
pub use models::*;
pub use correction::{CorrectionStrategy, CorrectionStyle, FocusTopic};
pub use database::DatabaseManager;
pub use engine::{TutorEngine, TurnRequest, TurnReply, UsageOutcome, TUTOR_UNAVAILABLE_MESSAGE};
