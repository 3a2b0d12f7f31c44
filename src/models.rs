use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::correction::CorrectionStrategy;
use crate::level::CefrLevel;

// 词汇表中的单词，由 (language, base_form) 唯一确定
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Word {
    pub id: i64,
    pub language: String,
    pub base_form: String,
    pub part_of_speech: String,
    pub pronunciation: Option<String>,
}

// 新增单词时使用（还没有 ID）
#[derive(Debug, Clone, Deserialize)]
pub struct NewWord {
    pub language: String,
    pub base_form: String,
    pub part_of_speech: String,
    pub pronunciation: Option<String>,
}

// 单词在某个等级下的课程优先级，数字越小越重要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordDifficultyLevel {
    pub word_id: i64,
    pub level: CefrLevel,
    pub priority: i64,
}

// 学习者对某个单词的掌握情况
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct UserWordProgress {
    pub word_id: i64,
    pub language: String,
    pub times_encountered: i64,
    pub mastery_score: f64,
    pub first_encountered: DateTime<Utc>,
    pub last_encountered: Option<DateTime<Utc>>,
}

// 选词用的候选项：单词 + 优先级 + 可能不存在的学习记录
#[derive(Debug, Clone, PartialEq)]
pub struct WordCandidate {
    pub word: Word,
    pub priority: i64,
    pub progress: Option<UserWordProgress>,
}

impl WordCandidate {
    // 没有学习记录的单词按掌握度 0 处理
    pub fn mastery_score(&self) -> f64 {
        self.progress.as_ref().map(|p| p.mastery_score).unwrap_or(0.0)
    }

    // None 排在所有时间之前，相当于 epoch
    pub fn last_encountered(&self) -> Option<DateTime<Utc>> {
        self.progress.as_ref().and_then(|p| p.last_encountered)
    }
}

// 导出用的学习记录
#[derive(Debug, Serialize, Clone, PartialEq, sqlx::FromRow)]
pub struct ProgressReport {
    pub base_form: String,
    pub times_encountered: i64,
    pub mastery_score: f64,
    pub first_encountered: DateTime<Utc>,
    pub last_encountered: Option<DateTime<Utc>>,
}

// 构造提示词的输入，每次请求新建，用完即丢
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub language: String,
    pub level: Option<CefrLevel>,
    pub topic: String,
    pub native_language: String,
    pub recent_vocab: Vec<String>,
    pub common_mistakes: Vec<String>,
    pub correction: Option<CorrectionStrategy>,
}

impl PromptContext {
    pub fn new(language: impl Into<String>, level: CefrLevel) -> Self {
        PromptContext {
            language: language.into(),
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_native_language(mut self, native_language: impl Into<String>) -> Self {
        self.native_language = native_language.into();
        self
    }

    pub fn with_recent_vocab(mut self, recent_vocab: Vec<String>) -> Self {
        self.recent_vocab = recent_vocab;
        self
    }

    pub fn with_common_mistakes(mut self, common_mistakes: Vec<String>) -> Self {
        self.common_mistakes = common_mistakes;
        self
    }

    pub fn with_correction(mut self, correction: CorrectionStrategy) -> Self {
        self.correction = Some(correction);
        self
    }
}
