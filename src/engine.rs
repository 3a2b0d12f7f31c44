use futures::stream::{self, StreamExt, TryStreamExt};

use crate::api::Generator;
use crate::config::Config;
use crate::correction::{CorrectionStrategy, fold_text, resolve};
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::level::{CefrLevel, DEFAULT_LEVEL};
use crate::mastery::{MasteryRule, MasteryTracker};
use crate::models::{PromptContext, UserWordProgress, Word};
use crate::prompt::PromptBuilder;
use crate::templates::TemplateStore;
use crate::vocabulary::VocabularySelector;

// 对话界面上唯一能看到的错误提示，不暴露内部错误
pub const TUTOR_UNAVAILABLE_MESSAGE: &str = "tutor unavailable, please retry";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub default_level: CefrLevel,
    pub native_language: String,
    pub vocab_limit: usize,
    pub mastery_rule: MasteryRule,
    pub prompt_builder: PromptBuilder,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            default_level: DEFAULT_LEVEL,
            native_language: "English".to_string(),
            vocab_limit: 10,
            mastery_rule: MasteryRule::default(),
            prompt_builder: PromptBuilder::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        EngineSettings {
            default_level: CefrLevel::normalize(&engine.default_level).unwrap_or(DEFAULT_LEVEL),
            native_language: engine.native_language.clone(),
            vocab_limit: engine.vocab_limit,
            mastery_rule: MasteryRule::new(engine.correct_step, engine.incorrect_step),
            prompt_builder: PromptBuilder::new(engine.recent_vocab_limit, engine.common_mistakes_limit),
        }
    }
}

// 一轮对话的输入，等级是用户给的原始字符串
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub language: String,
    pub level: String,
    pub topic: String,
    pub common_mistakes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub language: String,
    pub level: CefrLevel,
    pub words: Vec<Word>,
    pub strategy: CorrectionStrategy,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnReply {
    Reply(String),
    Unavailable,
}

impl TurnReply {
    pub fn text(&self) -> &str {
        match self {
            TurnReply::Reply(text) => text,
            TurnReply::Unavailable => TUTOR_UNAVAILABLE_MESSAGE,
        }
    }
}

// 学习者在本轮是否正确使用了某个单词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageOutcome {
    pub word_id: i64,
    pub correct_usage: bool,
}

pub struct TutorEngine<G, T> {
    db: DatabaseManager,
    generator: G,
    templates: T,
    settings: EngineSettings,
}

impl<G: Generator + Sync, T: TemplateStore> TutorEngine<G, T> {
    pub fn new(db: DatabaseManager, generator: G, templates: T, settings: EngineSettings) -> Self {
        TutorEngine {
            db,
            generator,
            templates,
            settings,
        }
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // 无法识别的等级使用配置里的默认等级
    pub fn resolve_level(&self, raw: &str) -> CefrLevel {
        match CefrLevel::normalize(raw) {
            Some(level) => level,
            None => {
                tracing::warn!(raw, default = %self.settings.default_level, "unrecognized level, using default");
                self.settings.default_level
            }
        }
    }

    // 选词和纠错策略互不依赖，并发执行后再拼提示词
    pub async fn prepare_turn(&self, request: &TurnRequest) -> Result<PreparedTurn> {
        let level = self.resolve_level(&request.level);
        let selector = VocabularySelector::new(&self.db);

        let (words, strategy) = tokio::join!(
            selector.select(&request.language, level, self.settings.vocab_limit),
            async { resolve(level) },
        );
        let words = words?;

        let template = self.templates.get_template(&request.language, level)?;
        let context = PromptContext::new(request.language.clone(), level)
            .with_topic(request.topic.clone())
            .with_native_language(self.settings.native_language.clone())
            .with_recent_vocab(words.iter().map(|w| w.base_form.clone()).collect())
            .with_common_mistakes(request.common_mistakes.clone())
            .with_correction(strategy.clone());
        let prompt = self.settings.prompt_builder.build(&template, &context);

        tracing::info!(
            language = %request.language,
            level = %level,
            words = words.len(),
            prompt_len = prompt.len(),
            "turn prepared"
        );

        Ok(PreparedTurn {
            language: request.language.clone(),
            level,
            words,
            strategy,
            prompt,
        })
    }

    // 生成失败只记录日志，界面上给统一提示
    pub async fn run_turn(&self, turn: &PreparedTurn) -> TurnReply {
        match self.generator.generate(&turn.prompt).await {
            Ok(reply) => TurnReply::Reply(reply),
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                TurnReply::Unavailable
            }
        }
    }

    // 准备提示词并生成回复；任何一步失败都返回统一提示
    pub async fn converse(&self, request: &TurnRequest) -> (Option<PreparedTurn>, TurnReply) {
        match self.prepare_turn(request).await {
            Ok(turn) => {
                let reply = self.run_turn(&turn).await;
                (Some(turn), reply)
            }
            Err(e) => {
                tracing::error!(error = %e, "could not prepare turn");
                (None, TurnReply::Unavailable)
            }
        }
    }

    pub async fn record_exposure(&self, word_id: i64, language: &str, correct_usage: bool) -> Result<UserWordProgress> {
        MasteryTracker::new(&self.db, self.settings.mastery_rule)
            .record_exposure(word_id, language, correct_usage)
            .await
    }

    // 学习者回复之后才更新掌握度，按顺序逐个写入
    pub async fn complete_turn(&self, language: &str, outcomes: &[UsageOutcome]) -> Result<Vec<UserWordProgress>> {
        let tracker = MasteryTracker::new(&self.db, self.settings.mastery_rule);
        let tracker = &tracker;

        stream::iter(outcomes.iter().copied())
            .then(move |outcome| tracker.record_exposure(outcome.word_id, language, outcome.correct_usage))
            .try_collect()
            .await
    }
}

fn tokens(text: &str, strip_diacritics: bool) -> Vec<String> {
    fold_text(text, true, true, strip_diacritics)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|window| window == phrase)
}

// 在学习者的话里找本轮给出的单词。
// 宽松比较（忽略变音符号）找到即算使用过；再按当前等级的策略比较，不一致算用错。
// 大小写和标点在这里总是忽略。没出现的单词不记录
pub fn detect_usage(words: &[Word], utterance: &str, strategy: &CorrectionStrategy) -> Vec<UsageOutcome> {
    let loose = tokens(utterance, true);
    let strict = tokens(utterance, strategy.ignore_diacritics);

    words
        .iter()
        .filter(|word| contains_phrase(&loose, &tokens(&word.base_form, true)))
        .map(|word| UsageOutcome {
            word_id: word.id,
            correct_usage: contains_phrase(&strict, &tokens(&word.base_form, strategy.ignore_diacritics)),
        })
        .collect()
}
