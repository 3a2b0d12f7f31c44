use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{EngineError, Result};
use crate::level::CefrLevel;

// 按语言和等级取提示词模板
pub trait TemplateStore {
    fn get_template(&self, language: &str, level: CefrLevel) -> Result<String>;
}

const BEGINNER_TEMPLATE: &str = r#"You are a patient {language} tutor for a {level} ({level_band}) learner whose native language is {native_language}.
Topic of today's conversation: {topic}.
Use short sentences, the present tense and very common words. Explain new words briefly in {native_language} when needed.
Work these words into the conversation naturally: {recent_vocab}.
Mistakes the learner often makes: {common_mistakes}.
{correction_strategy}
Reply in {language} and end with a simple question."#;

const INTERMEDIATE_TEMPLATE: &str = r#"You are a friendly {language} conversation partner for a {level} ({level_band}) learner (native language: {native_language}).
Topic: {topic}.
Speak naturally at a moderate pace, mixing tenses, and only fall back to {native_language} if the learner is stuck.
Try to use these words: {recent_vocab}.
Recurring mistakes to watch for: {common_mistakes}.
{correction_strategy}
Keep each reply to a few sentences and keep the conversation going."#;

const ADVANCED_TEMPLATE: &str = r#"You are a demanding {language} tutor for a {level} ({level_band}) learner. Speak only {language}.
Topic: {topic}.
Use idiomatic, nuanced language and vary the register where it fits the topic.
Vocabulary to practise: {recent_vocab}.
Known weak points: {common_mistakes}.
{correction_strategy}
Challenge the learner's word choice and style when it sounds unnatural."#;

// 内置模板，按等级段区分，与语言无关
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub fn template_for(level: CefrLevel) -> &'static str {
        match level {
            CefrLevel::A1 | CefrLevel::A2 => BEGINNER_TEMPLATE,
            CefrLevel::B1 | CefrLevel::B2 => INTERMEDIATE_TEMPLATE,
            CefrLevel::C1 | CefrLevel::C2 => ADVANCED_TEMPLATE,
        }
    }
}

impl TemplateStore for BuiltinTemplates {
    fn get_template(&self, _language: &str, level: CefrLevel) -> Result<String> {
        Ok(Self::template_for(level).to_string())
    }
}

// 从目录读取模板：<dir>/<language>/<LEVEL>.txt → <dir>/<language>/default.txt → 内置模板
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTemplateStore { dir: dir.into() }
    }

    fn candidates(&self, language: &str, level: CefrLevel) -> [PathBuf; 2] {
        let language_dir = self.dir.join(language);
        [
            language_dir.join(format!("{}.txt", level.as_str())),
            language_dir.join("default.txt"),
        ]
    }
}

impl TemplateStore for FileTemplateStore {
    fn get_template(&self, language: &str, level: CefrLevel) -> Result<String> {
        // 语言名来自调用方，不允许跳出模板目录
        if language.is_empty() || language.contains(['/', '\\']) || language.contains("..") {
            return Err(EngineError::Template(format!("非法的语言名: {:?}", language)));
        }

        for path in self.candidates(language, level) {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    tracing::debug!(path = %path.display(), "template loaded");
                    return Ok(content);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(EngineError::Template(format!("{}: {}", path.display(), e)));
                }
            }
        }

        tracing::debug!(language, level = %level, "no template file, using builtin");
        BuiltinTemplates.get_template(language, level)
    }
}

// 根据配置选择模板来源
pub enum Templates {
    Builtin(BuiltinTemplates),
    Files(FileTemplateStore),
}

impl Templates {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => Templates::Files(FileTemplateStore::new(dir)),
            None => Templates::Builtin(BuiltinTemplates),
        }
    }
}

impl TemplateStore for Templates {
    fn get_template(&self, language: &str, level: CefrLevel) -> Result<String> {
        match self {
            Templates::Builtin(store) => store.get_template(language, level),
            Templates::Files(store) => store.get_template(language, level),
        }
    }
}
