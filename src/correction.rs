use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::level::CefrLevel;

// 纠错语气
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrectionStyle {
    // 只指出影响理解的错误，语气鼓励
    Encouraging,
    // 指出大部分错误并简短解释
    Balanced,
    // 细致纠正，包括文体层面的问题
    Rigorous,
}

impl CorrectionStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrectionStyle::Encouraging => "encouraging",
            CorrectionStyle::Balanced => "balanced",
            CorrectionStyle::Rigorous => "rigorous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FocusTopic {
    BasicGrammar,
    CoreVocabulary,
    SubtleGrammar,
    Register,
    Idioms,
    Style,
    CulturalNuance,
    RegisterPrecision,
}

impl FocusTopic {
    pub fn tag(self) -> &'static str {
        match self {
            FocusTopic::BasicGrammar => "basic_grammar",
            FocusTopic::CoreVocabulary => "core_vocabulary",
            FocusTopic::SubtleGrammar => "subtle_grammar",
            FocusTopic::Register => "register",
            FocusTopic::Idioms => "idioms",
            FocusTopic::Style => "style",
            FocusTopic::CulturalNuance => "cultural_nuance",
            FocusTopic::RegisterPrecision => "register_precision",
        }
    }
}

// 纠错策略，由等级直接推导，不落库
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionStrategy {
    pub ignore_punctuation: bool,
    pub ignore_capitalization: bool,
    pub ignore_diacritics: bool,
    pub focus_on: Vec<FocusTopic>,
    pub correction_style: CorrectionStyle,
}

// 按等级段查表：A1-B1 / B2 / C1-C2
pub fn resolve(level: CefrLevel) -> CorrectionStrategy {
    match level {
        CefrLevel::A1 | CefrLevel::A2 | CefrLevel::B1 => CorrectionStrategy {
            ignore_punctuation: true,
            ignore_capitalization: true,
            ignore_diacritics: true,
            focus_on: vec![FocusTopic::BasicGrammar, FocusTopic::CoreVocabulary],
            correction_style: CorrectionStyle::Encouraging,
        },
        CefrLevel::B2 => CorrectionStrategy {
            ignore_punctuation: true,
            ignore_capitalization: true,
            ignore_diacritics: false,
            focus_on: vec![FocusTopic::SubtleGrammar, FocusTopic::Register, FocusTopic::Idioms],
            correction_style: CorrectionStyle::Balanced,
        },
        CefrLevel::C1 | CefrLevel::C2 => CorrectionStrategy {
            ignore_punctuation: false,
            ignore_capitalization: false,
            ignore_diacritics: false,
            focus_on: vec![FocusTopic::Style, FocusTopic::CulturalNuance, FocusTopic::RegisterPrecision],
            correction_style: CorrectionStyle::Rigorous,
        },
    }
}

impl CorrectionStrategy {
    pub fn for_level(level: CefrLevel) -> Self {
        resolve(level)
    }

    pub fn focus_tags(&self) -> Vec<&'static str> {
        self.focus_on.iter().map(|topic| topic.tag()).collect()
    }

    // 生成给模型看的纠错说明
    pub fn instructions(&self) -> String {
        let mut lines = vec![format!("Correction style: {}.", self.correction_style.as_str())];

        if self.ignore_punctuation {
            lines.push("Do not correct punctuation.".to_string());
        }
        if self.ignore_capitalization {
            lines.push("Do not correct capitalization.".to_string());
        }
        if self.ignore_diacritics {
            lines.push("Do not correct missing or wrong accents.".to_string());
        }

        let focus: Vec<String> = self
            .focus_on
            .iter()
            .map(|topic| topic.tag().replace('_', " "))
            .collect();
        lines.push(format!("Focus corrections on: {}.", focus.join(", ")));

        lines.join(" ")
    }

    // 按策略忽略标点、大小写、变音符号后再比较
    pub fn normalize_for_comparison(&self, text: &str) -> String {
        fold_text(
            text,
            self.ignore_punctuation,
            self.ignore_capitalization,
            self.ignore_diacritics,
        )
    }

    pub fn matches(&self, expected: &str, actual: &str) -> bool {
        self.normalize_for_comparison(expected) == self.normalize_for_comparison(actual)
    }
}

pub(crate) fn fold_text(text: &str, strip_punctuation: bool, lowercase: bool, strip_diacritics: bool) -> String {
    // 去变音符号时先分解再丢掉组合附加符号，否则统一成组合形式
    let normalized: String = if strip_diacritics {
        text.nfd().filter(|c| !is_combining_mark(*c)).collect()
    } else {
        text.nfc().collect()
    };

    let mut folded = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        if strip_punctuation && !c.is_alphanumeric() && !c.is_whitespace() {
            continue;
        }
        if lowercase {
            folded.extend(c.to_lowercase());
        } else {
            folded.push(c);
        }
    }

    // 合并多余空白
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
