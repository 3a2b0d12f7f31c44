use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::level::CefrLevel;
use crate::prompt::{COMMON_MISTAKES_LIMIT, RECENT_VOCAB_LIMIT};

// 配置文件结构
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub processing: ProcessingConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub openrouter_key: String,
    pub models: ModelsConfig,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    pub tutor_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub db_file: String,
}

// 选词、提示词和掌握度相关的参数
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub default_level: String,
    pub native_language: String,
    pub vocab_limit: usize,
    pub recent_vocab_limit: usize,
    pub common_mistakes_limit: usize,
    pub correct_step: f64,
    pub incorrect_step: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_level: "A1".to_string(),
            native_language: "English".to_string(),
            vocab_limit: 10,
            recent_vocab_limit: 10,
            common_mistakes_limit: 5,
            correct_step: 10.0,
            incorrect_step: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TemplatesConfig {
    // 模板目录：<dir>/<language>/<LEVEL>.txt，不配置时只用内置模板
    pub dir: Option<PathBuf>,
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.7
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path)
            .with_context(|| format!("配置文件 {} 不存在或无法读取", path.display()))?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("配置文件解析失败: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;

        if CefrLevel::normalize(&engine.default_level).is_none() {
            anyhow::bail!("engine.default_level 无法识别: {:?}", engine.default_level);
        }
        if engine.vocab_limit == 0 {
            anyhow::bail!("engine.vocab_limit 必须大于 0");
        }
        // 提示词里最多 10 个近期单词、5 个常见错误，配置只能调小
        if !(1..=RECENT_VOCAB_LIMIT).contains(&engine.recent_vocab_limit) {
            anyhow::bail!(
                "engine.recent_vocab_limit 必须在 1..={} 范围内，当前值: {}",
                RECENT_VOCAB_LIMIT,
                engine.recent_vocab_limit
            );
        }
        if !(1..=COMMON_MISTAKES_LIMIT).contains(&engine.common_mistakes_limit) {
            anyhow::bail!(
                "engine.common_mistakes_limit 必须在 1..={} 范围内，当前值: {}",
                COMMON_MISTAKES_LIMIT,
                engine.common_mistakes_limit
            );
        }
        for (name, step) in [("correct_step", engine.correct_step), ("incorrect_step", engine.incorrect_step)] {
            if !(step > 0.0 && step <= 100.0) {
                anyhow::bail!("engine.{} 必须在 (0, 100] 范围内，当前值: {}", name, step);
            }
        }
        if engine.incorrect_step >= engine.correct_step {
            anyhow::bail!(
                "engine.incorrect_step ({}) 必须小于 engine.correct_step ({})",
                engine.incorrect_step,
                engine.correct_step
            );
        }
        if self.processing.request_timeout_seconds == 0 {
            anyhow::bail!("processing.request_timeout_seconds 必须大于 0");
        }

        Ok(())
    }
}
