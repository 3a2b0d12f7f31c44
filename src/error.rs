use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

// 引擎内部的错误类型，数据库错误原样向上传递，不在这里重试
#[derive(Error, Debug)]
pub enum EngineError {
    // 词汇表里不存在的单词，属于调用方的数据错误
    #[error("未找到: {0}")]
    NotFound(String),

    #[error("参数无效: {0}")]
    InvalidInput(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("生成失败: {0}")]
    Generation(String),

    #[error("模板读取失败: {0}")]
    Template(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 错误: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn word_not_found(word_id: i64) -> Self {
        EngineError::NotFound(format!("单词 ID {}", word_id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
