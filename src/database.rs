use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::level::CefrLevel;
use crate::mastery::{MAX_MASTERY, MIN_MASTERY, ProgressStore};
use crate::models::*;
use crate::vocabulary::VocabularySource;

pub struct DatabaseManager {
    pool: SqlitePool,
}

// 左连接查询的一行，学习记录的列可能全为 NULL
#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: i64,
    language: String,
    base_form: String,
    part_of_speech: String,
    pronunciation: Option<String>,
    priority: i64,
    progress_language: Option<String>,
    times_encountered: Option<i64>,
    mastery_score: Option<f64>,
    first_encountered: Option<DateTime<Utc>>,
    last_encountered: Option<DateTime<Utc>>,
}

impl From<CandidateRow> for WordCandidate {
    fn from(row: CandidateRow) -> Self {
        let progress = match (
            row.progress_language,
            row.times_encountered,
            row.mastery_score,
            row.first_encountered,
        ) {
            (Some(language), Some(times_encountered), Some(mastery_score), Some(first_encountered)) => {
                Some(UserWordProgress {
                    word_id: row.id,
                    language,
                    times_encountered,
                    mastery_score,
                    first_encountered,
                    last_encountered: row.last_encountered,
                })
            }
            _ => None,
        };

        WordCandidate {
            word: Word {
                id: row.id,
                language: row.language,
                base_form: row.base_form,
                part_of_speech: row.part_of_speech,
                pronunciation: row.pronunciation,
            },
            priority: row.priority,
            progress,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &Config) -> Result<Self> {
        // 数据库文件放在当前目录下
        let db_path = std::env::current_dir()?.join(&config.database.db_file);
        tracing::info!(path = %db_path.display(), "connecting database");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    // 内存数据库只能有一个连接，否则每个连接看到的是不同的库
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let manager = DatabaseManager { pool };
        manager.initialize_tables().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                language TEXT NOT NULL,
                base_form TEXT NOT NULL,
                part_of_speech TEXT NOT NULL,
                pronunciation TEXT,
                created_at DATETIME DEFAULT (datetime('now')),
                UNIQUE(language, base_form)
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS word_difficulty_levels (
                word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                level TEXT NOT NULL CHECK (level IN ('A1', 'A2', 'B1', 'B2', 'C1', 'C2')),
                priority INTEGER NOT NULL CHECK (priority >= 1),
                PRIMARY KEY (word_id, level)
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_word_progress (
                word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                times_encountered INTEGER NOT NULL DEFAULT 0 CHECK (times_encountered >= 0),
                mastery_score REAL NOT NULL DEFAULT 0 CHECK (mastery_score >= 0 AND mastery_score <= 100),
                first_encountered DATETIME NOT NULL,
                last_encountered DATETIME,
                PRIMARY KEY (word_id, language)
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_word_difficulty_level ON word_difficulty_levels (level, priority)"
        ).execute(&self.pool).await?;

        Ok(())
    }

    // 新增单词；同一语言下已存在的原形只更新词性和读音
    pub async fn add_word(&self, word: &NewWord) -> Result<Word> {
        if word.base_form.trim().is_empty() || word.language.trim().is_empty() {
            return Err(EngineError::InvalidInput("单词原形和语言不能为空".to_string()));
        }

        let saved = sqlx::query_as::<_, Word>(
            r#"
            INSERT INTO words (language, base_form, part_of_speech, pronunciation)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(language, base_form) DO UPDATE SET
                part_of_speech = excluded.part_of_speech,
                pronunciation = excluded.pronunciation
            RETURNING id, language, base_form, part_of_speech, pronunciation
            "#
        )
        .bind(word.language.trim())
        .bind(word.base_form.trim())
        .bind(&word.part_of_speech)
        .bind(&word.pronunciation)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn find_word(&self, language: &str, base_form: &str) -> Result<Option<Word>> {
        let word = sqlx::query_as::<_, Word>(
            "SELECT id, language, base_form, part_of_speech, pronunciation FROM words WHERE language = ? AND base_form = ?"
        )
        .bind(language)
        .bind(base_form)
        .fetch_optional(&self.pool)
        .await?;

        Ok(word)
    }

    // 根据ID获取单词信息
    pub async fn get_word_by_id(&self, id: i64) -> Result<Option<Word>> {
        let word = sqlx::query_as::<_, Word>(
            "SELECT id, language, base_form, part_of_speech, pronunciation FROM words WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(word)
    }

    // 设置单词在某个等级下的优先级，(word, level) 已存在时覆盖优先级
    pub async fn add_word_difficulty(&self, word_id: i64, level: CefrLevel, priority: i64) -> Result<WordDifficultyLevel> {
        if priority < 1 {
            return Err(EngineError::InvalidInput(format!("优先级必须大于等于 1，当前值: {}", priority)));
        }
        if self.get_word_by_id(word_id).await?.is_none() {
            return Err(EngineError::word_not_found(word_id));
        }

        sqlx::query(
            r#"
            INSERT INTO word_difficulty_levels (word_id, level, priority) VALUES (?, ?, ?)
            ON CONFLICT(word_id, level) DO UPDATE SET priority = excluded.priority
            "#
        )
        .bind(word_id)
        .bind(level.as_str())
        .bind(priority)
        .execute(&self.pool)
        .await?;

        Ok(WordDifficultyLevel { word_id, level, priority })
    }

    pub async fn get_word_levels(&self, word_id: i64) -> Result<Vec<WordDifficultyLevel>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT level, priority FROM word_difficulty_levels WHERE word_id = ? ORDER BY level"
        )
        .bind(word_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(level, priority)| {
                CefrLevel::normalize(&level).map(|level| WordDifficultyLevel { word_id, level, priority })
            })
            .collect())
    }

    // 删除单词，等级和学习记录会级联删除
    pub async fn delete_word(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM words WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_progress(&self, word_id: i64, language: &str) -> Result<Option<UserWordProgress>> {
        let progress = sqlx::query_as::<_, UserWordProgress>(
            r#"
            SELECT word_id, language, times_encountered, mastery_score, first_encountered, last_encountered
            FROM user_word_progress WHERE word_id = ? AND language = ?
            "#
        )
        .bind(word_id)
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    // 某语言下全部学习记录，按原形排序
    pub async fn get_all_progress(&self, language: &str) -> Result<Vec<ProgressReport>> {
        let rows = sqlx::query_as::<_, ProgressReport>(
            r#"
            SELECT w.base_form, p.times_encountered, p.mastery_score, p.first_encountered, p.last_encountered
            FROM user_word_progress p
            JOIN words w ON w.id = p.word_id
            WHERE p.language = ?
            ORDER BY w.base_form
            "#
        )
        .bind(language)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

impl VocabularySource for DatabaseManager {
    async fn get_words_with_progress(&self, language: &str, level: CefrLevel) -> Result<Vec<WordCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                w.id, w.language, w.base_form, w.part_of_speech, w.pronunciation,
                d.priority,
                p.language AS progress_language,
                p.times_encountered, p.mastery_score, p.first_encountered, p.last_encountered
            FROM word_difficulty_levels d
            JOIN words w ON w.id = d.word_id
            LEFT JOIN user_word_progress p ON p.word_id = w.id AND p.language = ?
            WHERE w.language = ? AND d.level = ?
            ORDER BY w.id
            "#
        )
        .bind(language)
        .bind(language)
        .bind(level.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WordCandidate::from).collect())
    }
}

impl ProgressStore for DatabaseManager {
    async fn upsert_progress<F>(
        &self,
        word_id: i64,
        language: &str,
        now: DateTime<Utc>,
        mutator: F,
    ) -> Result<UserWordProgress>
    where
        F: FnOnce(&mut UserWordProgress) + Send,
    {
        let mut tx = self.pool.begin().await?;

        // 第一条语句就是写操作，事务一开始就拿到写锁，后面的读-改-写不会和其他写者交错。
        // 单词不存在或不属于该语言时不会插入任何行
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_word_progress
                (word_id, language, times_encountered, mastery_score, first_encountered, last_encountered)
            SELECT ?, ?, 0, 0, ?, NULL
            WHERE EXISTS (SELECT 1 FROM words WHERE id = ? AND language = ?)
            "#
        )
        .bind(word_id)
        .bind(language)
        .bind(now)
        .bind(word_id)
        .bind(language)
        .execute(&mut *tx)
        .await?;

        let current = sqlx::query_as::<_, UserWordProgress>(
            r#"
            SELECT word_id, language, times_encountered, mastery_score, first_encountered, last_encountered
            FROM user_word_progress WHERE word_id = ? AND language = ?
            "#
        )
        .bind(word_id)
        .bind(language)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut progress) = current else {
            // 事务随 tx 一起回滚
            return Err(EngineError::word_not_found(word_id));
        };

        mutator(&mut progress);
        progress.mastery_score = progress.mastery_score.clamp(MIN_MASTERY, MAX_MASTERY);
        progress.times_encountered = progress.times_encountered.max(0);

        sqlx::query(
            r#"
            UPDATE user_word_progress
            SET times_encountered = ?, mastery_score = ?, last_encountered = ?
            WHERE word_id = ? AND language = ?
            "#
        )
        .bind(progress.times_encountered)
        .bind(progress.mastery_score)
        .bind(progress.last_encountered)
        .bind(word_id)
        .bind(language)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(progress)
    }
}
