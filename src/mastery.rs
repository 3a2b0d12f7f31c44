use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::Result;
use crate::models::UserWordProgress;

pub const MAX_MASTERY: f64 = 100.0;
pub const MIN_MASTERY: f64 = 0.0;

// 学习记录的写入接口：读取、修改、写回必须在同一个事务里完成。
// 新记录的 first_encountered 取 now；单词不存在时返回 NotFound，不能留下悬空记录
pub trait ProgressStore {
    fn upsert_progress<F>(
        &self,
        word_id: i64,
        language: &str,
        now: DateTime<Utc>,
        mutator: F,
    ) -> impl Future<Output = Result<UserWordProgress>> + Send
    where
        F: FnOnce(&mut UserWordProgress) + Send;
}

// 掌握度更新规则：答对加分比答错扣分多
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryRule {
    pub correct_step: f64,
    pub incorrect_step: f64,
}

impl Default for MasteryRule {
    fn default() -> Self {
        MasteryRule {
            correct_step: 10.0,
            incorrect_step: 5.0,
        }
    }
}

impl MasteryRule {
    pub fn new(correct_step: f64, incorrect_step: f64) -> Self {
        MasteryRule {
            correct_step,
            incorrect_step,
        }
    }

    pub fn next_score(&self, current: f64, correct_usage: bool) -> f64 {
        let next = if correct_usage {
            current + self.correct_step
        } else {
            current - self.incorrect_step
        };
        next.clamp(MIN_MASTERY, MAX_MASTERY)
    }

    pub fn apply(&self, progress: &mut UserWordProgress, correct_usage: bool, now: DateTime<Utc>) {
        progress.times_encountered += 1;
        progress.last_encountered = Some(now);
        progress.mastery_score = self.next_score(progress.mastery_score, correct_usage);
    }
}

pub struct MasteryTracker<'a, S> {
    store: &'a S,
    rule: MasteryRule,
}

impl<'a, S: ProgressStore + Sync> MasteryTracker<'a, S> {
    pub fn new(store: &'a S, rule: MasteryRule) -> Self {
        MasteryTracker { store, rule }
    }

    // 记录一次接触，返回更新后的学习记录
    pub async fn record_exposure(&self, word_id: i64, language: &str, correct_usage: bool) -> Result<UserWordProgress> {
        let rule = self.rule;
        let now = Utc::now();

        let progress = self
            .store
            .upsert_progress(word_id, language, now, move |progress| rule.apply(progress, correct_usage, now))
            .await?;

        tracing::debug!(
            word_id,
            language,
            correct_usage,
            times_encountered = progress.times_encountered,
            mastery_score = progress.mastery_score,
            "exposure recorded"
        );

        Ok(progress)
    }
}
