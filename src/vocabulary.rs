use std::cmp::Ordering;
use std::future::Future;

use crate::error::Result;
use crate::level::CefrLevel;
use crate::models::{Word, WordCandidate};

// 读取某语言某等级的全部单词及学习记录（左连接，没有记录时为 None）
pub trait VocabularySource {
    fn get_words_with_progress(
        &self,
        language: &str,
        level: CefrLevel,
    ) -> impl Future<Output = Result<Vec<WordCandidate>>> + Send;
}

pub struct VocabularySelector<'a, S> {
    source: &'a S,
}

impl<'a, S: VocabularySource + Sync> VocabularySelector<'a, S> {
    pub fn new(source: &'a S) -> Self {
        VocabularySelector { source }
    }

    // 返回最需要练习的单词，最多 limit 个
    pub async fn select(&self, language: &str, level: CefrLevel, limit: usize) -> Result<Vec<Word>> {
        let candidates = self.source.get_words_with_progress(language, level).await?;
        let total = candidates.len();

        let selected: Vec<Word> = rank_candidates(candidates, limit)
            .into_iter()
            .map(|candidate| candidate.word)
            .collect();

        tracing::debug!(
            language,
            level = %level,
            total,
            selected = selected.len(),
            "vocabulary selected"
        );

        Ok(selected)
    }
}

// 排序键：掌握度 → 优先级 → 上次见到的时间 → 单词 ID，全部升序
pub fn compare_candidates(a: &WordCandidate, b: &WordCandidate) -> Ordering {
    a.mastery_score()
        .total_cmp(&b.mastery_score())
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.last_encountered().cmp(&b.last_encountered()))
        .then_with(|| a.word.id.cmp(&b.word.id))
}

pub fn rank_candidates(mut candidates: Vec<WordCandidate>, limit: usize) -> Vec<WordCandidate> {
    candidates.sort_by(compare_candidates);
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserWordProgress;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn candidate(id: i64, priority: i64, progress: Option<(f64, Option<i64>)>) -> WordCandidate {
        WordCandidate {
            word: Word {
                id,
                language: "es".to_string(),
                base_form: format!("palabra{}", id),
                part_of_speech: "noun".to_string(),
                pronunciation: None,
            },
            priority,
            progress: progress.map(|(mastery_score, minutes_ago)| UserWordProgress {
                word_id: id,
                language: "es".to_string(),
                times_encountered: 1,
                mastery_score,
                first_encountered: base_time() - Duration::days(1),
                last_encountered: minutes_ago.map(|m| base_time() - Duration::minutes(m)),
            }),
        }
    }

    fn ids(candidates: &[WordCandidate]) -> Vec<i64> {
        candidates.iter().map(|c| c.word.id).collect()
    }

    struct FixedSource(Vec<WordCandidate>);

    impl VocabularySource for FixedSource {
        async fn get_words_with_progress(&self, language: &str, _level: CefrLevel) -> Result<Vec<WordCandidate>> {
            Ok(self
                .0
                .iter()
                .filter(|c| c.word.language == language)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn lower_mastery_ranks_first() {
        let ranked = rank_candidates(
            vec![candidate(1, 1, Some((50.0, Some(10)))), candidate(2, 1, Some((0.0, Some(10))))],
            10,
        );
        assert_eq!(ids(&ranked), vec![2, 1]);
    }

    #[test]
    fn missing_progress_counts_as_zero_mastery() {
        let ranked = rank_candidates(
            vec![candidate(1, 1, Some((5.0, Some(1)))), candidate(2, 3, None)],
            10,
        );
        assert_eq!(ids(&ranked), vec![2, 1]);
    }

    #[test]
    fn priority_breaks_mastery_ties() {
        let ranked = rank_candidates(
            vec![
                candidate(1, 5, Some((20.0, Some(1)))),
                candidate(2, 2, Some((20.0, Some(1)))),
                candidate(3, 1, Some((20.0, Some(1)))),
            ],
            10,
        );
        assert_eq!(ids(&ranked), vec![3, 2, 1]);
    }

    #[test]
    fn stalest_word_wins_remaining_ties() {
        let ranked = rank_candidates(
            vec![
                candidate(1, 1, Some((30.0, Some(5)))),
                candidate(2, 1, Some((30.0, Some(500)))),
                candidate(3, 1, Some((30.0, None))),
            ],
            10,
        );
        assert_eq!(ids(&ranked), vec![3, 2, 1]);
    }

    #[test]
    fn word_id_is_final_tiebreaker() {
        let ranked = rank_candidates(vec![candidate(9, 1, None), candidate(4, 1, None), candidate(7, 1, None)], 10);
        assert_eq!(ids(&ranked), vec![4, 7, 9]);
    }

    #[test]
    fn limit_bounds_the_result() {
        let pool: Vec<_> = (1..=20).map(|id| candidate(id, id, None)).collect();
        assert_eq!(rank_candidates(pool.clone(), 10).len(), 10);
        assert_eq!(rank_candidates(pool.clone(), 25).len(), 20);
        assert!(rank_candidates(pool, 0).is_empty());
        assert!(rank_candidates(Vec::new(), 5).is_empty());
    }

    #[tokio::test]
    async fn select_is_deterministic() {
        let source = FixedSource(vec![
            candidate(3, 2, Some((10.0, Some(3)))),
            candidate(1, 2, Some((10.0, Some(3)))),
            candidate(2, 1, None),
            candidate(4, 1, Some((90.0, None))),
        ]);
        let selector = VocabularySelector::new(&source);

        let first = selector.select("es", CefrLevel::A1, 3).await.unwrap();
        let second = selector.select("es", CefrLevel::A1, 3).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn select_returns_empty_for_uncurated_language() {
        let source = FixedSource(vec![candidate(1, 1, None)]);
        let selector = VocabularySelector::new(&source);
        assert!(selector.select("fr", CefrLevel::B1, 10).await.unwrap().is_empty());
    }
}
