use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::database::DatabaseManager;
use crate::error::Result;
use crate::level::CefrLevel;
use crate::models::{NewWord, ProgressReport};

// 词汇表 CSV 的一行：language,base_form,part_of_speech,pronunciation,level,priority
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    language: String,
    base_form: String,
    part_of_speech: String,
    pronunciation: Option<String>,
    level: String,
    priority: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

struct CatalogEntry {
    word: NewWord,
    level: CefrLevel,
    priority: i64,
}

// 先同步解析 CSV，无效行记录下来跳过
fn parse_catalog<R: Read>(reader: R) -> (Vec<CatalogEntry>, usize) {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    let mut skipped = 0;

    for (index, record) in csv_reader.deserialize::<CatalogRecord>().enumerate() {
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed catalog row");
                skipped += 1;
                continue;
            }
        };

        let Some(level) = CefrLevel::normalize(&record.level) else {
            tracing::warn!(line, level = %record.level, "skipping catalog row with unknown level");
            skipped += 1;
            continue;
        };

        if record.priority < 1 || record.base_form.is_empty() || record.language.is_empty() {
            tracing::warn!(line, base_form = %record.base_form, "skipping incomplete catalog row");
            skipped += 1;
            continue;
        }

        entries.push(CatalogEntry {
            word: NewWord {
                language: record.language,
                base_form: record.base_form,
                part_of_speech: record.part_of_speech,
                pronunciation: record.pronunciation.filter(|p| !p.is_empty()),
            },
            level,
            priority: record.priority,
        });
    }

    (entries, skipped)
}

// 导入整理好的词汇表
pub async fn import_catalog<R: Read>(db: &DatabaseManager, reader: R) -> Result<ImportSummary> {
    let (entries, skipped) = parse_catalog(reader);
    let mut summary = ImportSummary { imported: 0, skipped };

    for entry in entries {
        let word = db.add_word(&entry.word).await?;
        db.add_word_difficulty(word.id, entry.level, entry.priority).await?;
        summary.imported += 1;
    }

    tracing::info!(imported = summary.imported, skipped = summary.skipped, "catalog imported");
    Ok(summary)
}

pub async fn import_catalog_file(db: &DatabaseManager, path: impl AsRef<Path>) -> Result<ImportSummary> {
    let file = File::open(path.as_ref())?;
    import_catalog(db, file).await
}

pub fn write_progress_csv<W: Write>(rows: &[ProgressReport], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

// 导出某语言的学习进度，返回导出的行数
pub async fn export_progress(db: &DatabaseManager, language: &str, path: impl AsRef<Path>) -> Result<usize> {
    let rows = db.get_all_progress(language).await?;
    let file = File::create(path.as_ref())?;
    write_progress_csv(&rows, file)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::{MasteryRule, MasteryTracker};
    use crate::vocabulary::VocabularySelector;

    const CATALOG: &str = "\
language,base_form,part_of_speech,pronunciation,level,priority
es,hola,interjection,ˈola,a1,1
es,gracias,interjection,,Beginner,2
es,tiempo,noun,,B2,3
es,tiempo,noun,,A1,5
es,perro,noun,,expert,1
es,gato,noun,,A1,0
es,casa,noun
";

    #[tokio::test]
    async fn import_skips_invalid_rows() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let summary = import_catalog(&db, CATALOG.as_bytes()).await.unwrap();
        assert_eq!(summary, ImportSummary { imported: 4, skipped: 3 });

        let hola = db.find_word("es", "hola").await.unwrap().unwrap();
        assert_eq!(hola.pronunciation.as_deref(), Some("ˈola"));
        let gracias = db.find_word("es", "gracias").await.unwrap().unwrap();
        assert_eq!(gracias.pronunciation, None);

        let tiempo = db.find_word("es", "tiempo").await.unwrap().unwrap();
        assert_eq!(db.get_word_levels(tiempo.id).await.unwrap().len(), 2);
        assert!(db.find_word("es", "perro").await.unwrap().is_none());

        let selected = VocabularySelector::new(&db).select("es", CefrLevel::A1, 10).await.unwrap();
        let forms: Vec<_> = selected.iter().map(|w| w.base_form.as_str()).collect();
        assert_eq!(forms, vec!["hola", "gracias", "tiempo"]);
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let db = DatabaseManager::in_memory().await.unwrap();
        import_catalog(&db, CATALOG.as_bytes()).await.unwrap();
        import_catalog(&db, CATALOG.as_bytes()).await.unwrap();

        let selected = VocabularySelector::new(&db).select("es", CefrLevel::A1, 10).await.unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[tokio::test]
    async fn export_writes_header_and_rows() {
        let db = DatabaseManager::in_memory().await.unwrap();
        import_catalog(&db, CATALOG.as_bytes()).await.unwrap();
        let hola = db.find_word("es", "hola").await.unwrap().unwrap();
        MasteryTracker::new(&db, MasteryRule::default())
            .record_exposure(hola.id, "es", true)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.csv");
        let count = export_progress(&db, "es", &path).await.unwrap();
        assert_eq!(count, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("base_form,times_encountered,mastery_score,first_encountered,last_encountered")
        );
        assert!(lines.next().unwrap().starts_with("hola,1,10.0,"));
        assert!(lines.next().is_none());
    }
}
