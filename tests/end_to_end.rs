use std::sync::Mutex;

use lingua_tutor::api::Generator;
use lingua_tutor::catalog::import_catalog;
use lingua_tutor::engine::{EngineSettings, detect_usage};
use lingua_tutor::templates::BuiltinTemplates;
use lingua_tutor::{
    CefrLevel, DatabaseManager, EngineError, TUTOR_UNAVAILABLE_MESSAGE, TurnReply, TurnRequest,
    TutorEngine, UsageOutcome,
};

const CATALOG: &str = "\
language,base_form,part_of_speech,pronunciation,level,priority
es,hola,interjection,,A1,1
es,gracias,interjection,,A1,2
es,agua,noun,,A1,3
es,casa,noun,,A1,4
es,perro,noun,,A1,5
es,gato,noun,,A1,6
es,libro,noun,,A1,7
es,mesa,noun,,A1,8
es,comer,verb,,A1,9
es,beber,verb,,A1,10
es,dormir,verb,,A1,11
es,tren,noun,,A1,12
es,estación,noun,,B2,1
fr,bonjour,interjection,,A1,1
";

// 记录收到的提示词，回复固定文本
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> lingua_tutor::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("¡Hola! ¿Qué quieres beber?".to_string())
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> lingua_tutor::Result<String> {
        Err(EngineError::Generation("connection refused at 10.0.0.1".to_string()))
    }
}

async fn engine_with<G: Generator + Sync>(generator: G) -> TutorEngine<G, BuiltinTemplates> {
    let db = DatabaseManager::in_memory().await.unwrap();
    import_catalog(&db, CATALOG.as_bytes()).await.unwrap();
    TutorEngine::new(db, generator, BuiltinTemplates, EngineSettings::default())
}

fn request(level: &str) -> TurnRequest {
    TurnRequest {
        language: "es".to_string(),
        level: level.to_string(),
        topic: "travel".to_string(),
        common_mistakes: vec!["ser vs estar".to_string()],
    }
}

#[tokio::test]
async fn lowercase_level_runs_a_full_beginner_turn() {
    let engine = engine_with(RecordingGenerator::default()).await;

    let turn = engine.prepare_turn(&request("a1")).await.unwrap();
    assert_eq!(turn.level, CefrLevel::A1);
    assert_eq!(turn.words.len(), 10);
    assert_eq!(turn.words[0].base_form, "hola");
    assert!(turn.strategy.ignore_punctuation);
    assert!(turn.strategy.ignore_capitalization);
    assert!(turn.strategy.ignore_diacritics);

    assert!(!turn.prompt.is_empty());
    assert!(turn.prompt.contains("A1"));
    assert!(turn.prompt.contains("travel"));
    assert!(turn.prompt.contains("hola, gracias, agua"));
    assert!(turn.prompt.contains("ser vs estar"));
    assert!(!turn.prompt.contains("dormir"));
    assert!(!turn.prompt.contains("{level}"));

    let reply = engine.run_turn(&turn).await;
    assert_eq!(reply, TurnReply::Reply("¡Hola! ¿Qué quieres beber?".to_string()));
}

#[tokio::test]
async fn mastery_update_reorders_the_next_turn() {
    let engine = engine_with(RecordingGenerator::default()).await;
    let turn = engine.prepare_turn(&request("beginner")).await.unwrap();

    let outcomes = detect_usage(&turn.words, "Hola, quiero agua, gracias", &turn.strategy);
    assert_eq!(outcomes.len(), 3);
    let updated = engine.complete_turn("es", &outcomes).await.unwrap();
    assert!(updated.iter().all(|p| p.times_encountered == 1 && p.mastery_score == 10.0));

    let next = engine.prepare_turn(&request("A1")).await.unwrap();
    let forms: Vec<_> = next.words.iter().map(|w| w.base_form.as_str()).collect();
    // 九个未练习的单词排在前面，练习过的按优先级排在最后
    assert_eq!(forms[0], "casa");
    assert!(forms.contains(&"tren"));
    assert_eq!(forms.last(), Some(&"hola"));
    assert!(!forms.contains(&"gracias"));
}

#[tokio::test]
async fn unknown_level_falls_back_to_default() {
    let engine = engine_with(RecordingGenerator::default()).await;
    let turn = engine.prepare_turn(&request("expert")).await.unwrap();
    assert_eq!(turn.level, CefrLevel::A1);
}

#[tokio::test]
async fn uncurated_level_gives_empty_vocabulary_not_error() {
    let engine = engine_with(RecordingGenerator::default()).await;
    let turn = engine.prepare_turn(&request("C2")).await.unwrap();
    assert!(turn.words.is_empty());
    assert!(!turn.strategy.ignore_diacritics);
    assert!(turn.prompt.contains("C2"));
}

#[tokio::test]
async fn generation_failure_hides_internal_error() {
    let engine = engine_with(FailingGenerator).await;
    let (turn, reply) = engine.converse(&request("B2")).await;

    assert!(turn.is_some());
    assert_eq!(reply, TurnReply::Unavailable);
    assert_eq!(reply.text(), TUTOR_UNAVAILABLE_MESSAGE);
    assert!(!reply.text().contains("10.0.0.1"));
}

#[tokio::test]
async fn recording_unknown_word_is_not_found() {
    let engine = engine_with(RecordingGenerator::default()).await;
    let err = engine
        .complete_turn("es", &[UsageOutcome { word_id: 9999, correct_usage: true }])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn prompt_is_built_before_mastery_changes() {
    let generator = RecordingGenerator::default();
    let engine = engine_with(generator).await;

    let turn = engine.prepare_turn(&request("A1")).await.unwrap();
    let prompt_before = turn.prompt.clone();
    engine.run_turn(&turn).await;

    let outcomes = detect_usage(&turn.words, "hola", &turn.strategy);
    engine.complete_turn("es", &outcomes).await.unwrap();

    assert_eq!(turn.prompt, prompt_before);
    let again = engine.prepare_turn(&request("A1")).await.unwrap();
    assert_ne!(again.prompt, prompt_before);
}
