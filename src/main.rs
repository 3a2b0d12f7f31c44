use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lingua_tutor::api::ApiClient;
use lingua_tutor::catalog::{export_progress, import_catalog_file};
use lingua_tutor::engine::{EngineSettings, detect_usage};
use lingua_tutor::templates::Templates;
use lingua_tutor::vocabulary::VocabularySelector;
use lingua_tutor::{Config, DatabaseManager, TurnReply, TurnRequest, TutorEngine};

#[derive(Parser, Debug)]
#[command(name = "lingua-tutor", version, about = "自适应语言辅导引擎")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 导入词汇表 CSV
    Import { file: PathBuf },
    /// 查看下一轮要练习的单词
    Select {
        #[arg(short, long)]
        language: String,
        #[arg(short = 'L', long, default_value = "")]
        level: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// 只生成提示词，不调用模型
    Prompt {
        #[arg(short, long)]
        language: String,
        #[arg(short = 'L', long, default_value = "")]
        level: String,
        #[arg(short, long, default_value = "")]
        topic: String,
        #[arg(short, long = "mistake")]
        mistakes: Vec<String>,
    },
    /// 交互式对话，空行结束
    Chat {
        #[arg(short, long)]
        language: String,
        #[arg(short = 'L', long, default_value = "")]
        level: String,
        #[arg(short, long, default_value = "")]
        topic: String,
    },
    /// 手动记录一次单词使用
    Record {
        #[arg(short, long)]
        language: String,
        #[arg(short, long)]
        word: String,
        #[arg(long)]
        incorrect: bool,
    },
    /// 导出学习进度 CSV
    Export {
        #[arg(short, long)]
        language: String,
        #[arg(short, long, default_value = "progress.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🎓 自适应语言辅导引擎");

    let config = Config::load_from(&args.config)?;
    let db = DatabaseManager::new(&config).await.context("数据库初始化失败")?;
    let settings = EngineSettings::from_config(&config);
    let templates = Templates::from_dir(config.templates.dir.clone());
    let api_client = ApiClient::new(config.clone())?;
    let engine = TutorEngine::new(db, api_client, templates, settings);

    match args.command {
        Command::Import { file } => {
            println!("📥 导入词汇表: {}", file.display());
            let summary = import_catalog_file(engine.database(), &file).await?;
            println!("✅ 导入 {} 条，跳过 {} 条无效记录", summary.imported, summary.skipped);
        }
        Command::Select { language, level, limit } => {
            let level = engine.resolve_level(&level);
            let limit = limit.unwrap_or(engine.settings().vocab_limit);
            let words = VocabularySelector::new(engine.database())
                .select(&language, level, limit)
                .await?;

            if words.is_empty() {
                println!("⚠️  {} {} 还没有整理好的词汇", language, level);
            } else {
                println!("📝 {} {} 下一轮练习的单词:", language, level);
                for (i, word) in words.iter().enumerate() {
                    println!("  {}. {} ({})", i + 1, word.base_form, word.part_of_speech);
                }
            }
        }
        Command::Prompt { language, level, topic, mistakes } => {
            let request = TurnRequest { language, level, topic, common_mistakes: mistakes };
            let turn = engine.prepare_turn(&request).await?;
            println!("📋 等级: {}，单词数: {}", turn.level, turn.words.len());
            println!("{}", turn.prompt);
        }
        Command::Chat { language, level, topic } => {
            run_chat(&engine, TurnRequest { language, level, topic, common_mistakes: Vec::new() }).await?;
        }
        Command::Record { language, word, incorrect } => {
            let Some(found) = engine.database().find_word(&language, &word).await? else {
                println!("❌ 词汇表里没有 {} ({})", word, language);
                return Ok(());
            };
            let progress = engine.record_exposure(found.id, &language, !incorrect).await?;
            println!(
                "✅ {}: 接触 {} 次，掌握度 {:.0}",
                found.base_form, progress.times_encountered, progress.mastery_score
            );
        }
        Command::Export { language, output } => {
            let count = export_progress(engine.database(), &language, &output).await?;
            println!("✅ 已导出 {} 条学习记录：{}", count, output.display());
        }
    }

    Ok(())
}

// 每轮：准备提示词 → 模型回复 → 读取学习者输入 → 更新掌握度
async fn run_chat(engine: &TutorEngine<ApiClient, Templates>, request: TurnRequest) -> Result<()> {
    let stdin = io::stdin();

    loop {
        let (turn, reply) = engine.converse(&request).await;
        println!("\n🤖 {}", reply.text());

        let Some(turn) = turn else {
            return Ok(());
        };
        if reply == TurnReply::Unavailable {
            return Ok(());
        }

        print!("🙋 ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            println!("👋 再见！");
            return Ok(());
        }

        let outcomes = detect_usage(&turn.words, &line, &turn.strategy);
        let updated = engine.complete_turn(&turn.language, &outcomes).await?;
        if !updated.is_empty() {
            println!("💾 更新了 {} 个单词的掌握度", updated.len());
        }
    }
}
