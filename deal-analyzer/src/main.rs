use anyhow::{Context, Result};
use chrono::{Duration, Local};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use deal_analyzer::analysis::AnalysisPipeline;
use deal_analyzer::chat::{AnalysisChat, ChatSession};
use deal_analyzer::cli::{Cli, Command};
use deal_analyzer::config::{database_path_from_env, AnalyzerConfig};
use deal_analyzer::gateway::AnthropicGateway;
use deal_analyzer::media::{prepare_context, CommandMediaExtractor};
use deal_analyzer::store::{CachedReport, ReportStore};
use deal_analyzer_sdk::{enable_event_stream, StageStatus};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    if cli.events {
        enable_event_stream();
    }

    let database_path = cli.database.clone().unwrap_or_else(database_path_from_env);
    let store = ReportStore::new(database_path)?;
    store
        .initialize_schema()
        .context("Failed to initialize report cache")?;

    match cli.command {
        Command::Analyze {
            file,
            query,
            capacity,
        } => analyze(&store, &file, &query, capacity).await,
        Command::Chat { file_id, question } => chat(&store, &file_id, question).await,
        Command::Reports { limit, offset } => {
            let reports = store.list(limit, offset)?;
            if reports.is_empty() {
                println!("No cached reports");
            }
            for report in reports {
                println!(
                    "{}  {}  {:<12} {:<14} {:>6.1}s  {}",
                    report.file_id,
                    report.created_at.format("%Y-%m-%d %H:%M"),
                    report.file_kind.as_str(),
                    report
                        .investment_type
                        .map(|t| t.as_str())
                        .unwrap_or("-"),
                    report.elapsed_seconds,
                    report.original_filename,
                );
            }
            Ok(())
        }
        Command::Show { file_id, stages } => {
            let report = load_report(&store, &file_id)?;
            if stages {
                for entry in &report.stage_log {
                    let mark = match entry.status {
                        StageStatus::Completed => "✓",
                        StageStatus::Degraded => "⚠",
                    };
                    println!("{} Stage {}: {}", mark, entry.stage_index, entry.name);
                    if let Some(note) = &entry.note {
                        println!("    {}", note);
                    }
                }
            } else {
                println!("{}", report.report);
            }
            Ok(())
        }
        Command::Delete { file_id } => {
            if store.delete(&file_id)? {
                println!("✓ Deleted {}", file_id);
            } else {
                println!("No report with id {}", file_id);
            }
            Ok(())
        }
        Command::Prune { days } => {
            let deleted = store.delete_before(Local::now() - Duration::days(days))?;
            println!("✓ Deleted {} report(s) older than {} days", deleted, days);
            Ok(())
        }
    }
}

fn load_config() -> Result<AnalyzerConfig> {
    AnalyzerConfig::from_env().context("Failed to load configuration")
}

fn load_report(store: &ReportStore, file_id: &str) -> Result<CachedReport> {
    store
        .get(file_id)?
        .with_context(|| format!("No cached report with id {}", file_id))
}

async fn analyze(store: &ReportStore, file: &Path, query: &str, capacity: usize) -> Result<()> {
    let config = load_config()?;
    let gateway = Arc::new(AnthropicGateway::new(&config)?);
    let extractor = CommandMediaExtractor::new(config.media.clone());

    println!("{}", "=".repeat(80));
    println!("Preparing {}", file.display());
    println!("{}", "=".repeat(80));

    let (kind, context) = prepare_context(&extractor, file, query, &config.media)
        .await
        .with_context(|| format!("Failed to prepare {}", file.display()))?;

    let pipeline = AnalysisPipeline::from_config(gateway, &config);
    let (handle, mut progress) = pipeline.spawn(context, capacity);

    while let Some(event) = progress.recv().await {
        let mark = match event.status {
            StageStatus::Completed => "✓",
            StageStatus::Degraded => "⚠",
        };
        println!(
            "{} [{:>3.0}%] Stage {}/{}: {}",
            mark,
            event.progress_percent,
            event.stage_index + 1,
            event.total_stages,
            event.name
        );
    }

    let outcome = handle.await.context("Analysis task aborted")?;
    let file_id = Uuid::new_v4().to_string();
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    println!("\n{}", outcome.report);

    let degraded = outcome.degraded_stages();
    if !degraded.is_empty() {
        println!("⚠ Degraded stages: {:?}", degraded);
    }

    let failed = outcome.is_failed();
    let elapsed = outcome.elapsed_seconds;
    store
        .save(&CachedReport::from_outcome(&file_id, filename, kind, outcome))
        .context("Failed to cache report")?;

    if failed {
        println!("✗ Analysis failed after {:.1}s (id {})", elapsed, file_id);
    } else {
        println!("✓ Analysis complete in {:.1}s (id {})", elapsed, file_id);
    }
    Ok(())
}

async fn chat(store: &ReportStore, file_id: &str, question: Option<String>) -> Result<()> {
    let report = load_report(store, file_id)?;
    let config = load_config()?;
    let gateway = Arc::new(AnthropicGateway::new(&config)?);
    let chat = AnalysisChat::from_config(gateway, &config);

    if let Some(question) = question {
        println!("{}", chat.ask(&question, &report.report, &[]).await);
        return Ok(());
    }

    let mut session = ChatSession::new(chat, report.report);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Ask about report {} (Ctrl-D to quit)", file_id);

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        println!("\n{}\n", session.ask(question).await);
    }
    Ok(())
}
