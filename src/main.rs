//! groundqa - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use groundqa::{
    bootstrap::{BootstrapStatus, Components},
    cli::{Args, Commands, QuestionArgs, Verbosity},
    config::Settings,
    eval::load_cases,
    ingest::{ChunkStrategy, IngestConfig},
    logging::init_tracing,
    telemetry::TelemetryDisplay,
    types::Citation,
    QaError,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();

    let settings = Settings::load(args.config.as_deref())?;
    init_tracing(&verbosity.log_directive(&settings.logging.level));

    match &args.command {
        Commands::Ask {
            question,
            user,
            session,
        } => run_ask(&settings, question, user.clone(), session.clone(), verbosity).await?,
        Commands::Qa { question } => run_qa(&settings, question, verbosity).await?,
        Commands::Ingest {
            path,
            max_docs,
            strategy,
            chunk_size,
            chunk_overlap,
        } => {
            let config = IngestConfig {
                max_docs: *max_docs,
                strategy: *strategy,
                chunk_size: *chunk_size,
                chunk_overlap: *chunk_overlap,
            };
            run_ingest(&settings, path, config, verbosity).await?
        }
        Commands::Eval { cases, report } => {
            let code = run_eval(&settings, cases, report, verbosity).await?;
            std::process::exit(code);
        }
        Commands::Config { path } => show_config(&settings, &args, *path)?,
    }

    Ok(())
}

/// Build components and make sure the model server answers
async fn connect(settings: &Settings) -> Result<Components> {
    let components = Components::build(settings).context("Failed to initialise backends")?;

    if components.check().await == BootstrapStatus::OllamaNotRunning {
        eprintln!("{} Ollama is not reachable at {}", "✗".red(), settings.llm.base_url);
        eprintln!("  Start it with: ollama serve");
        anyhow::bail!("Ollama not running");
    }

    Ok(components)
}

fn spinner(verbosity: Verbosity, message: &str) -> Option<ProgressBar> {
    if !verbosity.show_progress() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Some(pb)
}

/// Report a pipeline failure the way callers should see it
fn public_failure(err: QaError) -> anyhow::Error {
    let message = err.public_message();
    eprintln!("{} {}", "Error:".red().bold(), message);
    anyhow::anyhow!(message)
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!("\n{}", "Sources:".bold());
    for c in citations {
        println!(
            "  [{}] {} ({:.3})",
            c.id.as_deref().unwrap_or("?").cyan(),
            c.source.as_deref().unwrap_or("unknown"),
            c.score
        );
    }
}

async fn run_ask(
    settings: &Settings,
    question: &QuestionArgs,
    user: Option<String>,
    session: Option<String>,
    verbosity: Verbosity,
) -> Result<()> {
    let components = connect(settings).await?;
    let request = question.to_request(user, session);

    let pb = spinner(verbosity, "Planning, answering and checking...");
    let result = components.service().ask(&request).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let response = result.map_err(public_failure)?;

    if question.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    print_citations(&response.citations);

    if !verbosity.is_quiet() {
        let status = if response.done { "accepted".green() } else { "unverified".yellow() };
        println!(
            "\n{} {} after {} attempt(s): {}",
            "Critic:".bold(),
            status,
            response.attempts,
            response.critique.as_deref().unwrap_or("-")
        );
        if verbosity.show_details() {
            println!("{} {}", "Plan:".bold(), response.plan.join(" → "));
        }
    }

    TelemetryDisplay::new(&response.stats, verbosity).display_summary();
    Ok(())
}

async fn run_qa(settings: &Settings, question: &QuestionArgs, verbosity: Verbosity) -> Result<()> {
    let components = connect(settings).await?;
    let request = question.to_request(None, None);

    let pb = spinner(verbosity, "Retrieving and answering...");
    let result = components.service().ask_single(&request).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let response = result.map_err(public_failure)?;

    if question.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    print_citations(&response.citations);

    if verbosity.show_details() {
        println!("\n{} {}", "Path:".bold(), response.path.as_str());
        if let Some(rewritten) = &response.rewritten_question {
            println!("{} {}", "Rewritten:".bold(), rewritten);
        }
    }

    TelemetryDisplay::new(&response.stats, verbosity).display_summary();
    Ok(())
}

async fn run_ingest(settings: &Settings, path: &Path, config: IngestConfig, verbosity: Verbosity) -> Result<()> {
    // Ingestion only needs the embedder, not a chat round trip
    let components = Components::build(settings).context("Failed to initialise backends")?;
    let strategy: ChunkStrategy = config.strategy;
    let pipeline = components.ingest_pipeline(config);

    let pb = spinner(verbosity, &format!("Ingesting {} ({})...", path.display(), strategy));
    let report = pipeline
        .run(path, |doc, chunks| {
            if let Some(pb) = &pb {
                pb.set_message(format!("{} → {} chunks", doc.source, chunks));
            }
        })
        .await
        .map_err(public_failure)?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !verbosity.is_quiet() {
        println!(
            "{} Ingested {} documents into {} chunks ({})",
            "✓".green(),
            report.documents,
            report.chunks,
            report.strategy
        );
    }
    Ok(())
}

async fn run_eval(settings: &Settings, cases_path: &Path, report_path: &Path, verbosity: Verbosity) -> Result<i32> {
    let cases = load_cases(cases_path)?;
    let components = connect(settings).await?;
    let runner = components.eval_runner();

    println!("Loaded {} eval cases from {}", cases.len(), cases_path.display());
    println!("{}", "-".repeat(80));

    let summary = runner
        .run_all(&cases, |case, result| {
            let status = if result.passed { "PASS".green() } else { "FAIL".red() };
            println!("[{}] {}: {}", status, case.id, case.question);

            let grounding = result
                .grounding_score
                .map(|g| format!("{:.3}", g))
                .unwrap_or_else(|| "None".to_string());
            if result.passed {
                println!(
                    "  abstained={} retrieved={} grounding={}",
                    result.abstained, result.retrieved, grounding
                );
            } else {
                println!("  grounding={} retrieved={}", grounding, result.retrieved);
                if verbosity.show_details() {
                    println!("  reasons: {}", result.fail_reasons.join(", "));
                }
            }
        })
        .await
        .map_err(public_failure)?;

    println!("{}", "-".repeat(80));
    println!("Summary: {}/{} passed", summary.passed(), summary.total());

    summary.write_report(report_path)?;
    println!("Saved report to {}", report_path.display());

    Ok(summary.exit_code())
}

fn show_config(settings: &Settings, args: &Args, path_only: bool) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Settings::config_path()?,
    };

    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    println!("{} {}", "groundqa configuration".bold(), format!("({})", path.display()).dimmed());
    println!();
    println!("{}", toml::to_string_pretty(settings)?);
    println!("Verbosity: {}", args.verbosity().as_str());

    Ok(())
}
