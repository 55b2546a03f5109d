use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use diarist_core::config::{self, DiaristConfig};
use diarist_core::controller::{format_report, Reply, ReplyKind, SessionController};
use diarist_core::llm::{LlmService, TextGenerator};
use diarist_core::model::Session;
use diarist_core::storage::{create_backend, SessionStore, Storage};
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "diarist", about = "Diarist: a daily journaling assistant", version)]
enum Cli {
    /// Write today's diary interactively, one line per entry
    Shell,
    /// Check the model backend and storage
    Check,
    /// List days that have a saved diary
    Dates {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the saved diary for a day (YYYY-MM-DD)
    Show {
        /// Day to show, e.g. 2025-12-14
        date: String,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a default .diarist/config.toml in the current directory
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = DiaristConfig::load(Some(&std::env::current_dir()?)).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        DiaristConfig::default_config()
    });

    run(cli, &config).await
}

async fn run(cli: Cli, config: &DiaristConfig) -> Result<()> {
    match cli {
        Cli::Shell => {
            let storage = make_storage(config)?;
            let llm = make_llm(config)?;
            cmd_shell(SessionController::new(storage, llm, config.session.clone())).await
        }
        Cli::Check => cmd_check(config).await,
        Cli::Dates { json } => {
            let storage = make_storage(config)?;
            cmd_dates(&storage, json).await
        }
        Cli::Show { date, json } => {
            let storage = make_storage(config)?;
            cmd_show(&storage, &date, json).await
        }
        Cli::Init { force } => cmd_init(config, force),
    }
}

fn make_storage(config: &DiaristConfig) -> Result<Storage> {
    let storage = create_backend(config).context("failed to open diary storage")?;
    tracing::debug!(
        backend = storage.backend_name(),
        location = %storage.location().display(),
        "storage opened"
    );
    Ok(storage)
}

fn make_llm(config: &DiaristConfig) -> Result<LlmService> {
    LlmService::from_config(&config.llm).context("failed to configure the model backend")
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{input}', expected YYYY-MM-DD"))
}

// ---------------------------------------------------------------------------
// shell
// ---------------------------------------------------------------------------

async fn cmd_shell(mut controller: SessionController<Storage, LlmService>) -> Result<()> {
    let phrases = controller.phrases().clone();
    println!("{}", "Diarist".bold());
    println!(
        "  {} \"{}\"   {} \"{}\"   {} /help",
        "start:".dimmed(),
        phrases.start_phrase.cyan(),
        "end:".dimmed(),
        phrases.end_phrase.cyan(),
        "help:".dimmed(),
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/status" => println!("{}", controller.status().dimmed()),
            "/check" => print_model_status(controller.is_model_available().await),
            "/help" => print_shell_help(&phrases),
            _ => print_reply(&controller.handle(&line).await),
        }
    }

    if let Some(session) = controller.current_session() {
        println!(
            "{}",
            format!(
                "Leaving with today's diary still open ({} entries saved as a snapshot).",
                session.entry_count()
            )
            .yellow()
        );
    }
    Ok(())
}

fn print_reply(reply: &Reply) {
    match reply.kind {
        ReplyKind::Welcome => println!("{}", reply.text.green()),
        ReplyKind::Recorded | ReplyKind::Ignored => println!("{}", reply.text.dimmed()),
        ReplyKind::NoContent => {
            println!("{}", "Nothing was written today, so there is nothing to summarize.".dimmed())
        }
        ReplyKind::Report => {
            println!();
            println!("{}", reply.text);
            println!();
        }
        ReplyKind::Failed => println!("{}", reply.text.red()),
        ReplyKind::AlreadyStarted | ReplyKind::NoActiveSession | ReplyKind::Blank => {
            println!("{}", reply.text.yellow())
        }
    }
}

fn print_shell_help(phrases: &config::SessionConfig) {
    println!("{}", "Diarist shell".bold());
    println!("  {:<28} start today's diary", phrases.start_phrase.cyan());
    println!("  {:<28} one diary entry", "<any other line>".cyan());
    println!("  {:<28} end the day and summarize", phrases.end_phrase.cyan());
    println!("  {:<28} current session state", "/status".cyan());
    println!("  {:<28} check the model backend", "/check".cyan());
    println!("  {:<28} leave the shell", "/quit".cyan());
}

fn print_model_status(available: bool) {
    if available {
        println!("{}", "Model backend is reachable.".green());
    } else {
        println!("{}", "Model backend is not reachable.".red());
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

async fn cmd_check(config: &DiaristConfig) -> Result<()> {
    println!("{}", "Diarist Check".bold());
    println!("{}", "=============".dimmed());
    println!();

    let mut failed = false;

    match LlmService::from_config(&config.llm) {
        Ok(llm) => {
            let target = format!("{} / {} @ {}", llm.provider_name(), llm.model(), llm.base_url());
            if llm.is_available().await {
                println!("  {} Model          {}", "OK".green(), target.dimmed());
            } else {
                println!("  {} Model          {}", "FAIL".red(), target.dimmed());
                if llm.provider_name() == "ollama" {
                    println!(
                        "       {} Start Ollama with: {}",
                        "hint:".dimmed(),
                        format!("ollama serve && ollama pull {}", llm.model()).cyan()
                    );
                }
                failed = true;
            }
        }
        Err(e) => {
            println!("  {} Model          {}", "FAIL".red(), format!("{e}").red());
            failed = true;
        }
    }

    match make_storage(config) {
        Ok(storage) => match storage.list_dates().await {
            Ok(dates) => println!(
                "  {} Storage        {} {} ({} days)",
                "OK".green(),
                storage.backend_name().cyan(),
                storage.location().display().to_string().dimmed(),
                dates.len()
            ),
            Err(e) => {
                println!("  {} Storage        {}", "FAIL".red(), format!("{e}").red());
                failed = true;
            }
        },
        Err(e) => {
            println!("  {} Storage        {}", "FAIL".red(), format!("{e:#}").red());
            failed = true;
        }
    }

    println!();
    if failed {
        anyhow::bail!("one or more checks failed");
    }
    println!("{}", "All checks passed.".green());
    Ok(())
}

// ---------------------------------------------------------------------------
// dates / show
// ---------------------------------------------------------------------------

async fn cmd_dates(storage: &Storage, json: bool) -> Result<()> {
    let dates = storage.list_dates().await?;

    if json {
        let out: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if dates.is_empty() {
        println!("{}", "No diaries yet.".dimmed());
        return Ok(());
    }
    for date in &dates {
        println!("{}", date.to_string().cyan());
    }
    println!();
    println!("{}", format!("{} days", dates.len()).dimmed());
    Ok(())
}

async fn cmd_show(storage: &Storage, date: &str, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let session = storage
        .load(date)
        .await?
        .with_context(|| format!("no diary saved for {date}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    print_session(&session);
    Ok(())
}

fn print_session(session: &Session) {
    println!("{}", session.date().format("%A, %B %-d, %Y").to_string().bold());
    let state = if session.is_active() {
        "in progress".yellow().to_string()
    } else {
        "closed".green().to_string()
    };
    println!(
        "{} {}",
        format!("started {}", session.start_time().format("%H:%M")).dimmed(),
        state
    );
    println!();

    println!(
        "{} ({})",
        "--- Entries ---".dimmed(),
        session.entry_count().to_string().cyan()
    );
    for entry in session.entries() {
        println!("  {}  {}", entry.timestamp.format("%H:%M").dimmed(), entry.content);
    }

    match session.reflection() {
        Some(reflection) => {
            println!();
            println!("{}", format_report(&reflection));
        }
        None => {
            println!();
            println!("{}", "No reflection was generated for this day.".dimmed());
        }
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn cmd_init(config: &DiaristConfig, force: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let diarist_dir = cwd.join(".diarist");
    let config_path = diarist_dir.join("config.toml");

    if config_path.exists() && !force {
        println!("Diarist already initialized in this directory.");
        println!("  {}", "Use --force to overwrite .diarist/config.toml".dimmed());
        return Ok(());
    }

    std::fs::create_dir_all(&diarist_dir)?;

    let note = "# Diarist configuration. DIARIST__SECTION__KEY env vars override these.\n";
    let toml_str = format!("{note}{}", config.to_toml_string()?);
    std::fs::write(&config_path, toml_str)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    add_to_gitignore(&cwd, ".diarist/config.local.toml")?;

    println!("{}", "Initialized Diarist in .diarist/".green());
    println!("  {}   .diarist/config.toml", "Config:".dimmed());
    println!("  {}    {}", "Model:".dimmed(), config.llm.model.cyan());
    println!("  {}  {}", "Storage:".dimmed(), config.storage.backend.cyan());
    if let Some(global) = config::global_config_path() {
        println!(
            "  {}   {}",
            "Global:".dimmed(),
            global.display().to_string().dimmed()
        );
    }
    println!();
    println!("{}", "Quick Start:".bold());
    println!("  1. Check the model:  {}", "diarist check".cyan());
    println!("  2. Start writing:    {}", "diarist shell".cyan());
    Ok(())
}

fn add_to_gitignore(dir: &Path, entry: &str) -> Result<()> {
    let gitignore_path = dir.join(".gitignore");
    if gitignore_path.exists() {
        let contents = std::fs::read_to_string(&gitignore_path)?;
        if !contents.lines().any(|l| l.trim() == entry) {
            let mut appended = contents;
            if !appended.ends_with('\n') {
                appended.push('\n');
            }
            appended.push_str(entry);
            appended.push('\n');
            std::fs::write(&gitignore_path, appended)?;
        }
    } else {
        std::fs::write(&gitignore_path, format!("{entry}\n"))?;
    }
    Ok(())
}
