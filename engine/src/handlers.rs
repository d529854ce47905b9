//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - ask: handle a single turn
//! - chat: interactive loop over one session
//! - history: show the stored turns of a session
//! - config: init/show/path

use anyhow::{Context, Result};
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::answer::AnswerSynthesizer;
use crate::config::Config;
use crate::db::Database;
use crate::llm::openai::OpenAIGenerator;
use crate::llm::Generator;
use crate::reformulator::QueryReformulator;
use crate::retrieval::{GraphQaClient, Retriever, SemanticSearchClient, SourceAdapter, WebSearchClient};
use crate::turn::TurnController;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build the turn controller from configuration
///
/// Every collaborator is constructed here and injected explicitly; nothing in
/// the engine holds ambient global state.
pub async fn build_controller(config: &Config) -> Result<(Database, TurnController)> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let generator: Arc<dyn Generator> = Arc::new(OpenAIGenerator::new(config.llm.clone()));

    let graph: Arc<dyn SourceAdapter> = Arc::new(GraphQaClient::new(config.graph.clone()));
    let semantic: Arc<dyn SourceAdapter> =
        Arc::new(SemanticSearchClient::new(config.vector.clone()));
    let web: Arc<dyn SourceAdapter> = Arc::new(WebSearchClient::new(config.web_search.clone()));

    let retriever = Arc::new(Retriever::new(
        graph,
        semantic,
        web,
        config.retrieval.clone(),
    ));

    let controller = TurnController::new(
        database.conversations(),
        retriever,
        QueryReformulator::new(Arc::clone(&generator)),
        AnswerSynthesizer::new(generator),
        config.core.history_limit,
    );

    Ok((database, controller))
}

/// Handle a single question
pub async fn handle_ask(
    question: String,
    session: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let (database, controller) = build_controller(config).await?;

    let answer = controller.handle_turn(&session_id, &question).await?;

    match format {
        OutputFormat::Text => {
            println!("{}", answer);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                json!({ "session_id": session_id, "answer": answer })
            );
        }
    }

    database.close().await?;
    Ok(())
}

/// Interactive chat loop over one session
///
/// Reads utterances from stdin until EOF or `exit`/`quit`. This is the
/// minimal console harness; the graphical chat front-end stays external.
pub async fn handle_chat(session: Option<String>, config: &Config) -> Result<()> {
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let (database, controller) = build_controller(config).await?;

    println!("Session: {}", session_id);
    println!("Posez votre question (exit pour quitter) :");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if utterance.eq_ignore_ascii_case("exit") || utterance.eq_ignore_ascii_case("quit") {
            break;
        }

        match controller.handle_turn(&session_id, utterance).await {
            Ok(answer) => println!("\n{}\n", answer),
            Err(e) => eprintln!("Erreur: {:#}", e),
        }
    }

    database.close().await?;
    Ok(())
}

/// Show the stored turns of a session
pub async fn handle_history(
    session_id: String,
    limit: Option<usize>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let store = database.conversations();

    let turns = match limit {
        Some(n) => store.recent(&session_id, n).await?,
        None => store.read(&session_id).await?,
    };

    match format {
        OutputFormat::Text => {
            if turns.is_empty() {
                println!("No turns stored for session '{}'", session_id);
            }
            for turn in &turns {
                println!("[{}] {}: {}", turn.seq, turn.role.as_str(), turn.content);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&turns)?);
        }
    }

    database.close().await?;
    Ok(())
}

/// Handle `config init` / `config show` / `config path`
pub fn handle_config(action: &crate::cli::ConfigAction, config: &Config) -> Result<()> {
    use crate::cli::ConfigAction;

    match action {
        ConfigAction::Init => {
            let path = Config::default_config_path()?;
            Config::load_or_create()?;
            println!("Configuration at {}", path.display());
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::default_config_path()?.display());
        }
    }
    Ok(())
}
