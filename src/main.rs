use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use pdf_chat::commands::{chat, knowledge, settings};
use pdf_chat::config::{self, PipelineOptions};
use pdf_chat::doc_processor::SourceFormat;
use pdf_chat::llm::CompletionProvider;
use pdf_chat::{AppError, AppResult, AppState, Database, Store};

/// Chat with PDF documents
#[derive(Parser, Debug)]
#[command(name = "pdf-chat", version, about = "Upload PDFs and ask questions about them")]
struct Cli {
    /// SQLite database file
    #[arg(long, value_name = "PATH", env = "PDF_CHAT_DB", default_value = "pdf-chat.db")]
    db: PathBuf,
    /// Model for this run, e.g. openai/gpt-4o-mini (overrides the llm_model setting)
    #[arg(long, value_name = "MODEL", env = "PDF_CHAT_MODEL")]
    model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF (or .txt/.md) file
    Upload {
        file: PathBuf,
        /// Display name, defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Add the built-in demo document
    Sample,
    /// List documents, newest first
    List,
    /// Show a document with its extracted text
    Show { id: String },
    /// Write the original uploaded bytes to a file
    Export { id: String, out: PathBuf },
    /// Delete a document with its chunks and messages
    Delete { id: String },
    /// Ask a question about a document
    Chat { id: String, message: String },
    /// Chat turns of a document, oldest first
    History { id: String },
    /// Summarize a document
    Summary { id: String },
    /// Manage stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    List,
    Set { key: String, value: String },
    Unset { key: String },
    /// Models usable with the configured keys
    Models,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Exported {
    id: String,
    path: PathBuf,
    bytes: usize,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "failed to serialize output"),
    }
}

fn read_upload(path: &Path) -> AppResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| AppError::Validation(format!("Cannot read {}: {}", path.display(), e)))
}

fn llm_client(state: &AppState, model_override: Option<&str>) -> AppResult<Arc<dyn CompletionProvider>> {
    let model = config::configured_model(state.db.as_ref(), model_override)?;
    let client = config::resolve_provider(&model, state.db.as_ref())?;
    info!(provider = client.provider().name(), model = client.model(), "using model");
    Ok(Arc::new(client))
}

async fn run(cli: Cli) -> AppResult<()> {
    let db: Arc<dyn Store> = Arc::new(Database::open(&cli.db)?);
    let options = PipelineOptions::load(db.as_ref())?;
    let state = AppState::new(db, options);
    let model = cli.model.as_deref();

    match cli.command {
        Command::Upload { file, name } => {
            let bytes = read_upload(&file)?;
            let name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let format = SourceFormat::from_path(&file);
            print_json(&knowledge::upload_document(&state, bytes, &name, format).await?);
        }
        Command::Sample => print_json(&knowledge::create_sample_document(&state).await?),
        Command::List => print_json(&knowledge::list_documents(&state)?),
        Command::Show { id } => print_json(&knowledge::get_document(&state, &id)?),
        Command::Export { id, out } => {
            let data = knowledge::get_document_data(&state, &id)?;
            std::fs::write(&out, &data).map_err(|e| {
                AppError::Validation(format!("Cannot write {}: {}", out.display(), e))
            })?;
            print_json(&Exported {
                id,
                path: out,
                bytes: data.len(),
            });
        }
        Command::Delete { id } => {
            knowledge::delete_document(&state, &id)?;
            print_json(&serde_json::json!({ "success": true }));
        }
        Command::Chat { id, message } => {
            let llm = llm_client(&state, model)?;
            print_json(&chat::send_message(&state, llm, &id, &message).await?);
        }
        Command::History { id } => print_json(&chat::get_messages(&state, &id)?),
        Command::Summary { id } => {
            let llm = llm_client(&state, model)?;
            let summary = knowledge::generate_summary(&state, llm, &id).await?;
            print_json(&serde_json::json!({ "summary": summary }));
        }
        Command::Settings { action } => {
            let store = state.db.as_ref();
            match action {
                SettingsAction::List => print_json(&settings::get_settings(store)?),
                SettingsAction::Set { key, value } => settings::set_setting(store, &key, &value)?,
                SettingsAction::Unset { key } => settings::delete_setting(store, &key)?,
                SettingsAction::Models => print_json(&settings::get_available_models(store)?),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    pdf_chat::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(status = e.status_code(), error = %e, "command failed");
            eprintln!("Error: {}", e.public_message());
            ExitCode::FAILURE
        }
    }
}
