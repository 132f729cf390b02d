pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod sample;
pub mod text;

pub use commands::AppState;
pub use config::PipelineOptions;
pub use db::{Database, Store};
pub use error::{AppError, AppResult};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdf_chat=info"));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
