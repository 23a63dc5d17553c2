//! chat-attachments command line
//!
//! Ingests local files as chat uploads and inspects stored attachments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_attachments::{
    AttachmentService, ContentStore, CreateAttachmentParams, Database, LocalContentStore,
    MemoryDatabase, MemoryUserDirectory, PreviewOutcome,
};
use chat_core::config::{AppConfig, LoggingConfig};
use chat_core::{ChatError, ChatResult, Id, SnowflakeIdGenerator};
use chat_db::PgDatabase;
use chat_models::User;
use chat_notifications::BroadcastNotifier;

/// Chat attachment ingestion tool.
#[derive(Parser, Debug)]
#[command(name = "chat-attachments", version, about = "Ingest and inspect chat attachments")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file into a channel as a new message.
    Ingest {
        /// Channel receiving the message.
        #[arg(long)]
        channel: Id,

        /// Uploading user.
        #[arg(long)]
        user: Id,

        /// File to upload.
        file: PathBuf,

        /// Display name; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Print a stored attachment as JSON.
    Show {
        /// Attachment id.
        id: Id,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let store: Arc<dyn ContentStore> = Arc::new(LocalContentStore::new(
        &config.storage.local_path,
        config.storage.namespace.clone(),
    ));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        store = store.name(),
        root = %config.storage.local_path,
        "Starting chat-attachments"
    );
    let notifier = Arc::new(BroadcastNotifier::default());
    let ids = Arc::new(SnowflakeIdGenerator::new(config.node_id));

    let result = match config.database.url.as_deref() {
        Some(url) => {
            let db = PgDatabase::connect(url, &config.database)
                .await
                .context("Failed to connect to database")?;
            let users = Arc::new(db.users());
            let service = AttachmentService::new(
                Arc::new(db.clone()),
                users,
                notifier.clone(),
                ids,
                config.preview,
            )
            .with_store(store);
            let result = run(&service, &notifier, cli.command).await;
            db.close().await;
            result
        }
        None => {
            warn!("No database configured, using the in-memory backend");
            let users = MemoryUserDirectory::new();
            if let Command::Ingest { user, .. } = &cli.command {
                users.insert(User::new(*user, format!("user-{}", user))).await;
            }
            let service = AttachmentService::new(
                Arc::new(MemoryDatabase::new()),
                Arc::new(users),
                notifier.clone(),
                ids,
                config.preview,
            )
            .with_store(store);
            run(&service, &notifier, cli.command).await
        }
    };

    if let Err(e) = result {
        error!(
            code = e.error_code(),
            status = e.status_code(),
            error = %e,
            "Command failed"
        );
        return Err(e.into());
    }

    Ok(())
}

async fn run<D: Database>(
    service: &AttachmentService<D>,
    notifier: &BroadcastNotifier,
    command: Command,
) -> ChatResult<()> {
    match command {
        Command::Ingest {
            channel,
            user,
            file,
            name,
        } => ingest(service, notifier, channel, user, &file, name).await,
        Command::Show { id } => {
            let attachment = service.find_by_id(id).await?;
            print_json(&json!({ "attachment": attachment }))
        }
    }
}

async fn ingest<D: Database>(
    service: &AttachmentService<D>,
    notifier: &BroadcastNotifier,
    channel: Id,
    user: Id,
    path: &Path,
    name: Option<String>,
) -> ChatResult<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ChatError::InvalidInput(format!("{}: {}", path.display(), e)))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ChatError::Storage(e.to_string()))?
        .len();

    let name = name
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .ok_or_else(|| ChatError::InvalidInput(format!("{} has no file name", path.display())))?;

    let mut events = notifier.subscribe();
    let params = CreateAttachmentParams::new(channel, name, size as i64);
    let created = service.create(params, user, &mut file).await?;

    let preview = match &created.preview {
        PreviewOutcome::Generated(_) => "generated".to_string(),
        PreviewOutcome::Skipped => "skipped".to_string(),
        PreviewOutcome::Failed(reason) => format!("failed: {}", reason),
    };
    let event = events.try_recv().ok();

    print_json(&json!({
        "attachment": created.attachment,
        "message_id": created.message_id,
        "preview": preview,
        "event": event,
    }))
}

fn print_json(value: &serde_json::Value) -> ChatResult<()> {
    let out = serde_json::to_string_pretty(value).map_err(|e| ChatError::Internal(e.to_string()))?;
    println!("{}", out);
    Ok(())
}

/// Initialize tracing subscriber; logs go to stderr so stdout stays JSON
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from([
            "chat-attachments",
            "--config",
            "chat.toml",
            "ingest",
            "--channel",
            "3",
            "--user",
            "7",
            "cat.gif",
            "--name",
            "Cat",
        ]);

        assert_eq!(cli.config.as_deref(), Some(Path::new("chat.toml")));
        match cli.command {
            Command::Ingest {
                channel,
                user,
                file,
                name,
            } => {
                assert_eq!((channel, user), (3, 7));
                assert_eq!(file, PathBuf::from("cat.gif"));
                assert_eq!(name.as_deref(), Some("Cat"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::parse_from(["chat-attachments", "show", "42"]);
        assert!(matches!(cli.command, Command::Show { id: 42 }));
    }
}
