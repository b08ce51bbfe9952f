use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

use petitioner::automation::{FormFiller, HttpFormFiller};
use petitioner::channels::{ImapMailbox, MailboxReader};
use petitioner::config::Settings;
use petitioner::petitions::{LogicalField, NewPetitionType};
use petitioner::pipeline::{IngestionStage, JobScheduler, SigningStage};
use petitioner::store::{LibSqlBackend, PetitionStore};

#[derive(Parser)]
#[command(name = "petitioner", version, about = "Signs simple petition emails for you")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    /// The chosen subcommand; a bare invocation runs one cycle.
    fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Once)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the check-and-sign cycle until Ctrl-C.
    Serve {
        /// Minutes between cycles (minimum 1).
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Run a single cycle and exit (default).
    Once,
    /// Show the most recent processed petitions.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage petition types.
    Types {
        #[command(subcommand)]
        action: TypesCommand,
    },
}

#[derive(Subcommand)]
enum TypesCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// JSON object of logical field → form field name, e.g. '{"zip_code":"postal"}'.
        #[arg(long = "field-map")]
        field_map: Option<String>,
        /// Regex (or plain substring) matched against petition URLs.
        #[arg(long)]
        url_pattern: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    Remove {
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(settings.log_dir.as_deref());

    match cli.into_command() {
        Command::Serve { interval } => serve(settings, interval).await,
        Command::Once => {
            let store = open_store(&settings.db_path).await?;
            let report = build_scheduler(&settings, store, settings.check_interval)?
                .run_once()
                .await?;
            println!(
                "seen {} | queued {} | skipped {} | duplicates {} | signed {} | failed {}",
                report.ingest.seen,
                report.ingest.queued,
                report.ingest.skipped,
                report.ingest.duplicates,
                report.signing.signed,
                report.signing.failed,
            );
            Ok(())
        }
        Command::List { limit } => {
            let store = open_store(&settings.db_path).await?;
            for p in store.list_processed(limit).await? {
                println!(
                    "{}  {:<8}  {}  {}",
                    p.created_at.format("%Y-%m-%d %H:%M"),
                    p.status.as_str(),
                    p.subject,
                    p.petition_url.as_deref().unwrap_or("-"),
                );
                if let Some(notes) = p.notes.as_deref().filter(|n| !n.is_empty()) {
                    println!("                    {notes}");
                }
            }
            Ok(())
        }
        Command::Types { action } => {
            let store = open_store(&settings.db_path).await?;
            run_types(store.as_ref(), action).await
        }
    }
}

/// Stderr logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "petitioner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

async fn open_store(path: &Path) -> anyhow::Result<Arc<dyn PetitionStore>> {
    let db = LibSqlBackend::new_local(path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(db))
}

fn build_scheduler(
    settings: &Settings,
    store: Arc<dyn PetitionStore>,
    interval: Duration,
) -> anyhow::Result<JobScheduler> {
    if settings.mailbox.is_none() {
        warn!(
            "Mailbox not configured (EMAIL_IMAP_HOST, EMAIL_USER, EMAIL_PASSWORD); \
             ingestion will be skipped"
        );
    }
    if settings.profile.is_empty() {
        warn!("No USER_* profile fields set; petitions will be marked failed");
    }

    let mailbox: Arc<dyn MailboxReader> = Arc::new(ImapMailbox::new(settings.mailbox.clone()));
    let filler: Arc<dyn FormFiller> = Arc::new(HttpFormFiller::new()?);

    Ok(JobScheduler::new(
        IngestionStage::new(Arc::clone(&store), mailbox),
        SigningStage::new(
            store,
            filler,
            settings.profile.clone(),
            settings.signing.clone(),
        ),
        interval,
    ))
}

async fn serve(settings: Settings, interval_minutes: Option<u64>) -> anyhow::Result<()> {
    let interval = interval_minutes
        .map(|m| Duration::from_secs(m.saturating_mul(60)))
        .unwrap_or(settings.check_interval);

    info!(
        db = %settings.db_path.display(),
        interval_secs = interval.as_secs(),
        automation = settings.signing.automation_enabled,
        "Petitioner starting"
    );

    // The database may not be reachable yet (e.g. a volume still mounting).
    let retry = petitioner::pipeline::scheduler::effective_interval(interval);
    let store = loop {
        match LibSqlBackend::new_local(&settings.db_path).await {
            Ok(db) => break Arc::new(db) as Arc<dyn PetitionStore>,
            Err(e) => {
                error!(error = %e, retry_secs = retry.as_secs(), "Database unavailable");
                tokio::select! {
                    _ = tokio::time::sleep(retry) => {}
                    _ = tokio::signal::ctrl_c() => return Ok(()),
                }
            }
        }
    };

    let scheduler = Arc::new(build_scheduler(&settings, store, interval)?);
    let (handle, shutdown) = scheduler.spawn();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.store(true, Ordering::Relaxed);
    handle.abort();
    Ok(())
}

async fn run_types(store: &dyn PetitionStore, action: TypesCommand) -> anyhow::Result<()> {
    match action {
        TypesCommand::List => {
            for t in store.list_petition_types().await? {
                let aliases: BTreeMap<&str, &str> = t
                    .field_aliases
                    .iter()
                    .map(|(f, a)| (f.as_str(), a.as_str()))
                    .collect();
                println!(
                    "{}  {}{}  pattern={}  fields={}",
                    t.id,
                    t.name,
                    if t.enabled { "" } else { " (disabled)" },
                    t.url_pattern.as_deref().unwrap_or("-"),
                    serde_json::to_string(&aliases)?,
                );
            }
        }
        TypesCommand::Add {
            name,
            description,
            field_map,
            url_pattern,
            disabled,
        } => {
            let field_aliases = match field_map {
                Some(raw) => parse_field_map(&raw)?,
                None => BTreeMap::new(),
            };
            let id = store
                .insert_petition_type(&NewPetitionType {
                    name,
                    description,
                    field_aliases,
                    url_pattern,
                    enabled: !disabled,
                })
                .await?;
            println!("{id}");
        }
        TypesCommand::Remove { id } => {
            if !store.delete_petition_type(id).await? {
                bail!("No petition type with id {id}");
            }
        }
    }
    Ok(())
}

fn parse_field_map(raw: &str) -> anyhow::Result<BTreeMap<LogicalField, String>> {
    let parsed: BTreeMap<String, String> =
        serde_json::from_str(raw).context("--field-map must be a JSON object of strings")?;
    parsed
        .into_iter()
        .map(|(key, alias)| {
            let field = key
                .parse::<LogicalField>()
                .map_err(|e| anyhow::anyhow!(e))?;
            Ok((field, alias))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_runs_one_cycle() {
        let cli = Cli::try_parse_from(["petitioner"]).unwrap();
        assert!(matches!(cli.into_command(), Command::Once));
    }

    #[test]
    fn serve_takes_interval() {
        let cli = Cli::try_parse_from(["petitioner", "serve", "--interval", "10"]).unwrap();
        assert!(matches!(cli.into_command(), Command::Serve { interval: Some(10) }));
    }

    #[test]
    fn field_map_rejects_unknown_field() {
        assert!(parse_field_map(r#"{"zip_code":"postal"}"#).is_ok());
        assert!(parse_field_map(r#"{"shoe_size":"size"}"#).is_err());
    }
}
