use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use burn_engine::{
    BlobBackend, BurnConfig, BurnError, CreateRequest, RetrieveRequest, SecretEngine, SystemClock,
};
use burn_store::{BlobStore, FsBlobStore, InlineBlobStore, SqliteRecordStore};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Darklock Burn - self-destructing secrets", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory, database and blob store
    Init,
    /// Print a fresh random key
    GenerateKey,
    /// Store a secret and print its retrieval key
    Create(CreateArgs),
    /// Decrypt a secret with its retrieval key and PIN
    Retrieve {
        #[arg(long)]
        key: String,
        /// Prompted for when omitted
        #[arg(long)]
        pin: Option<String>,
        /// Where to write a file secret (defaults to its original name)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Prompted for when omitted
    #[arg(long)]
    pin: Option<String>,
    /// Minutes until the secret self-destructs (30-2880)
    #[arg(long)]
    ttl_minutes: i64,
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    text: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burn_cli=info,burn_engine=info,burn_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = BurnConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Init => init_command(&config).await,
        Commands::GenerateKey => {
            println!("{}", json!({ "key": SecretEngine::generate_key() }));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Create(args) => create_command(&config, args).await,
        Commands::Retrieve { key, pin, out } => retrieve_command(&config, key, pin, out).await,
    }
}

async fn init_command(config: &BurnConfig) -> Result<ExitCode> {
    let data = config.resolve_data_dir()?;
    build_engine(config).await?;
    info!(data_dir = %data.display(), backend = ?config.blob_backend, "store initialised");
    println!("Data directory: {}", data.display());
    Ok(ExitCode::SUCCESS)
}

async fn create_command(config: &BurnConfig, args: CreateArgs) -> Result<ExitCode> {
    let engine = build_engine(config).await?;
    let pin = pin_or_prompt(args.pin, "Secret PIN: ").await?;

    let request = match (args.text, args.file) {
        (Some(text), None) => CreateRequest::text(pin, args.ttl_minutes, text),
        (None, Some(path)) => {
            let (filename, bytes) = read_payload_file(&path).await?;
            CreateRequest::file(pin, args.ttl_minutes, filename, bytes)
        }
        _ => return Err(anyhow!("exactly one of --text or --file is required")),
    };

    match engine.create(request).await {
        Ok(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

async fn retrieve_command(
    config: &BurnConfig,
    key: String,
    pin: Option<String>,
    out: Option<PathBuf>,
) -> Result<ExitCode> {
    let engine = build_engine(config).await?;
    let pin = pin_or_prompt(pin, "Secret PIN: ").await?;

    let secret = match engine.retrieve(RetrieveRequest::new(key, pin)).await {
        Ok(secret) => secret,
        Err(e) => return Ok(report(&e)),
    };

    let mut output = json!({ "ttl_remaining_secs": secret.ttl_remaining_secs() });
    if let Some(text) = &secret.decrypted_text {
        output["decrypted_text"] = json!(text.as_str());
    }
    if let Some(file) = &secret.decrypted_file {
        let dest = out.unwrap_or_else(|| safe_file_name(&file.filename));
        tokio::fs::write(&dest, &file.bytes[..])
            .await
            .with_context(|| format!("write {}", dest.display()))?;
        output["decrypted_file"] = json!({
            "path": dest.display().to_string(),
            "size": file.bytes.len(),
        });
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

async fn build_engine(config: &BurnConfig) -> Result<SecretEngine> {
    let data = config.resolve_data_dir()?;
    tokio::fs::create_dir_all(&data)
        .await
        .with_context(|| format!("create {}", data.display()))?;

    let records = SqliteRecordStore::open(&data.join(&config.database_file)).await?;
    let blobs: Arc<dyn BlobStore> = match config.blob_backend {
        BlobBackend::Inline => Arc::new(InlineBlobStore),
        BlobBackend::Filesystem => Arc::new(FsBlobStore::open(data.join(&config.blob_dir)).await?),
    };

    Ok(SecretEngine::new(
        Arc::new(records),
        blobs,
        config.pin_hasher()?,
        Arc::new(SystemClock),
        config.engine_settings(),
    ))
}

async fn pin_or_prompt(pin: Option<String>, prompt: &'static str) -> Result<String> {
    match pin {
        Some(pin) => Ok(pin),
        None => tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .context("PIN prompt task")?
            .context("read PIN"),
    }
}

/// Read a file to submit, keeping only its final name component.
async fn read_payload_file(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((filename, bytes))
}

/// Print the error body and map it to a process exit code.
fn report(e: &BurnError) -> ExitCode {
    eprintln!("{}", json!(e.to_body()));
    match e {
        BurnError::Validation(_) => ExitCode::from(2),
        BurnError::NotFoundOrInvalid | BurnError::Expired => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

/// Strip directories from a stored filename before writing it locally.
fn safe_file_name(stored: &str) -> PathBuf {
    Path::new(stored)
        .file_name()
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("secret.bin"))
}
