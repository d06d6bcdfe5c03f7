//! Offline bulk import of a roster workbook on behalf of an existing user.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rosters::{
    audit::DbAuditSink,
    config::{CommitMode, ConfigLoader},
    db,
    pipelines::{self, PipelineContext},
    repositories::UserRepository,
    storage::LocalBlobStore,
    telemetry::init_tracing,
    tenancy::Actor,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "import_roster", about = "Ingest an .xlsx roster into a new batch")]
struct Args {
    /// Workbook to ingest
    #[arg(long)]
    file: PathBuf,

    /// Login email of the user the import runs as
    #[arg(long = "as")]
    actor_email: String,

    /// Company that owns the batch (owners only may pick another company)
    #[arg(long)]
    company_id: Option<Uuid>,

    /// Override the configured flush size
    #[arg(long)]
    flush_size: Option<usize>,

    /// Override the configured commit mode (per_chunk or atomic)
    #[arg(long)]
    commit_mode: Option<CommitMode>,

    /// Apply pending migrations before importing
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new().load().context("loading configuration")?;
    if let Some(flush_size) = args.flush_size {
        config.ingest.flush_size = flush_size;
    }
    if let Some(commit_mode) = args.commit_mode {
        config.ingest.commit_mode = commit_mode;
    }
    config.ingest.validate().context("validating ingest settings")?;
    init_tracing(&config).context("initializing telemetry")?;

    let db = Arc::new(
        db::init_pool(&config)
            .await
            .context("initializing database connection pool")?,
    );
    if args.migrate {
        db::run_migrations(&db).await?;
    }

    let user = UserRepository::new(db.as_ref())
        .find_active_by_email(&args.actor_email)
        .await
        .context("looking up importing user")?
        .ok_or_else(|| anyhow!("no active user with email {}", args.actor_email))?;
    let actor = Actor::from(&user);

    let audit = Arc::new(DbAuditSink::new(Arc::clone(&db)));
    let blobs = Arc::new(LocalBlobStore::new(
        config.upload_dir.clone(),
        config.ingest.upload_chunk_bytes,
    ));
    let ctx = PipelineContext::new(&config, Arc::clone(&db), blobs, audit.clone());

    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", args.file.display()))?
        .to_string();
    let mut source = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;

    let batch = pipelines::ingest(&ctx, args.company_id, &actor, &mut source, &filename)
        .await
        .context("ingesting workbook")?;
    audit.flush().await;

    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}
