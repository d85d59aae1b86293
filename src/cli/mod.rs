//! # CLI Module
//!
//! Command-line interface for the image vault.
//!
//! ## Usage
//! ```bash
//! # Store every image under a directory
//! imgvault ingest ~/Pictures/refs --tags "lighting, film"
//!
//! # Store one capture even though a near-duplicate exists
//! imgvault ingest shot.jpg --source-url https://example.com/a.jpg --ignore-duplicate
//!
//! # Browse
//! imgvault list --output json
//! imgvault show 3f2c9a1e-...
//!
//! # Trash, restore, purge
//! imgvault trash 3f2c9a1e-...
//! imgvault restore 71d0...
//! imgvault empty-trash
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use imgvault::config::VaultConfig;
use imgvault::core::detector::DuplicateMatch;
use imgvault::core::record::{parse_tags, Collection, ImageRecord, RecordUpdate, TrashRecord};
use imgvault::core::replication::FormFields;
use imgvault::core::scanner::{ScanConfig, WalkDirScanner};
use imgvault::error::{IngestError, LifecycleError, Result, VaultError};
use imgvault::events::{null_sender, Event, EventChannel, EventReceiver, IngestEvent, LifecycleEvent};
use imgvault::{init_tracing, Vault};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

/// imgvault - capture images into a vault replicated across two hosts
#[derive(Parser, Debug)]
#[command(name = "imgvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store image files, or every image under a directory
    Ingest(IngestArgs),

    /// List stored images, newest first
    List {
        /// Only images in this collection
        #[arg(long)]
        collection: Option<String>,
    },

    /// Show one stored image
    Show { id: String },

    /// Edit the description, tags, source fields or collection of an image
    Edit(EditArgs),

    /// Move images to the trash
    Trash {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List trashed images, most recently deleted first
    TrashList,

    /// Show one trashed image
    TrashShow { id: String },

    /// Put a trashed image back
    Restore { id: String },

    /// Delete a trashed image from both hosts and the index
    Purge { id: String },

    /// Purge everything in the trash
    EmptyTrash,

    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionCommand,
    },

    /// Print the effective configuration, with API keys hidden
    Config,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,

    /// Free-text description
    #[arg(long)]
    description: Option<String>,

    /// URL the image was captured from
    #[arg(long)]
    source_url: Option<String>,

    /// URL of the page the image was on
    #[arg(long)]
    page_url: Option<String>,

    /// Title of the page the image was on
    #[arg(long)]
    title: Option<String>,

    /// Collection to add the images to
    #[arg(long)]
    collection: Option<String>,

    /// Store images even when they duplicate an existing one
    #[arg(long)]
    ignore_duplicate: bool,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,

    #[arg(long)]
    description: Option<String>,

    /// Comma-separated tags, replacing the current ones
    #[arg(long)]
    tags: Option<String>,

    #[arg(long)]
    source_url: Option<String>,

    #[arg(long)]
    page_url: Option<String>,

    #[arg(long)]
    title: Option<String>,

    /// Move the image into this collection
    #[arg(long, conflicts_with = "no_collection")]
    collection: Option<String>,

    /// Remove the image from its collection
    #[arg(long)]
    no_collection: bool,
}

#[derive(Subcommand, Debug)]
enum CollectionCommand {
    /// Create a collection
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List collections with their image counts
    List,
    /// Delete a collection. Its images are kept.
    Delete { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (ids only)
    Minimal,
}

struct Context {
    config: VaultConfig,
    output: OutputFormat,
    verbose: bool,
    term: Term,
}

impl Context {
    fn open_vault(&self) -> Result<Vault> {
        Vault::from_config(&self.config, null_sender())
    }

    fn pretty(&self) -> bool {
        self.output == OutputFormat::Pretty
    }

    fn line(&self, text: impl AsRef<str>) {
        self.term.write_line(text.as_ref()).ok();
    }
}

/// Run the CLI
pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => VaultConfig::load_from(path)?,
        None => VaultConfig::load()?,
    };

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_tracing(level, config.logging.format == "json");

    let ctx = Context {
        config,
        output: cli.output,
        verbose: cli.verbose,
        term: Term::stderr(),
    };

    match cli.command {
        Commands::Ingest(args) => run_ingest(&ctx, args).await,
        Commands::List { collection } => run_list(&ctx, collection).await,
        Commands::Show { id } => run_show(&ctx, &id).await,
        Commands::Edit(args) => run_edit(&ctx, args).await,
        Commands::Trash { ids } => run_trash(&ctx, ids).await,
        Commands::TrashList => run_trash_list(&ctx).await,
        Commands::TrashShow { id } => run_trash_show(&ctx, &id).await,
        Commands::Restore { id } => run_restore(&ctx, &id).await,
        Commands::Purge { id } => run_purge(&ctx, &id).await,
        Commands::EmptyTrash => run_empty_trash(&ctx).await,
        Commands::Collections { action } => run_collections(&ctx, action).await,
        Commands::Config => run_config(&ctx),
    }
}

#[derive(Serialize)]
struct SkippedDuplicate {
    path: PathBuf,
    #[serde(flatten)]
    existing: DuplicateMatch,
}

#[derive(Serialize)]
struct FailedFile {
    path: PathBuf,
    error: String,
}

#[derive(Default, Serialize)]
struct IngestSummary {
    stored: Vec<ImageRecord>,
    duplicates: Vec<SkippedDuplicate>,
    failed: Vec<FailedFile>,
}

async fn run_ingest(ctx: &Context, args: IngestArgs) -> Result<ExitCode> {
    let scanner = WalkDirScanner::new(ScanConfig {
        include_hidden: args.include_hidden,
        ..ScanConfig::default()
    });
    let scan = scanner.scan(&args.paths);

    let mut summary = IngestSummary::default();
    for error in scan.errors {
        tracing::warn!(error = %error, "skipped during scan");
        summary.failed.push(FailedFile {
            path: scan_error_path(&error),
            error: error.to_string(),
        });
    }

    if scan.files.is_empty() && summary.failed.is_empty() {
        return Err(VaultError::InvalidInput("no image files found".to_string()));
    }

    let mut fields = FormFields {
        source_image_url: args.source_url,
        source_page_url: args.page_url,
        page_title: args.title,
        description: args.description.unwrap_or_default(),
        collection_id: args.collection,
        ..FormFields::default()
    };
    if let Some(tags) = &args.tags {
        fields = fields.with_tag_list(tags);
    }

    let (sender, receiver) = EventChannel::new();
    let vault = Vault::from_config(&ctx.config, sender)?;

    if let Some(id) = &fields.collection_id {
        if vault.get_collection(id).await?.is_none() {
            return Err(VaultError::CollectionNotFound { id: id.clone() });
        }
    }

    let progress = ctx.pretty().then(|| new_progress(scan.files.len() as u64));
    let event_thread = spawn_event_printer(receiver, progress.clone(), ctx.verbose);

    for file in &scan.files {
        let outcome = match file.read(fields.clone()) {
            Ok(request) => vault.ingest(request, args.ignore_duplicate).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(record) => summary.stored.push(record),
            Err(VaultError::Ingest(IngestError::DuplicateFound { existing })) => {
                summary.duplicates.push(SkippedDuplicate {
                    path: file.path.clone(),
                    existing: *existing,
                })
            }
            Err(e) => summary.failed.push(FailedFile {
                path: file.path.clone(),
                error: e.to_string(),
            }),
        }

        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    // Dropping the vault drops the last sender, which ends the event thread
    drop(vault);
    event_thread.join().ok();
    if let Some(ref pb) = progress {
        pb.finish_and_clear();
    }

    match ctx.output {
        OutputFormat::Pretty => print_ingest_summary(ctx, &summary),
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Minimal => {
            for record in &summary.stored {
                println!("{}", record.id);
            }
        }
    }

    Ok(exit_code(summary.failed.is_empty()))
}

fn print_ingest_summary(ctx: &Context, summary: &IngestSummary) {
    ctx.line("");
    ctx.line(format!("{} Ingest Complete", style("✓").green().bold()));
    ctx.line("");

    ctx.line(format!("  {} images stored", style(summary.stored.len()).cyan()));
    let bytes: u64 = summary.stored.iter().map(|r| r.file_size).sum();
    ctx.line(format!("  {} uploaded", style(format_bytes(bytes)).yellow()));

    let single_host = summary.stored.iter().filter(|r| r.imgbb_url.is_none()).count();
    if single_host > 0 {
        ctx.line(format!(
            "  {} stored on the required host only",
            style(single_host).dim()
        ));
    }
    ctx.line("");

    for record in &summary.stored {
        ctx.line(format!(
            "  {} {} {}",
            style("+").green(),
            style(&record.id).dim(),
            record.file_name
        ));
    }

    if !summary.duplicates.is_empty() {
        ctx.line("");
        ctx.line(format!("{}", style("Skipped Duplicates:").bold().underlined()));
        for skipped in &summary.duplicates {
            ctx.line(format!(
                "  {} {} matches {} ({})",
                style("○").dim(),
                display_path(&skipped.path),
                style(&skipped.existing.record.id).cyan(),
                style(skipped.existing.kind).yellow()
            ));
        }
        ctx.line(format!(
            "  {}",
            style("Use --ignore-duplicate to store them anyway.").dim()
        ));
    }

    if !summary.failed.is_empty() {
        ctx.line("");
        ctx.line(format!("{}", style("Failed:").bold().red()));
        for failed in &summary.failed {
            ctx.line(format!(
                "  {} {}: {}",
                style("✗").red(),
                display_path(&failed.path),
                failed.error
            ));
        }
    }
}

async fn run_list(ctx: &Context, collection: Option<String>) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let records = match &collection {
        Some(id) => {
            if vault.get_collection(id).await?.is_none() {
                return Err(VaultError::CollectionNotFound { id: id.clone() });
            }
            vault.list_collection(id).await?
        }
        None => vault.list().await?,
    };

    match ctx.output {
        OutputFormat::Pretty => {
            if records.is_empty() {
                ctx.line(format!("  {}", style("The vault is empty.").dim()));
            }
            for record in &records {
                print_record_line(ctx, &vault, record);
            }
            if !records.is_empty() {
                ctx.line("");
                ctx.line(format!("  {} images", style(records.len()).cyan()));
            }
        }
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Minimal => records.iter().for_each(|r| println!("{}", r.id)),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_show(ctx: &Context, id: &str) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let record = vault
        .get_by_id(id)
        .await?
        .ok_or_else(|| VaultError::RecordNotFound { id: id.to_string() })?;

    match ctx.output {
        OutputFormat::Pretty => print_record_detail(ctx, &vault, &record),
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Minimal => println!("{}", vault.display_url(&record)),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_edit(ctx: &Context, args: EditArgs) -> Result<ExitCode> {
    let collection_id = if args.no_collection {
        Some(None)
    } else {
        args.collection.map(Some)
    };

    let update = RecordUpdate {
        description: args.description,
        tags: args.tags.as_deref().map(parse_tags),
        source_image_url: args.source_url,
        source_page_url: args.page_url,
        page_title: args.title,
        collection_id,
    };
    if update.is_empty() {
        return Err(VaultError::InvalidInput("nothing to change".to_string()));
    }

    let vault = ctx.open_vault()?;
    let record = vault.update(&args.id, &update).await?;

    match ctx.output {
        OutputFormat::Pretty => {
            ctx.line(format!("{} Updated {}", style("✓").green().bold(), record.id));
            print_record_detail(ctx, &vault, &record);
        }
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Minimal => println!("{}", record.id),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_trash(ctx: &Context, ids: Vec<String>) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let results = vault.soft_delete_many(&ids).await;
    let all_ok = results.iter().all(|(_, result)| result.is_ok());

    match ctx.output {
        OutputFormat::Pretty => {
            for (id, result) in &results {
                match result {
                    Ok(trashed) => ctx.line(format!(
                        "  {} {} moved to trash as {}",
                        style("✓").green(),
                        id,
                        style(&trashed.id).cyan()
                    )),
                    Err(e) => ctx.line(format!("  {} {}: {}", style("✗").red(), id, e)),
                }
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = results
                .iter()
                .map(|(id, result)| match result {
                    Ok(trashed) => serde_json::json!({ "id": id, "trashId": trashed.id }),
                    Err(e) => serde_json::json!({ "id": id, "error": e.to_string() }),
                })
                .collect();
            print_json(&output)?;
        }
        OutputFormat::Minimal => {
            for (_, result) in &results {
                if let Ok(trashed) = result {
                    println!("{}", trashed.id);
                }
            }
        }
    }

    Ok(exit_code(all_ok))
}

async fn run_trash_list(ctx: &Context) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let trash = vault.list_trash().await?;

    match ctx.output {
        OutputFormat::Pretty => {
            if trash.is_empty() {
                ctx.line(format!("  {}", style("The trash is empty.").dim()));
            }
            for trashed in &trash {
                print_trash_line(ctx, trashed);
            }
        }
        OutputFormat::Json => print_json(&trash)?,
        OutputFormat::Minimal => trash.iter().for_each(|t| println!("{}", t.id)),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_trash_show(ctx: &Context, id: &str) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let trashed = vault
        .get_trashed_by_id(id)
        .await?
        .ok_or_else(|| LifecycleError::TrashNotFound { id: id.to_string() })?;

    match ctx.output {
        OutputFormat::Pretty => {
            print_trash_line(ctx, &trashed);
            print_record_detail(ctx, &vault, &trashed.record);
        }
        OutputFormat::Json => print_json(&trashed)?,
        OutputFormat::Minimal => println!("{}", trashed.original_id),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_restore(ctx: &Context, id: &str) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    let record = vault.restore(id).await?;

    match ctx.output {
        OutputFormat::Pretty => ctx.line(format!(
            "{} Restored {} ({})",
            style("✓").green().bold(),
            style(&record.id).cyan(),
            record.file_name
        )),
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Minimal => println!("{}", record.id),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_purge(ctx: &Context, id: &str) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;
    vault.permanently_delete(id).await?;

    match ctx.output {
        OutputFormat::Pretty => ctx.line(format!(
            "{} Deleted {} from every host",
            style("✓").green().bold(),
            id
        )),
        OutputFormat::Json => print_json(&serde_json::json!({ "purged": id }))?,
        OutputFormat::Minimal => println!("{}", id),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_empty_trash(ctx: &Context) -> Result<ExitCode> {
    let (sender, receiver) = EventChannel::new();
    let vault = Vault::from_config(&ctx.config, sender)?;

    let pending = vault.list_trash().await?.len();
    let progress = (ctx.pretty() && pending > 0).then(|| new_progress(pending as u64));
    let event_thread = spawn_event_printer(receiver, progress.clone(), ctx.verbose);

    let report = vault.empty_trash().await;

    drop(vault);
    event_thread.join().ok();
    if let Some(ref pb) = progress {
        pb.finish_and_clear();
    }
    let report = report?;

    match ctx.output {
        OutputFormat::Pretty => {
            ctx.line(format!(
                "{} {} trashed images deleted",
                style("✓").green().bold(),
                style(report.destroyed).cyan()
            ));
            if !report.is_complete() {
                ctx.line(format!(
                    "  {} left in the trash:",
                    style(report.failures.len()).red()
                ));
                for failure in &report.failures {
                    ctx.line(format!(
                        "  {} {}: {}",
                        style("✗").red(),
                        failure.trash_id,
                        failure.error
                    ));
                }
            }
        }
        OutputFormat::Json => {
            let failures: Vec<_> = report
                .failures
                .iter()
                .map(|f| serde_json::json!({ "trashId": f.trash_id, "error": f.error.to_string() }))
                .collect();
            print_json(&serde_json::json!({
                "destroyed": report.destroyed,
                "failures": failures,
            }))?;
        }
        OutputFormat::Minimal => {
            for failure in &report.failures {
                println!("{}", failure.trash_id);
            }
        }
    }

    Ok(exit_code(report.is_complete()))
}

async fn run_collections(ctx: &Context, action: CollectionCommand) -> Result<ExitCode> {
    let vault = ctx.open_vault()?;

    match action {
        CollectionCommand::Create { name, description } => {
            let collection = vault.create_collection(&name, &description).await?;
            match ctx.output {
                OutputFormat::Pretty => ctx.line(format!(
                    "{} Created collection {} ({})",
                    style("✓").green().bold(),
                    style(&collection.name).bold(),
                    style(&collection.id).cyan()
                )),
                OutputFormat::Json => print_json(&collection)?,
                OutputFormat::Minimal => println!("{}", collection.id),
            }
        }
        CollectionCommand::List => {
            let collections = vault.list_collections().await?;
            let records = vault.list().await?;
            let counts = member_counts(&records);
            match ctx.output {
                OutputFormat::Pretty => {
                    if collections.is_empty() {
                        ctx.line(format!("  {}", style("No collections yet.").dim()));
                    }
                    for collection in &collections {
                        print_collection_line(ctx, collection, counts.get(collection.id.as_str()));
                    }
                }
                OutputFormat::Json => print_json(&collections)?,
                OutputFormat::Minimal => collections.iter().for_each(|c| println!("{}", c.id)),
            }
        }
        CollectionCommand::Delete { id } => {
            vault.delete_collection(&id).await?;
            match ctx.output {
                OutputFormat::Pretty => ctx.line(format!(
                    "{} Deleted collection {}. Its images were kept.",
                    style("✓").green().bold(),
                    id
                )),
                OutputFormat::Json => print_json(&serde_json::json!({ "deleted": id }))?,
                OutputFormat::Minimal => println!("{}", id),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_config(ctx: &Context) -> Result<ExitCode> {
    let mut shown = ctx.config.clone();
    for host in [&mut shown.hosts.pixvid, &mut shown.hosts.imgbb] {
        if host.api_key.is_some() {
            host.api_key = Some("********".to_string());
        }
    }

    match ctx.output {
        OutputFormat::Json => print_json(&shown)?,
        _ => {
            if ctx.pretty() {
                ctx.line(format!(
                    "# {}",
                    style(VaultConfig::default_path().display()).dim()
                ));
            }
            println!("{}", shown.to_toml()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Print progress-relevant engine events while a long command runs
fn spawn_event_printer(
    receiver: EventReceiver,
    progress: Option<ProgressBar>,
    verbose: bool,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut failed_purges = HashSet::new();

        for event in receiver.iter() {
            let Some(ref pb) = progress else {
                continue;
            };

            match event {
                Event::Ingest(IngestEvent::Started { file_name, .. }) => pb.set_message(file_name),
                Event::Ingest(IngestEvent::HostUploaded { host, url }) if verbose => {
                    pb.println(format!("  {} {} {}", style("↑").green(), host, style(url).dim()))
                }
                Event::Ingest(IngestEvent::HostFailed {
                    host,
                    required: false,
                    error,
                }) => pb.println(format!(
                    "  {} {} unavailable, stored on the required host only: {}",
                    style("!").yellow(),
                    host,
                    error
                )),
                Event::Ingest(IngestEvent::OrphanedAsset { host, url, .. }) => pb.println(format!(
                    "  {} {} kept an upload with no record: {}",
                    style("!").red(),
                    host,
                    url
                )),
                Event::Lifecycle(LifecycleEvent::Purged { trash_id }) => {
                    pb.set_message(trash_id);
                    pb.inc(1);
                }
                Event::Lifecycle(LifecycleEvent::PurgeFailed { trash_id, .. }) => {
                    // One record can fail on both hosts
                    if failed_purges.insert(trash_id) {
                        pb.inc(1);
                    }
                }
                _ => {}
            }
        }
    })
}

fn new_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

fn print_record_line(ctx: &Context, vault: &Vault, record: &ImageRecord) {
    let replicas = if record.imgbb_url.is_some() {
        style("2 hosts").green()
    } else {
        style("1 host").yellow()
    };

    ctx.line(format!(
        "  {} {}  {}  {}",
        style(&record.id).cyan(),
        record.internal_added_timestamp.format("%Y-%m-%d %H:%M"),
        record.file_name,
        replicas
    ));
    if ctx.verbose {
        ctx.line(format!("    {}", style(vault.display_url(record)).dim()));
    }
}

fn print_record_detail(ctx: &Context, vault: &Vault, record: &ImageRecord) {
    let field = |label: &str, value: String| {
        ctx.line(format!("  {:<14} {}", style(label).dim(), value));
    };

    ctx.line("");
    ctx.line(format!("{}", style(&record.file_name).bold()));
    field("id", record.id.clone());
    field("url", vault.display_url(record).to_string());
    field("pixvid", record.pixvid_url.clone());
    if let Some(url) = &record.imgbb_url {
        field("imgbb", url.clone());
    }
    field(
        "type",
        format!("{} ({:?})", record.file_type, record.file_type_source),
    );
    field("size", format_bytes(record.file_size));
    if let (Some(width), Some(height)) = (record.width, record.height) {
        field("dimensions", format!("{}x{}", width, height));
    }
    if let Some(date) = record.creation_date {
        field(
            "created",
            format!("{} ({:?})", date.format("%Y-%m-%d %H:%M:%S"), record.creation_date_source),
        );
    }
    field("added", record.internal_added_timestamp.to_rfc3339());
    if !record.description.is_empty() {
        field("description", record.description.clone());
    }
    if !record.tags.is_empty() {
        field("tags", record.tags.join(", "));
    }
    if let Some(url) = &record.source_image_url {
        field("source", url.clone());
    }
    if let Some(url) = &record.source_page_url {
        field("page", url.clone());
    }
    if let Some(title) = &record.page_title {
        field("page title", title.clone());
    }
    if let Some(collection) = &record.collection_id {
        field("collection", collection.clone());
    }

    if ctx.verbose {
        field("sha256", record.sha256.clone());
        if let (Some(a), Some(d), Some(p)) = (&record.a_hash, &record.d_hash, &record.p_hash) {
            field("hashes", format!("a:{} d:{} p:{}", a, d, p));
        }
        for (tag, value) in &record.exif_metadata_map {
            field(tag.as_str(), value.clone());
        }
    }
}

fn print_trash_line(ctx: &Context, trashed: &TrashRecord) {
    let purged = if trashed.pixvid_purged {
        format!(" {}", style("(required copy purged)").red())
    } else {
        String::new()
    };

    ctx.line(format!(
        "  {} {}  {}  was {}{}",
        style(&trashed.id).cyan(),
        trashed.deleted_at.format("%Y-%m-%d %H:%M"),
        trashed.record.file_name,
        style(&trashed.original_id).dim(),
        purged
    ));
}

fn print_collection_line(ctx: &Context, collection: &Collection, count: Option<&usize>) {
    ctx.line(format!(
        "  {} {} ({} images)",
        style(&collection.id).cyan(),
        style(&collection.name).bold(),
        count.copied().unwrap_or(0)
    ));
    if !collection.description.is_empty() {
        ctx.line(format!("    {}", style(&collection.description).dim()));
    }
}

fn member_counts(records: &[ImageRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for id in records.iter().filter_map(|r| r.collection_id.as_deref()) {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn scan_error_path(error: &imgvault::error::ScanError) -> PathBuf {
    use imgvault::error::ScanError;

    match error {
        ScanError::NotFound { path }
        | ScanError::PermissionDenied { path }
        | ScanError::Read { path, .. } => path.clone(),
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest_flags() {
        let cli = Cli::try_parse_from([
            "imgvault",
            "ingest",
            "a.png",
            "shots/",
            "--tags",
            "x, y",
            "--ignore-duplicate",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.paths.len(), 2);
                assert_eq!(args.tags.as_deref(), Some("x, y"));
                assert!(args.ignore_duplicate);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn edit_rejects_collection_and_no_collection_together() {
        let result = Cli::try_parse_from([
            "imgvault",
            "edit",
            "id-1",
            "--collection",
            "c-1",
            "--no-collection",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn counts_members_per_collection() {
        let mut records = Vec::new();
        for (id, collection) in [("a", Some("c1")), ("b", Some("c1")), ("c", None)] {
            let mut record: ImageRecord = serde_json::from_value(serde_json::json!({
                "id": id,
                "fileName": "x.png",
                "fileType": "image/png",
                "fileTypeSource": "exif",
                "fileSize": 1,
                "creationDateSource": "unknown",
                "sha256": id,
                "pixvidUrl": "https://pixvid.test/x",
                "pixvidDeleteToken": "t",
                "internalAddedTimestamp": "2024-01-01T00:00:00Z"
            }))
            .unwrap();
            record.collection_id = collection.map(str::to_string);
            records.push(record);
        }

        let counts = member_counts(&records);
        assert_eq!(counts.get("c1"), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
