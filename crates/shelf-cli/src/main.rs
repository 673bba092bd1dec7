//! Shelf CLI
//!
//! Command-line interface for Shelf - an offline-first digital library.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shelf_core::{Config, ReadingStatus, StorageError, Store, SyncError};

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Shelf - Offline-first digital library")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Manage highlights and notes
    #[command(alias = "note")]
    Annotation {
        #[command(subcommand)]
        command: AnnotationCommands,
    },
    /// Record reading sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (library counts, sync status)
    Status,
    /// Sync with the remote library
    Sync,
}

#[derive(Subcommand)]
enum BookCommands {
    /// Add a book from a local file
    Add {
        /// Path to the book file
        file: PathBuf,
        /// Title (defaults to the file name)
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Author
        #[arg(short, long)]
        author: Option<String>,
        /// Tags to file the book under
        #[arg(short, long, visible_alias = "tag")]
        category: Vec<String>,
    },
    /// List books
    #[command(alias = "ls")]
    List {
        /// Filter by reading status
        #[arg(short, long)]
        status: Option<ReadingStatus>,
        /// Filter by tag name
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Show book details
    Show {
        /// Book ID (full or prefix)
        id: String,
    },
    /// Change title or author
    Edit {
        /// Book ID (full or prefix)
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New author (empty to clear)
        #[arg(short, long)]
        author: Option<String>,
    },
    /// Update reading progress
    Progress {
        /// Book ID (full or prefix)
        id: String,
        /// Percent read, 0-100
        percent: f64,
        /// Current location in the book
        #[arg(short, long)]
        location: Option<String>,
    },
    /// Rate a book
    Rate {
        /// Book ID (full or prefix)
        id: String,
        /// Rating from 1 to 5
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
    },
    /// Set reading status (unread, reading, finished, abandoned)
    Status {
        /// Book ID (full or prefix)
        id: String,
        status: ReadingStatus,
    },
    /// File a book under a tag
    Tag {
        /// Book ID (full or prefix)
        id: String,
        /// Tag name
        name: String,
    },
    /// Remove a tag from a book
    Untag {
        /// Book ID (full or prefix)
        id: String,
        /// Tag name
        name: String,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Create a tag
    Add {
        name: String,
        /// Display color, e.g. #ff8800
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Rename a tag, keeping its books
    #[command(alias = "mv")]
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
    /// List all tags
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
enum AnnotationCommands {
    /// Highlight a passage
    Add {
        /// Book ID (full or prefix)
        book_id: String,
        /// Highlighted text
        text: String,
        /// Note attached to the highlight
        #[arg(short, long)]
        note: Option<String>,
        /// Location in the book (EPUB CFI)
        #[arg(long, visible_alias = "location")]
        cfi: Option<String>,
        /// Highlight color
        #[arg(short, long)]
        color: Option<String>,
    },
    /// List annotations on a book
    #[command(alias = "ls")]
    List {
        /// Book ID (full or prefix)
        book_id: String,
    },
    /// Delete an annotation
    #[command(alias = "rm")]
    Delete {
        /// Annotation ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Record a session that just ended
    Log {
        /// Book ID (full or prefix)
        book_id: String,
        /// Minutes spent reading
        minutes: u32,
        /// Pages read
        #[arg(short, long)]
        pages: Option<u32>,
    },
    /// List sessions of a book
    #[command(alias = "ls")]
    List {
        /// Book ID (full or prefix)
        book_id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync_url, sync_enabled, remote_selector,
        /// request_timeout_secs, push_batch_size, tag_collision, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let store = Store::open_with_config(config).inspect_err(print_recovery_hint)?;

    let is_write = is_write_command(&cli.command);
    let is_manual_sync = matches!(cli.command, Commands::Sync);

    // Sync before read commands (to get latest data)
    if !is_write && !is_manual_sync {
        auto_sync(&store, &output).await;
    }

    let result = match cli.command {
        Commands::Book { command } => handle_book_command(command, &store, &output).await,
        Commands::Tag { command } => match command {
            TagCommands::Add { name, color } => {
                commands::tag::add(&store, name, color, &output).await
            }
            TagCommands::Rename { old, new } => {
                commands::tag::rename(&store, old, new, &output).await
            }
            TagCommands::List => commands::tag::list(&store, &output).await,
        },
        Commands::Annotation { command } => {
            handle_annotation_command(command, &store, &output).await
        }
        Commands::Session { command } => match command {
            SessionCommands::Log {
                book_id,
                minutes,
                pages,
            } => commands::session::log(&store, book_id, minutes, pages, &output).await,
            SessionCommands::List { book_id } => {
                commands::session::list(&store, book_id, &output).await
            }
        },
        Commands::Config { .. } => Ok(()), // Handled above
        Commands::Status => commands::status::show(&store, &output).await,
        Commands::Sync => commands::sync::sync(&store, &output).await,
    };

    // Sync after successful write commands (to push changes)
    if is_write && result.is_ok() {
        auto_sync(&store, &output).await;
    }

    result.inspect_err(print_recovery_hint)
}

fn is_write_command(command: &Commands) -> bool {
    match command {
        Commands::Book { command } => !matches!(
            command,
            BookCommands::List { .. } | BookCommands::Show { .. }
        ),
        Commands::Tag { command } => !matches!(command, TagCommands::List),
        Commands::Annotation { command } => !matches!(command, AnnotationCommands::List { .. }),
        Commands::Session { command } => matches!(command, SessionCommands::Log { .. }),
        Commands::Config { .. } | Commands::Status | Commands::Sync => false,
    }
}

async fn handle_book_command(command: BookCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        BookCommands::Add {
            file,
            title,
            author,
            category,
        } => {
            let opts = commands::book::AddOptions {
                file,
                title,
                author,
                tags: category,
            };
            commands::book::add(store, opts, output).await
        }
        BookCommands::List { status, tag } => commands::book::list(store, status, tag, output).await,
        BookCommands::Show { id } => commands::book::show(store, id, output).await,
        BookCommands::Edit { id, title, author } => {
            commands::book::edit(store, id, title, author, output).await
        }
        BookCommands::Progress {
            id,
            percent,
            location,
        } => commands::book::progress(store, id, percent, location, output).await,
        BookCommands::Rate { id, rating } => commands::book::rate(store, id, rating, output).await,
        BookCommands::Status { id, status } => {
            commands::book::set_status(store, id, status, output).await
        }
        BookCommands::Tag { id, name } => commands::book::tag(store, id, name, output).await,
        BookCommands::Untag { id, name } => commands::book::untag(store, id, name, output).await,
    }
}

async fn handle_annotation_command(
    command: AnnotationCommands,
    store: &Store,
    output: &Output,
) -> Result<()> {
    match command {
        AnnotationCommands::Add {
            book_id,
            text,
            note,
            cfi,
            color,
        } => {
            let opts = commands::annotation::AddOptions {
                book_id,
                text,
                note,
                location: cfi,
                color,
            };
            commands::annotation::add(store, opts, output).await
        }
        AnnotationCommands::List { book_id } => {
            commands::annotation::list(store, book_id, output).await
        }
        AnnotationCommands::Delete { id } => commands::annotation::delete(store, id, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

fn print_recovery_hint(err: &anyhow::Error) {
    if let Some(hint) = recovery_hint(err) {
        eprintln!("Hint: {}", hint);
    }
}

/// Suggestion for the first storage error in the chain, if it has one
fn recovery_hint(err: &anyhow::Error) -> Option<String> {
    let storage = err.chain().find_map(|cause| {
        cause.downcast_ref::<StorageError>().or_else(|| {
            match cause.downcast_ref::<SyncError>() {
                Some(SyncError::Storage(inner)) => Some(inner),
                _ => None,
            }
        })
    })?;
    let suggestion = storage.recovery_suggestion()?;
    if storage.is_recoverable() {
        Some(format!("{} Then run the command again.", suggestion))
    } else {
        Some(suggestion.to_string())
    }
}

/// Auto-sync if sync is enabled, failures are only reported
async fn auto_sync(store: &Store, output: &Output) {
    let config = store.config();
    if !config.sync_enabled || config.sync_url.is_none() {
        return;
    }

    if let Err(e) = commands::sync::sync_quiet(store).await {
        tracing::warn!("Auto-sync failed: {}", e);
        if !output.is_quiet() {
            eprintln!("⚠ Auto-sync failed: {}", e);
        }
    }
}
