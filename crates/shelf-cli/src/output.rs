//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use shelf_core::{Annotation, Book, ReadingSession, SyncOutcome, Tag};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print a single book with its tag names
    pub fn print_book(&self, book: &Book, tags: &[Tag]) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", book.id);
                println!("Title:     {}", book.title);
                if let Some(ref author) = book.author {
                    println!("Author:    {}", author);
                }
                println!("Status:    {}", book.status);
                println!("Progress:  {:.0}%", book.progress);
                if let Some(ref location) = book.current_location {
                    println!("Location:  {}", location);
                }
                if let Some(rating) = book.rating {
                    println!("Rating:    {}", stars(rating));
                }
                let names = category_names(book, tags);
                if !names.is_empty() {
                    println!("Tags:      {}", names.join(", "));
                }
                if let Some(ref file_name) = book.file_name {
                    let size = book
                        .file_data
                        .as_ref()
                        .map(|d| format!(" ({})", human_size(d.len())))
                        .unwrap_or_default();
                    println!("File:      {}{}", file_name, size);
                }
                println!("Added:     {}", book.added_at.format("%Y-%m-%d %H:%M"));
                if let Some(updated) = book.updated_at {
                    println!("Updated:   {}", updated.format("%Y-%m-%d %H:%M"));
                }
                if let Some(read) = book.last_read_at {
                    println!("Last read: {}", read.format("%Y-%m-%d %H:%M"));
                }
            }
            OutputFormat::Json => self.json(book),
            OutputFormat::Quiet => println!("{}", book.id),
        }
    }

    /// Print a list of books
    pub fn print_books(&self, books: &[Book]) {
        match self.format {
            OutputFormat::Human => {
                if books.is_empty() {
                    println!("No books found.");
                    return;
                }
                for book in books {
                    println!(
                        "{} | {} | {} | {:>3.0}% {}",
                        short_id(&book.id),
                        truncate(&book.title, 35),
                        truncate(book.author.as_deref().unwrap_or("-"), 20),
                        book.progress,
                        book.status
                    );
                }
                println!("\n{} book(s)", books.len());
            }
            OutputFormat::Json => self.json(books),
            OutputFormat::Quiet => {
                for book in books {
                    println!("{}", book.id);
                }
            }
        }
    }

    /// Print a list of tags with book counts
    pub fn print_tags(&self, tags: &[(Tag, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (tag, count) in tags {
                    match tag.color {
                        Some(ref color) => {
                            println!("{} | {} [{}] ({})", short_id(&tag.id), tag.name, color, count)
                        }
                        None => println!("{} | {} ({})", short_id(&tag.id), tag.name, count),
                    }
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(tag, count)| {
                        serde_json::json!({
                            "id": tag.id,
                            "name": tag.name,
                            "color": tag.color,
                            "count": count
                        })
                    })
                    .collect();
                self.json(&json_tags);
            }
            OutputFormat::Quiet => {
                for (tag, _) in tags {
                    println!("{}", tag.name);
                }
            }
        }
    }

    /// Print annotations of one book
    pub fn print_annotations(&self, book: &Book, annotations: &[Annotation]) {
        match self.format {
            OutputFormat::Human => {
                println!("Annotations for: {} - {}", short_id(&book.id), book.title);
                println!();

                if annotations.is_empty() {
                    println!("No annotations on this book.");
                    return;
                }

                for annotation in annotations {
                    println!("────────────────────────────────────────");
                    println!(
                        "ID: {}  Created: {}",
                        short_id(&annotation.id),
                        annotation.created_at.format("%Y-%m-%d %H:%M")
                    );
                    if let Some(ref cfi) = annotation.cfi {
                        println!("At: {}", cfi);
                    }
                    println!();
                    println!("  \"{}\"", annotation.text);
                    if let Some(ref note) = annotation.note {
                        println!();
                        println!("{}", note);
                    }
                    println!();
                }
                println!("{} annotation(s)", annotations.len());
            }
            OutputFormat::Json => self.json(annotations),
            OutputFormat::Quiet => {
                for annotation in annotations {
                    println!("{}", annotation.id);
                }
            }
        }
    }

    pub fn print_session(&self, session: &ReadingSession) {
        match self.format {
            OutputFormat::Human => {
                let minutes = session.duration_seconds / 60;
                let pages = session
                    .pages_read
                    .map(|p| format!(", {} pages", p))
                    .unwrap_or_default();
                println!(
                    "{} | {} | {} min{}",
                    short_id(&session.id),
                    session.started_at.format("%Y-%m-%d %H:%M"),
                    minutes,
                    pages
                );
            }
            OutputFormat::Json => self.json(session),
            OutputFormat::Quiet => println!("{}", session.id),
        }
    }

    /// Print the result of a sync run
    pub fn print_sync_outcome(&self, outcome: &SyncOutcome) {
        match self.format {
            OutputFormat::Human => {
                let push = outcome.push_report();
                match outcome.merge_report() {
                    None => println!(
                        "✓ Remote was empty - uploaded {} books, {} tags",
                        push.books, push.tags
                    ),
                    Some(merge) => {
                        if merge.mutations() == 0 {
                            println!("✓ Sync complete - already up to date");
                        } else {
                            println!("✓ Sync complete - {} local changes", merge.mutations());
                        }
                        println!(
                            "  Books:       {} new, {} updated",
                            merge.books.inserted, merge.books.overwritten
                        );
                        println!(
                            "  Tags:        {} new, {} updated, {} merged by name",
                            merge.tags.inserted, merge.tags.overwritten, merge.tags.replaced
                        );
                        println!(
                            "  Annotations: {} new, {} updated",
                            merge.annotations.inserted, merge.annotations.overwritten
                        );
                        println!("  Sessions:    {} new", merge.reading_sessions.inserted);
                    }
                }
                println!(
                    "  Pushed {} books in {} request(s)",
                    push.books, push.batches
                );
            }
            OutputFormat::Json => self.json(outcome),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// First 8 characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Names of the tags a book is filed under, unknown ids shown as-is
fn category_names(book: &Book, tags: &[Tag]) -> Vec<String> {
    book.categories
        .iter()
        .map(|id| {
            tags.iter()
                .find(|t| &t.id == id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| id.clone())
        })
        .collect()
}

fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{:.1} MB", bytes / (KB * KB))
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
