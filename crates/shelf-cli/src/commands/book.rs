//! Book command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use shelf_core::{Book, ReadingSession, ReadingStatus, Store};

use super::find_book;
use crate::output::Output;

/// Options for adding a book
pub struct AddOptions {
    pub file: PathBuf,
    pub title: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
}

/// Add a book from a local file
pub async fn add(store: &Store, opts: AddOptions, output: &Output) -> Result<()> {
    let file_name = opts
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Not a file: {}", opts.file.display()))?;

    if let Some(existing) = store.find_book_by_file_name(&file_name).await? {
        output.message(&format!(
            "Skipped: '{}' is already in the library as {}",
            file_name, existing.id
        ));
        return Ok(());
    }

    let data = std::fs::read(&opts.file)
        .with_context(|| format!("Failed to read {}", opts.file.display()))?;

    let title = opts.title.unwrap_or_else(|| title_from_file_name(&file_name));
    let mut book = Book::new(title);
    book.set_author(opts.author);
    book.set_file(file_name.clone(), data);

    for name in opts.tags {
        let tag = store.ensure_tag(&name, None).await?;
        book.add_category(tag.id);
    }

    if !store.add_book(&book).await? {
        output.message(&format!("Skipped: '{}' is already in the library", file_name));
        return Ok(());
    }

    output.success(&format!("Added book: {}", book.id));
    let tags = store.get_all_tags().await?;
    output.print_book(&book, &tags);

    Ok(())
}

/// List books, optionally filtered by status or tag name
pub async fn list(
    store: &Store,
    status: Option<ReadingStatus>,
    tag: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut books = store.get_all_books().await?;

    if let Some(status) = status {
        books.retain(|b| b.status == status);
    }

    if let Some(ref name) = tag {
        let tags = store.get_all_tags().await?;
        let Some(tag) = tags.iter().find(|t| t.name.eq_ignore_ascii_case(name)) else {
            bail!("No tag named '{}'", name);
        };
        books.retain(|b| b.categories.contains(&tag.id));
    }

    output.print_books(&books);
    Ok(())
}

/// Show a single book with its recent sessions
pub async fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let book = find_book(store, &id).await?;
    let tags = store.get_all_tags().await?;
    output.print_book(&book, &tags);

    if output.is_json() || output.is_quiet() {
        return Ok(());
    }

    let annotations = store.get_annotations(&book.id).await?;
    let sessions = store.get_sessions(&book.id).await?;

    println!();
    println!("Annotations: {}", annotations.len());
    println!(
        "Sessions:    {} ({} min total)",
        sessions.len(),
        total_minutes(&sessions)
    );
    for session in sessions.iter().rev().take(5) {
        output.print_session(session);
    }

    Ok(())
}

/// Edit title or author
pub async fn edit(
    store: &Store,
    id: String,
    title: Option<String>,
    author: Option<String>,
    output: &Output,
) -> Result<()> {
    if title.is_none() && author.is_none() {
        bail!("Nothing to change: pass --title and/or --author");
    }

    let mut book = find_book(store, &id).await?;
    if let Some(title) = title {
        let title = title.trim();
        if title.is_empty() {
            bail!("Title cannot be empty");
        }
        book.set_title(title);
    }
    if let Some(author) = author {
        let author = author.trim();
        book.set_author((!author.is_empty()).then(|| author.to_string()));
    }
    store.update_book(&book).await?;

    output.success(&format!("Updated book: {}", book.id));
    Ok(())
}

/// Update reading progress
pub async fn progress(
    store: &Store,
    id: String,
    percent: f64,
    location: Option<String>,
    output: &Output,
) -> Result<()> {
    if !percent.is_finite() {
        bail!("Progress must be a number between 0 and 100");
    }

    let mut book = find_book(store, &id).await?;
    book.set_progress(percent, location);
    store.update_book(&book).await?;

    output.success(&format!(
        "{} is at {:.0}% ({})",
        book.title, book.progress, book.status
    ));
    Ok(())
}

/// Rate a book from 1 to 5
pub async fn rate(store: &Store, id: String, rating: u8, output: &Output) -> Result<()> {
    let mut book = find_book(store, &id).await?;
    book.set_rating(Some(rating));
    store.update_book(&book).await?;

    output.success(&format!("Rated {}: {}/5", book.title, rating));
    Ok(())
}

/// Change the reading status
pub async fn set_status(
    store: &Store,
    id: String,
    status: ReadingStatus,
    output: &Output,
) -> Result<()> {
    let mut book = find_book(store, &id).await?;
    book.set_status(status);
    store.update_book(&book).await?;

    output.success(&format!("{} is now {}", book.title, status));
    Ok(())
}

/// File a book under a tag, creating the tag if needed
pub async fn tag(store: &Store, id: String, name: String, output: &Output) -> Result<()> {
    let mut book = find_book(store, &id).await?;
    let tag = store.ensure_tag(&name, None).await?;
    book.add_category(tag.id);
    store.update_book(&book).await?;

    output.success(&format!("Tagged {} with {}", book.title, name));
    Ok(())
}

/// Remove a tag from a book
pub async fn untag(store: &Store, id: String, name: String, output: &Output) -> Result<()> {
    let mut book = find_book(store, &id).await?;
    let tags = store.get_all_tags().await?;
    let Some(tag) = tags.iter().find(|t| t.name.eq_ignore_ascii_case(&name)) else {
        bail!("No tag named '{}'", name);
    };
    book.remove_category(&tag.id);
    store.update_book(&book).await?;

    output.success(&format!("Removed {} from {}", name, book.title));
    Ok(())
}

fn total_minutes(sessions: &[ReadingSession]) -> u64 {
    sessions
        .iter()
        .map(|s| u64::from(s.duration_seconds))
        .sum::<u64>()
        / 60
}

/// "the_left_hand-of.darkness.epub" -> "the left hand of darkness"
fn title_from_file_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let title = stem
        .split(|c: char| c == '_' || c == '-' || c == '.')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        file_name.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use shelf_core::Config;
    use tempfile::TempDir;

    fn test_store(temp_dir: &TempDir) -> Store {
        let config = Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        Store::open_with_config(config).unwrap()
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(
            title_from_file_name("the_left_hand-of.darkness.epub"),
            "the left hand of darkness"
        );
        assert_eq!(title_from_file_name("Dune.pdf"), "Dune");
        assert_eq!(title_from_file_name("README"), "README");
        assert_eq!(title_from_file_name(".epub"), ".epub");
    }

    #[test]
    fn test_total_minutes_does_not_overflow() {
        let long = ReadingSession::new("b1", shelf_core::hydrate::now(), u32::MAX);
        let sessions = vec![long.clone(), long];
        assert_eq!(total_minutes(&sessions), 2 * u64::from(u32::MAX) / 60);
        assert_eq!(total_minutes(&[]), 0);
    }

    #[tokio::test]
    async fn test_add_reads_file_and_skips_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        let file = temp_dir.path().join("dune.epub");
        std::fs::write(&file, b"epub bytes").unwrap();

        let opts = || AddOptions {
            file: file.clone(),
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            tags: vec!["Sci-Fi".to_string()],
        };

        add(&store, opts(), &output).await.unwrap();
        add(&store, opts(), &output).await.unwrap();

        let books = store.get_all_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].file_data.as_deref(), Some(&b"epub bytes"[..]));
        assert_eq!(books[0].file_type.as_deref(), Some("epub"));
        assert_eq!(books[0].categories.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_and_rate_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        let book = Book::with_id("b-1234", "Emma");
        store.add_book(&book).await.unwrap();

        progress(&store, "b-12".to_string(), 40.0, None, &output)
            .await
            .unwrap();
        rate(&store, "b-1234".to_string(), 4, &output).await.unwrap();

        let stored = store.get_book("b-1234").await.unwrap().unwrap();
        assert_eq!(stored.progress, 40.0);
        assert_eq!(stored.status, ReadingStatus::Reading);
        assert_eq!(stored.rating, Some(4));
    }

    #[tokio::test]
    async fn test_progress_rejects_nan() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        store.add_book(&Book::with_id("b1", "Emma")).await.unwrap();
        assert!(progress(&store, "b1".to_string(), f64::NAN, None, &output)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_edit_title_and_clear_author() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        let mut book = Book::with_id("b1", "emma");
        book.set_author(Some("Austen".to_string()));
        store.add_book(&book).await.unwrap();

        edit(&store, "b1".to_string(), Some(" Emma ".to_string()), Some("".to_string()), &output)
            .await
            .unwrap();
        let stored = store.get_book("b1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Emma");
        assert!(stored.author.is_none());
        assert!(stored.updated_at >= book.updated_at);

        assert!(edit(&store, "b1".to_string(), None, None, &output).await.is_err());
        assert!(edit(&store, "b1".to_string(), Some("  ".to_string()), None, &output)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tag_and_untag() {
        let temp_dir = TempDir::new().unwrap();
        let store = test_store(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        store.add_book(&Book::with_id("b1", "Emma")).await.unwrap();
        tag(&store, "b1".to_string(), "Classics".to_string(), &output)
            .await
            .unwrap();
        assert_eq!(store.get_book("b1").await.unwrap().unwrap().categories.len(), 1);

        untag(&store, "b1".to_string(), "classics".to_string(), &output)
            .await
            .unwrap();
        assert!(store.get_book("b1").await.unwrap().unwrap().categories.is_empty());
    }
}
