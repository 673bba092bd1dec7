//! Reading session command handlers

use anyhow::{bail, Result};

use shelf_core::Store;

use super::find_book;
use crate::output::Output;

/// Record a reading session that just ended
pub async fn log(
    store: &Store,
    book_id: String,
    minutes: u32,
    pages: Option<u32>,
    output: &Output,
) -> Result<()> {
    if minutes == 0 {
        bail!("A reading session must last at least one minute");
    }

    let book = find_book(store, &book_id).await?;
    let duration_seconds = minutes
        .checked_mul(60)
        .ok_or_else(|| anyhow::anyhow!("Session too long: {} minutes", minutes))?;

    let session = store.log_session(&book.id, duration_seconds, pages).await?;

    if output.is_json() || output.is_quiet() {
        output.print_session(&session);
    } else {
        output.success(&format!("Logged {} min of {}", minutes, book.title));
    }
    Ok(())
}

/// List sessions recorded for a book
pub async fn list(store: &Store, book_id: String, output: &Output) -> Result<()> {
    let book = find_book(store, &book_id).await?;
    let sessions = store.get_sessions(&book.id).await?;

    if output.is_json() {
        output.json(&sessions);
        return Ok(());
    }

    if sessions.is_empty() && !output.is_quiet() {
        println!("No reading sessions for: {}", book.title);
        return Ok(());
    }
    for session in &sessions {
        output.print_session(session);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use shelf_core::{Book, Config};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_records_session_and_reading_time() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open_with_config(Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        })
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);
        store.add_book(&Book::with_id("b1", "Ulysses")).await.unwrap();

        log(&store, "b1".to_string(), 25, Some(12), &output)
            .await
            .unwrap();
        assert!(log(&store, "b1".to_string(), 0, None, &output).await.is_err());

        let sessions = store.get_sessions("b1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_seconds, 25 * 60);
        assert_eq!(sessions[0].pages_read, Some(12));

        let book = store.get_book("b1").await.unwrap().unwrap();
        assert!(book.last_read_at.is_some());
    }
}
