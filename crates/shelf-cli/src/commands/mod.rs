//! Command handlers

pub mod annotation;
pub mod book;
pub mod config;
pub mod session;
pub mod status;
pub mod sync;
pub mod tag;

use anyhow::{bail, Result};

use shelf_core::{Book, Store};

/// Resolve a full id or unique id prefix against `(id, label)` candidates
///
/// An exact match wins even when it is also a prefix of other ids.
pub(crate) fn resolve_id<'a, I>(kind: &str, input: &str, candidates: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let candidates: Vec<(&str, &str)> = candidates.into_iter().collect();

    if candidates.iter().any(|(id, _)| *id == input) {
        return Ok(input.to_string());
    }

    let matches: Vec<_> = candidates
        .iter()
        .filter(|(id, _)| !input.is_empty() && id.starts_with(input))
        .collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, input),
        1 => Ok(matches[0].0.to_string()),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, input);
            for (id, label) in &matches {
                eprintln!("  {} - {}", id, label);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Look up a book by id or id prefix
pub(crate) async fn find_book(store: &Store, id: &str) -> Result<Book> {
    let books = store.get_all_books().await?;
    let resolved = resolve_id(
        "book",
        id,
        books.iter().map(|b| (b.id.as_str(), b.title.as_str())),
    )?;
    books
        .into_iter()
        .find(|b| b.id == resolved)
        .ok_or_else(|| anyhow::anyhow!("Book not found: {}", id))
}
