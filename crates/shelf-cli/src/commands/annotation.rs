//! Annotation command handlers

use anyhow::{bail, Result};

use shelf_core::{Annotation, Store};

use super::{find_book, resolve_id};
use crate::output::Output;

/// Options for a new annotation
pub struct AddOptions {
    pub book_id: String,
    pub text: String,
    pub note: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
}

/// Highlight a passage in a book
pub async fn add(store: &Store, opts: AddOptions, output: &Output) -> Result<()> {
    if opts.text.trim().is_empty() {
        bail!("Annotation text cannot be empty");
    }

    let book = find_book(store, &opts.book_id).await?;

    let mut annotation = Annotation::new(&book.id, opts.text);
    annotation.cfi = opts.location;
    annotation.color = opts.color;
    if opts.note.is_some() {
        annotation.set_note(opts.note);
    }

    store.add_annotation(&annotation).await?;

    if output.is_quiet() {
        println!("{}", annotation.id);
    } else {
        output.success(&format!(
            "Added annotation {} to: {}",
            annotation.id, book.title
        ));
    }

    Ok(())
}

/// List annotations on a book
pub async fn list(store: &Store, book_id: String, output: &Output) -> Result<()> {
    let book = find_book(store, &book_id).await?;
    let annotations = store.get_annotations(&book.id).await?;
    output.print_annotations(&book, &annotations);
    Ok(())
}

/// Delete an annotation
///
/// The annotation is tombstoned so the deletion reaches the remote on the
/// next sync.
pub async fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let annotations = store.get_all_annotations().await?;
    let resolved = resolve_id(
        "annotation",
        &id,
        annotations.iter().map(|a| (a.id.as_str(), a.text.as_str())),
    )?;

    if !store.delete_annotation(&resolved).await? {
        bail!("Annotation not found: {}", id);
    }

    output.success(&format!("Deleted annotation: {}", resolved));
    Ok(())
}
