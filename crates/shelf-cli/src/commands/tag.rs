//! Tag command handlers

use anyhow::{bail, Result};

use shelf_core::Store;

use crate::output::Output;

/// Create a tag, or update the color of an existing one
pub async fn add(store: &Store, name: String, color: Option<String>, output: &Output) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Tag name cannot be empty");
    }

    let mut tag = store.ensure_tag(name, color.clone()).await?;
    if color.is_some() && tag.color != color {
        tag.set_color(color);
        store.update_tag(&tag).await?;
    }

    output.success(&format!("Tag: {} ({})", tag.name, tag.id));
    Ok(())
}

/// Rename a tag in place; books keep pointing at it
pub async fn rename(store: &Store, old: String, new: String, output: &Output) -> Result<()> {
    let new = new.trim();
    if new.is_empty() {
        bail!("Tag name cannot be empty");
    }

    let tags = store.get_all_tags().await?;
    let Some(tag) = tags.iter().find(|t| t.name.eq_ignore_ascii_case(old.trim())) else {
        bail!("No tag named '{}'", old);
    };
    if let Some(other) = tags.iter().find(|t| t.name == new && t.id != tag.id) {
        bail!("A tag named '{}' already exists ({})", new, other.id);
    }

    let mut tag = tag.clone();
    tag.rename(new);
    store.update_tag(&tag).await?;

    output.success(&format!("Renamed {} to {}", old, tag.name));
    Ok(())
}

/// List all tags with usage counts
pub async fn list(store: &Store, output: &Output) -> Result<()> {
    let tags = store.get_tags_with_counts().await?;
    output.print_tags(&tags);
    Ok(())
}
