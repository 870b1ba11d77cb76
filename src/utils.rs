use crate::error::Result;
use std::fs::DirBuilder;
use std::path::Path;

/// Creates a directory if it doesn't exist
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    DirBuilder::new().recursive(true).create(path)?;
    Ok(())
}

/// Shorten text to a log-friendly preview of at most 50 characters.
pub fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 50;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}
