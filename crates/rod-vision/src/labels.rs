use anyhow::{Context, Result};
use std::path::Path;

/// One class name per line, line index = class id. Reading stops at the first
/// blank line; anything after it is ignored.
pub fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .take_while(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read label file {}", path.display()))?;
    let labels = parse_labels(&text);
    anyhow::ensure!(!labels.is_empty(), "label file {} is empty", path.display());
    Ok(labels)
}
