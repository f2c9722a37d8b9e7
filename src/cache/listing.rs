//! HTML index pages for cached directories.

use std::io;
use std::path::Path;

/// One visible child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

impl ListingEntry {
    /// Name as shown in the listing; directories carry a trailing `/`
    pub fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Link target relative to the listed directory
    pub fn href(&self) -> String {
        // Encoding the whole display name would turn the directory marker
        // into %2F, so slashes are restored afterwards.
        urlencoding::encode(&self.display_name()).replace("%2F", "/")
    }
}

/// Immediate children of `dir` that do not start with `.`, sorted by name.
///
/// Names that are not valid UTF-8 are skipped, since no key can name them.
pub async fn visible_entries(dir: &Path) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = ?entry.path(), "Skipping non UTF-8 name in listing");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        // Follows symlinks, so a linked directory is listed as a directory.
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(ListingEntry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Render the index page for `dir`
pub async fn render_listing(dir: &Path) -> io::Result<String> {
    let entries = visible_entries(dir).await?;
    let mut html = String::from("<!doctype html>\n<html lang=\"en\">\n<body>\n<ul>\n");
    for entry in &entries {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            entry.href(),
            escape_html(&entry.display_name())
        ));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    Ok(html)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}
