//! Directory listing module
//!
//! Renders the HTML index for directories that have no index file.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// One row of the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl ListingEntry {
    /// Shown text: symlinks end in `@`, other directories in `/`
    pub fn display_name(&self) -> String {
        if self.is_symlink {
            format!("{}@", self.name)
        } else if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Percent-encoded relative link
    pub fn href(&self) -> String {
        let mut href = urlencoding::encode(&self.name).into_owned();
        if self.is_dir {
            href.push('/');
        }
        href
    }
}

/// Read a directory's entries, sorted case-insensitively by name
pub async fn read_entries(dir: &Path) -> io::Result<Vec<ListingEntry>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let file_type = entry.file_type().await?;
        let is_symlink = file_type.is_symlink();
        // Symlinked directories are listed as directories; dangling links as files
        let is_dir = if is_symlink {
            tokio::fs::metadata(entry.path())
                .await
                .is_ok_and(|m| m.is_dir())
        } else {
            file_type.is_dir()
        };

        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            is_symlink,
        });
    }

    entries.sort_by_cached_key(|e| e.name.to_lowercase());
    Ok(entries)
}

/// Render the listing page for `request_path`
pub fn render_listing(request_path: &str, entries: &[ListingEntry]) -> String {
    let display_path = urlencoding::decode(request_path)
        .map_or_else(|_| request_path.to_string(), std::borrow::Cow::into_owned);
    let title = format!("Directory listing for {}", html_escape(&display_path));

    let mut html = String::with_capacity(256 + entries.len() * 64);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{title}</h1>");
    html.push_str("<hr>\n<ul>\n");
    for entry in entries {
        let _ = writeln!(
            html,
            "<li><a href=\"{}\">{}</a></li>",
            html_escape(&entry.href()),
            html_escape(&entry.display_name())
        );
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}

/// Escape text for use in HTML content and quoted attributes
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    fn entry(name: &str, is_dir: bool, is_symlink: bool) -> ListingEntry {
        ListingEntry {
            name: name.to_string(),
            is_dir,
            is_symlink,
        }
    }

    #[test]
    fn test_entry_names_and_links() {
        let dir = entry("sub dir", true, false);
        assert_eq!(dir.display_name(), "sub dir/");
        assert_eq!(dir.href(), "sub%20dir/");

        let link = entry("latest", false, true);
        assert_eq!(link.display_name(), "latest@");
        assert_eq!(link.href(), "latest");

        let dir_link = entry("current", true, true);
        assert_eq!(dir_link.display_name(), "current@");
        assert_eq!(dir_link.href(), "current/");
    }

    #[test]
    fn test_render_escapes_names() {
        let html = render_listing("/a%20b/", &[entry("<script>.txt", false, false)]);
        assert!(html.contains("<title>Directory listing for /a b/</title>"));
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("href=\"%3Cscript%3E.txt\""));
    }

    #[test]
    fn test_render_escapes_title() {
        let html = render_listing("/%3Cb%3E/", &[]);
        assert!(html.contains("Directory listing for /&lt;b&gt;/"));
    }

    #[tokio::test]
    async fn test_read_entries_sorted_case_insensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.child("beta.txt"), b"b").unwrap();
        std::fs::write(dir.child("Alpha.txt"), b"a").unwrap();
        std::fs::create_dir(dir.child("gamma")).unwrap();

        let entries = read_entries(dir.path()).await.unwrap();
        let names: Vec<_> = entries.iter().map(ListingEntry::display_name).collect();
        assert_eq!(names, vec!["Alpha.txt", "beta.txt", "gamma/"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_entries_marks_symlinks() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.child("real")).unwrap();
        std::os::unix::fs::symlink(dir.child("real"), dir.child("link")).unwrap();

        let entries = read_entries(dir.path()).await.unwrap();
        assert_eq!(
            entries,
            vec![entry("link", true, true), entry("real", true, false)]
        );
        assert_eq!(entries[0].display_name(), "link@");
        assert_eq!(entries[0].href(), "link/");
    }
}
