//! Drive search query (`q` parameter) construction.
//!
//! User-supplied names are embedded in single-quoted string literals, so
//! `\` and `'` must be escaped or an exact-name lookup stops being exact.

use std::fmt;

/// Mime type marking an item as a folder.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Composable `q` expression. Clauses are joined with `and`.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    clauses: Vec<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive name match.
    pub fn name_equals(mut self, name: &str) -> Self {
        self.clauses.push(format!("name = '{}'", escape(name)));
        self
    }

    /// Substring name match.
    pub fn name_contains(mut self, fragment: &str) -> Self {
        self.clauses
            .push(format!("name contains '{}'", escape(fragment)));
        self
    }

    pub fn is_folder(mut self) -> Self {
        self.clauses.push(format!("mimeType = '{}'", FOLDER_MIME));
        self
    }

    pub fn is_not_folder(mut self) -> Self {
        self.clauses.push(format!("mimeType != '{}'", FOLDER_MIME));
        self
    }

    pub fn not_trashed(mut self) -> Self {
        self.clauses.push("trashed = false".to_string());
        self
    }

    /// Constrain to direct children of a folder id.
    pub fn parent(mut self, folder_id: &str) -> Self {
        self.clauses
            .push(format!("'{}' in parents", escape(folder_id)));
        self
    }

    pub fn kind(mut self, kind: FileKind) -> Self {
        self.clauses.push(kind.clause());
        self
    }

    pub fn build(self) -> String {
        self.clauses.join(" and ")
    }
}

/// File-type filters accepted by the search tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    Document,
    Spreadsheet,
    Presentation,
    Pdf,
    Image,
    Video,
    Audio,
}

impl FileKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "folder" => Some(FileKind::Folder),
            "document" => Some(FileKind::Document),
            "spreadsheet" => Some(FileKind::Spreadsheet),
            "presentation" => Some(FileKind::Presentation),
            "pdf" => Some(FileKind::Pdf),
            "image" => Some(FileKind::Image),
            "video" => Some(FileKind::Video),
            "audio" => Some(FileKind::Audio),
            _ => None,
        }
    }

    fn clause(self) -> String {
        match self {
            FileKind::Folder => format!("mimeType = '{}'", FOLDER_MIME),
            FileKind::Document => "mimeType = 'application/vnd.google-apps.document'".to_string(),
            FileKind::Spreadsheet => {
                "mimeType = 'application/vnd.google-apps.spreadsheet'".to_string()
            }
            FileKind::Presentation => {
                "mimeType = 'application/vnd.google-apps.presentation'".to_string()
            }
            FileKind::Pdf => "mimeType = 'application/pdf'".to_string(),
            FileKind::Image => "mimeType contains 'image/'".to_string(),
            FileKind::Video => "mimeType contains 'video/'".to_string(),
            FileKind::Audio => "mimeType contains 'audio/'".to_string(),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::Folder => "folder",
            FileKind::Document => "document",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::Presentation => "presentation",
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape("Bob's \\ Reports"), "Bob\\'s \\\\ Reports");
    }

    #[test]
    fn exact_folder_lookup_query() {
        let q = QueryBuilder::new()
            .is_folder()
            .name_equals("Reports")
            .not_trashed()
            .parent("F123")
            .build();
        assert_eq!(
            q,
            "mimeType = 'application/vnd.google-apps.folder' and name = 'Reports' \
             and trashed = false and 'F123' in parents"
        );
    }

    #[test]
    fn root_scope_omits_parent_clause() {
        let q = QueryBuilder::new()
            .is_folder()
            .name_equals("Reports")
            .not_trashed()
            .build();
        assert!(!q.contains("in parents"));
    }

    #[test]
    fn quoted_name_stays_exact() {
        let q = QueryBuilder::new().name_equals("it's a trap' or name != '").build();
        assert_eq!(q, "name = 'it\\'s a trap\\' or name != \\''");
    }

    #[test]
    fn file_kind_parsing_is_case_insensitive() {
        assert_eq!(FileKind::parse("PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::parse("Spreadsheet"), Some(FileKind::Spreadsheet));
        assert_eq!(FileKind::parse("archive"), None);
    }

    #[test]
    fn media_kinds_use_contains() {
        let q = QueryBuilder::new().kind(FileKind::Image).build();
        assert_eq!(q, "mimeType contains 'image/'");
    }
}
