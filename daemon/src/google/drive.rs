//! Drive API v3 Client
//!
//! Thin wrappers over the Drive REST endpoints used by the tools:
//! - Folder lookup / creation (behind the `FolderStore` seam)
//! - Name searches for files and folders
//! - Multipart file upload and metadata/content updates
//! - Download, exporting Google Workspace documents to PDF

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::client::GoogleClient;
use super::query::{FileKind, QueryBuilder, FOLDER_MIME};
use super::resolver::{FolderRef, FolderStore, ParentScope};
use crate::error::DriveError;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Google Workspace mime types that cannot be downloaded directly and are
/// exported to PDF instead.
const WORKSPACE_MIMES: [&str; 6] = [
    "application/vnd.google-apps.document",
    "application/vnd.google-apps.spreadsheet",
    "application/vnd.google-apps.presentation",
    "application/vnd.google-apps.drawing",
    "application/vnd.google-apps.script",
    "application/vnd.google-apps.form",
];

/// A created item as reported by the backend.
#[derive(Debug, Clone)]
pub struct CreatedItem {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
}

/// A downloaded file plus the metadata callers need to store it.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub exported: bool,
    pub original_name: Option<String>,
    pub original_mime_type: Option<String>,
}

pub struct DriveApi {
    client: GoogleClient,
}

impl DriveApi {
    pub fn new(access_token: String) -> Result<Self, DriveError> {
        let client = GoogleClient::new(access_token)?;
        Ok(Self { client })
    }

    /// Find a folder by exact name under a parent scope. Requests a single
    /// result; ordering among same-named siblings is the backend's.
    pub async fn find_folder(
        &self,
        name: &str,
        parent: &ParentScope,
    ) -> Result<Option<FolderRef>, DriveError> {
        let mut builder = QueryBuilder::new().is_folder().name_equals(name).not_trashed();
        if let ParentScope::Folder(id) = parent {
            builder = builder.parent(id);
        }
        let q = builder.build();
        debug!("Searching for folder with query: {}", q);

        let query = vec![
            ("q", q),
            ("spaces", "drive".to_string()),
            ("fields", "files(id, name, parents)".to_string()),
            ("pageSize", "1".to_string()),
        ];

        let url = format!("{}/files", DRIVE_API_BASE);
        let response = self.client.get(&url, &query).await?;

        let Some(item) = response
            .get("files")
            .and_then(|v| v.as_array())
            .and_then(|files| files.first())
        else {
            return Ok(None);
        };

        Ok(Some(folder_ref_from_item(item, parent)))
    }

    /// Create a folder under the parent scope.
    pub async fn create_folder(
        &self,
        name: &str,
        parent: &ParentScope,
    ) -> Result<CreatedItem, DriveError> {
        info!("Creating folder '{}' with parent: {}", name, parent);

        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent.as_parent_id()],
        });

        let query = vec![("fields", "id, name, webViewLink, parents".to_string())];
        let url = format!("{}/files", DRIVE_API_BASE);
        let response = self.client.post(&url, &query, &metadata).await?;

        created_item_from(&response)
    }

    /// Find any non-trashed item (file or folder) by exact name, anywhere.
    pub async fn find_file_id(&self, name: &str) -> Result<Option<String>, DriveError> {
        let q = QueryBuilder::new().name_equals(name).not_trashed().build();
        let query = vec![
            ("q", q),
            ("spaces", "drive".to_string()),
            ("fields", "files(id, name)".to_string()),
            ("pageSize", "1".to_string()),
        ];

        let url = format!("{}/files", DRIVE_API_BASE);
        let response = self.client.get(&url, &query).await?;

        Ok(response
            .get("files")
            .and_then(|v| v.as_array())
            .and_then(|files| files.first())
            .and_then(|item| item.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    /// Rename an item (works for files and folders alike).
    pub async fn rename(&self, file_id: &str, new_name: &str) -> Result<Value, DriveError> {
        info!("Renaming {} to '{}'", file_id, new_name);

        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);
        let query = vec![("fields", "id, name".to_string())];
        self.client.patch(&url, &query, &json!({ "name": new_name })).await
    }

    /// Upload a new file via multipart create.
    pub async fn create_file(
        &self,
        name: &str,
        parent: &ParentScope,
        mime_type: &str,
        content: &[u8],
    ) -> Result<CreatedItem, DriveError> {
        info!(
            "Uploading file '{}' ({} bytes, {}) under {}",
            name,
            content.len(),
            mime_type,
            parent
        );

        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent.as_parent_id()],
        });

        let url = format!("{}/files", UPLOAD_API_BASE);
        let query = vec![
            ("uploadType", "multipart".to_string()),
            ("fields", "id, name, mimeType, webViewLink".to_string()),
        ];
        let response = self
            .client
            .post_multipart(&url, &query, &metadata, mime_type, content)
            .await?;

        created_item_from(&response)
    }

    /// Replace a file's content, optionally renaming it in the same call.
    pub async fn update_file_content(
        &self,
        file_id: &str,
        new_name: Option<&str>,
        mime_type: &str,
        content: &[u8],
    ) -> Result<Value, DriveError> {
        info!("Updating content of {} ({} bytes)", file_id, content.len());

        let metadata = match new_name {
            Some(name) => json!({ "name": name }),
            None => json!({}),
        };

        let url = format!("{}/files/{}", UPLOAD_API_BASE, file_id);
        let query = vec![
            ("uploadType", "multipart".to_string()),
            ("fields", "id, name, mimeType".to_string()),
        ];
        self.client
            .patch_multipart(&url, &query, &metadata, mime_type, content)
            .await
    }

    /// `name contains` search over folders.
    pub async fn search_folders(
        &self,
        fragment: &str,
        parent: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<Value>, DriveError> {
        let mut builder = QueryBuilder::new().is_folder().name_contains(fragment).not_trashed();
        if let Some(parent_id) = parent {
            builder = builder.parent(parent_id);
        }
        let q = builder.build();
        debug!("Folder search query: {}", q);

        let base_query = vec![
            ("q", q),
            ("spaces", "drive".to_string()),
            (
                "fields",
                "nextPageToken, files(id, name, parents, createdTime, modifiedTime)".to_string(),
            ),
        ];

        let url = format!("{}/files", DRIVE_API_BASE);
        let items = self
            .client
            .get_file_pages(&url, &base_query, max_results)
            .await?;

        Ok(items
            .iter()
            .map(|item| {
                json!({
                    "id": item.get("id"),
                    "name": item.get("name"),
                    "parent_id": first_parent(item),
                    "created_time": item.get("createdTime"),
                    "modified_time": item.get("modifiedTime"),
                })
            })
            .collect())
    }

    /// `name contains` search over files. Folders are excluded unless the
    /// caller asked for them via `kind`.
    pub async fn search_files(
        &self,
        fragment: &str,
        parent: Option<&str>,
        kind: Option<FileKind>,
        max_results: usize,
    ) -> Result<Vec<Value>, DriveError> {
        let mut builder = QueryBuilder::new().name_contains(fragment).not_trashed();
        builder = match kind {
            Some(k) => builder.kind(k),
            None => builder.is_not_folder(),
        };
        if let Some(parent_id) = parent {
            builder = builder.parent(parent_id);
        }
        let q = builder.build();
        debug!("File search query: {}", q);

        let base_query = vec![
            ("q", q),
            ("spaces", "drive".to_string()),
            (
                "fields",
                "nextPageToken, files(id, name, parents, mimeType, createdTime, modifiedTime, webViewLink)"
                    .to_string(),
            ),
        ];

        let url = format!("{}/files", DRIVE_API_BASE);
        let items = self
            .client
            .get_file_pages(&url, &base_query, max_results)
            .await?;

        Ok(items
            .iter()
            .map(|item| {
                json!({
                    "id": item.get("id"),
                    "name": item.get("name"),
                    "parent_id": first_parent(item),
                    "mime_type": item.get("mimeType"),
                    "created_time": item.get("createdTime"),
                    "modified_time": item.get("modifiedTime"),
                    "web_view_link": item.get("webViewLink").and_then(|v| v.as_str()).unwrap_or(""),
                })
            })
            .collect())
    }

    /// Download a file's bytes. Workspace documents are exported to PDF and
    /// reported with a `.pdf` file name.
    pub async fn download(&self, file_id: &str) -> Result<Download, DriveError> {
        let meta_url = format!("{}/files/{}", DRIVE_API_BASE, file_id);
        let info = self.client.get(&meta_url, &[]).await?;

        let original_name = info
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let original_mime = info
            .get("mimeType")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        if WORKSPACE_MIMES.contains(&original_mime.as_str()) {
            info!("Exporting Workspace file '{}' as PDF", original_name);

            let url = format!("{}/files/{}/export", DRIVE_API_BASE, file_id);
            let bytes = self
                .client
                .get_bytes(&url, &[("mimeType", "application/pdf".to_string())])
                .await?;

            return Ok(Download {
                bytes,
                file_name: format!("{}.pdf", file_stem(&original_name)),
                mime_type: "application/pdf".to_string(),
                exported: true,
                original_name: Some(original_name),
                original_mime_type: Some(original_mime),
            });
        }

        info!("Downloading binary file '{}'", original_name);
        let bytes = self
            .client
            .get_bytes(&meta_url, &[("alt", "media".to_string())])
            .await?;

        Ok(Download {
            bytes,
            file_name: original_name,
            mime_type: original_mime,
            exported: false,
            original_name: None,
            original_mime_type: None,
        })
    }
}

#[async_trait]
impl FolderStore for DriveApi {
    async fn lookup(&self, name: &str, parent: &ParentScope) -> Result<Option<FolderRef>, DriveError> {
        self.find_folder(name, parent).await
    }

    async fn create(&self, name: &str, parent: &ParentScope) -> Result<FolderRef, DriveError> {
        let created = self.create_folder(name, parent).await?;
        Ok(FolderRef {
            id: created.id,
            name: created.name,
            parent_id: parent.as_parent_id().to_string(),
        })
    }
}

fn folder_ref_from_item(item: &Value, scope: &ParentScope) -> FolderRef {
    FolderRef {
        id: item.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        name: item.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        parent_id: item
            .get("parents")
            .and_then(|v| v.as_array())
            .and_then(|p| p.first())
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| scope.as_parent_id())
            .to_string(),
    }
}

fn created_item_from(response: &Value) -> Result<CreatedItem, DriveError> {
    let id = response
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DriveError::Transport("create response missing id".to_string()))?
        .to_string();

    Ok(CreatedItem {
        id,
        name: response
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        web_view_link: response
            .get("webViewLink")
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}

fn first_parent(item: &Value) -> String {
    item.get("parents")
        .and_then(|v| v.as_array())
        .and_then(|p| p.first())
        .and_then(|v| v.as_str())
        .unwrap_or("root")
        .to_string()
}

/// Name without its final extension, for export renaming.
fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_ref_prefers_reported_parent() {
        let item = serde_json::json!({
            "id": "F9", "name": "Reports", "parents": ["P1"]
        });
        let r = folder_ref_from_item(&item, &ParentScope::Root);
        assert_eq!(r.parent_id, "P1");
    }

    #[test]
    fn folder_ref_falls_back_to_scope() {
        let item = serde_json::json!({ "id": "F9", "name": "Reports" });
        let r = folder_ref_from_item(&item, &ParentScope::Folder("P2".to_string()));
        assert_eq!(r.parent_id, "P2");
    }

    #[test]
    fn created_item_requires_an_id() {
        assert!(created_item_from(&serde_json::json!({ "name": "x" })).is_err());
        let ok = created_item_from(&serde_json::json!({
            "id": "A1", "name": "x", "webViewLink": "https://drive.google.com/x"
        }))
        .unwrap();
        assert_eq!(ok.id, "A1");
        assert_eq!(ok.web_view_link.as_deref(), Some("https://drive.google.com/x"));
    }

    #[test]
    fn export_renames_to_pdf_without_double_extension() {
        assert_eq!(file_stem("report.docx"), "report");
        assert_eq!(file_stem("plain"), "plain");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("a.b.c"), "a.b");
    }

    #[test]
    fn workspace_mimes_cover_docs_sheets_slides() {
        for mime in [
            "application/vnd.google-apps.document",
            "application/vnd.google-apps.spreadsheet",
            "application/vnd.google-apps.presentation",
        ] {
            assert!(WORKSPACE_MIMES.contains(&mime));
        }
        assert!(!WORKSPACE_MIMES.contains(&"application/pdf"));
    }
}
