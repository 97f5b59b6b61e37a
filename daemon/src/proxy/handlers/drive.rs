//! Google Drive Handlers
//!
//! The `drive.*` methods exposed over the socket. Every parent given by name
//! goes through the folder resolver, so concurrent requests naming the same
//! folder agree on one id instead of racing each other into duplicates.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::{error, info};

use super::super::protocol::JsonRpcResponse;
use super::common::{
    self, bool_with_default, optional_string, require_string, string_with_default,
    u64_with_default,
};
use crate::error::DriveError;
use crate::google::query::FileKind;
use crate::google::resolver::ResolutionLocks;
use crate::google::{DriveApi, FolderResolver, ParentScope};

/// One lock set for the whole process. Resolvers are built per request, so
/// the locks that serialize same-pair resolutions must outlive them.
static RESOLUTION_LOCKS: Lazy<Arc<ResolutionLocks>> =
    Lazy::new(|| Arc::new(ResolutionLocks::new()));

fn resolver(api: &DriveApi) -> FolderResolver<&DriveApi> {
    FolderResolver::with_locks(api, Arc::clone(&RESOLUTION_LOCKS))
}

/// Handle drive namespace methods
pub async fn handle(action: &str, params: &Value, id: Value) -> JsonRpcResponse {
    match action {
        "resolve_folder" | "resolveFolder" => handle_resolve_folder(params, id).await,
        "folder_create" | "folderCreate" => handle_folder_create(params, id).await,
        "folder_update" | "folderUpdate" => handle_folder_update(params, id).await,
        "folder_search" | "folderSearch" => handle_folder_search(params, id).await,
        "file_create" | "fileCreate" => handle_file_create(params, id).await,
        "file_update" | "fileUpdate" => handle_file_update(params, id).await,
        "file_search" | "fileSearch" => handle_file_search(params, id).await,
        "file_download" | "fileDownload" => handle_file_download(params, id).await,
        _ => JsonRpcResponse::method_not_found(id, &format!("drive.{}", action)),
    }
}

/// Interpret the parent parameters of a request. `parent_id` is taken as a
/// folder id unless `parent_by_name` is set, in which case it names a folder
/// under root that is resolved (and created on miss) before use.
async fn parent_scope(
    api: &DriveApi,
    params: &Value,
    id: &Value,
) -> Result<ParentScope, JsonRpcResponse> {
    let raw = string_with_default(params, "parent_id", "root");
    let scope = ParentScope::parse(raw);
    if scope.is_root() || !bool_with_default(params, "parent_by_name", false) {
        return Ok(scope);
    }

    match resolver(api).resolve_or_create(raw, &ParentScope::Root).await {
        Ok(folder) => Ok(ParentScope::Folder(folder.id)),
        Err(e) => {
            error!("Failed to resolve parent folder '{}': {}", raw, e);
            Err(JsonRpcResponse::drive_error(id.clone(), &e))
        }
    }
}

/// Binary payloads arrive base64-encoded; everything else is the literal
/// text. A binary payload that fails to decode is stored as-is rather than
/// rejected, matching how uploads behaved before decoding was added.
fn decode_content(content: &str, mime_type: &str) -> Vec<u8> {
    if mime_type.starts_with("image/") || mime_type == "application/pdf" {
        BASE64
            .decode(content)
            .unwrap_or_else(|_| content.as_bytes().to_vec())
    } else {
        content.as_bytes().to_vec()
    }
}

async fn handle_resolve_folder(params: &Value, id: Value) -> JsonRpcResponse {
    let name = match require_string(params, "name", &id) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let parent = ParentScope::parse(string_with_default(params, "parent_id", "root"));

    info!("Resolving folder '{}' under {}", name, parent);

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    match resolver(&api).resolve_or_create(name, &parent).await {
        Ok(folder) => JsonRpcResponse::success(
            id,
            json!({
                "id": folder.id,
                "name": folder.name,
                "parent_id": folder.parent_id,
            }),
        ),
        Err(e) => {
            error!("Failed to resolve folder '{}': {}", name, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_folder_create(params: &Value, id: Value) -> JsonRpcResponse {
    let name = match require_string(params, "name", &id) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    let parent = match parent_scope(&api, params, &id).await {
        Ok(scope) => scope,
        Err(resp) => return resp,
    };

    match resolver(&api).resolve_or_create(name, &parent).await {
        Ok(folder) => JsonRpcResponse::success(
            id,
            json!({
                "id": folder.id,
                "name": folder.name,
                "parent_id": folder.parent_id,
                "success": true,
            }),
        ),
        Err(e) => {
            error!("Failed to create folder '{}': {}", name, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_folder_update(params: &Value, id: Value) -> JsonRpcResponse {
    let new_name = match require_string(params, "new_name", &id) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let search_by_name = bool_with_default(params, "search_by_name", false);

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    let folder_id = if search_by_name {
        let name = match require_string(params, "name", &id) {
            Ok(n) => n,
            Err(resp) => return resp,
        };
        match api.find_folder(name, &ParentScope::Root).await {
            Ok(Some(folder)) => folder.id,
            Ok(None) => {
                let err = DriveError::NotFound(format!("folder '{}'", name));
                return JsonRpcResponse::drive_error(id, &err);
            }
            Err(e) => {
                error!("Folder lookup for '{}' failed: {}", name, e);
                return JsonRpcResponse::drive_error(id, &e);
            }
        }
    } else {
        match require_string(params, "folder_id", &id) {
            Ok(fid) => fid.to_string(),
            Err(resp) => return resp,
        }
    };

    match api.rename(&folder_id, new_name).await {
        Ok(_) => JsonRpcResponse::success(
            id,
            json!({
                "id": folder_id,
                "name": new_name,
                "success": true,
            }),
        ),
        Err(e) => {
            error!("Failed to rename folder {}: {}", folder_id, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_folder_search(params: &Value, id: Value) -> JsonRpcResponse {
    let query = match require_string(params, "query", &id) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let parent = optional_string(params, "parent_id");
    let max_results = u64_with_default(params, "max_results", 10).clamp(1, 1000) as usize;

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    match api.search_folders(query, parent, max_results).await {
        Ok(folders) => JsonRpcResponse::success(
            id,
            json!({
                "folder_count": folders.len(),
                "folders": folders,
            }),
        ),
        Err(e) => {
            error!("Folder search for '{}' failed: {}", query, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_file_create(params: &Value, id: Value) -> JsonRpcResponse {
    let name = match require_string(params, "name", &id) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let content = match require_string(params, "content", &id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mime_type = string_with_default(params, "mime_type", "text/plain");

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    let parent = match parent_scope(&api, params, &id).await {
        Ok(scope) => scope,
        Err(resp) => return resp,
    };

    let bytes = decode_content(content, mime_type);

    match api.create_file(name, &parent, mime_type, &bytes).await {
        Ok(created) => JsonRpcResponse::success(
            id,
            json!({
                "id": created.id,
                "name": created.name,
                "parent_id": parent.as_parent_id(),
                "mime_type": mime_type,
                "web_view_link": created.web_view_link,
                "success": true,
            }),
        ),
        Err(e) => {
            error!("Failed to upload file '{}': {}", name, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_file_update(params: &Value, id: Value) -> JsonRpcResponse {
    let new_name = optional_string(params, "new_name");
    let new_content = optional_string(params, "new_content");
    if new_name.is_none() && new_content.is_none() {
        return JsonRpcResponse::invalid_params(
            id,
            "At least one of 'new_name' or 'new_content' is required",
        );
    }
    let search_by_name = bool_with_default(params, "search_by_name", false);

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    let file_id = if search_by_name {
        let name = match require_string(params, "name", &id) {
            Ok(n) => n,
            Err(resp) => return resp,
        };
        match api.find_file_id(name).await {
            Ok(Some(fid)) => fid,
            Ok(None) => {
                let err = DriveError::NotFound(format!("file '{}'", name));
                return JsonRpcResponse::drive_error(id, &err);
            }
            Err(e) => {
                error!("File lookup for '{}' failed: {}", name, e);
                return JsonRpcResponse::drive_error(id, &e);
            }
        }
    } else {
        match require_string(params, "file_id", &id) {
            Ok(fid) => fid.to_string(),
            Err(resp) => return resp,
        }
    };

    let mut updated = Vec::new();
    let result = if let Some(content) = new_content {
        let mime_type = string_with_default(params, "mime_type", "text/plain");
        let bytes = decode_content(content, mime_type);
        if new_name.is_some() {
            updated.push("name");
        }
        updated.push("content");
        api.update_file_content(&file_id, new_name, mime_type, &bytes)
            .await
    } else {
        updated.push("name");
        // unwrap is safe: the both-absent case was rejected above
        api.rename(&file_id, new_name.unwrap()).await
    };

    match result {
        Ok(_) => JsonRpcResponse::success(
            id,
            json!({
                "id": file_id,
                "updated": updated,
                "success": true,
            }),
        ),
        Err(e) => {
            error!("Failed to update file {}: {}", file_id, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_file_search(params: &Value, id: Value) -> JsonRpcResponse {
    let query = match require_string(params, "query", &id) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let kind = match optional_string(params, "file_type") {
        Some(raw) => match FileKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return JsonRpcResponse::invalid_params(
                    id,
                    format!(
                        "Unknown file_type '{}' (expected one of: folder, document, \
                         spreadsheet, presentation, pdf, image, video, audio)",
                        raw
                    ),
                );
            }
        },
        None => None,
    };
    let parent = optional_string(params, "parent_id");
    let max_results = u64_with_default(params, "max_results", 10).clamp(1, 1000) as usize;

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    match api.search_files(query, parent, kind, max_results).await {
        Ok(files) => JsonRpcResponse::success(
            id,
            json!({
                "file_count": files.len(),
                "files": files,
            }),
        ),
        Err(e) => {
            error!("File search for '{}' failed: {}", query, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

async fn handle_file_download(params: &Value, id: Value) -> JsonRpcResponse {
    let file_id = match require_string(params, "file_id", &id) {
        Ok(fid) => fid,
        Err(resp) => return resp,
    };

    let api = match common::drive_api(&id).await {
        Ok(api) => api,
        Err(resp) => return resp,
    };

    match api.download(file_id).await {
        Ok(download) => {
            let mut result = json!({
                "file_id": file_id,
                "file_name": download.file_name,
                "mime_type": download.mime_type,
                "file_size": download.bytes.len(),
                "exported": download.exported,
                "content_base64": BASE64.encode(&download.bytes),
            });
            if download.exported {
                result["original_name"] = json!(download.original_name);
                result["original_mime_type"] = json!(download.original_mime_type);
            }
            JsonRpcResponse::success(id, result)
        }
        Err(e) => {
            error!("Failed to download {}: {}", file_id, e);
            JsonRpcResponse::drive_error(id, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Parameter validation runs before any token or network work, so these
    // paths are testable without credentials.

    #[tokio::test]
    async fn resolve_folder_requires_a_name() {
        let response = handle("resolve_folder", &json!({}), json!(1)).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("name"));
    }

    #[tokio::test]
    async fn unknown_action_is_method_not_found() {
        let response = handle("folder_delete", &json!({}), json!(2)).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("drive.folder_delete"));
    }

    #[tokio::test]
    async fn file_update_rejects_a_no_op() {
        let response = handle("file_update", &json!({"file_id": "F1"}), json!(3)).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, -32602);
    }

    #[tokio::test]
    async fn file_search_rejects_unknown_file_type() {
        let params = json!({"query": "report", "file_type": "archive"});
        let response = handle("file_search", &params, json!(4)).await;
        let error = response.error.expect("expected an error");
        assert_eq!(error.code, -32602);
        assert!(error.message.contains("archive"));
    }

    #[tokio::test]
    async fn camel_case_aliases_reach_the_same_handler() {
        let response = handle("resolveFolder", &json!({}), json!(5)).await;
        assert_eq!(response.error.expect("expected an error").code, -32602);
    }

    #[test]
    fn binary_mimes_are_base64_decoded() {
        let encoded = BASE64.encode(b"\x89PNG");
        assert_eq!(decode_content(&encoded, "image/png"), b"\x89PNG");
        assert_eq!(decode_content(&encoded, "application/pdf"), b"\x89PNG");
    }

    #[test]
    fn text_content_is_taken_literally() {
        assert_eq!(decode_content("hello", "text/plain"), b"hello");
        // Text that happens to be valid base64 must not be decoded.
        assert_eq!(decode_content("aGVsbG8=", "text/markdown"), b"aGVsbG8=");
    }

    #[test]
    fn undecodable_binary_content_falls_back_to_raw_bytes() {
        assert_eq!(decode_content("not base64!!", "image/png"), b"not base64!!");
    }
}
