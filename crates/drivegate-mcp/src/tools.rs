use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::debug;

use drivegate_protocol::{JsonRpcRequest as SocketRequest, SocketClient};

use crate::protocol::{McpTool, ToolAnnotations, ToolContent, ToolsCallResponse, ToolsListResponse};

#[derive(Debug, Clone)]
pub struct ToolIndexEntry {
    pub socket_method: String,
}

/// One exposed tool: MCP name, daemon method, description, schema, hints.
struct ToolSpec {
    name: &'static str,
    socket_method: &'static str,
    description: &'static str,
    input_schema: fn() -> Value,
    read_only: bool,
    idempotent: bool,
}

fn parent_properties() -> Value {
    json!({
        "parent_id": {
            "type": "string",
            "description": "Parent folder id, or a folder name when parent_by_name is true. Empty or 'root' means the Drive root."
        },
        "parent_by_name": {
            "type": "boolean",
            "description": "Treat parent_id as a folder name under root, resolving it (and creating it if absent) before use.",
            "default": false
        }
    })
}

fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "drive_resolve_folder",
            socket_method: "drive.resolve_folder",
            description: "Resolve a folder name to its id under a parent, creating the folder if it does not exist. Safe to call repeatedly.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Exact folder name (case-sensitive)"},
                    "parent_id": {"type": "string", "description": "Parent folder id; empty or 'root' means the Drive root"}
                },
                "required": ["name"]
            }),
            read_only: false,
            idempotent: true,
        },
        ToolSpec {
            name: "drive_folder_create",
            socket_method: "drive.folder_create",
            description: "Create a folder in Google Drive, reusing an existing folder of the same name under the same parent.",
            input_schema: || {
                let mut props = parent_properties();
                props["name"] = json!({"type": "string", "description": "Folder name"});
                json!({"type": "object", "properties": props, "required": ["name"]})
            },
            read_only: false,
            idempotent: true,
        },
        ToolSpec {
            name: "drive_folder_update",
            socket_method: "drive.folder_update",
            description: "Rename a folder, addressed by id or by exact name.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "folder_id": {"type": "string", "description": "Folder id (required unless search_by_name)"},
                    "name": {"type": "string", "description": "Exact current name (required with search_by_name)"},
                    "new_name": {"type": "string", "description": "New folder name"},
                    "search_by_name": {"type": "boolean", "default": false}
                },
                "required": ["new_name"]
            }),
            read_only: false,
            idempotent: false,
        },
        ToolSpec {
            name: "drive_folder_search",
            socket_method: "drive.folder_search",
            description: "Search folders by name fragment, optionally within a parent folder.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Name fragment to match"},
                    "parent_id": {"type": "string", "description": "Restrict to this parent folder"},
                    "max_results": {"type": "integer", "default": 10, "maximum": 1000}
                },
                "required": ["query"]
            }),
            read_only: true,
            idempotent: true,
        },
        ToolSpec {
            name: "drive_file_create",
            socket_method: "drive.file_create",
            description: "Upload a file to Google Drive. Binary content (images, PDFs) must be base64-encoded.",
            input_schema: || {
                let mut props = parent_properties();
                props["name"] = json!({"type": "string", "description": "File name"});
                props["content"] = json!({"type": "string", "description": "File content; base64 for image/* and application/pdf"});
                props["mime_type"] = json!({"type": "string", "default": "text/plain"});
                json!({"type": "object", "properties": props, "required": ["name", "content"]})
            },
            read_only: false,
            idempotent: false,
        },
        ToolSpec {
            name: "drive_file_update",
            socket_method: "drive.file_update",
            description: "Rename a file or replace its content, addressed by id or by exact name.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "File id (required unless search_by_name)"},
                    "name": {"type": "string", "description": "Exact current name (required with search_by_name)"},
                    "new_name": {"type": "string"},
                    "new_content": {"type": "string", "description": "Replacement content; base64 for image/* and application/pdf"},
                    "mime_type": {"type": "string", "default": "text/plain"},
                    "search_by_name": {"type": "boolean", "default": false}
                }
            }),
            read_only: false,
            idempotent: false,
        },
        ToolSpec {
            name: "drive_file_search",
            socket_method: "drive.file_search",
            description: "Search files by name fragment, optionally filtered by type or parent folder.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Name fragment to match"},
                    "file_type": {"type": "string", "enum": ["folder", "document", "spreadsheet", "presentation", "pdf", "image", "video", "audio"]},
                    "parent_id": {"type": "string", "description": "Restrict to this parent folder"},
                    "max_results": {"type": "integer", "default": 10, "maximum": 1000}
                },
                "required": ["query"]
            }),
            read_only: true,
            idempotent: true,
        },
        ToolSpec {
            name: "drive_file_download",
            socket_method: "drive.file_download",
            description: "Download a file's content as base64. Google Workspace documents are exported as PDF.",
            input_schema: || json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "File id"}
                },
                "required": ["file_id"]
            }),
            read_only: true,
            idempotent: true,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<McpTool>,
    allowlist: HashMap<String, ToolIndexEntry>,
}

impl ToolRegistry {
    pub fn load() -> anyhow::Result<Self> {
        let mut tools = Vec::new();
        let mut allowlist = HashMap::new();

        for spec in tool_specs() {
            if allowlist
                .insert(
                    spec.name.to_string(),
                    ToolIndexEntry {
                        socket_method: spec.socket_method.to_string(),
                    },
                )
                .is_some()
            {
                anyhow::bail!("duplicate MCP tool name: {}", spec.name);
            }

            tools.push(McpTool {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                input_schema: (spec.input_schema)(),
                annotations: Some(ToolAnnotations {
                    read_only_hint: Some(spec.read_only),
                    destructive_hint: Some(false),
                    idempotent_hint: Some(spec.idempotent),
                    open_world_hint: Some(true),
                }),
            });
        }

        tools.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { tools, allowlist })
    }

    pub fn list_response(&self) -> ToolsListResponse {
        ToolsListResponse {
            tools: self.tools.clone(),
            next_cursor: None,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        let Some(entry) = self.allowlist.get(name) else {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        };

        debug!("Forwarding {} to {}", name, entry.socket_method);

        let mut client = SocketClient::connect()
            .await
            .map_err(|e| ToolCallError::Upstream(format!("socket connect failed: {}", e)))?;

        let mut req = SocketRequest::new(entry.socket_method.clone(), arguments);
        req.id = Some(json!(1));
        let resp = client
            .call(req)
            .await
            .map_err(|e| ToolCallError::Upstream(format!("socket call failed: {}", e)))?;

        if let Some(err) = resp.error {
            return Ok(ToolsCallResponse {
                content: vec![ToolContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string(&json!({"error": err})).unwrap_or_else(|_| "{}".to_string()),
                }],
                is_error: true,
            });
        }

        Ok(ToolsCallResponse {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: serde_json::to_string(&resp.result.unwrap_or(Value::Null))
                    .unwrap_or_else(|_| "null".to_string()),
            }],
            is_error: false,
        })
    }
}

#[derive(Debug)]
pub enum ToolCallError {
    UnknownTool(String),
    Upstream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_all_drive_tools() {
        let registry = ToolRegistry::load().unwrap();
        let listed = registry.list_response();

        assert_eq!(listed.tools.len(), 8);
        let names: Vec<&str> = listed.tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"drive_resolve_folder"));
        assert!(names.contains(&"drive_file_download"));
        // Sorted for stable tools/list output.
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn every_tool_maps_to_a_drive_method() {
        let registry = ToolRegistry::load().unwrap();
        for tool in &registry.list_response().tools {
            let entry = registry.allowlist.get(&tool.name).unwrap();
            assert!(entry.socket_method.starts_with("drive."));
        }
    }

    #[test]
    fn mutating_tools_carry_write_hints() {
        let registry = ToolRegistry::load().unwrap();
        let resolve = registry
            .list_response()
            .tools
            .into_iter()
            .find(|t| t.name == "drive_resolve_folder")
            .unwrap();
        let annotations = resolve.annotations.unwrap();
        assert_eq!(annotations.read_only_hint, Some(false));
        assert_eq!(annotations.idempotent_hint, Some(true));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_before_connecting() {
        let registry = ToolRegistry::load().unwrap();
        let err = registry.call_tool("drive_folder_delete", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolCallError::UnknownTool(_)));
    }
}
