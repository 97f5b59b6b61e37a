use crate::protocol::{
    InitializeRequest, InitializeResponse, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
    ToolsCapabilities,
};

pub fn handle_initialize(_request: InitializeRequest) -> InitializeResponse {
    InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapabilities { list_changed: false },
        },
        server_info: ServerInfo {
            name: "drivegate-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: "Drivegate exposes Google Drive folder and file tools backed by a local \
                       daemon. Folder tools resolve parents by name idempotently, so repeated \
                       calls with the same name return the same folder."
            .to_string(),
    }
}
