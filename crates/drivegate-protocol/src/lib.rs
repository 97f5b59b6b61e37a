pub mod client;
pub mod jsonrpc;

pub use client::SocketClient;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
