//! Google Drive API Client Module
//!
//! Authenticated HTTP access to the Drive v3 REST API plus the
//! folder-resolution protocol built on top of it.

pub mod client;
pub mod drive;
pub mod query;
pub mod resolver;

pub use drive::DriveApi;
pub use resolver::{FolderRef, FolderResolver, FolderStore, ParentScope};
