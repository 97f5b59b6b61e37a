//! Folder resolution with idempotent creation.
//!
//! Every write that addresses a parent folder by name goes through
//! `resolve_or_create`: look the folder up under its parent scope, create it
//! only on a miss, and hand back its id. The lookup-then-create pair is not
//! atomic against the backend — Drive offers no create-if-absent primitive —
//! so two *processes* racing on the same `(name, parent)` can still both
//! create a folder. Within one process, calls for the same pair are
//! serialized through a keyed async lock, so at most one folder is created
//! no matter how many concurrent requests resolve the same pair.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::DriveError;

/// A resolved folder. `id` is assigned by Drive and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    pub parent_id: String,
}

/// Parent context for a lookup or creation. `Root` means the Drive root;
/// lookups under root are unconstrained by parent, matching the backend's
/// convention of omitting the parent clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentScope {
    Root,
    Folder(String),
}

impl ParentScope {
    /// Interpret a caller-supplied parent id. Empty and the literal "root"
    /// both mean the root scope.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() || raw == "root" {
            ParentScope::Root
        } else {
            ParentScope::Folder(raw.to_string())
        }
    }

    /// The id to report (and send as `parents`) for this scope.
    pub fn as_parent_id(&self) -> &str {
        match self {
            ParentScope::Root => "root",
            ParentScope::Folder(id) => id.as_str(),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ParentScope::Root)
    }
}

impl fmt::Display for ParentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_parent_id())
    }
}

/// Backend operations the resolver needs. `DriveApi` implements this against
/// Drive; tests implement it in memory.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Find a non-trashed folder with exactly this name under the scope.
    /// Requests a single result; among same-named siblings the backend's
    /// first match wins, and that ordering is backend-defined.
    async fn lookup(&self, name: &str, parent: &ParentScope) -> Result<Option<FolderRef>, DriveError>;

    /// Create a folder with this name under the scope.
    async fn create(&self, name: &str, parent: &ParentScope) -> Result<FolderRef, DriveError>;
}

// Handlers build one store per request but borrow it for resolution, so a
// reference to a store is itself a store.
#[async_trait]
impl<T: FolderStore> FolderStore for &T {
    async fn lookup(&self, name: &str, parent: &ParentScope) -> Result<Option<FolderRef>, DriveError> {
        (**self).lookup(name, parent).await
    }

    async fn create(&self, name: &str, parent: &ParentScope) -> Result<FolderRef, DriveError> {
        (**self).create(name, parent).await
    }
}

/// Async locks keyed by `(name, parent)`. One instance is shared across all
/// handler invocations so concurrent resolutions of the same pair queue up.
#[derive(Default)]
pub struct ResolutionLocks {
    inner: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl ResolutionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, name: &str, parent: &ParentScope) -> OwnedMutexGuard<()> {
        let key = (name.to_string(), parent.as_parent_id().to_string());
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

/// Resolves folder names to ids, creating on miss.
pub struct FolderResolver<S> {
    store: S,
    locks: Arc<ResolutionLocks>,
}

impl<S: FolderStore> FolderResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Arc::new(ResolutionLocks::new()),
        }
    }

    /// Share a lock set with other resolver instances (one store per
    /// request, one lock set per process).
    pub fn with_locks(store: S, locks: Arc<ResolutionLocks>) -> Self {
        Self { store, locks }
    }

    /// Resolve `name` under `parent`, creating the folder if absent.
    ///
    /// At most one folder is created per call. A successful return is always
    /// a folder that was either found or confirmed created — there is no
    /// "maybe created" outcome. Duplicate names under one parent resolve to
    /// whichever match the backend returns first.
    pub async fn resolve_or_create(
        &self,
        name: &str,
        parent: &ParentScope,
    ) -> Result<FolderRef, DriveError> {
        if name.is_empty() {
            return Err(DriveError::InvalidArgument(
                "folder name is required".to_string(),
            ));
        }

        let _guard = self.locks.acquire(name, parent).await;

        if let Some(found) = self.store.lookup(name, parent).await? {
            debug!("Folder '{}' already exists under {} as {}", name, parent, found.id);
            return Ok(found);
        }

        info!("Creating folder '{}' under {}", name, parent);
        self.store.create(name, parent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store counting backend calls.
    #[derive(Default)]
    struct MemoryStore {
        folders: Mutex<Vec<FolderRef>>,
        lookups: AtomicUsize,
        creates: AtomicUsize,
    }

    impl MemoryStore {
        async fn seed(&self, id: &str, name: &str, parent_id: &str) {
            self.folders.lock().await.push(FolderRef {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
    }

    #[async_trait]
    impl FolderStore for MemoryStore {
        async fn lookup(
            &self,
            name: &str,
            parent: &ParentScope,
        ) -> Result<Option<FolderRef>, DriveError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let folders = self.folders.lock().await;
            Ok(folders
                .iter()
                .find(|f| {
                    f.name == name
                        && match parent {
                            // Root lookups carry no parent constraint.
                            ParentScope::Root => true,
                            ParentScope::Folder(id) => &f.parent_id == id,
                        }
                })
                .cloned())
        }

        async fn create(&self, name: &str, parent: &ParentScope) -> Result<FolderRef, DriveError> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            let folder = FolderRef {
                id: format!("created-{}", n),
                name: name.to_string(),
                parent_id: parent.as_parent_id().to_string(),
            };
            self.folders.lock().await.push(folder.clone());
            Ok(folder)
        }
    }

    #[tokio::test]
    async fn sequential_calls_are_idempotent() {
        let store = MemoryStore::default();
        let resolver = FolderResolver::new(&store);

        let first = resolver
            .resolve_or_create("Q3", &ParentScope::Folder("F123".to_string()))
            .await
            .unwrap();
        let second = resolver
            .resolve_or_create("Q3", &ParentScope::Folder("F123".to_string()))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn existing_folder_skips_the_create_call() {
        let store = MemoryStore::default();
        store.seed("R1", "Reports", "root").await;
        let resolver = FolderResolver::new(&store);

        let found = resolver
            .resolve_or_create("Reports", &ParentScope::Root)
            .await
            .unwrap();

        assert_eq!(found.id, "R1");
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_issues_exactly_one_create_under_the_parent() {
        let store = MemoryStore::default();
        let resolver = FolderResolver::new(&store);

        let created = resolver
            .resolve_or_create("Q3", &ParentScope::Folder("F123".to_string()))
            .await
            .unwrap();

        assert_eq!(created.parent_id, "F123");
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_name_fails_before_any_backend_call() {
        let store = MemoryStore::default();
        let resolver = FolderResolver::new(&store);

        let err = resolver
            .resolve_or_create("", &ParentScope::Root)
            .await
            .unwrap_err();

        assert!(matches!(err, DriveError::InvalidArgument(_)));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn name_under_a_different_parent_is_a_miss_not_an_error() {
        let store = MemoryStore::default();
        store.seed("E1", "Existing", "Other").await;
        let resolver = FolderResolver::new(&store);

        let resolved = resolver
            .resolve_or_create("Existing", &ParentScope::Folder("WrongParent".to_string()))
            .await
            .unwrap();

        assert_ne!(resolved.id, "E1");
        assert_eq!(resolved.parent_id, "WrongParent");
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_same_pair_calls_create_exactly_one_folder() {
        let store: &'static MemoryStore = Box::leak(Box::new(MemoryStore::default()));
        let resolver = Arc::new(FolderResolver::new(store));

        let a = Arc::clone(&resolver);
        let b = Arc::clone(&resolver);
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.resolve_or_create("Dup", &ParentScope::Root).await }),
            tokio::spawn(async move { b.resolve_or_create("Dup", &ParentScope::Root).await }),
        );

        let ra = ra.unwrap().unwrap();
        let rb = rb.unwrap().unwrap();
        assert_eq!(ra.id, rb.id);
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_pairs_do_not_block_each_other() {
        let store = MemoryStore::default();
        let resolver = FolderResolver::new(&store);

        let one = resolver
            .resolve_or_create("A", &ParentScope::Root)
            .await
            .unwrap();
        let two = resolver
            .resolve_or_create("A", &ParentScope::Folder("F1".to_string()))
            .await
            .unwrap();

        assert_ne!(one.id, two.id);
        assert_eq!(store.creates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parent_scope_parsing() {
        assert_eq!(ParentScope::parse(""), ParentScope::Root);
        assert_eq!(ParentScope::parse("root"), ParentScope::Root);
        assert_eq!(
            ParentScope::parse("F123"),
            ParentScope::Folder("F123".to_string())
        );
        assert_eq!(ParentScope::parse("F123").as_parent_id(), "F123");
        assert_eq!(ParentScope::Root.as_parent_id(), "root");
    }
}
