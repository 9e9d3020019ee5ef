use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::errors::Result;
use crate::models::{DavResource, Existence, LockToken};

/// Response body of a GET, read incrementally as it arrives
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Single-request WebDAV operations addressed by base-relative resource paths.
///
/// Implementations never create missing parents, never retry and never
/// check preconditions on the caller's behalf. That is the orchestrator's
/// job (see [`WebDAVService`](super::service::WebDAVService)).
#[async_trait]
pub trait WebDAVTransport: Send + Sync {
    /// Probe a resource. Never fails; transport errors become `Existence::Unknown`.
    async fn check_existence(&self, path: &str) -> Existence;

    /// `check_existence` folded to a bool, `Unknown` counting as absent
    async fn exists(&self, path: &str) -> bool {
        self.check_existence(path).await.is_present()
    }

    /// The resource itself followed by its immediate children
    async fn list(&self, path: &str) -> Result<Vec<DavResource>>;

    /// Create a single collection; the parent must already exist
    async fn create_directory(&self, path: &str) -> Result<()>;

    /// Delete a collection and everything below it
    async fn delete_directory(&self, path: &str) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Create or overwrite a resource with everything `content` yields until EOF
    async fn put(&self, path: &str, content: &mut (dyn AsyncRead + Send + Unpin)) -> Result<()>;

    /// Open the content of a resource for reading
    async fn get(&self, path: &str) -> Result<ByteStream>;

    async fn copy(&self, source: &str, destination: &str, overwrite: bool) -> Result<()>;

    async fn move_resource(&self, source: &str, destination: &str, overwrite: bool) -> Result<()>;

    /// Take an exclusive write lock
    async fn lock(&self, path: &str) -> Result<LockToken>;

    async fn unlock(&self, path: &str, token: &LockToken) -> Result<()>;

    /// Renew a lock, returning the token the server now associates with it
    async fn refresh_lock(&self, path: &str, token: &LockToken) -> Result<LockToken>;
}
