use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::errors::{Result, WebDAVError};
use crate::models::{
    DavResource, Existence, FileSummary, LockToken, ResourceDescription, TransferOutcome,
};

use super::config::WebDAVConfig;
use super::connection::WebDAVConnection;
use super::paths;
use super::transport::{ByteStream, WebDAVTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferKind {
    Copy,
    Move,
}

impl TransferKind {
    fn verb(self) -> &'static str {
        match self {
            TransferKind::Copy => "Copy",
            TransferKind::Move => "Move",
        }
    }
}

/// Path-aware WebDAV operations on top of a [`WebDAVTransport`].
///
/// The service keeps no state between calls. Every operation issues its
/// transport requests one at a time, and existence checks run as separate
/// round-trips before the mutation they gate.
pub struct WebDAVService<T: WebDAVTransport = WebDAVConnection> {
    transport: Arc<T>,
}

impl WebDAVService<WebDAVConnection> {
    /// Creates a service talking HTTP to the configured server
    pub fn connect(config: WebDAVConfig) -> Result<Self> {
        Ok(Self::new(WebDAVConnection::new(config)?))
    }
}

impl<T: WebDAVTransport> WebDAVService<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.transport.exists(&paths::normalize(path)).await
    }

    /// Like `exists`, but keeps "could not check" apart from "absent"
    pub async fn check_existence(&self, path: &str) -> Existence {
        self.transport.check_existence(&paths::normalize(path)).await
    }

    /// Names of the immediate children of a directory
    pub async fn list_folder(&self, path: &str) -> Result<Vec<String>> {
        let path = paths::normalize(path);
        info!("📁 Listing all resources under '{}'", path);

        let entries = self.transport.list(&path).await?;
        Ok(Self::children(&path, entries)
            .into_iter()
            .map(|child| child.name)
            .collect())
    }

    /// Creates every missing directory of `path`, parent before child.
    ///
    /// A failed create propagates immediately and leaves the ancestors created
    /// so far in place; calling again resumes where it stopped.
    pub async fn ensure_directory_chain(&self, path: &str) -> Result<()> {
        for ancestor in paths::ancestor_chain(path) {
            if self.transport.exists(&ancestor).await {
                continue;
            }
            debug!("Creating missing directory '{}'", ancestor);
            self.transport.create_directory(&ancestor).await?;
        }
        Ok(())
    }

    /// Creates a directory together with any missing parents
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        info!("📁 Create directory '{}'", path);
        self.ensure_directory_chain(path).await
    }

    /// Deletes a directory and its content; absent directories are left alone
    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        let path = paths::normalize(path);
        info!("🗑️ Delete directory '{}'", path);

        if !self.transport.exists(&path).await {
            debug!("Directory '{}' does not exist, nothing to delete", path);
            return Ok(());
        }
        self.transport.delete_directory(&path).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let path = paths::normalize(path);
        info!("🗑️ Delete file '{}'", path);

        if !self.transport.exists(&path).await {
            return Err(WebDAVError::not_found(path));
        }
        self.transport.delete_file(&path).await
    }

    /// Uploads `content` to `path`, creating missing parent directories first.
    ///
    /// Existing content is overwritten. The reader stays owned by the caller.
    pub async fn upload_file(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<()> {
        let path = paths::normalize(path);
        info!("⬆️ Upload file to '{}'", path);

        if paths::is_root(&path) {
            return Err(WebDAVError::invalid_request("Cannot upload content to the root collection"));
        }

        if let Some(parent) = paths::parent_directory(&path) {
            self.ensure_directory_chain(parent).await?;
        }
        self.transport.put(&path, content).await
    }

    pub async fn upload_bytes(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut reader = content;
        self.upload_file(path, &mut reader).await
    }

    /// Opens a file for reading without buffering its content
    pub async fn download_stream(&self, path: &str) -> Result<ByteStream> {
        let path = paths::normalize(path);
        info!("⬇️ Download file from '{}'", path);

        if !self.transport.exists(&path).await {
            return Err(WebDAVError::not_found(path));
        }
        self.transport.get(&path).await
    }

    /// Downloads a whole file into memory
    pub async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.download_stream(path).await?;
        let mut content = Vec::new();
        stream.read_to_end(&mut content).await?;
        Ok(content)
    }

    pub async fn get_file_as_string(&self, path: &str) -> Result<String> {
        let content = self.download_file(path).await?;
        String::from_utf8(content).map_err(|_| WebDAVError::InvalidUtf8 {
            path: paths::normalize(path),
        })
    }

    /// Server-side copy that creates the destination's parent directories
    pub async fn copy(&self, source: &str, destination: &str, overwrite: bool) -> Result<TransferOutcome> {
        self.transfer(TransferKind::Copy, source, destination, overwrite).await
    }

    /// Server-side move that creates the destination's parent directories
    pub async fn move_resource(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<TransferOutcome> {
        self.transfer(TransferKind::Move, source, destination, overwrite).await
    }

    async fn transfer(
        &self,
        kind: TransferKind,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<TransferOutcome> {
        let source = paths::normalize(source);
        let destination = paths::normalize(destination);
        info!("{} from '{}' to '{}'", kind.verb(), source, destination);

        if !self.transport.exists(&source).await {
            warn!("'{}' does not exist, skipping {}", source, kind.verb().to_lowercase());
            return Ok(TransferOutcome::SourceMissing);
        }

        if !overwrite && self.transport.exists(&destination).await {
            warn!("'{}' already exists, skipping {}", destination, kind.verb().to_lowercase());
            return Ok(TransferOutcome::DestinationExists);
        }

        // Destinations directly under the root have nothing to create
        if let Some(parent) = paths::parent_directory(&destination) {
            self.ensure_directory_chain(parent).await?;
        }

        match kind {
            TransferKind::Copy => self.transport.copy(&source, &destination, overwrite).await?,
            TransferKind::Move => {
                self.transport
                    .move_resource(&source, &destination, overwrite)
                    .await?
            }
        }

        Ok(TransferOutcome::Completed)
    }

    /// Deletes every immediate child of `dir` that still exists.
    ///
    /// Directories are removed with their content by the server. Not
    /// transactional: children deleted before a failure stay deleted.
    /// Returns the number of children deleted.
    pub async fn cleanup_directory(&self, dir: &str) -> Result<usize> {
        let dir = paths::normalize(dir);
        info!("🧹 Cleaning up all resources under '{}'", dir);

        let entries = self.transport.list(&dir).await?;
        let mut deleted = 0;

        for child in Self::children(&dir, entries) {
            if !self.transport.exists(&child.path).await {
                continue;
            }

            if child.is_directory() {
                self.transport.delete_directory(&child.path).await?;
            } else {
                self.transport.delete_file(&child.path).await?;
            }
            deleted += 1;
        }

        info!("🧹 Deleted {} resources under '{}'", deleted, dir);
        Ok(deleted)
    }

    /// Summary of a file, or the child names of a directory
    pub async fn describe(&self, path: &str) -> Result<ResourceDescription> {
        let path = paths::normalize(path);
        info!("📋 Get description for '{}'", path);

        let entries = match self.transport.list(&path).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(ResourceDescription::Empty),
            Err(e) => return Err(e),
        };

        if entries.is_empty() {
            return Ok(ResourceDescription::Empty);
        }

        let target = entries.iter().position(|entry| entry.path == path);
        match target {
            Some(idx) if entries[idx].is_file() => {
                Ok(ResourceDescription::File(Self::summarize(&path, &entries[idx])))
            }
            Some(_) => Ok(ResourceDescription::Directory(
                Self::children(&path, entries)
                    .into_iter()
                    .map(|child| child.name)
                    .collect(),
            )),
            // The server did not echo the target itself; fall back to the entry count
            None if entries.len() > 1 => Ok(ResourceDescription::Directory(
                entries.into_iter().map(|entry| entry.name).collect(),
            )),
            None => Ok(ResourceDescription::File(Self::summarize(&path, &entries[0]))),
        }
    }

    /// Takes a write lock; `None` when the resource does not exist
    pub async fn lock(&self, path: &str) -> Result<Option<LockToken>> {
        let path = paths::normalize(path);
        info!("🔒 Lock file '{}'", path);

        if !self.transport.exists(&path).await {
            warn!("'{}' does not exist, nothing to lock", path);
            return Ok(None);
        }

        let token = self.transport.lock(&path).await?;
        info!("🔒 Token of file '{}': {}", path, token);
        Ok(Some(token))
    }

    pub async fn unlock(&self, path: &str, token: &LockToken) -> Result<()> {
        let path = paths::normalize(path);
        info!("🔓 Unlock file '{}' with token {}", path, token);

        if !self.transport.exists(&path).await {
            warn!("'{}' does not exist, nothing to unlock", path);
            return Ok(());
        }
        self.transport.unlock(&path, token).await
    }

    pub async fn refresh_lock(&self, path: &str, token: &LockToken) -> Result<Option<LockToken>> {
        let path = paths::normalize(path);
        info!("🔒 Refresh lock for file '{}' with token {}", path, token);

        if !self.transport.exists(&path).await {
            warn!("'{}' does not exist, nothing to refresh", path);
            return Ok(None);
        }
        self.transport.refresh_lock(&path, token).await.map(Some)
    }

    /// Listing entries minus the listed resource itself
    fn children(path: &str, entries: Vec<DavResource>) -> Vec<DavResource> {
        entries
            .into_iter()
            .filter(|entry| entry.path != path)
            .collect()
    }

    fn summarize(path: &str, entry: &DavResource) -> FileSummary {
        FileSummary {
            file_name: path.to_string(),
            created_at: entry.created_at,
            last_modified: entry.last_modified,
            content_type: entry.content_type.clone(),
            content_length: entry.content_length,
        }
    }
}

impl<T: WebDAVTransport> Clone for WebDAVService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}
