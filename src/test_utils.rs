//! In-memory WebDAV transport for unit and integration tests
//!
//! `MemoryTransport` keeps a resource tree in a map keyed by resource path
//! and answers the way a strict WebDAV server would: MKCOL needs an existing
//! parent, PUT needs an existing parent collection, COPY/MOVE honour the
//! overwrite flag. Every call is recorded so tests can assert on the exact
//! request sequence an orchestrator operation produced.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{Result, WebDAVError};
use crate::models::{DavResource, Existence, LockToken, ResourceKind};
use crate::services::webdav::paths;
use crate::services::webdav::{ByteStream, WebDAVTransport};

/// A request received by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CheckExistence(String),
    List(String),
    CreateDirectory(String),
    DeleteDirectory(String),
    DeleteFile(String),
    Put(String),
    Get(String),
    Copy { source: String, destination: String, overwrite: bool },
    Move { source: String, destination: String, overwrite: bool },
    Lock(String),
    Unlock(String),
    RefreshLock(String),
}

impl TransportCall {
    /// Whether the call changes server state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            TransportCall::CheckExistence(_) | TransportCall::List(_) | TransportCall::Get(_)
        )
    }
}

#[derive(Debug, Clone)]
enum Node {
    Directory {
        created_at: DateTime<Utc>,
    },
    File {
        content: Vec<u8>,
        content_type: String,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    locks: HashMap<String, String>,
    calls: Vec<TransportCall>,
    failures: Vec<TransportCall>,
    next_lock: u64,
}

impl State {
    fn record(&mut self, call: TransportCall) -> Result<()> {
        let injected = self.failures.contains(&call);
        let description = format!("{:?}", call);
        self.calls.push(call);
        if injected {
            return Err(WebDAVError::status("MEMORY", description, 500, "Injected failure"));
        }
        Ok(())
    }

    fn holds_lock(&self, path: &str, token: &LockToken) -> bool {
        self.locks.get(path).map(|held| held == token.as_str()).unwrap_or(false)
    }

    fn is_directory(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Directory { .. }))
    }

    fn parent_exists(&self, path: &str) -> bool {
        self.is_directory(paths::parent_directory(path).unwrap_or(""))
    }

    /// Keys of `path` and everything below it
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path);
        self.nodes
            .keys()
            .filter(|key| {
                key.as_str() == path || path.is_empty() || key.starts_with(&prefix)
            })
            .cloned()
            .collect()
    }

    fn remove_subtree(&mut self, path: &str) {
        for key in self.subtree(path) {
            if !key.is_empty() {
                self.nodes.remove(&key);
                self.locks.remove(&key);
            }
        }
    }

    fn resource(&self, path: &str, node: &Node) -> DavResource {
        let (kind, created_at, last_modified, content_type, content_length) = match node {
            Node::Directory { created_at } => {
                (ResourceKind::Directory, Some(*created_at), Some(*created_at), None, None)
            }
            Node::File {
                content,
                content_type,
                created_at,
                modified_at,
            } => (
                ResourceKind::File,
                Some(*created_at),
                Some(*modified_at),
                Some(content_type.clone()),
                Some(content.len() as u64),
            ),
        };

        DavResource {
            href: format!("/memory/{}", path),
            path: path.to_string(),
            name: paths::file_name(path).to_string(),
            kind,
            created_at,
            last_modified,
            content_type,
            content_length,
            etag: None,
        }
    }

    fn transfer(&mut self, source: &str, destination: &str, overwrite: bool, remove_source: bool) -> Result<()> {
        if source.is_empty() || destination.is_empty() {
            return Err(WebDAVError::status("COPY", destination, 403, "Forbidden"));
        }
        if !self.nodes.contains_key(source) {
            return Err(WebDAVError::not_found(source));
        }
        if self.nodes.contains_key(destination) {
            if !overwrite {
                return Err(WebDAVError::status("COPY", destination, 412, "Precondition Failed"));
            }
            self.remove_subtree(destination);
        }
        if !self.parent_exists(destination) {
            return Err(WebDAVError::status("COPY", destination, 409, "Conflict"));
        }

        let copied: Vec<(String, Node)> = self
            .subtree(source)
            .into_iter()
            .filter_map(|key| {
                let node = self.nodes.get(&key)?.clone();
                let rebased = format!("{}{}", destination, &key[source.len()..]);
                Some((rebased, node))
            })
            .collect();

        if remove_source {
            self.remove_subtree(source);
        }
        self.nodes.extend(copied);
        Ok(())
    }
}

/// WebDAV server kept in memory
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(String::new(), Node::Directory { created_at: Utc::now() });
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-call
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seeds a directory and its ancestors without recording calls
    pub fn with_directory(self, path: &str) -> Self {
        {
            let mut state = self.state();
            for ancestor in paths::ancestor_chain(path) {
                state
                    .nodes
                    .entry(ancestor)
                    .or_insert(Node::Directory { created_at: Utc::now() });
            }
        }
        self
    }

    /// Seeds a file and its parent directories without recording calls
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        let path = paths::normalize(path);
        let this = match paths::parent_directory(&path) {
            Some(parent) => self.with_directory(parent),
            None => self,
        };
        {
            let now = Utc::now();
            let mut state = this.state();
            state.nodes.insert(
                path.clone(),
                Node::File {
                    content: content.to_vec(),
                    content_type: mime_guess::from_path(&path).first_or_octet_stream().to_string(),
                    created_at: now,
                    modified_at: now,
                },
            );
        }
        this
    }

    /// Makes the given call fail with a 500; existence probes report `Unknown`
    pub fn fail_on(&self, call: TransportCall) {
        self.state().failures.push(call);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn mutations(&self) -> Vec<TransportCall> {
        self.calls().into_iter().filter(|call| call.is_mutation()).collect()
    }

    /// Paths passed to `create_directory`, in call order
    pub fn created_directories(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::CreateDirectory(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state().nodes.contains_key(&paths::normalize(path))
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.state().is_directory(&paths::normalize(path))
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.state().nodes.get(&paths::normalize(path)) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.state().locks.contains_key(&paths::normalize(path))
    }
}

#[async_trait]
impl WebDAVTransport for MemoryTransport {
    async fn check_existence(&self, path: &str) -> Existence {
        let mut state = self.state();
        if state.record(TransportCall::CheckExistence(path.to_string())).is_err() {
            return Existence::Unknown("Injected failure".to_string());
        }
        if state.nodes.contains_key(path) {
            Existence::Exists
        } else {
            Existence::Absent
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<DavResource>> {
        let mut state = self.state();
        state.record(TransportCall::List(path.to_string()))?;

        let node = state
            .nodes
            .get(path)
            .ok_or_else(|| WebDAVError::not_found(path))?;
        let mut entries = vec![state.resource(path, node)];

        if matches!(node, Node::Directory { .. }) {
            entries.extend(
                state
                    .nodes
                    .iter()
                    .filter(|(key, _)| !key.is_empty() && paths::parent_directory(key).unwrap_or("") == path)
                    .map(|(key, child)| state.resource(key, child)),
            );
        }

        Ok(entries)
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::CreateDirectory(path.to_string()))?;

        if state.nodes.contains_key(path) {
            return Err(WebDAVError::status("MKCOL", path, 405, "Method Not Allowed"));
        }
        if !state.parent_exists(path) {
            return Err(WebDAVError::status("MKCOL", path, 409, "Conflict"));
        }
        state
            .nodes
            .insert(path.to_string(), Node::Directory { created_at: Utc::now() });
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::DeleteDirectory(path.to_string()))?;

        if path.is_empty() {
            return Err(WebDAVError::status("DELETE", path, 403, "Forbidden"));
        }
        if !state.is_directory(path) {
            return Err(WebDAVError::not_found(path));
        }
        state.remove_subtree(path);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::DeleteFile(path.to_string()))?;

        if state.is_directory(path) {
            return Err(WebDAVError::status("DELETE", path, 409, "Conflict"));
        }
        if state.nodes.remove(path).is_none() {
            return Err(WebDAVError::not_found(path));
        }
        state.locks.remove(path);
        Ok(())
    }

    async fn put(&self, path: &str, content: &mut (dyn AsyncRead + Send + Unpin)) -> Result<()> {
        let mut body = Vec::new();
        content.read_to_end(&mut body).await?;

        let mut state = self.state();
        state.record(TransportCall::Put(path.to_string()))?;

        if state.is_directory(path) {
            return Err(WebDAVError::status("PUT", path, 405, "Method Not Allowed"));
        }
        if !state.parent_exists(path) {
            return Err(WebDAVError::status("PUT", path, 409, "Conflict"));
        }

        let now = Utc::now();
        let created_at = match state.nodes.get(path) {
            Some(Node::File { created_at, .. }) => *created_at,
            _ => now,
        };
        state.nodes.insert(
            path.to_string(),
            Node::File {
                content: body,
                content_type: mime_guess::from_path(path).first_or_octet_stream().to_string(),
                created_at,
                modified_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let mut state = self.state();
        state.record(TransportCall::Get(path.to_string()))?;

        match state.nodes.get(path) {
            Some(Node::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(Node::Directory { .. }) => Err(WebDAVError::status("GET", path, 405, "Method Not Allowed")),
            None => Err(WebDAVError::not_found(path)),
        }
    }

    async fn copy(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::Copy {
            source: source.to_string(),
            destination: destination.to_string(),
            overwrite,
        })?;
        state.transfer(source, destination, overwrite, false)
    }

    async fn move_resource(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::Move {
            source: source.to_string(),
            destination: destination.to_string(),
            overwrite,
        })?;
        state.transfer(source, destination, overwrite, true)
    }

    async fn lock(&self, path: &str) -> Result<LockToken> {
        let mut state = self.state();
        state.record(TransportCall::Lock(path.to_string()))?;

        if !state.nodes.contains_key(path) {
            return Err(WebDAVError::not_found(path));
        }
        if state.locks.contains_key(path) {
            return Err(WebDAVError::status("LOCK", path, 423, "Locked"));
        }

        state.next_lock += 1;
        let token = format!("opaquelocktoken:memory-{}", state.next_lock);
        state.locks.insert(path.to_string(), token.clone());
        Ok(LockToken::new(token))
    }

    async fn unlock(&self, path: &str, token: &LockToken) -> Result<()> {
        let mut state = self.state();
        state.record(TransportCall::Unlock(path.to_string()))?;

        if !state.holds_lock(path, token) {
            return Err(WebDAVError::status("UNLOCK", path, 409, "Conflict"));
        }
        state.locks.remove(path);
        Ok(())
    }

    async fn refresh_lock(&self, path: &str, token: &LockToken) -> Result<LockToken> {
        let mut state = self.state();
        state.record(TransportCall::RefreshLock(path.to_string()))?;

        if !state.holds_lock(path, token) {
            return Err(WebDAVError::status("LOCK", path, 412, "Precondition Failed"));
        }
        Ok(token.clone())
    }
}
