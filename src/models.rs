use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceKind {
    #[serde(rename = "directory")]
    Directory,
    #[serde(rename = "file")]
    File,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Directory => write!(f, "directory"),
            ResourceKind::File => write!(f, "file"),
        }
    }
}

/// A single entry of a PROPFIND listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DavResource {
    /// href exactly as reported by the server
    pub href: String,
    /// Base-relative path without leading or trailing slash ("" is the root)
    pub path: String,
    pub name: String,
    pub kind: ResourceKind,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

impl DavResource {
    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }
}

/// Outcome of an existence probe.
///
/// Probes never fail: a transport error while probing is reported as
/// `Unknown` and default call sites treat it the same as `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Absent,
    Unknown(String),
}

impl Existence {
    pub fn is_present(&self) -> bool {
        matches!(self, Existence::Exists)
    }
}

/// Opaque lock token handed out by the server on LOCK
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a copy or move request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transport performed the copy or move
    #[serde(rename = "completed")]
    Completed,
    /// Nothing was done because the source does not exist
    #[serde(rename = "source_missing")]
    SourceMissing,
    /// Nothing was done because the destination exists and overwrite was off
    #[serde(rename = "destination_exists")]
    DestinationExists,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        *self == TransferOutcome::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSummary {
    pub file_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum ResourceDescription {
    Empty,
    Directory(Vec<String>),
    File(FileSummary),
}

fn display_or_null<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

impl std::fmt::Display for ResourceDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceDescription::Empty => Ok(()),
            ResourceDescription::Directory(names) => write!(f, "[{}]", names.join(", ")),
            ResourceDescription::File(summary) => {
                writeln!(f, "file_name: {}", summary.file_name)?;
                writeln!(f, "created_at: {}", display_or_null(&summary.created_at))?;
                writeln!(f, "last_modified: {}", display_or_null(&summary.last_modified))?;
                writeln!(f, "content_type: {}", display_or_null(&summary.content_type))?;
                writeln!(f, "content_length: {}", display_or_null(&summary.content_length))
            }
        }
    }
}

/// Result of probing a server with OPTIONS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDAVConnectionResult {
    pub success: bool,
    pub message: String,
    pub server_version: Option<String>,
    pub server_type: Option<String>,
}
