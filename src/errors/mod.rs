use thiserror::Error;

/// Errors surfaced by WebDAV transports and the path orchestrator
#[derive(Error, Debug)]
pub enum WebDAVError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} failed with status {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("XML parsing error: {details}")]
    Xml { details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid WebDAV configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Content of '{path}' is not valid UTF-8")]
    InvalidUtf8 { path: String },

    #[error("Server returned no lock token for '{path}'")]
    MissingLockToken { path: String },

    #[error("Invalid request: {details}")]
    InvalidRequest { details: String },
}

impl WebDAVError {
    /// Stable error code for callers that branch on the failure kind
    pub fn error_code(&self) -> &'static str {
        match self {
            WebDAVError::Http(_) => "WEBDAV_HTTP",
            WebDAVError::Status { .. } => "WEBDAV_STATUS",
            WebDAVError::NotFound { .. } => "WEBDAV_NOT_FOUND",
            WebDAVError::Xml { .. } => "WEBDAV_XML",
            WebDAVError::Io(_) => "WEBDAV_IO",
            WebDAVError::InvalidConfig { .. } => "WEBDAV_INVALID_CONFIG",
            WebDAVError::InvalidUtf8 { .. } => "WEBDAV_INVALID_UTF8",
            WebDAVError::MissingLockToken { .. } => "WEBDAV_MISSING_LOCK_TOKEN",
            WebDAVError::InvalidRequest { .. } => "WEBDAV_INVALID_REQUEST",
        }
    }

    /// Whether the failure means the target resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            WebDAVError::NotFound { .. } => true,
            WebDAVError::Status { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// Utility functions for common error creation patterns
impl WebDAVError {
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn xml<S: Into<String>>(details: S) -> Self {
        Self::Xml { details: details.into() }
    }

    pub fn invalid_request<S: Into<String>>(details: S) -> Self {
        Self::InvalidRequest { details: details.into() }
    }

    pub fn invalid_config<S: Into<String>>(details: S) -> Self {
        Self::InvalidConfig { details: details.into() }
    }

    pub fn status<M: Into<String>, U: Into<String>, S: Into<String>>(
        method: M,
        url: U,
        status: u16,
        message: S,
    ) -> Self {
        Self::Status {
            method: method.into(),
            url: url.into(),
            status,
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for WebDAVError {
    fn from(e: quick_xml::Error) -> Self {
        Self::xml(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WebDAVError>;
