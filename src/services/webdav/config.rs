use std::str::FromStr;

use crate::errors::{Result, WebDAVError};

/// Server flavour, decides where the DAV root lives under the server URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerType {
    #[default]
    Generic,
    Nextcloud,
    OwnCloud,
}

impl FromStr for ServerType {
    type Err = WebDAVError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "generic" => Ok(ServerType::Generic),
            "nextcloud" => Ok(ServerType::Nextcloud),
            "owncloud" => Ok(ServerType::OwnCloud),
            other => Err(WebDAVError::invalid_config(format!(
                "Unknown server type '{}'. Valid types are: generic, nextcloud, owncloud",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerType::Generic => write!(f, "generic"),
            ServerType::Nextcloud => write!(f, "nextcloud"),
            ServerType::OwnCloud => write!(f, "owncloud"),
        }
    }
}

/// WebDAV server configuration
#[derive(Debug, Clone)]
pub struct WebDAVConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub server_type: ServerType,
}

impl WebDAVConfig {
    /// Creates a new WebDAV configuration for a generic server
    pub fn new(server_url: String, username: String, password: String) -> Self {
        Self {
            server_url,
            username,
            password,
            timeout_seconds: 30,
            server_type: ServerType::Generic,
        }
    }

    pub fn with_server_type(mut self, server_type: ServerType) -> Self {
        self.server_type = server_type;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(WebDAVError::invalid_config("Server URL cannot be empty"));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(WebDAVError::invalid_config(
                "Server URL must start with http:// or https://",
            ));
        }

        url::Url::parse(&self.server_url).map_err(|e| {
            WebDAVError::invalid_config(format!("Invalid server URL '{}': {}", self.server_url, e))
        })?;

        if self.server_type == ServerType::Nextcloud && self.username.is_empty() {
            return Err(WebDAVError::invalid_config(
                "Nextcloud servers need a username to locate the files root",
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(WebDAVError::invalid_config("Timeout must be at least one second"));
        }

        Ok(())
    }

    /// Returns the DAV root for this server, without a trailing slash
    pub fn webdav_url(&self) -> String {
        let mut url = self.server_url.trim_end_matches('/').to_string();

        match self.server_type {
            ServerType::Nextcloud => {
                if !url.contains("/remote.php/dav/files/") {
                    url.push_str(&format!("/remote.php/dav/files/{}", self.username));
                }
            }
            ServerType::OwnCloud => {
                if !url.contains("/remote.php/webdav") {
                    url.push_str("/remote.php/webdav");
                }
            }
            ServerType::Generic => {}
        }

        url
    }

    /// Whether the client should authenticate at all
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> WebDAVConfig {
        WebDAVConfig::new(url.to_string(), "admin".to_string(), "admin".to_string())
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(config("").validate().is_err());
        assert!(config("ftp://192.168.95.229/webdav/").validate().is_err());
        assert!(config("http://192.168.95.229/webdav/").validate().is_ok());
        assert!(config("http://host/dav").with_timeout_seconds(0).validate().is_err());
    }

    #[test]
    fn test_webdav_url_per_server_type() {
        let generic = config("http://192.168.95.229/webdav/");
        assert_eq!(generic.webdav_url(), "http://192.168.95.229/webdav");

        let nextcloud = config("https://cloud.example.com/").with_server_type(ServerType::Nextcloud);
        assert_eq!(
            nextcloud.webdav_url(),
            "https://cloud.example.com/remote.php/dav/files/admin"
        );

        let owncloud = config("https://oc.example.com").with_server_type(ServerType::OwnCloud);
        assert_eq!(owncloud.webdav_url(), "https://oc.example.com/remote.php/webdav");

        // Already pointing at the DAV root
        let explicit = config("https://oc.example.com/remote.php/webdav/").with_server_type(ServerType::OwnCloud);
        assert_eq!(explicit.webdav_url(), "https://oc.example.com/remote.php/webdav");
    }

    #[test]
    fn test_server_type_parsing() {
        assert_eq!("Nextcloud".parse::<ServerType>().unwrap(), ServerType::Nextcloud);
        assert_eq!("".parse::<ServerType>().unwrap(), ServerType::Generic);
        assert!("sharepoint".parse::<ServerType>().is_err());
    }
}
