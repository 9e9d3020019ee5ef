use anyhow::{Context, Result};
use std::env;

use crate::services::webdav::{ServerType, WebDAVConfig};

#[derive(Clone, Debug)]
pub struct Config {
    pub webdav_base_url: String,
    pub webdav_username: String,
    pub webdav_password: String,
    pub timeout_seconds: u64,
    pub server_type: ServerType,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            webdav_base_url: env::var("WEBDAV_BASE_URL")
                .unwrap_or_else(|_| "http://localhost/webdav/".to_string()),
            webdav_username: env::var("WEBDAV_USERNAME").unwrap_or_default(),
            webdav_password: env::var("WEBDAV_PASSWORD").unwrap_or_default(),
            timeout_seconds: match env::var("WEBDAV_TIMEOUT_SECONDS") {
                Ok(value) => value
                    .parse()
                    .with_context(|| format!("WEBDAV_TIMEOUT_SECONDS must be a number, got '{}'", value))?,
                Err(_) => 30,
            },
            server_type: env::var("WEBDAV_SERVER_TYPE")
                .unwrap_or_default()
                .parse()
                .context("Invalid WEBDAV_SERVER_TYPE")?,
        })
    }

    pub fn webdav_config(&self) -> WebDAVConfig {
        WebDAVConfig::new(
            self.webdav_base_url.clone(),
            self.webdav_username.clone(),
            self.webdav_password.clone(),
        )
        .with_timeout_seconds(self.timeout_seconds)
        .with_server_type(self.server_type)
    }
}
