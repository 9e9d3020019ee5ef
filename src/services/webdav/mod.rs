// WebDAV service modules organized by functionality

pub mod config;
pub mod connection;
pub mod paths;
pub mod service;
pub mod transport;
pub mod url_management;

// Re-export main types for convenience
pub use config::{ServerType, WebDAVConfig};
pub use connection::WebDAVConnection;
pub use service::WebDAVService;
pub use transport::{ByteStream, WebDAVTransport};
pub use url_management::WebDAVUrlManager;

// Test modules
#[cfg(test)]
mod tests;
