//! Path-aware WebDAV resource management.
//!
//! [`WebDAVService`] turns filesystem-style requests (upload into a nested
//! path, copy into a directory that does not exist yet, clean up a folder)
//! into sequences of single WebDAV requests issued through a
//! [`WebDAVTransport`]. [`WebDAVConnection`] is the HTTP transport.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod webdav_xml_parser;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use errors::{Result, WebDAVError};
pub use models::{
    DavResource, Existence, FileSummary, LockToken, ResourceDescription, ResourceKind,
    TransferOutcome, WebDAVConnectionResult,
};
pub use services::webdav::{
    ByteStream, ServerType, WebDAVConfig, WebDAVConnection, WebDAVService, WebDAVTransport,
    WebDAVUrlManager,
};
