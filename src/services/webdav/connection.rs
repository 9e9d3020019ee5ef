use std::io;

use async_trait::async_trait;
use futures_util::{stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Body, Client, Method, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, WebDAVError};
use crate::models::{DavResource, Existence, LockToken, WebDAVConnectionResult};
use crate::webdav_xml_parser::{parse_lock_token, parse_propfind_response};
use super::config::WebDAVConfig;
use super::transport::{ByteStream, WebDAVTransport};
use super::url_management::WebDAVUrlManager;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:creationdate/>
        <D:getcontentlength/>
        <D:getcontenttype/>
        <D:getlastmodified/>
        <D:getetag/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
const UPLOAD_QUEUE_CHUNKS: usize = 4;

/// Requested lock lifetime, renewed by `refresh_lock`
const LOCK_TIMEOUT: &str = "Second-3600";

/// WebDAV transport over HTTP.
///
/// Each trait operation maps to exactly one request. Status codes are
/// interpreted here; nothing is retried.
#[derive(Clone)]
pub struct WebDAVConnection {
    client: Client,
    config: WebDAVConfig,
    urls: WebDAVUrlManager,
}

impl WebDAVConnection {
    pub fn new(config: WebDAVConfig) -> Result<Self> {
        // Validate configuration first
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        let urls = WebDAVUrlManager::new(&config);

        Ok(Self { client, config, urls })
    }

    /// Tests the connection with an OPTIONS request against the DAV root
    pub async fn test_connection(&self) -> WebDAVConnectionResult {
        info!("🔍 Testing WebDAV connection to: {}", self.urls.base_url());

        match self.test_options_request().await {
            Ok((server_version, server_type)) => {
                info!("✅ WebDAV connection successful");
                WebDAVConnectionResult {
                    success: true,
                    message: "Connection successful".to_string(),
                    server_version,
                    server_type,
                }
            }
            Err(e) => {
                error!("❌ WebDAV connection failed: {}", e);
                WebDAVConnectionResult {
                    success: false,
                    message: format!("Connection failed: {}", e),
                    server_version: None,
                    server_type: None,
                }
            }
        }
    }

    async fn test_options_request(&self) -> Result<(Option<String>, Option<String>)> {
        let url = self.urls.resource_url("");
        let response = self
            .authenticated_request(Method::OPTIONS, &url, None, HeaderMap::new())
            .await?;
        let response = Self::expect_status(response, "OPTIONS", &url, "")?;

        let server_version = response
            .headers()
            .get("server")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let dav_header = response
            .headers()
            .get("dav")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if dav_header.is_empty() {
            return Err(WebDAVError::status(
                "OPTIONS",
                url,
                response.status().as_u16(),
                "Server does not advertise WebDAV support (missing DAV header)",
            ));
        }
        debug!("DAV capabilities: {}", dav_header);

        Ok((server_version.clone(), Some(Self::detect_server_type(server_version.as_deref()))))
    }

    fn detect_server_type(server_version: Option<&str>) -> String {
        let server_lower = server_version.unwrap_or("").to_lowercase();
        if server_lower.contains("nextcloud") {
            "nextcloud".to_string()
        } else if server_lower.contains("owncloud") {
            "owncloud".to_string()
        } else {
            "generic".to_string()
        }
    }

    /// Sends one authenticated request and returns the raw response
    async fn authenticated_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Body>,
        headers: HeaderMap,
    ) -> Result<Response> {
        debug!("➡️ {} {}", method, url);

        let mut request = self.client.request(method, url).headers(headers);

        if self.config.has_credentials() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    /// Accepts any 2xx (207 Multi-Status included); maps 404 to `NotFound`
    fn expect_status(response: Response, method: &str, url: &str, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(WebDAVError::not_found(path));
        }

        Err(WebDAVError::status(
            method,
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown status"),
        ))
    }

    fn dav_method(name: &str) -> Result<Method> {
        Method::from_bytes(name.as_bytes())
            .map_err(|e| WebDAVError::invalid_request(format!("Invalid HTTP method {}: {}", name, e)))
    }

    fn header_value(value: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(value)
            .map_err(|e| WebDAVError::invalid_request(format!("Invalid header value '{}': {}", value, e)))
    }

    fn propfind_headers(depth: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("depth", HeaderValue::from_static(depth));
        headers.insert("content-type", HeaderValue::from_static("application/xml; charset=utf-8"));
        headers
    }

    async fn propfind(&self, path: &str, depth: &'static str) -> Result<Response> {
        let url = self.urls.resource_url(path);
        self.authenticated_request(
            Self::dav_method("PROPFIND")?,
            &url,
            Some(Body::from(PROPFIND_BODY)),
            Self::propfind_headers(depth),
        )
        .await
    }

    async fn transfer(&self, method: &str, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        let url = self.urls.resource_url(source);
        let mut headers = HeaderMap::new();
        headers.insert("destination", Self::header_value(&self.urls.resource_url(destination))?);
        headers.insert(
            "overwrite",
            HeaderValue::from_static(if overwrite { "T" } else { "F" }),
        );

        let response = self
            .authenticated_request(Self::dav_method(method)?, &url, None, headers)
            .await?;
        Self::expect_status(response, method, &url, source)?;
        Ok(())
    }

    /// Lock token from the `Lock-Token` header, falling back to the lockdiscovery body
    async fn read_lock_token(response: Response) -> Result<Option<String>> {
        let from_header = response
            .headers()
            .get("lock-token")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string())
            .filter(|v| !v.is_empty());

        if from_header.is_some() {
            return Ok(from_header);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        parse_lock_token(&body)
    }

    fn lock_body(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<D:lockinfo xmlns:D="DAV:">
    <D:lockscope><D:exclusive/></D:lockscope>
    <D:locktype><D:write/></D:locktype>
    <D:owner><D:href>{}</D:href></D:owner>
</D:lockinfo>"#,
            quick_xml::escape::escape(self.config.username.as_str())
        )
    }
}

#[async_trait]
impl WebDAVTransport for WebDAVConnection {
    async fn check_existence(&self, path: &str) -> Existence {
        match self.propfind(path, "0").await {
            Ok(response) => match response.status() {
                StatusCode::NOT_FOUND => Existence::Absent,
                status if status.is_success() => Existence::Exists,
                status => {
                    warn!("Unable to check {} on webdav [{}]: HTTP {}", path, self.urls.base_url(), status);
                    Existence::Unknown(format!("PROPFIND returned {}", status))
                }
            },
            Err(e) => {
                warn!("Unable to get resource {} from webdav [{}]: {}", path, self.urls.base_url(), e);
                Existence::Unknown(e.to_string())
            }
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<DavResource>> {
        let response = self.propfind(path, "1").await?;
        let url = self.urls.resource_url(path);
        let response = Self::expect_status(response, "PROPFIND", &url, path)?;

        let body = response.text().await?;
        let resources = parse_propfind_response(&body)?;
        debug!("📁 PROPFIND {} returned {} entries", url, resources.len());

        Ok(self.urls.process_resources(resources))
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let url = self.urls.collection_url(path);
        let response = self
            .authenticated_request(Self::dav_method("MKCOL")?, &url, None, HeaderMap::new())
            .await?;
        Self::expect_status(response, "MKCOL", &url, path)?;
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> Result<()> {
        let url = self.urls.collection_url(path);
        let response = self
            .authenticated_request(Method::DELETE, &url, None, HeaderMap::new())
            .await?;
        Self::expect_status(response, "DELETE", &url, path)?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let url = self.urls.resource_url(path);
        let response = self
            .authenticated_request(Method::DELETE, &url, None, HeaderMap::new())
            .await?;
        Self::expect_status(response, "DELETE", &url, path)?;
        Ok(())
    }

    async fn put(&self, path: &str, content: &mut (dyn AsyncRead + Send + Unpin)) -> Result<()> {
        let url = self.urls.resource_url(path);

        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", Self::header_value(content_type.essence_str())?);

        // The reader stays borrowed, so chunks are pumped through a bounded
        // channel into a 'static body stream
        let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(UPLOAD_QUEUE_CHUNKS);
        let body = Body::wrap_stream(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        }));

        debug!("⬆️ Streaming upload to {}", url);
        let request = self.authenticated_request(Method::PUT, &url, Some(body), headers);
        let pump = async move {
            let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
            let mut sent = 0u64;
            loop {
                let n = match content.read(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        let _ = tx.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
                        return Err(WebDAVError::Io(e));
                    }
                };
                if n == 0 {
                    break;
                }
                // A closed receiver means the request already finished
                if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    break;
                }
                sent += n as u64;
            }
            Ok(sent)
        };

        let (response, pumped) = tokio::join!(request, pump);
        let sent = pumped?;
        Self::expect_status(response?, "PUT", &url, path)?;
        debug!("⬆️ Uploaded {} bytes to {}", sent, url);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<ByteStream> {
        let url = self.urls.resource_url(path);
        let response = self
            .authenticated_request(Method::GET, &url, None, HeaderMap::new())
            .await?;
        let response = Self::expect_status(response, "GET", &url, path)?;

        debug!("⬇️ Streaming download from {}", url);
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn copy(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        self.transfer("COPY", source, destination, overwrite).await
    }

    async fn move_resource(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        self.transfer("MOVE", source, destination, overwrite).await
    }

    async fn lock(&self, path: &str) -> Result<LockToken> {
        let url = self.urls.resource_url(path);
        let mut headers = HeaderMap::new();
        headers.insert("timeout", HeaderValue::from_static(LOCK_TIMEOUT));
        headers.insert("content-type", HeaderValue::from_static("application/xml; charset=utf-8"));

        let response = self
            .authenticated_request(
                Self::dav_method("LOCK")?,
                &url,
                Some(Body::from(self.lock_body())),
                headers,
            )
            .await?;
        let response = Self::expect_status(response, "LOCK", &url, path)?;

        Self::read_lock_token(response)
            .await?
            .map(LockToken::new)
            .ok_or_else(|| WebDAVError::MissingLockToken { path: path.to_string() })
    }

    async fn unlock(&self, path: &str, token: &LockToken) -> Result<()> {
        let url = self.urls.resource_url(path);
        let mut headers = HeaderMap::new();
        headers.insert("lock-token", Self::header_value(&format!("<{}>", token))?);

        let response = self
            .authenticated_request(Self::dav_method("UNLOCK")?, &url, None, headers)
            .await?;
        Self::expect_status(response, "UNLOCK", &url, path)?;
        Ok(())
    }

    async fn refresh_lock(&self, path: &str, token: &LockToken) -> Result<LockToken> {
        let url = self.urls.resource_url(path);
        let mut headers = HeaderMap::new();
        headers.insert("timeout", HeaderValue::from_static(LOCK_TIMEOUT));
        headers.insert("if", Self::header_value(&format!("(<{}>)", token))?);

        let response = self
            .authenticated_request(Self::dav_method("LOCK")?, &url, None, headers)
            .await?;
        let response = Self::expect_status(response, "LOCK", &url, path)?;

        // Servers usually keep the token on refresh and may not echo it back
        Ok(Self::read_lock_token(response)
            .await?
            .map(LockToken::new)
            .unwrap_or_else(|| token.clone()))
    }
}
