use crate::models::DavResource;
use super::config::WebDAVConfig;
use super::paths;

/// Centralized URL and path management for WebDAV operations
///
/// Converts between base-relative resource paths and the absolute URLs the
/// server expects, and maps hrefs from multistatus responses back to
/// resource paths.
#[derive(Debug, Clone)]
pub struct WebDAVUrlManager {
    base_url: String,
    base_path: String,
}

impl WebDAVUrlManager {
    pub fn new(config: &WebDAVConfig) -> Self {
        let base_url = config.webdav_url();
        let base_path = url::Url::parse(&base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default();

        Self { base_url, base_path }
    }

    /// DAV root, e.g. "http://192.168.95.229/webdav"
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a resource path
    ///
    /// Input:  "a/b/c/test.xml"
    /// Output: "http://192.168.95.229/webdav/a/b/c/test.xml"
    pub fn resource_url(&self, path: &str) -> String {
        let encoded = Self::encode_path(path);
        if encoded.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, encoded)
        }
    }

    /// Absolute URL for a collection, always ending in '/'
    pub fn collection_url(&self, path: &str) -> String {
        let url = self.resource_url(path);
        if url.ends_with('/') {
            url
        } else {
            format!("{}/", url)
        }
    }

    /// Convert an href from a multistatus response to a resource path
    ///
    /// Input:  "/webdav/a/b/File%20with%20spaces.pdf"
    /// Output: "a/b/File with spaces.pdf"
    pub fn href_to_relative_path(&self, href: &str) -> String {
        // Some servers answer with absolute URLs instead of absolute paths
        let href_path = if href.starts_with("http://") || href.starts_with("https://") {
            url::Url::parse(href)
                .map(|u| u.path().to_string())
                .unwrap_or_else(|_| href.to_string())
        } else {
            href.to_string()
        };

        let decoded = urlencoding::decode(&href_path)
            .map(|d| d.into_owned())
            .unwrap_or(href_path);

        let decoded_base = urlencoding::decode(&self.base_path)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| self.base_path.clone());

        let relative = decoded
            .strip_prefix(decoded_base.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(decoded.as_str());

        paths::normalize(relative)
    }

    /// Fill in the resource path and name of a parsed multistatus entry
    pub fn process_resource(&self, mut resource: DavResource) -> DavResource {
        resource.path = self.href_to_relative_path(&resource.href);
        if resource.name.is_empty() {
            resource.name = paths::file_name(&resource.path).to_string();
        }
        resource
    }

    pub fn process_resources(&self, resources: Vec<DavResource>) -> Vec<DavResource> {
        resources
            .into_iter()
            .map(|resource| self.process_resource(resource))
            .collect()
    }

    fn encode_path(path: &str) -> String {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;
    use crate::services::webdav::config::ServerType;

    fn generic_manager() -> WebDAVUrlManager {
        WebDAVUrlManager::new(&WebDAVConfig::new(
            "http://192.168.95.229/webdav/".to_string(),
            "admin".to_string(),
            "admin".to_string(),
        ))
    }

    #[test]
    fn test_resource_url() {
        let manager = generic_manager();
        assert_eq!(manager.resource_url("a/b/c/test.xml"), "http://192.168.95.229/webdav/a/b/c/test.xml");
        assert_eq!(manager.resource_url(""), "http://192.168.95.229/webdav/");
        assert_eq!(manager.resource_url("/AAA/"), "http://192.168.95.229/webdav/AAA");
        assert_eq!(manager.resource_url("my docs/a b.txt"), "http://192.168.95.229/webdav/my%20docs/a%20b.txt");
    }

    #[test]
    fn test_collection_url_has_trailing_slash() {
        let manager = generic_manager();
        assert_eq!(manager.collection_url("AAA"), "http://192.168.95.229/webdav/AAA/");
        assert_eq!(manager.collection_url(""), "http://192.168.95.229/webdav/");
    }

    #[test]
    fn test_href_to_relative_path() {
        let manager = generic_manager();
        assert_eq!(manager.href_to_relative_path("/webdav/"), "");
        assert_eq!(manager.href_to_relative_path("/webdav/AAA/"), "AAA");
        assert_eq!(manager.href_to_relative_path("/webdav/a/b/c/test.xml"), "a/b/c/test.xml");
        assert_eq!(manager.href_to_relative_path("/webdav/File%20with%20spaces.pdf"), "File with spaces.pdf");
        assert_eq!(manager.href_to_relative_path("http://192.168.95.229/webdav/x/y"), "x/y");
        // Prefix must end on a segment boundary
        assert_eq!(manager.href_to_relative_path("/webdav2/file.txt"), "webdav2/file.txt");
    }

    #[test]
    fn test_nextcloud_href_to_relative_path() {
        let config = WebDAVConfig::new(
            "https://nas.example.com".to_string(),
            "testuser".to_string(),
            "password".to_string(),
        )
        .with_server_type(ServerType::Nextcloud);
        let manager = WebDAVUrlManager::new(&config);

        assert_eq!(
            manager.href_to_relative_path("/remote.php/dav/files/testuser/Photos/image.jpg"),
            "Photos/image.jpg"
        );
        assert_eq!(manager.href_to_relative_path("/remote.php/dav/files/testuser"), "");
    }

    #[test]
    fn test_process_resource() {
        let manager = generic_manager();
        let resource = DavResource {
            href: "/webdav/aa/bb/cc/".to_string(),
            path: String::new(),
            name: String::new(),
            kind: ResourceKind::Directory,
            created_at: None,
            last_modified: None,
            content_type: None,
            content_length: None,
            etag: None,
        };

        let processed = manager.process_resource(resource);
        assert_eq!(processed.path, "aa/bb/cc");
        assert_eq!(processed.name, "cc");
    }
}
