use webdav_manager::{
    Existence, LockToken, ResourceKind, ServerType, WebDAVConfig, WebDAVConnection, WebDAVError,
    WebDAVTransport,
};
use tokio::io::AsyncReadExt;
use wiremock::matchers::{basic_auth, body_bytes, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_connection(mock_server: &MockServer) -> WebDAVConnection {
    let config = WebDAVConfig::new(
        format!("{}/webdav", mock_server.uri()),
        "testuser".to_string(),
        "testpass".to_string(),
    );
    WebDAVConnection::new(config).expect("Failed to create WebDAV connection")
}

fn patterned_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn multistatus(entries: &[(&str, bool)]) -> String {
    let responses: String = entries
        .iter()
        .map(|(href, collection)| {
            let resourcetype = if *collection {
                "<d:resourcetype><d:collection/></d:resourcetype>".to_string()
            } else {
                "<d:resourcetype/><d:getcontentlength>7</d:getcontentlength><d:getcontenttype>text/plain</d:getcontenttype>".to_string()
            };
            format!(
                r#"<d:response>
        <d:href>{}</d:href>
        <d:propstat>
            <d:prop>
                <d:getlastmodified>Tue, 29 Jul 2025 01:34:17 GMT</d:getlastmodified>
                {}
            </d:prop>
            <d:status>HTTP/1.1 200 OK</d:status>
        </d:propstat>
    </d:response>"#,
                href, resourcetype
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
    {}
</d:multistatus>"#,
        responses
    )
}

#[tokio::test]
async fn test_connection_detects_server_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .and(path("/webdav/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("DAV", "1, 2")
                .insert_header("Server", "Nextcloud"),
        )
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let result = connection.test_connection().await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.server_version.as_deref(), Some("Nextcloud"));
    assert_eq!(result.server_type.as_deref(), Some("nextcloud"));
}

#[tokio::test]
async fn test_connection_without_dav_header_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let result = connection.test_connection().await;

    assert!(!result.success);
    assert!(result.message.contains("DAV"));
}

#[tokio::test]
async fn test_check_existence_maps_status_codes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/webdav/present.txt"))
        .and(header("depth", "0"))
        .and(basic_auth("testuser", "testpass"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[("/webdav/present.txt", false)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PROPFIND"))
        .and(path("/webdav/broken.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);

    assert_eq!(connection.check_existence("present.txt").await, Existence::Exists);
    // Unmatched requests get a 404 from the mock server
    assert_eq!(connection.check_existence("absent.txt").await, Existence::Absent);
    assert!(matches!(
        connection.check_existence("broken.txt").await,
        Existence::Unknown(_)
    ));
    assert!(!connection.exists("broken.txt").await);
}

#[tokio::test]
async fn test_unreachable_server_is_unknown() {
    let mock_server = MockServer::start().await;
    let connection = create_test_connection(&mock_server);
    drop(mock_server);

    assert!(matches!(
        connection.check_existence("anything").await,
        Existence::Unknown(_)
    ));
}

#[tokio::test]
async fn test_list_returns_self_and_children_with_kinds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/webdav/docs"))
        .and(header("depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[
            ("/webdav/docs/", true),
            ("/webdav/docs/v1.2/", true),
            ("/webdav/docs/Makefile", false),
            ("/webdav/docs/File%20with%20spaces.txt", false),
        ])))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let entries = connection.list("docs").await.unwrap();

    let summary: Vec<(&str, ResourceKind)> = entries
        .iter()
        .map(|entry| (entry.path.as_str(), entry.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("docs", ResourceKind::Directory),
            ("docs/v1.2", ResourceKind::Directory),
            ("docs/Makefile", ResourceKind::File),
            ("docs/File with spaces.txt", ResourceKind::File),
        ]
    );
    assert_eq!(entries[2].name, "Makefile");
    assert_eq!(entries[2].content_length, Some(7));
}

#[tokio::test]
async fn test_list_missing_resource_is_not_found() {
    let mock_server = MockServer::start().await;
    let connection = create_test_connection(&mock_server);

    let error = connection.list("missing").await.unwrap_err();

    assert!(matches!(error, WebDAVError::NotFound { ref path } if path == "missing"));
}

#[tokio::test]
async fn test_create_directory_sends_mkcol_to_collection_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .and(path("/webdav/a/b/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    connection.create_directory("a/b").await.unwrap();
}

#[tokio::test]
async fn test_mkcol_conflict_is_a_status_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let error = connection.create_directory("x/y").await.unwrap_err();

    assert!(matches!(error, WebDAVError::Status { status: 409, .. }));
    assert!(!error.is_not_found());
}

#[tokio::test]
async fn test_put_sends_body_and_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/webdav/a/b/c/notes.txt"))
        .and(header("content-type", "text/plain"))
        .and(body_string_contains("hello webdav"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let mut body: &[u8] = b"hello webdav";
    connection.put("a/b/c/notes.txt", &mut body).await.unwrap();
}

#[tokio::test]
async fn test_get_returns_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/webdav/report.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"report body".to_vec()))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);

    let mut stream = connection.get("report.txt").await.unwrap();
    let mut content = Vec::new();
    stream.read_to_end(&mut content).await.unwrap();
    assert_eq!(content, b"report body".to_vec());

    let error = connection.get("other.txt").await.err().unwrap();
    assert!(error.is_not_found());
}

#[tokio::test]
async fn test_get_streams_large_body_in_chunks() {
    let mock_server = MockServer::start().await;
    let payload = patterned_payload(3 * 1024 * 1024 + 17);

    Mock::given(method("GET"))
        .and(path("/webdav/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let mut stream = connection.get("big.bin").await.unwrap();

    let mut received = Vec::new();
    let mut chunk = vec![0u8; 8 * 1024];
    let mut reads = 0;
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        assert!(n <= chunk.len());
        received.extend_from_slice(&chunk[..n]);
        reads += 1;
    }

    assert!(reads > 1);
    assert_eq!(received.len(), payload.len());
    assert_eq!(received, payload);
}

#[tokio::test]
async fn test_put_streams_body_larger_than_one_chunk() {
    let mock_server = MockServer::start().await;
    let payload = patterned_payload(300 * 1024 + 5);

    Mock::given(method("PUT"))
        .and(path("/webdav/uploads/big.bin"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let mut reader: &[u8] = &payload;
    connection.put("uploads/big.bin", &mut reader).await.unwrap();
}

#[tokio::test]
async fn test_put_rejected_by_server_is_a_status_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let mut reader: &[u8] = b"orphan";
    let error = connection.put("missing/parent.txt", &mut reader).await.unwrap_err();

    assert!(matches!(error, WebDAVError::Status { status: 409, .. }));
}

#[tokio::test]
async fn test_copy_sends_destination_and_overwrite_headers() {
    let mock_server = MockServer::start().await;
    let destination = format!("{}/webdav/aa/bb/test.xml", mock_server.uri());

    Mock::given(method("COPY"))
        .and(path("/webdav/a/test.xml"))
        .and(header("destination", destination.as_str()))
        .and(header("overwrite", "F"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    connection.copy("a/test.xml", "aa/bb/test.xml", false).await.unwrap();
}

#[tokio::test]
async fn test_move_with_overwrite() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MOVE"))
        .and(path("/webdav/a/test.xml"))
        .and(header("overwrite", "T"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    connection.move_resource("a/test.xml", "b/test.xml", true).await.unwrap();
}

#[tokio::test]
async fn test_move_rejected_by_precondition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MOVE"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let error = connection.move_resource("a.txt", "b.txt", false).await.unwrap_err();

    assert!(matches!(error, WebDAVError::Status { status: 412, .. }));
}

#[tokio::test]
async fn test_delete_directory_targets_collection_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/webdav/AAA/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/webdav/notes.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    connection.delete_directory("AAA").await.unwrap();
    connection.delete_file("notes.txt").await.unwrap();
}

#[tokio::test]
async fn test_lock_reads_token_from_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LOCK"))
        .and(path("/webdav/f.txt"))
        .and(body_string_contains("lockinfo"))
        .and(body_string_contains("testuser"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Lock-Token", "<opaquelocktoken:e71d4fae-5dec-22d6-fea5-00a0c91e6be4>"),
        )
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let token = connection.lock("f.txt").await.unwrap();

    assert_eq!(token.as_str(), "opaquelocktoken:e71d4fae-5dec-22d6-fea5-00a0c91e6be4");
}

#[tokio::test]
async fn test_lock_falls_back_to_lockdiscovery_body() {
    let mock_server = MockServer::start().await;

    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<D:prop xmlns:D="DAV:">
    <D:lockdiscovery>
        <D:activelock>
            <D:locktype><D:write/></D:locktype>
            <D:lockscope><D:exclusive/></D:lockscope>
            <D:timeout>Second-3600</D:timeout>
            <D:locktoken><D:href>opaquelocktoken:from-body</D:href></D:locktoken>
        </D:activelock>
    </D:lockdiscovery>
</D:prop>"#;

    Mock::given(method("LOCK"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let token = connection.lock("f.txt").await.unwrap();

    assert_eq!(token, LockToken::new("opaquelocktoken:from-body"));
}

#[tokio::test]
async fn test_lock_without_token_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LOCK"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let error = connection.lock("f.txt").await.unwrap_err();

    assert!(matches!(error, WebDAVError::MissingLockToken { .. }));
}

#[tokio::test]
async fn test_unlock_sends_lock_token_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("UNLOCK"))
        .and(path("/webdav/f.txt"))
        .and(header("lock-token", "<opaquelocktoken:abc>"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    connection
        .unlock("f.txt", &LockToken::new("opaquelocktoken:abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refresh_lock_keeps_token_when_not_echoed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LOCK"))
        .and(path("/webdav/f.txt"))
        .and(header("if", "(<opaquelocktoken:abc>)"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connection = create_test_connection(&mock_server);
    let token = LockToken::new("opaquelocktoken:abc");

    assert_eq!(connection.refresh_lock("f.txt", &token).await.unwrap(), token);
}

#[tokio::test]
async fn test_nextcloud_paths_are_rooted_at_user_files() {
    let mock_server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .and(path("/remote.php/dav/files/testuser/Documents/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = WebDAVConfig::new(
        mock_server.uri(),
        "testuser".to_string(),
        "testpass".to_string(),
    )
    .with_server_type(ServerType::Nextcloud);
    let connection = WebDAVConnection::new(config).unwrap();

    connection.create_directory("Documents").await.unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = WebDAVConfig::new(
        "ftp://example.com".to_string(),
        String::new(),
        String::new(),
    );

    let error = WebDAVConnection::new(config).err().expect("ftp URLs must be rejected");
    assert!(matches!(error, WebDAVError::InvalidConfig { .. }));
}
