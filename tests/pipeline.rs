//! End-to-end runs of the pipeline against a local HTTP server.

use antivirus_updater::http::USER_AGENT;
use antivirus_updater::{Config, Descriptor, Pipeline, Summary};
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Clone)]
struct Resource {
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
    /// Length advertised on HEAD, when it differs from the body.
    head_length: Option<u64>,
}

#[derive(Debug, Clone)]
struct Hit {
    method: Method,
    path: String,
    referer: Option<String>,
    user_agent: Option<String>,
}

#[derive(Default)]
struct MockState {
    resources: Mutex<HashMap<String, Resource>>,
    hits: Mutex<Vec<Hit>>,
}

struct MockServer {
    base: String,
    state: Arc<MockState>,
}

impl MockServer {
    async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(serve).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn html(&self, path: &str, body: String) {
        self.add(path, Resource {
            status: StatusCode::OK,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
            head_length: None,
        });
    }

    fn file(&self, path: &str, body: &[u8]) {
        self.add(path, Resource {
            status: StatusCode::OK,
            content_type: "application/octet-stream",
            body: body.to_vec(),
            head_length: None,
        });
    }

    fn add(&self, path: &str, resource: Resource) {
        self.state.resources.lock().unwrap().insert(path.to_string(), resource);
    }

    fn hits(&self, method: Method, path: &str) -> Vec<Hit> {
        self.state
            .hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.method == method && h.path == path)
            .cloned()
            .collect()
    }
}

async fn serve(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    state.hits.lock().unwrap().push(Hit {
        method: method.clone(),
        path: uri.path().to_string(),
        referer: header_str(header::REFERER),
        user_agent: header_str(header::USER_AGENT),
    });

    let resource = state.resources.lock().unwrap().get(uri.path()).cloned();
    let Some(resource) = resource else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (length, body) = if method == Method::HEAD {
        (resource.head_length.unwrap_or(resource.body.len() as u64), Body::empty())
    } else {
        (resource.body.len() as u64, Body::from(resource.body))
    };

    Response::builder()
        .status(resource.status)
        .header(header::CONTENT_TYPE, resource.content_type)
        .header(header::CONTENT_LENGTH, length)
        .body(body)
        .unwrap()
}

/// Answers every request with `Content-Length: 100`; GETs get ten bytes of
/// body before the connection is closed.
async fn start_truncating_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n";
                let _ = socket.write_all(head).await;
                if !request.starts_with(b"HEAD") {
                    let _ = socket.write_all(&[b'x'; 10]).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

async fn run(root: &TempDir, catalogue: Vec<Descriptor>) -> Summary {
    let mut config = Config::new(root.path());
    config.jobs = 2;
    Pipeline::new(config).unwrap().run(catalogue).await
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_single_hop_download() {
    let server = MockServer::start().await;
    server.html(
        "/page",
        format!(
            r#"<html><body><a class="dl" href="{}">Download</a></body></html>"#,
            server.url("/files/tool-v2.exe")
        ),
    );
    server.file("/files/tool-v2.exe", b"MZ tool version 2");

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::crawl(&server.url("/page"), &["a.dl"], "Vendor", "fast");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 0);
    let destination = root.path().join("fast").join("Vendor_tool-v2.exe");
    assert_eq!(read(&destination), b"MZ tool version 2");
    assert!(!root.path().join("fast").join("Vendor_tool-v2.exe.part").exists());
}

#[tokio::test]
async fn test_download_sends_referer_and_user_agent() {
    let server = MockServer::start().await;
    let link = server.url("/files/tool.exe");
    server.html("/page", format!(r#"<a class="dl" href="{link}">x</a>"#));
    server.file("/files/tool.exe", b"tool");

    let root = tempfile::tempdir().unwrap();
    run(&root, vec![Descriptor::crawl(&server.url("/page"), &["a.dl"], "", "fast")]).await;

    let gets = server.hits(Method::GET, "/files/tool.exe");
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].referer.as_deref(), Some(server.url("/page").as_str()));
    assert_eq!(gets[0].user_agent.as_deref(), Some(USER_AGENT));

    let page = server.hits(Method::GET, "/page");
    assert_eq!(page[0].user_agent.as_deref(), Some(USER_AGENT));
    assert_eq!(page[0].referer, None);
}

#[tokio::test]
async fn test_up_to_date_file_is_not_transferred() {
    let server = MockServer::start().await;
    let link = server.url("/files/tool-v2.exe");
    server.html("/page", format!(r#"<a class="dl" href="{link}">x</a>"#));
    server.file("/files/tool-v2.exe", b"0123456789");

    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("fast");
    std::fs::create_dir_all(&dir).unwrap();
    let destination = dir.join("Vendor_tool-v2.exe");
    std::fs::write(&destination, b"abcdefghij").unwrap();
    let before = std::fs::metadata(&destination).unwrap().modified().unwrap();

    let descriptor = Descriptor::crawl(&server.url("/page"), &["a.dl"], "Vendor", "fast");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.up_to_date, 1);
    assert_eq!(summary.downloaded, 0);
    assert!(server.hits(Method::GET, "/files/tool-v2.exe").is_empty());
    assert_eq!(read(&destination), b"abcdefghij");
    assert_eq!(std::fs::metadata(&destination).unwrap().modified().unwrap(), before);
}

#[tokio::test]
async fn test_size_rechecked_on_response_when_head_lies() {
    let server = MockServer::start().await;
    server.add("/files/kit.exe", Resource {
        status: StatusCode::OK,
        content_type: "application/octet-stream",
        body: b"0123456789".to_vec(),
        head_length: Some(0),
    });

    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("slow");
    std::fs::create_dir_all(&dir).unwrap();
    let destination = dir.join("kit.exe");
    std::fs::write(&destination, b"abcdefghij").unwrap();

    let descriptor = Descriptor::direct(&server.url("/files/kit.exe"), "", "slow");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.up_to_date, 1);
    assert_eq!(server.hits(Method::GET, "/files/kit.exe").len(), 1);
    assert_eq!(read(&destination), b"abcdefghij");
}

#[tokio::test]
async fn test_stale_file_is_replaced() {
    let server = MockServer::start().await;
    server.file("/files/kit.exe", b"new and longer content");

    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("slow");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("kit.exe"), b"old").unwrap();

    let descriptor = Descriptor::direct(&server.url("/files/kit.exe"), "", "slow");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(read(&dir.join("kit.exe")), b"new and longer content");
}

#[tokio::test]
async fn test_two_hops_with_meta_refresh() {
    let server = MockServer::start().await;
    server.html(
        "/download/tool/",
        format!(
            r#"<div class="dl_choices"><a class="next" href="{}">Start</a></div>"#,
            server.url("/dl/42")
        ),
    );
    server.html(
        "/dl/42",
        format!(
            concat!(
                r#"<html><head><meta http-equiv="refresh" content="3;url={}"></head>"#,
                "<body>Your download will start</body></html>",
            ),
            server.url("/files/final.exe")
        ),
    );
    server.file("/files/final.exe", b"final");

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::crawl(
        &server.url("/download/tool/"),
        &[".dl_choices a.next", r#"meta[content^="3"]"#],
        "Vendor",
        "fast",
    );
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(read(&root.path().join("fast").join("Vendor_final.exe")), b"final");
    let gets = server.hits(Method::GET, "/files/final.exe");
    assert_eq!(gets[0].referer.as_deref(), Some(server.url("/dl/42").as_str()));
}

#[tokio::test]
async fn test_duplicate_links_dispatch_once() {
    let server = MockServer::start().await;
    let link = server.url("/files/tool.exe");
    server.html(
        "/page",
        format!(r#"<a class="dl" href="{link}">one</a><p><a class="dl" href="{link}">two</a></p>"#),
    );
    server.file("/files/tool.exe", b"tool");

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::crawl(&server.url("/page"), &["a.dl"], "", "tools");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(server.hits(Method::HEAD, "/files/tool.exe").len(), 1);
    assert_eq!(server.hits(Method::GET, "/files/tool.exe").len(), 1);
}

#[tokio::test]
async fn test_failures_do_not_stop_other_entries() {
    let server = MockServer::start().await;
    server.add("/broken", Resource {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        content_type: "text/html",
        body: b"oops".to_vec(),
        head_length: None,
    });
    server.html("/empty", "<p>moved</p>".to_string());
    server.file("/files/ok.exe", b"ok");

    let root = tempfile::tempdir().unwrap();
    let summary = run(
        &root,
        vec![
            Descriptor::crawl(&server.url("/broken"), &["a"], "", "fast"),
            Descriptor::crawl(&server.url("/empty"), &["a.dl"], "", "fast"),
            Descriptor::direct(&server.url("/files/missing.exe"), "", "fast"),
            Descriptor::direct(&server.url("/files/ok.exe"), "", "fast"),
        ],
    )
    .await;

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.empty_pages, 1);
    assert_eq!(read(&root.path().join("fast").join("ok.exe")), b"ok");
    assert!(!root.path().join("fast").join("missing.exe").exists());
}

#[tokio::test]
async fn test_missing_category_makes_no_request() {
    let server = MockServer::start().await;
    server.file("/files/tool.exe", b"tool");

    let mut descriptor = Descriptor::direct(&server.url("/files/tool.exe"), "", "");
    descriptor.category = None;

    let root = tempfile::tempdir().unwrap();
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.failed, 1);
    assert!(server.state.hits.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_random_name_vendor() {
    let server = MockServer::start().await;
    server.file("/sasportablehome.php", b"sas");

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::direct(
        &server.url("/sasportablehome.php"),
        "SuperAntiSpyware_Portable",
        "extra",
    )
    .with_file_type(".exe");
    run(&root, vec![descriptor]).await;

    assert_eq!(read(&root.path().join("extra").join("SuperAntiSpyware_Portable.exe")), b"sas");
}

#[tokio::test]
async fn test_zip_is_extracted() {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("bin/", options).unwrap();
        writer.start_file("bin/recall.exe", options).unwrap();
        writer.write_all(b"MZ recall").unwrap();
        writer.finish().unwrap();
    }

    let server = MockServer::start().await;
    server.file("/current/recall.zip", buffer.get_ref());

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::direct(
        &server.url("/current/recall.zip"),
        "keit.co",
        "licences_and_passwords",
    );
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.downloaded, 1);
    let dir = root.path().join("licences_and_passwords");
    assert!(dir.join("keit.co_recall.zip").is_file());
    assert_eq!(read(&dir.join("keit.co_recall").join("bin").join("recall.exe")), b"MZ recall");
}

#[tokio::test]
async fn test_truncated_transfer_leaves_no_file() {
    let base = start_truncating_server().await;

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::direct(&format!("{base}/tool.exe"), "", "fast");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 0);
    let dir = root.path().join("fast");
    assert!(!dir.join("tool.exe").exists());
    assert!(!dir.join("tool.exe.part").exists());
}

#[tokio::test]
async fn test_failed_rename_removes_partial_file() {
    let server = MockServer::start().await;
    server.file("/files/tool.exe", b"tool");

    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("fast");
    // a non-empty directory in the way makes the final rename fail
    let blocker = dir.join("tool.exe");
    std::fs::create_dir_all(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), b"keep").unwrap();

    let descriptor = Descriptor::direct(&server.url("/files/tool.exe"), "", "fast");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(server.hits(Method::GET, "/files/tool.exe").len(), 1);
    assert!(!dir.join("tool.exe.part").exists());
    assert_eq!(read(&blocker.join("keep")), b"keep");
}

#[tokio::test]
async fn test_bad_selector_later_in_chain_makes_no_request() {
    let server = MockServer::start().await;
    let link = server.url("/next");
    server.html("/page", format!(r#"<a class="dl" href="{link}">x</a>"#));

    let root = tempfile::tempdir().unwrap();
    let descriptor = Descriptor::crawl(&server.url("/page"), &["a.dl", "a["], "", "fast");
    let summary = run(&root, vec![descriptor]).await;

    assert_eq!(summary.failed, 1);
    assert!(server.state.hits.lock().unwrap().is_empty());
}
