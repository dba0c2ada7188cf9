use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use http::{Request, Response, StatusCode};

use dav_engine::body::Body;
use dav_engine::ls::memls::MemLs;
use dav_engine::ls::{DavLockManager, LockDepth, LockScope};
use dav_engine::repo::{DavRepository, MemRepository};
use dav_engine::{DavHandler, DavMethod, DavPath, LockSystem, Repository};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn send(dav: &DavHandler, method: &str, uri: &str, body: &str) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();
    dav.handle(req).await
}

async fn body_of(resp: Response<Body>) -> String {
    let mut body = resp.into_body();
    let mut data = Vec::new();
    while let Some(chunk) = body.next().await {
        data.extend_from_slice(&chunk.unwrap());
    }
    String::from_utf8(data).unwrap()
}

// a repository with a lock manager we keep a handle to.
fn locked_handler() -> (DavHandler, Arc<MemLs>) {
    let ls = MemLs::new();
    let repo = MemRepository::with_locks(ls.clone());
    let dav = DavHandler::builder(Repository::Custom(Arc::new(repo))).build();
    (dav, ls)
}

fn lock(ls: &MemLs, path: &str) -> String {
    let path = DavPath::new(path).unwrap();
    ls.lock(&path, None, None, None, LockScope::Exclusive, LockDepth::Infinity)
        .unwrap()
        .token
}

#[tokio::test]
async fn mkcol_then_put() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();

    let resp = send(&dav, "MKCOL", "/docs", "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["location"], "/docs");

    let resp = send(&dav, "MKCOL", "/docs", "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = send(&dav, "PUT", "/docs/file.txt", "hello").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(resp.headers().contains_key("etag"));

    let res = dav
        .repository()
        .locate(&DavPath::new("/docs/file.txt").unwrap())
        .await
        .unwrap();
    assert_eq!(res.content().unwrap(), Bytes::from("hello"));

    let resp = send(&dav, "PUT", "/docs/file.txt", "again").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn mkcol_conflicts() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();

    let resp = send(&dav, "MKCOL", "/missing/child", "").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_of(resp).await, "no parent found");

    let resp = send(&dav, "MKCOL", "/", "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = send(&dav, "MKCOL", "/docs", "a body").await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn mkcol_below_file() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    assert_eq!(send(&dav, "PUT", "/f", "x").await.status(), StatusCode::CREATED);

    // creating below a plain resource is not allowed by the repository,
    // which PUT and MKCOL report as an internal failure.
    let resp = send(&dav, "MKCOL", "/f/sub", "").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let resp = send(&dav, "PUT", "/f/g", "x").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = send(&dav, "PUT", "/nodir/g", "x").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn put_on_locked_resource() {
    init();
    let (dav, ls) = locked_handler();
    assert_eq!(send(&dav, "PUT", "/f", "1").await.status(), StatusCode::CREATED);
    let t1 = lock(&ls, "/f");

    // no If header at all.
    let resp = send(&dav, "PUT", "/f", "2").await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    // wrong token.
    let req = Request::put("/f")
        .header("If", "(<opaquelocktoken:nope>)")
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);

    // negated token that is active.
    let req = Request::put("/f")
        .header("If", format!("(Not <{t1}>)"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);

    // holds, but asserts no token.
    let req = Request::put("/f")
        .header("If", "(Not <opaquelocktoken:nope>)")
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::LOCKED);

    // malformed.
    let req = Request::put("/f")
        .header("If", format!("(<{t1}>"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::BAD_REQUEST);

    // tagged for another resource only.
    let req = Request::put("/f")
        .header("If", format!("</other> (<{t1}>)"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::BAD_REQUEST);

    let req = Request::put("/f")
        .header("If", format!("(<{t1}>)"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);

    let req = Request::put("/f")
        .header("If", format!("<http://localhost/f> (<{t1}>)"))
        .body(Body::from("3"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);

    let res = dav
        .repository()
        .locate(&DavPath::new("/f").unwrap())
        .await
        .unwrap();
    assert_eq!(res.content().unwrap(), Bytes::from("3"));
}

#[tokio::test]
async fn lock_with_etag_condition() {
    init();
    let (dav, ls) = locked_handler();
    let resp = send(&dav, "PUT", "/f", "1").await;
    let etag = resp.headers()["etag"].to_str().unwrap().to_string();
    let t1 = lock(&ls, "/f");

    let req = Request::put("/f")
        .header("If", format!("(<{t1}> [\"wrong\"])"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);

    let req = Request::put("/f")
        .header("If", format!("(<{t1}> [{etag}])"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn locked_parent_gates_new_resources() {
    init();
    let (dav, ls) = locked_handler();
    assert_eq!(send(&dav, "MKCOL", "/dir", "").await.status(), StatusCode::CREATED);
    let t1 = lock(&ls, "/dir");

    let resp = send(&dav, "MKCOL", "/dir/sub", "").await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    let req = Request::builder()
        .method("MKCOL")
        .uri("/dir/sub")
        .header("If", format!("(<{t1}>)"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::CREATED);

    // unlocked siblings are not affected.
    assert_eq!(send(&dav, "PUT", "/other", "x").await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn delete() {
    init();
    let (dav, ls) = locked_handler();
    send(&dav, "MKCOL", "/a", "").await;
    send(&dav, "PUT", "/a/f", "x").await;

    let req = Request::delete("/a")
        .header("Depth", "0")
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::BAD_REQUEST);

    let t1 = lock(&ls, "/a");
    assert_eq!(send(&dav, "DELETE", "/a/f", "").await.status(), StatusCode::LOCKED);

    let req = Request::delete("/a")
        .header("If", format!("(<{t1}>)"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);
    assert!(ls.discover(&DavPath::new("/a").unwrap()).is_empty());

    assert_eq!(send(&dav, "DELETE", "/a", "").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(send(&dav, "DELETE", "/", "").await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unlock() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    assert_eq!(
        send(&dav, "UNLOCK", "/f", "").await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let (dav, ls) = locked_handler();
    send(&dav, "PUT", "/f", "x").await;
    let t1 = lock(&ls, "/f");

    assert_eq!(send(&dav, "UNLOCK", "/f", "").await.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("UNLOCK")
        .uri("/f")
        .header("Lock-Token", "<opaquelocktoken:nope>")
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::CONFLICT);

    let req = Request::builder()
        .method("UNLOCK")
        .uri("/f")
        .header("Lock-Token", format!("<{t1}>"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);

    // unlocked now, so no If header is needed.
    assert_eq!(send(&dav, "PUT", "/f", "y").await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn get_and_head() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    send(&dav, "MKCOL", "/docs", "").await;
    let put = send(&dav, "PUT", "/docs/page.html", "<p>hi</p>").await;
    let etag = put.headers()["etag"].clone();

    let resp = send(&dav, "GET", "/docs/page.html", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/html");
    assert_eq!(resp.headers()["content-length"], "9");
    assert_eq!(resp.headers()["etag"], etag);
    assert!(resp.headers().contains_key("last-modified"));
    assert_eq!(body_of(resp).await, "<p>hi</p>");

    let resp = send(&dav, "HEAD", "/docs/page.html", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-length"], "9");
    assert_eq!(body_of(resp).await, "");

    let req = Request::get("/docs/page.html")
        .header("If-None-Match", etag.clone())
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NOT_MODIFIED);

    let req = Request::get("/docs/page.html")
        .header("If-Match", "\"other\"")
        .body(Body::empty())
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);

    assert_eq!(
        send(&dav, "GET", "/docs", "").await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(send(&dav, "GET", "/nope", "").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_preconditions() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();

    let req = Request::put("/f")
        .header("If-Match", "*")
        .body(Body::from("x"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);

    let req = Request::put("/f")
        .header("If-None-Match", "*")
        .body(Body::from("x"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::CREATED);

    let req = Request::put("/f")
        .header("If-None-Match", "*")
        .body(Body::from("y"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn options() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    send(&dav, "PUT", "/f", "x").await;

    let resp = send(&dav, "OPTIONS", "/f", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["dav"], "1");
    assert_eq!(resp.headers()["ms-author-via"], "DAV");
    assert_eq!(resp.headers()["allow"], "HEAD,GET,PUT,OPTIONS,DELETE");

    let resp = send(&dav, "OPTIONS", "/new", "").await;
    assert_eq!(resp.headers()["allow"], "OPTIONS,MKCOL,PUT");

    let dav = DavHandler::builder(Repository::Mem)
        .locksystem(LockSystem::Mem)
        .build();
    let resp = send(&dav, "OPTIONS", "/", "").await;
    assert_eq!(resp.headers()["dav"], "1,2");
    assert_eq!(resp.headers()["allow"], "OPTIONS,UNLOCK");
}

#[tokio::test]
async fn methods_and_config() {
    init();
    let dav = DavHandler::builder(Repository::Mem)
        .methods(DavMethod::HTTP_RO)
        .build();
    assert_eq!(
        send(&dav, "PUT", "/f", "x").await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let dav = DavHandler::builder(Repository::Mem).build();
    let resp = send(&dav, "PROPFIND", "/", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(!resp.headers().contains_key("connection"));

    let resp = send(&dav, "BREW", "/", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(resp.headers()["connection"], "close");

    let resp = send(&dav, "GET", "/a/../b", "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prefix_and_principal() {
    init();
    let dav = DavHandler::builder(Repository::Mem)
        .strip_prefix("/dav")
        .principal("alice")
        .build();

    let resp = send(&dav, "MKCOL", "/dav/docs/", "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["location"], "/dav/docs/");
    assert_eq!(send(&dav, "GET", "/elsewhere", "").await.status(), StatusCode::NOT_FOUND);

    let req = Request::put("/dav/docs/f").body(Body::from("x")).unwrap();
    let resp = dav.handle_with(req, None, Some("bob".to_string())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let repo = dav.repository();
    let docs = repo.locate(&DavPath::new("/docs").unwrap()).await.unwrap();
    assert_eq!(docs.owner(), Some("alice"));
    let f = repo.locate(&DavPath::new("/docs/f").unwrap()).await.unwrap();
    assert_eq!(f.owner(), Some("bob"));
}

#[tokio::test]
async fn body_limits_and_streams() {
    init();
    let dav = DavHandler::builder(Repository::Mem).max_body_size(4).build();
    assert_eq!(
        send(&dav, "PUT", "/big", "12345").await.status(),
        StatusCode::PAYLOAD_TOO_LARGE
    );

    let chunks: Vec<io::Result<Bytes>> = vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))];
    let req = Request::put("/s").body(stream::iter(chunks)).unwrap();
    assert_eq!(dav.handle_stream(req).await.status(), StatusCode::CREATED);
    let resp = send(&dav, "GET", "/s", "").await;
    assert_eq!(body_of(resp).await, "abcd");

    let chunks: Vec<io::Result<Bytes>> = vec![
        Ok(Bytes::from("ab")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
    ];
    let req = Request::put("/t").body(stream::iter(chunks)).unwrap();
    assert_eq!(
        dav.handle_stream(req).await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(send(&dav, "GET", "/t", "").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_puts_into_one_collection() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    assert_eq!(send(&dav, "MKCOL", "/d", "").await.status(), StatusCode::CREATED);

    let mut tasks = Vec::new();
    for i in 0..200 {
        let dav = dav.clone();
        tasks.push(tokio::spawn(async move {
            send(&dav, "PUT", &format!("/d/f{i}"), &format!("{i}")).await.status()
        }));
    }
    for t in tasks {
        assert_eq!(t.await.unwrap(), StatusCode::CREATED);
    }

    let d = dav
        .repository()
        .locate(&DavPath::new("/d").unwrap())
        .await
        .unwrap();
    let coll = d.as_collection().unwrap();
    assert_eq!(coll.children().count(), 200);
    for i in 0..200 {
        let f = coll.get_child(&format!("f{i}")).unwrap();
        assert_eq!(f.content().unwrap(), Bytes::from(format!("{i}")));
    }
}

#[tokio::test]
async fn encoded_slash_is_not_a_separator() {
    init();
    let dav = DavHandler::builder(Repository::Mem).build();
    assert_eq!(send(&dav, "PUT", "/a%2Fb", "x").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(send(&dav, "MKCOL", "/a%2fb", "").await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resource_tag_on_other_host() {
    init();
    let (dav, ls) = locked_handler();
    send(&dav, "PUT", "/f", "1").await;
    let t1 = lock(&ls, "/f");

    let req = Request::put("/f")
        .header("Host", "localhost:4918")
        .header("If", format!("<http://other.example/f> (<{t1}>)"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::BAD_REQUEST);

    let req = Request::put("/f")
        .header("Host", "localhost:4918")
        .header("If", format!("<http://localhost:4918/f> (<{t1}>)"))
        .body(Body::from("2"))
        .unwrap();
    assert_eq!(dav.handle(req).await.status(), StatusCode::NO_CONTENT);
}
