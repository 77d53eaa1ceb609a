//! Host-level scenarios against a stubbed WebDAV server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dvfs_core::{
    CancelToken, EntryKind, ListingFlags, VfsError, VfsHost, DIRECTORY_ACCESS_MODE,
    REGULAR_FILE_ACCESS_MODE,
};
use dvfs_webdav::{HostConfiguration, WebDavHost};

fn config_for(server: &MockServer) -> HostConfiguration {
    let uri = server.uri();
    let address = uri.strip_prefix("http://").expect("mock server is http");
    let (host, port) = address.split_once(':').expect("mock uri has a port");
    HostConfiguration::new(host, "", "", "", false, port.parse().ok())
}

async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("OPTIONS"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "Allow",
            "OPTIONS, GET, HEAD, PUT, DELETE, PROPFIND, PROPPATCH, MKCOL, MOVE",
        ))
        .mount(&server)
        .await;
    server
}

fn multistatus(entries: &[(&str, bool, Option<u64>)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<D:multistatus xmlns:D=\"DAV:\">\n",
    );
    for (href, is_dir, size) in entries {
        body.push_str("<D:response>\n");
        body.push_str(&format!("<D:href>{href}</D:href>\n"));
        body.push_str("<D:propstat><D:prop>\n");
        if *is_dir {
            body.push_str("<D:resourcetype><D:collection/></D:resourcetype>\n");
        } else {
            body.push_str("<D:resourcetype/>\n");
        }
        if let Some(size) = size {
            body.push_str(&format!("<D:getcontentlength>{size}</D:getcontentlength>\n"));
        }
        body.push_str("<D:getlastmodified>Sat, 02 Mar 2024 15:44:46 GMT</D:getlastmodified>\n");
        body.push_str("<D:creationdate>2024-03-02T15:44:46Z</D:creationdate>\n");
        body.push_str("</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>\n");
        body.push_str("</D:response>\n");
    }
    body.push_str("</D:multistatus>\n");
    body
}

fn propfind_listing(at: &str, entries: &[(&str, bool, Option<u64>)]) -> Mock {
    Mock::given(method("PROPFIND"))
        .and(path(at))
        .and(header("Depth", "1"))
        .respond_with(
            ResponseTemplate::new(207)
                .insert_header("Content-Type", "application/xml; charset=utf-8")
                .set_body_string(multistatus(entries)),
        )
}

#[tokio::test]
async fn test_connect_probes_server_options() {
    let server = start_server().await;
    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let mask = host.supported_requests();
    assert!(mask.contains(dvfs_webdav::HttpRequests::PROPFIND));
    assert!(mask.contains(dvfs_webdav::HttpRequests::MKCOL));
    assert!(!mask.contains(dvfs_webdav::HttpRequests::LOCK));
    assert!(host.is_writable());
    assert!(host.is_case_sensitive("/"));
    assert!(host.features().non_empty_rmdir);
}

#[tokio::test]
async fn test_connect_fails_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = WebDavHost::connect(config_for(&server)).await;
    assert!(matches!(result, Err(VfsError::Io(_))));
}

#[tokio::test]
async fn test_root_listing_has_no_dot_dot() {
    let server = start_server().await;
    propfind_listing(
        "/",
        &[
            ("/", true, None),
            ("/a.txt", false, Some(10)),
            ("/sub/", true, None),
        ],
    )
    .mount(&server)
    .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let listing = host
        .fetch_directory_listing("/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();

    let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.txt", "sub"]);

    assert_eq!(listing.entries[0].kind, EntryKind::File);
    assert_eq!(listing.entries[0].mode, REGULAR_FILE_ACCESS_MODE);
    assert_eq!(listing.entries[0].size, 10);
    assert_eq!(listing.entries[1].kind, EntryKind::Directory);
    assert_eq!(listing.entries[1].mode, DIRECTORY_ACCESS_MODE);
    assert!(listing.entries[0].mtime.is_some());
    assert_eq!(listing.entries[0].ctime, listing.entries[0].mtime);
}

#[tokio::test]
async fn test_nested_listing_leads_with_dot_dot() {
    let server = start_server().await;
    propfind_listing("/x/", &[("/x/", true, None), ("/x/f", false, Some(3))])
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let listing = host
        .fetch_directory_listing("/x", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();

    let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["..", "f"]);
    assert_eq!(listing.entries[0].kind, EntryKind::Directory);

    // the flag suppresses ".."
    let flags = ListingFlags {
        no_dot_dot: true,
        ..Default::default()
    };
    let listing = host
        .fetch_directory_listing("/x/", flags, &CancelToken::none())
        .await
        .unwrap();
    let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["f"]);
}

#[tokio::test]
async fn test_trailing_slash_is_normalised() {
    let server = start_server().await;
    propfind_listing("/x/", &[("/x/", true, None), ("/x/f", false, Some(3))])
        .expect(1)
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let first = host
        .fetch_directory_listing("/x", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();
    // the second call hits the cache, hence expect(1) above
    let second = host
        .fetch_directory_listing("/x/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();

    let names = |l: &dvfs_core::DirectoryListing| {
        l.entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
}

#[tokio::test]
async fn test_create_directory_round_trip() {
    let server = start_server().await;
    Mock::given(method("MKCOL"))
        .and(path("/new/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    host.create_directory("/new", &CancelToken::none())
        .await
        .unwrap();

    // no PROPFIND is mounted, so this must be served from the cache
    let stat = host.stat("/new", &CancelToken::none()).await.unwrap();
    assert!(stat.is_directory());
    assert_eq!(stat.mode, DIRECTORY_ACCESS_MODE);
}

#[tokio::test]
async fn test_listing_refetches_after_local_mutation() {
    let server = start_server().await;
    propfind_listing("/", &[("/", true, None), ("/a.txt", false, Some(10))])
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/new/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    host.fetch_directory_listing("/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();
    host.create_directory("/new", &CancelToken::none())
        .await
        .unwrap();
    // the dirty mark forces a second PROPFIND
    host.fetch_directory_listing("/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rename_directory() {
    let server = start_server().await;
    propfind_listing("/", &[("/", true, None), ("/a/", true, None)])
        .mount(&server)
        .await;
    propfind_listing("/a/", &[("/a/", true, None), ("/a/f", false, Some(3))])
        .mount(&server)
        .await;
    let destination = format!("{}/b/", server.uri());
    Mock::given(method("MOVE"))
        .and(path("/a/"))
        .and(header("Destination", destination.as_str()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    host.fetch_directory_listing("/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();
    host.fetch_directory_listing("/a/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();

    host.rename("/a", "/b", &CancelToken::none()).await.unwrap();

    let err = host.stat("/a", &CancelToken::none()).await.unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));

    let stat = host.stat("/b", &CancelToken::none()).await.unwrap();
    assert!(stat.is_directory());

    // the old directory's snapshot followed the rename
    let listing = host
        .fetch_directory_listing("/b/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();
    assert!(listing.entries.iter().any(|e| e.name == "f"));
}

#[tokio::test]
async fn test_unlink_updates_cache() {
    let server = start_server().await;
    propfind_listing(
        "/",
        &[("/", true, None), ("/doomed.txt", false, Some(4))],
    )
    .mount(&server)
    .await;
    Mock::given(method("DELETE"))
        .and(path("/doomed.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    host.fetch_directory_listing("/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap();

    host.unlink("/doomed.txt", &CancelToken::none())
        .await
        .unwrap();

    let err = host
        .stat("/doomed.txt", &CancelToken::none())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[tokio::test]
async fn test_statfs_reports_quota() {
    let server = start_server().await;
    let quota = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/</d:href>
    <d:propstat><d:prop>
      <d:quota-available-bytes>100</d:quota-available-bytes>
      <d:quota-used-bytes>50</d:quota-used-bytes>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .and(header("Depth", "0"))
        .respond_with(ResponseTemplate::new(207).set_body_string(quota))
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let statfs = host.statfs("/", &CancelToken::none()).await.unwrap();
    assert_eq!(statfs.free_bytes, Some(100));
    assert_eq!(statfs.avail_bytes, Some(100));
    assert_eq!(statfs.total_bytes, Some(150));
    assert!(statfs.volume_name.starts_with("http://"));
}

#[tokio::test]
async fn test_iterate_directory_listing() {
    let server = start_server().await;
    propfind_listing(
        "/x/",
        &[
            ("/x/", true, None),
            ("/x/one", false, Some(1)),
            ("/x/two/", true, None),
        ],
    )
    .mount(&server)
    .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let mut seen = Vec::new();
    host.iterate_directory_listing("/x", &mut |entry| {
        seen.push((entry.name.clone(), entry.kind));
        true
    })
    .await
    .unwrap();
    assert_eq!(
        seen,
        vec![
            ("one".to_string(), EntryKind::File),
            ("two".to_string(), EntryKind::Directory),
        ]
    );

    // handler bailing out surfaces as cancellation
    let err = host
        .iterate_directory_listing("/x", &mut |_| false)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Cancelled));
}

#[tokio::test]
async fn test_missing_listing_maps_to_not_found() {
    let server = start_server().await;
    Mock::given(method("PROPFIND"))
        .and(path("/missing/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let err = host
        .fetch_directory_listing("/missing/", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[tokio::test]
async fn test_locked_move_maps_to_permission() {
    let server = start_server().await;
    propfind_listing("/", &[("/", true, None), ("/a", false, Some(1))])
        .mount(&server)
        .await;
    Mock::given(method("MOVE"))
        .respond_with(ResponseTemplate::new(423))
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();
    let err = host
        .rename("/a", "/b", &CancelToken::none())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Permission(_)));
}

#[tokio::test]
async fn test_delete_root_is_refused_locally() {
    let server = start_server().await;
    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let err = host.unlink("/", &CancelToken::none()).await.unwrap_err();
    assert!(matches!(err, VfsError::Permission(_)));
    // no DELETE may reach the server
    assert!(server.received_requests().await.unwrap().iter().all(|r| {
        r.method.as_str() != "DELETE"
    }));
}

#[tokio::test]
async fn test_cancel_token_short_circuits() {
    let server = start_server().await;
    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let cancelled = Arc::new(AtomicBool::new(true));
    let observed = cancelled.clone();
    let cancel = CancelToken::new(move || observed.load(Ordering::Relaxed));

    let err = host
        .fetch_directory_listing("/anything/", ListingFlags::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Cancelled));
}

#[tokio::test]
async fn test_observe_directory_changes() {
    let server = start_server().await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let ticket = host.observe_directory_changes(
        "/",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
    );
    assert!(ticket >= 1);

    host.create_directory("/watched", &CancelToken::none())
        .await
        .unwrap();
    assert_eq!(fired.load(Ordering::Relaxed), 1);

    host.stop_observing(ticket);
    host.create_directory("/watched2", &CancelToken::none())
        .await
        .unwrap();
    assert_eq!(fired.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_invalid_path_is_rejected() {
    let server = start_server().await;
    let host = WebDavHost::connect(config_for(&server)).await.unwrap();

    let err = host
        .fetch_directory_listing("relative", ListingFlags::default(), &CancelToken::none())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));

    let err = host.stat("", &CancelToken::none()).await.unwrap_err();
    assert!(matches!(err, VfsError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_tls_failure_maps_to_tls_error() {
    // an https config pointed at a plaintext listener fails the handshake
    let server = MockServer::start().await;
    let address = server.uri();
    let address = address.strip_prefix("http://").unwrap();
    let (host, port) = address.split_once(':').unwrap();
    let config = HostConfiguration::new(host, "", "", "", true, port.parse().ok());

    let err = WebDavHost::connect(config).await.unwrap_err();
    assert!(matches!(err, VfsError::Tls(_)), "got {err:?}");
}
