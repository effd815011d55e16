//! Integration tests for the full archive run.

use std::time::Duration;

use chan_archiver::archive::{archive_all, collect_threads, RunSummary};
use chan_archiver::config::Config;
use chan_archiver::downloader::RetryPolicy;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"png-bytes!";
const JPG: &[u8] = b"jpg-bytes";

/// Create a test configuration pointing both hosts at the mock server.
fn create_test_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let host = server.address().to_string();
    Config {
        thread_urls: vec![
            "http://boards.4chan.org/g/thread/12345".to_string(),
            "http://boards.4chan.org/g/thread/999".to_string(),
            // Same thread again, different form
            "http://boards.4chan.org/g/thread/12345#p12346".to_string(),
        ],
        download_dir: temp_dir.path().join("archive"),
        link_file: Some(temp_dir.path().join("links.txt")),
        api_host: host.clone(),
        media_host: host,
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::none(),
        ..Config::for_testing()
    }
}

async fn mount_thread(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/g/thread/12345.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                {
                    "no": 12345,
                    "tim": 1_620_000_000_000_u64,
                    "ext": ".png",
                    "fsize": PNG.len(),
                    "com": "source: https://example.com/src"
                },
                {
                    "no": 12346,
                    "tim": 1_620_000_000_001_u64,
                    "ext": ".jpg",
                    "com": "mirror https://exam<wbr>ple.com/src and https://other.example/x"
                }
            ]
        })))
        .expect(2)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/g/thread/999.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(server)
        .await;

    // PNG has a reported size: fetched once, skipped locally afterwards
    Mock::given(method("GET"))
        .and(path("/g/1620000000000.png"))
        .and(header("Range", "bytes=0-"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
        .expect(1)
        .mount(server)
        .await;

    // JPG has no reported size: completeness comes from a 416 on the second run
    Mock::given(method("GET"))
        .and(path("/g/1620000000001.jpg"))
        .and(header("Range", "bytes=0-"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(JPG))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/g/1620000000001.jpg"))
        .and(header("Range", format!("bytes={}-", JPG.len()).as_str()))
        .respond_with(ResponseTemplate::new(416))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_archive_run_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    mount_thread(&mock_server).await;

    let config = create_test_config(&mock_server, &temp_dir);

    let mut threads = collect_threads(&config).await.expect("collect failed");
    assert_eq!(threads.len(), 2);

    let first = archive_all(&config, &mut threads).await.expect("first run failed");
    assert_eq!(
        first,
        RunSummary {
            threads: 2,
            dead_threads: 1,
            files_downloaded: 2,
            files_complete: 0,
            bytes: (PNG.len() + JPG.len()) as u64,
            links_added: 2,
        }
    );

    let thread_dir = temp_dir.path().join("archive").join("12345");
    assert_eq!(std::fs::read(thread_dir.join("1620000000000.png")).unwrap(), PNG);
    assert_eq!(std::fs::read(thread_dir.join("1620000000001.jpg")).unwrap(), JPG);
    assert!(!temp_dir.path().join("archive").join("999").exists());

    let links_path = temp_dir.path().join("links.txt");
    let links = std::fs::read_to_string(&links_path).unwrap();
    assert_eq!(links, "https://example.com/src\nhttps://other.example/x\n");

    // Second run: fresh thread states, same files on disk
    let mut threads = collect_threads(&config).await.expect("collect failed");
    let second = archive_all(&config, &mut threads).await.expect("second run failed");
    assert_eq!(
        second,
        RunSummary {
            threads: 2,
            dead_threads: 1,
            files_downloaded: 0,
            files_complete: 2,
            bytes: 0,
            links_added: 0,
        }
    );

    assert_eq!(std::fs::read(thread_dir.join("1620000000000.png")).unwrap(), PNG);
    assert_eq!(std::fs::read(thread_dir.join("1620000000001.jpg")).unwrap(), JPG);
    assert_eq!(std::fs::read_to_string(&links_path).unwrap(), links);
}

#[tokio::test]
async fn test_flat_layout_without_subdir() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a/thread/77.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [{ "no": 77, "tim": 5_u64, "ext": ".gif", "fsize": 3 }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a/5.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gif".as_slice()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Config {
        thread_urls: vec!["http://boards.4chan.org/a/thread/77".to_string()],
        make_subdir: false,
        link_file: None,
        ..create_test_config(&mock_server, &temp_dir)
    };

    let mut threads = collect_threads(&config).await.unwrap();
    let summary = archive_all(&config, &mut threads).await.unwrap();

    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(summary.links_added, 0);
    assert_eq!(
        std::fs::read(temp_dir.path().join("archive").join("5.gif")).unwrap(),
        b"gif"
    );
    assert!(!temp_dir.path().join("links.txt").exists());
}

#[tokio::test]
async fn test_download_failure_stops_run() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/g/thread/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [{ "no": 1, "tim": 9_u64, "ext": ".png" }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/g/9.png"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;
    // Never reached
    Mock::given(method("GET"))
        .and(path("/g/thread/2.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = Config {
        thread_urls: vec![
            "http://boards.4chan.org/g/thread/1".to_string(),
            "http://boards.4chan.org/g/thread/2".to_string(),
        ],
        ..create_test_config(&mock_server, &temp_dir)
    };

    let mut threads = collect_threads(&config).await.unwrap();
    let err = archive_all(&config, &mut threads).await.unwrap_err();
    assert!(err.to_string().contains("403"), "got {err}");
}
