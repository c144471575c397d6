//! Integration tests for htsnexus
//!
//! Each test builds a scratch index database and data directory.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use htsnexus::{
    handlers::{AppState, create_router},
    index::{BinningStrategy, CachedIndexStore, SCHEMA, SqliteIndexStore},
    location::LocationResolver,
    range::RangeResolver,
    response::ResponseAssembler,
    service::TicketService,
};
use rusqlite::{Connection, params};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SAM_HEADER: &str = "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:1000000\n@SQ\tSN:chr2\tLN:50000\n";

const VCF_HEADER: &str = "##fileformat=VCFv4.3\n##contig=<ID=20,length=64444167>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

fn create_index(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("htsnexus_index");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();

    // local BAM with a block index: header bytes [0,1000), chr1 block, unplaced block
    conn.execute(
        "INSERT INTO htsfiles VALUES ('test:sample1:bam', 'bam', 'test', 'sample1', 'sample1.bam', 3000)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO htsfiles_blocks_meta VALUES ('test:sample1:bam', 'GRCh38', ?1, NULL, NULL)",
        params![SAM_HEADER],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO htsfiles_blocks VALUES ('test:sample1:bam', 1000, 2000, 'chr1', 0, 500, NULL, NULL)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO htsfiles_blocks VALUES ('test:sample1:bam', 2000, 2500, NULL, NULL, NULL, NULL, NULL)",
        [],
    )
    .unwrap();

    // remote VCF with a block index and a stored header slice
    conn.execute(
        "INSERT INTO htsfiles VALUES ('test:remote1:vcf', 'vcf', 'test', 'remote1', 'https://example.org/remote1.vcf.gz', NULL)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO htsfiles_blocks_meta VALUES ('test:remote1:vcf', 'GRCh37', ?1, ?2, NULL)",
        params![VCF_HEADER, b"HDR".to_vec()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO htsfiles_blocks VALUES ('test:remote1:vcf', 500, 900, '20', 60000, 90000, NULL, NULL)",
        [],
    )
    .unwrap();

    // local BAM registered without a block index
    conn.execute(
        "INSERT INTO htsfiles VALUES ('test:plain:bam', 'bam', 'test', 'plain', 'sample1.bam', NULL)",
        [],
    )
    .unwrap();

    path
}

fn sample_bytes() -> Vec<u8> {
    (0..3000u32).map(|i| (i % 251) as u8).collect()
}

fn create_test_server(dir: &TempDir) -> TestServer {
    create_test_server_with_payload(dir, 1 << 20)
}

fn create_test_server_with_payload(dir: &TempDir, max_payload: u64) -> TestServer {
    std::fs::write(dir.path().join("sample1.bam"), sample_bytes()).unwrap();

    let index = create_index(dir);
    let store = SqliteIndexStore::open(index, BinningStrategy::Hierarchical).unwrap();
    let store = Arc::new(CachedIndexStore::new(
        Arc::new(store),
        None,
        Duration::from_secs(5),
    ));
    let service = TicketService::new(
        RangeResolver::new(store),
        LocationResolver::new(dir.path(), None, Duration::from_secs(5)),
        ResponseAssembler::new("http://localhost:48444", max_payload).unwrap(),
    );

    let state = AppState {
        service: Arc::new(service),
        default_namespace: "test".to_string(),
        max_payload,
    };

    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_service_info() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/service-info").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["type"]["artifact"], "htsget");
    assert_eq!(body["type"]["version"], "1.3.0");

    server.get("/").await.assert_status_ok();
}

#[tokio::test]
async fn test_reads_region_ticket() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server
        .get("/reads/test/sample1?referenceName=chr1&start=100&end=300")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["htsget"]["format"], "BAM");

    let urls = body["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);

    assert_eq!(urls[0]["url"], "http://localhost:48444/data/bam/test/sample1");
    assert_eq!(urls[0]["headers"]["Range"], "bytes=0-999");
    assert_eq!(urls[0]["class"], "header");

    assert_eq!(urls[1]["headers"]["Range"], "bytes=1000-1999");
    assert_eq!(urls[1]["class"], "body");

    // BGZF EOF marker
    assert_eq!(
        urls[2]["url"],
        "data:application/octet-stream;base64,H4sIBAAAAAAA/wYAQkMCABsAAwAAAAAAAAAAAA=="
    );
}

#[tokio::test]
async fn test_reads_default_namespace_whole_file() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/reads/sample1").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let urls = body["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].get("headers").is_none());
    assert!(urls[0]["url"].as_str().unwrap().ends_with("/data/bam/test/sample1"));
}

#[tokio::test]
async fn test_reads_header_only() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/reads/test/sample1?class=header").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let urls = body["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["class"], "header");
    assert_eq!(urls[0]["headers"]["Range"], "bytes=0-999");
}

#[tokio::test]
async fn test_reads_unplaced() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/reads/test/sample1?referenceName=*").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let urls = body["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls[1]["headers"]["Range"], "bytes=2000-2499");
}

#[tokio::test]
async fn test_reads_past_reference_end_has_no_body() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server
        .get("/reads/test/sample1?referenceName=chr2&start=60000&end=70000")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let urls = body["htsget"]["urls"].as_array().unwrap();
    // header and EOF only
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["class"], "header");
}

#[tokio::test]
async fn test_variants_remote_ticket() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server
        .get("/variants/test/remote1?referenceName=20&start=70000&end=80000")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["htsget"]["format"], "VCF");
    let urls = body["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0]["url"], "data:application/octet-stream;base64,SERS");
    assert_eq!(urls[1]["url"], "https://example.org/remote1.vcf.gz");
    assert_eq!(urls[1]["headers"]["Range"], "bytes=500-899");
}

#[tokio::test]
async fn test_unknown_accession() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/reads/test/nonexistent").await;
    response.assert_status_not_found();

    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "UnknownAccession");
}

#[tokio::test]
async fn test_unknown_reference() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server
        .get("/reads/test/sample1?referenceName=chrUn&start=0&end=10")
        .await;
    response.assert_status_not_found();

    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "UnknownReference");
}

#[tokio::test]
async fn test_invalid_query() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    for path in [
        "/reads/test/sample1?referenceName=chr1&start=300&end=100",
        "/reads/test/sample1?referenceName=chr1&start=-1",
        "/reads/test/plain?referenceName=chr1",
    ] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["htsget"]["error"], "InvalidQuery", "{}", path);
    }
}

#[tokio::test]
async fn test_malformed_query_string_is_invalid_query() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    for path in [
        "/reads/test/sample1?referenceName=chr1&start=1&start=2",
        "/variants/remote1?referenceName=20&end=5&end=6",
    ] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["htsget"]["error"], "InvalidQuery", "{}", path);
    }
}

#[tokio::test]
async fn test_unsupported_format() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    // Try to get reads with VCF format (not a reads format)
    let response = server.get("/reads/test/sample1?format=VCF").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "UnsupportedFormat");
}

#[tokio::test]
async fn test_data_endpoint_whole_file() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/data/bam/test/sample1").await;
    response.assert_status_ok();

    let content_type = response.headers().get("content-type").unwrap();
    assert_eq!(content_type, "application/vnd.ga4gh.bam");
    assert_eq!(response.as_bytes().len(), 3000);
}

#[tokio::test]
async fn test_data_endpoint_partial_content() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server
        .get("/data/bam/test/sample1")
        .add_header(
            HeaderName::from_static("range"),
            HeaderValue::from_static("bytes=1000-1999"),
        )
        .await;

    response.assert_status(StatusCode::PARTIAL_CONTENT);

    let content_range = response.headers().get("content-range").unwrap();
    assert_eq!(content_range, "bytes 1000-1999/3000");

    let accept_ranges = response.headers().get("accept-ranges").unwrap();
    assert_eq!(accept_ranges, "bytes");

    let bytes = response.as_bytes();
    assert_eq!(bytes.len(), 1000);
    assert_eq!(bytes[0], (1000 % 251) as u8);
}

#[tokio::test]
async fn test_data_endpoint_not_found() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server(&dir);

    let response = server.get("/data/bam/test/nonexistent").await;
    response.assert_status_not_found();
}

/// Fetches every URL of a ticket the way a client would and concatenates the bytes.
async fn fetch_ticket(server: &TestServer, ticket: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in ticket["htsget"]["urls"].as_array().unwrap() {
        let url = entry["url"].as_str().unwrap();
        if let Some(encoded) = url.strip_prefix("data:application/octet-stream;base64,") {
            out.extend(STANDARD.decode(encoded).unwrap());
            continue;
        }

        let path = url.strip_prefix("http://localhost:48444").unwrap();
        let mut request = server.get(path);
        if let Some(range) = entry["headers"]["Range"].as_str() {
            request = request.add_header(
                HeaderName::from_static("range"),
                HeaderValue::from_str(range).unwrap(),
            );
        }
        let response = request.await;
        assert!(
            response.status_code().is_success(),
            "{} {:?} -> {}",
            url,
            entry.get("headers"),
            response.status_code()
        );
        out.extend_from_slice(&response.as_bytes()[..]);
    }
    out
}

#[tokio::test]
async fn test_tickets_stay_within_payload_limit() {
    let dir = TempDir::new().unwrap();
    let server = create_test_server_with_payload(&dir, 512);
    let file = sample_bytes();

    // the whole file is larger than one response may carry
    server
        .get("/data/bam/test/sample1")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let ticket: Value = server.get("/reads/test/sample1").await.json();
    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 6);
    assert_eq!(urls[5]["headers"]["Range"], "bytes=2560-2999");
    assert_eq!(fetch_ticket(&server, &ticket).await, file);

    let ticket: Value = server
        .get("/reads/test/sample1?referenceName=chr1&start=100&end=300")
        .await
        .json();
    let urls = ticket["htsget"]["urls"].as_array().unwrap();
    // header and body split in two each, then the EOF marker
    assert_eq!(urls.len(), 5);
    assert_eq!(urls[1]["class"], "header");
    assert_eq!(urls[2]["headers"]["Range"], "bytes=1000-1511");

    let bytes = fetch_ticket(&server, &ticket).await;
    assert_eq!(&bytes[..2000], &file[..2000]);
    assert_eq!(bytes.len(), 2000 + 28);
}
