//! BGS Tops Scraper Integration Tests
//!
//! These tests point the scraper at a local fixture server carrying a
//! miniature copy of the tops pages (one index, two wells), so they exercise
//! the fetch, parse, convert and cache path without network access.

use ndr_access::{BgsTopsScraper, TopsError};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Local fixture server for static pages. Each route carries a status, a
/// body and a hit counter; the header map of the last request per route is
/// kept for inspection.
struct PageServer {
    base_url: String,
    hits: HashMap<&'static str, Arc<AtomicUsize>>,
    last_headers: Arc<Mutex<HashMap<String, Vec<(String, String)>>>>,
}

impl PageServer {
    fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let last_headers = Arc::new(Mutex::new(HashMap::new()));

        let mut hits = HashMap::new();
        let mut table = Vec::new();
        for (path, status, body) in routes {
            let counter = Arc::new(AtomicUsize::new(0));
            hits.insert(path, Arc::clone(&counter));
            table.push((path.to_string(), status, body, counter));
        }

        let headers = Arc::clone(&last_headers);
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => serve_page(stream, &table, &headers),
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url,
            hits,
            last_headers,
        }
    }

    /// Root for `BgsTopsScraper::with_base_url`.
    fn tops_base(&self) -> String {
        format!("{}/tops/", self.base_url)
    }

    fn hits(&self, path: &str) -> usize {
        self.hits
            .get(path)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn last_header(&self, path: &str, name: &str) -> Option<String> {
        self.last_headers
            .lock()
            .unwrap()
            .get(path)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

fn serve_page(
    mut stream: TcpStream,
    routes: &[(String, u16, String, Arc<AtomicUsize>)],
    last_headers: &Arc<Mutex<HashMap<String, Vec<(String, String)>>>>,
) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    last_headers
        .lock()
        .unwrap()
        .insert(target.clone(), headers);

    let (status, body) = routes
        .iter()
        .find(|(path, _, _, counter)| {
            if *path == target {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            } else {
                false
            }
        })
        .map(|(_, status, body, _)| (*status, body.clone()))
        .unwrap_or((404, "no such page".to_string()));

    let reply = format!(
        "HTTP/1.1 {} Fixture\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body,
    );
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

const INDEX_ROUTE: &str = "/tops/seclinks.htm";
const WELL_A_ROUTE: &str = "/tops/well0001.htm";
const WELL_B_ROUTE: &str = "/tops/well0002.htm";

fn index_page() -> String {
    r#"<html><body>
       <h1>Geological tops by well</h1>
       <a href="well0001.htm">15/9- 19</a>
       <a href="well0002.htm">16/7- 2</a>
       </body></html>"#
        .to_string()
}

/// Helper: a detail page in the portal layout. Four preceding tables, then
/// the tops table with two preamble rows, a header row and one data row per
/// depth (in feet).
fn detail_page(feet: &[&str]) -> String {
    let filler = "<table><tr><td>navigation</td></tr></table>".repeat(4);
    let data_rows: String = feet
        .iter()
        .map(|value| format!("<tr><td>Lista</td><td>{value}</td><td>interpreted</td></tr>"))
        .collect();
    format!(
        "<html><body>{filler}\
         <table>\
         <tr><td>Well 15/9- 19</td></tr>\
         <tr><td>Interpreted geological tops</td></tr>\
         <tr><th>Formation</th><th>Top Down Hole Depth</th><th>Notes</th></tr>\
         {data_rows}\
         </table></body></html>"
    )
}

fn scraper_for(server: &PageServer) -> BgsTopsScraper {
    BgsTopsScraper::with_base_url(&server.tops_base(), Duration::from_secs(5)).unwrap()
}

/// Test: the index page yields well labels in page order, and repeat calls
/// reuse the first fetch.
#[test]
fn test_well_ids_fetches_index_once() {
    let server = PageServer::start(vec![(INDEX_ROUTE, 200, index_page())]);
    let mut scraper = scraper_for(&server);

    let first: Vec<String> = scraper.well_ids().unwrap().to_vec();
    assert_eq!(first, ["15/9- 19", "16/7- 2"]);

    let second: Vec<String> = scraper.well_ids().unwrap().to_vec();
    assert_eq!(second, first);
    assert_eq!(server.hits(INDEX_ROUTE), 1, "index must be fetched once");
}

/// Test: index links resolve to absolute detail URLs under the base.
#[test]
fn test_well_ids_url_resolves_links() {
    let server = PageServer::start(vec![(INDEX_ROUTE, 200, index_page())]);
    let base = server.tops_base();
    let mut scraper = scraper_for(&server);

    let urls = scraper.well_ids_url().unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls["15/9- 19"], format!("{base}well0001.htm"));
    assert_eq!(urls["16/7- 2"], format!("{base}well0002.htm"));
}

/// Test: the scraper presents a browser user agent, which the portal
/// requires.
#[test]
fn test_scraper_presents_browser_user_agent() {
    let server = PageServer::start(vec![(INDEX_ROUTE, 200, index_page())]);
    let mut scraper = scraper_for(&server);
    scraper.well_ids().unwrap();

    let agent = server
        .last_header(INDEX_ROUTE, "user-agent")
        .unwrap_or_default();
    assert!(
        agent.starts_with("Mozilla/5.0"),
        "expected a browser user agent, got: {agent}"
    );
}

/// Test: end to end, a well's tops arrive as meters rounded to one decimal
/// with the synthetic 0.0 surface depth first.
#[test]
fn test_tops_extraction_end_to_end() {
    let server = PageServer::start(vec![
        (INDEX_ROUTE, 200, index_page()),
        (WELL_A_ROUTE, 200, detail_page(&["100", "328", "1,000"])),
    ]);
    let mut scraper = scraper_for(&server);

    let depths = scraper.tops_for_well("15/9- 19").unwrap();
    // 100 ft = 30.48 m, 328 ft = 99.9744 m, 1,000 ft = 304.8 m.
    assert_eq!(depths, [0.0, 30.5, 100.0, 304.8]);
}

/// Test: a well's depth model is extracted once; repeat lookups come from
/// the cache.
#[test]
fn test_tops_cached_after_first_fetch() {
    let server = PageServer::start(vec![
        (INDEX_ROUTE, 200, index_page()),
        (WELL_A_ROUTE, 200, detail_page(&["100"])),
    ]);
    let mut scraper = scraper_for(&server);

    let first: Vec<f64> = scraper.tops_for_well("15/9- 19").unwrap().to_vec();
    let second: Vec<f64> = scraper.tops_for_well("15/9- 19").unwrap().to_vec();

    assert_eq!(first, second);
    assert_eq!(
        server.hits(WELL_A_ROUTE),
        1,
        "detail page must be fetched once"
    );
}

/// Test: a label missing from the index is rejected with the known labels,
/// and no detail page is fetched.
#[test]
fn test_unknown_well_id_lists_valid_labels() {
    let server = PageServer::start(vec![
        (INDEX_ROUTE, 200, index_page()),
        (WELL_A_ROUTE, 200, detail_page(&["100"])),
    ]);
    let mut scraper = scraper_for(&server);

    let err = scraper.tops_for_well("7/11- 1").unwrap_err();
    match err {
        TopsError::UnknownWellId { given, valid } => {
            assert_eq!(given, "7/11- 1");
            assert_eq!(valid, ["15/9- 19", "16/7- 2"]);
        }
        other => panic!("expected UnknownWellId, got {other:?}"),
    }
    assert_eq!(server.hits(WELL_A_ROUTE), 0);
    assert_eq!(server.hits(WELL_B_ROUTE), 0);
}

/// Test: a detail page that no longer matches the portal layout surfaces a
/// structure error instead of a panic or a bogus model.
#[test]
fn test_malformed_detail_page_is_structure_error() {
    let one_table = "<html><body><table><tr><td>only</td></tr></table></body></html>".to_string();
    let server = PageServer::start(vec![
        (INDEX_ROUTE, 200, index_page()),
        (WELL_A_ROUTE, 200, one_table),
    ]);
    let mut scraper = scraper_for(&server);

    let err = scraper.tops_for_well("15/9- 19").unwrap_err();
    assert!(matches!(err, TopsError::PageStructure(_)));
    assert!(err.to_string().contains("found 1"));
}

/// Test: a failing index fetch reports the URL and status.
#[test]
fn test_index_fetch_failure_surfaces_status() {
    let server = PageServer::start(vec![(INDEX_ROUTE, 404, "gone".to_string())]);
    let mut scraper = scraper_for(&server);

    let err = scraper.well_ids().unwrap_err();
    match err {
        TopsError::FetchFailed { url, status } => {
            assert!(url.ends_with("seclinks.htm"));
            assert_eq!(status.as_u16(), 404);
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}

/// Test: a failed index fetch is not cached as empty; the next call retries
/// the fetch.
#[test]
fn test_failed_index_fetch_is_retried() {
    let server = PageServer::start(vec![(INDEX_ROUTE, 503, "busy".to_string())]);
    let mut scraper = scraper_for(&server);

    assert!(scraper.well_ids().is_err());
    assert!(scraper.well_ids().is_err());
    assert_eq!(
        server.hits(INDEX_ROUTE),
        2,
        "a failed index fetch must not populate the cache"
    );
}
