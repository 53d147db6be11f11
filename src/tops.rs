//! BGS geological tops scraper
//!
//! BGS publishes interpreted geological tops for offshore wells as static
//! pages on the NSTA portal: one index page (`seclinks.htm`) linking every
//! well, plus one detail page per well. [`BgsTopsScraper`] downloads the
//! index once, resolves a well's detail page and extracts the
//! "Top Down Hole Depth" column of the fifth table as a depth sequence in
//! meters, prefixed with a synthetic surface depth of 0.0.
//!
//! The portal's page layout is taken on trust: the tops table position and
//! the two preamble rows are fixed assumptions, and a page that no longer
//! matches them surfaces as [`TopsError::PageStructure`] rather than a panic.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Feet to meters.
const FT_TO_M: f64 = 0.3048;

/// Public root of the geological tops pages.
const DEFAULT_BASE_URL: &str =
    "https://itportal.nstauthority.co.uk/information/well_data/bgs_tops/geological_tops/";

/// Index page listing every well with interpreted tops.
const INDEX_PAGE: &str = "seclinks.htm";

/// The portal blocks default HTTP agents; present a browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";

/// Header of the column carrying each top's depth, in feet.
const DEPTH_COLUMN: &str = "Top Down Hole Depth";

/// Position of the tops table among the page's `<table>` elements.
const TOPS_TABLE_INDEX: usize = 4;

/// Preamble rows before the header row of the tops table.
const TOPS_SKIP_ROWS: usize = 2;

/// Tops scraper errors
#[derive(Debug, thiserror::Error)]
pub enum TopsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The portal answered with a non-200 status.
    #[error("failed to fetch {url}: status {status}")]
    FetchFailed {
        url: String,
        status: reqwest::StatusCode,
    },
    /// The requested label is not in the index.
    #[error("well id '{given}' must be one of {valid:?}")]
    UnknownWellId { given: String, valid: Vec<String> },
    /// The page no longer matches the layout the extractor assumes.
    #[error("unexpected page structure: {0}")]
    PageStructure(String),
}

/// Everything derived from one fetch of the index page: the link labels in
/// page order and the label → absolute-URL map. A single struct, so the two
/// views can only be populated or discarded together.
#[derive(Debug, Clone, Default)]
pub struct WellIndex {
    labels: Vec<String>,
    urls: HashMap<String, String>,
}

impl WellIndex {
    /// Well labels in page order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Absolute detail-page URL for a label.
    pub fn url_for(&self, label: &str) -> Option<&str> {
        self.urls.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.urls.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Scraper for the BGS geological tops pages.
///
/// The index is fetched lazily on first use and kept for the scraper's
/// lifetime; per-well depth models are cached after their first extraction,
/// so repeat lookups never re-fetch.
pub struct BgsTopsScraper {
    http: reqwest::blocking::Client,
    base_url: String,
    index: Option<WellIndex>,
    models: HashMap<String, Vec<f64>>,
}

impl BgsTopsScraper {
    /// Scraper for the public portal, 30 second timeout.
    pub fn new() -> Result<Self, TopsError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Scraper for the public portal with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TopsError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// Scraper rooted at a different base URL (tests use a local server).
    /// Detail links resolve to `<base_url><href>`.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, TopsError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http,
            base_url,
            index: None,
            models: HashMap::new(),
        })
    }

    /// Well labels in index-page order. The first call fetches the index;
    /// later calls reuse it.
    pub fn well_ids(&mut self) -> Result<&[String], TopsError> {
        Ok(self.index()?.labels())
    }

    /// Label → absolute detail-page URL, from the same cached index.
    pub fn well_ids_url(&mut self) -> Result<&HashMap<String, String>, TopsError> {
        Ok(&self.index()?.urls)
    }

    /// Depth sequence for one well, in meters, starting with the synthetic
    /// 0.0 surface depth. Extracted once per well and cached; repeat calls
    /// return the cached sequence without re-fetching.
    pub fn tops_for_well(&mut self, well_id: &str) -> Result<&[f64], TopsError> {
        if !self.models.contains_key(well_id) {
            let depths = self.fetch_model(well_id)?;
            debug!(well_id, tops = depths.len(), "cached tops model");
            self.models.insert(well_id.to_string(), depths);
        }
        Ok(self
            .models
            .get(well_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    fn fetch_model(&mut self, well_id: &str) -> Result<Vec<f64>, TopsError> {
        let url = {
            let index = self.index()?;
            match index.url_for(well_id) {
                Some(url) => url.to_string(),
                None => {
                    return Err(TopsError::UnknownWellId {
                        given: well_id.to_string(),
                        valid: index.labels().to_vec(),
                    })
                }
            }
        };
        let html = self.fetch_page(&url)?;
        parse_tops_table(&html)
    }

    fn index(&mut self) -> Result<&WellIndex, TopsError> {
        if self.index.is_none() {
            let url = format!("{}{}", self.base_url, INDEX_PAGE);
            let html = self.fetch_page(&url)?;
            let parsed = parse_link_index(&html, &self.base_url);
            info!(wells = parsed.len(), "loaded BGS tops index");
            self.index = Some(parsed);
        }
        Ok(self.index.get_or_insert_with(WellIndex::default))
    }

    /// Download a page, requiring HTTP 200. Anything else is fatal for the
    /// call.
    fn fetch_page(&self, url: &str) -> Result<String, TopsError> {
        debug!(url = %url, "GET");
        let response = self.http.get(url).send()?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(%status, url = %url, "failed to fetch web page");
            return Err(TopsError::FetchFailed {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.text()?)
    }
}

/// CSS selectors used below are fixed literals and always parse.
fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Build the well index from the raw index page: every `<a>` element
/// contributes its text as the label and `<base><href>` as the detail URL.
fn parse_link_index(html: &str, base_url: &str) -> WellIndex {
    let document = Html::parse_document(html);
    let anchor = selector("a");
    let mut labels = Vec::new();
    let mut urls = HashMap::new();
    for element in document.select(&anchor) {
        let label: String = element.text().collect();
        let href = element.value().attr("href").unwrap_or_default();
        urls.insert(label.clone(), format!("{base_url}{href}"));
        labels.push(label);
    }
    WellIndex { labels, urls }
}

/// Extract the depth sequence from a well detail page.
///
/// The tops table is the fifth on the page; its first two rows are preamble
/// and the next one is the header. Depths come from the
/// "Top Down Hole Depth" column in feet, converted to meters and rounded to
/// one decimal, with 0.0 prepended.
fn parse_tops_table(html: &str) -> Result<Vec<f64>, TopsError> {
    let document = Html::parse_document(html);
    let tables: Vec<_> = document.select(&selector("table")).collect();
    let table = tables.get(TOPS_TABLE_INDEX).ok_or_else(|| {
        TopsError::PageStructure(format!(
            "expected at least {} tables on the page, found {}",
            TOPS_TABLE_INDEX + 1,
            tables.len()
        ))
    })?;

    let row_selector = selector("tr");
    let cell_selector = selector("td, th");
    let mut rows = table.select(&row_selector).skip(TOPS_SKIP_ROWS);

    let header = rows.next().ok_or_else(|| {
        TopsError::PageStructure(format!(
            "tops table has no header row after skipping {TOPS_SKIP_ROWS} rows"
        ))
    })?;
    let header_cells: Vec<String> = header.select(&cell_selector).map(cell_text).collect();
    let depth_column = header_cells
        .iter()
        .position(|cell| cell == DEPTH_COLUMN)
        .ok_or_else(|| {
            TopsError::PageStructure(format!(
                "no '{DEPTH_COLUMN}' column in tops table header {header_cells:?}"
            ))
        })?;

    let mut depths = vec![0.0];
    for (row_number, row) in rows.enumerate() {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        let raw = cells.get(depth_column).ok_or_else(|| {
            TopsError::PageStructure(format!(
                "row {row_number} of the tops table has no depth cell"
            ))
        })?;
        let feet: f64 = raw.replace(',', "").parse().map_err(|_| {
            TopsError::PageStructure(format!("non-numeric depth value '{raw}'"))
        })?;
        depths.push(round_decimeter(feet * FT_TO_M));
    }
    Ok(depths)
}

/// Round to one decimal place.
fn round_decimeter(meters: f64) -> f64 {
    (meters * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"
        <html><body>
        <p>Geological tops by well</p>
        <a href="well0001.htm">15/9- 19</a>
        <a href="well0002.htm">16/7- 2</a>
        <a href="well0003.htm">211/26- 4</a>
        </body></html>
    "#;

    fn detail_page(feet: &[&str]) -> String {
        let filler = "<table><tr><td>filler</td></tr></table>".repeat(4);
        let data_rows: String = feet
            .iter()
            .map(|value| {
                format!("<tr><td>Lista</td><td>{value}</td><td>descr</td></tr>")
            })
            .collect();
        format!(
            "<html><body>{filler}\
             <table>\
             <tr><td>preamble one</td></tr>\
             <tr><td>preamble two</td></tr>\
             <tr><th>Formation</th><th>Top Down Hole Depth</th><th>Notes</th></tr>\
             {data_rows}\
             </table></body></html>"
        )
    }

    #[test]
    fn test_parse_link_index_orders_and_resolves() {
        let index = parse_link_index(INDEX_HTML, "https://example.test/tops/");
        assert_eq!(index.labels(), ["15/9- 19", "16/7- 2", "211/26- 4"]);
        assert_eq!(
            index.url_for("16/7- 2"),
            Some("https://example.test/tops/well0002.htm")
        );
        assert!(index.contains("211/26- 4"));
        assert!(!index.contains("1/1- 1"));
    }

    #[test]
    fn test_parse_tops_table_converts_feet_and_prepends_zero() {
        let page = detail_page(&["100", "328", "1,000"]);
        let depths = parse_tops_table(&page).unwrap();
        // 100 ft = 30.48 m -> 30.5; 328 ft = 99.9744 m -> 100.0;
        // 1,000 ft (comma grouped) = 304.8 m.
        assert_eq!(depths, vec![0.0, 30.5, 100.0, 304.8]);
    }

    #[test]
    fn test_parse_tops_table_needs_five_tables() {
        let page = "<html><body><table><tr><td>only</td></tr></table></body></html>";
        let err = parse_tops_table(page).unwrap_err();
        assert!(matches!(err, TopsError::PageStructure(_)));
        assert!(err.to_string().contains("found 1"));
    }

    #[test]
    fn test_parse_tops_table_missing_depth_column() {
        let filler = "<table><tr><td>filler</td></tr></table>".repeat(4);
        let page = format!(
            "<html><body>{filler}\
             <table>\
             <tr><td>one</td></tr><tr><td>two</td></tr>\
             <tr><th>Formation</th><th>Depth In Cubits</th></tr>\
             <tr><td>Lista</td><td>7</td></tr>\
             </table></body></html>"
        );
        let err = parse_tops_table(&page).unwrap_err();
        assert!(matches!(err, TopsError::PageStructure(_)));
        assert!(err.to_string().contains("Top Down Hole Depth"));
    }

    #[test]
    fn test_parse_tops_table_rejects_non_numeric_depths() {
        let page = detail_page(&["100", "n/a"]);
        let err = parse_tops_table(&page).unwrap_err();
        assert!(matches!(err, TopsError::PageStructure(_)));
        assert!(err.to_string().contains("n/a"));
    }

    #[test]
    fn test_round_decimeter() {
        assert_eq!(round_decimeter(30.48), 30.5);
        assert_eq!(round_decimeter(99.9744), 100.0);
        assert_eq!(round_decimeter(0.04), 0.0);
    }
}
