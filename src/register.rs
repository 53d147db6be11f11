//! NDR register access client
//!
//! The National Data Repository publishes its well register as SharePoint
//! lists behind a Microsoft-Graph-compatible API. [`NdrClient`] owns the
//! OAuth2 client-credentials handshake, assembles filtered queries against
//! the two known lists (projects and files) and shapes the JSON responses
//! into plain lookup maps.
//!
//! One token is acquired when the client is constructed and reused for the
//! life of the instance; there is no refresh. Every operation is a single
//! blocking request with an explicit timeout.

use crate::config::NdrCredentials;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fixed scope for the client-credentials grant.
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default authority for token requests.
const DEFAULT_LOGIN_BASE: &str = "https://login.microsoftonline.com";

/// Default Graph API root.
const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Opt-in the upstream API demands before it will run filters over
/// non-indexed columns. Sent verbatim on quadrant queries.
const PREFER_NON_INDEXED: &str = "HonorNonIndexedQueriesWarningMayFailRandomly";

/// Register client errors
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The token endpoint answered with a non-200 status. Construction stops
    /// here; no client exists with an absent token.
    #[error("token request rejected with status {status}: {body}")]
    TokenRejected { status: StatusCode, body: String },
    /// A list endpoint answered with a non-200 status.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("list id must be one of [\"project id\", \"file id\"], got '{0}'")]
    UnknownListKey(String),
    /// The requested filter key is not a column of the file list.
    #[error("'{given}' is not a valid key; valid keys: {valid:?}")]
    InvalidFilterKey { given: String, valid: Vec<String> },
    /// Response JSON did not have the expected shape.
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

/// Tunables for client construction. Defaults target the public endpoints
/// with a 30 second per-request timeout and no proxy.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Applied to every request, the token request included.
    pub timeout: Duration,
    /// Optional proxy URL for all traffic (corporate networks).
    pub proxy: Option<String>,
    /// Token authority base. Tests point this at a local server.
    pub login_base: String,
    /// Graph API root. Tests point this at a local server.
    pub graph_base: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            proxy: None,
            login_base: DEFAULT_LOGIN_BASE.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
        }
    }
}

/// Bearer token acquired at construction.
///
/// The register flow never refreshes it. The advertised lifetime is kept so
/// stale use is at least visible, both here and in the logs.
#[derive(Debug, Clone)]
pub struct AccessToken {
    bearer: String,
    acquired_at: Instant,
    lifetime: Option<Duration>,
}

impl AccessToken {
    /// The raw bearer string.
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    /// Whether the lifetime advertised by the token endpoint has elapsed.
    pub fn is_expired(&self) -> bool {
        match self.lifetime {
            Some(lifetime) => self.acquired_at.elapsed() >= lifetime,
            None => false,
        }
    }
}

/// Shape of the token endpoint's happy-path answer.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// One row of the column-metadata table for a register list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub description: String,
}

/// Authenticated client for the NDR well register.
///
/// Queries assemble their target in the `current_url` field and take
/// `&mut self`, so one instance serves one caller at a time; concurrent
/// callers each construct their own client.
#[derive(Debug)]
pub struct NdrClient {
    http: Client,
    credentials: NdrCredentials,
    token: AccessToken,
    auth_header: HeaderValue,
    graph_base: String,
    current_url: String,
}

impl NdrClient {
    /// Connect with [`ClientOptions::default`].
    pub fn connect(credentials: NdrCredentials) -> Result<Self, AccessError> {
        Self::connect_with(credentials, ClientOptions::default())
    }

    /// Connect, performing the client-credentials token request immediately.
    ///
    /// A non-200 answer from the token endpoint fails construction with the
    /// status and response body attached.
    pub fn connect_with(
        credentials: NdrCredentials,
        options: ClientOptions,
    ) -> Result<Self, AccessError> {
        let mut builder = Client::builder().timeout(options.timeout);
        if let Some(proxy) = &options.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let http = builder.build()?;

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            options.login_base.trim_end_matches('/'),
            credentials.tenant_id
        );
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        debug!(url = %token_url, "requesting access token");
        let response = http.post(&token_url).form(&form).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            warn!(%status, body = %body, "there was an error getting the access token");
            return Err(AccessError::TokenRejected { status, body });
        }
        let token: TokenResponse = response.json()?;
        let auth_header = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|e| AccessError::Payload(format!("token is not usable as a header: {e}")))?;
        info!("access token retrieved successfully");

        Ok(Self {
            http,
            credentials,
            token: AccessToken {
                bearer: token.access_token,
                acquired_at: Instant::now(),
                lifetime: token.expires_in.map(Duration::from_secs),
            },
            auth_header,
            graph_base: options.graph_base.trim_end_matches('/').to_string(),
            current_url: String::new(),
        })
    }

    /// The bearer token acquired at construction.
    pub fn access_token(&self) -> &AccessToken {
        &self.token
    }

    /// Target URL assembled by the most recent query.
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Clear the in-progress request target.
    pub fn reset_current_url(&mut self) {
        self.current_url.clear();
    }

    /// Point `current_url` at one of the two register lists.
    ///
    /// `list_key` is the logical name `"project id"` or `"file id"`.
    pub fn create_url(&mut self, list_key: &str) -> Result<(), AccessError> {
        let list_guid = match list_key {
            "project id" => &self.credentials.lists.project_id,
            "file id" => &self.credentials.lists.file_id,
            other => {
                self.reset_current_url();
                return Err(AccessError::UnknownListKey(other.to_string()));
            }
        };
        self.current_url = list_url(&self.graph_base, &self.credentials.site_id, list_guid);
        Ok(())
    }

    /// Standard headers for authenticated calls: bearer authorization plus
    /// a JSON content type.
    fn headers(&self) -> HeaderMap {
        if self.token.is_expired() {
            warn!("access token lifetime has elapsed; upstream calls are expected to fail");
        }
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Issue a GET with the supplied or default headers and parse the body
    /// as JSON. Non-200 responses are logged and surfaced as
    /// [`AccessError::Upstream`] with status and body attached.
    fn fetch_json(&self, url: &str, headers: Option<HeaderMap>) -> Result<Value, AccessError> {
        let headers = headers.unwrap_or_else(|| self.headers());
        debug!(url = %url, "GET");
        let response = self.http.get(url).headers(headers).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            warn!(%status, body = %body, "failed to get response from server");
            return Err(AccessError::Upstream { status, body });
        }
        Ok(response.json()?)
    }

    /// Column metadata (`name`, `displayName`, `description`) for a list.
    ///
    /// The first entry of the server's `value` array is dropped, and the
    /// first row of the extracted set is dropped again — two rows total,
    /// matching the system this replaces. An empty upstream column list
    /// yields an empty table.
    pub fn get_key_names(&mut self, list_key: &str) -> Result<Vec<ColumnInfo>, AccessError> {
        self.create_url(list_key)?;
        self.current_url
            .push_str("/columns?$select=name,displayName,description");
        let payload = self.fetch_json(&self.current_url, None)?;
        extract_columns(&payload)
    }

    /// Find LAS files by a column filter on the file list.
    ///
    /// `key` must be one of the file-list column names, otherwise the items
    /// query is never issued and the error names the allowed set. The result
    /// maps `"<key value> <index>"` (the index disambiguates duplicate key
    /// values) to the file name. An empty upstream result is an empty map.
    pub fn get_las_by_key(
        &mut self,
        key: &str,
        value: &str,
    ) -> Result<BTreeMap<String, String>, AccessError> {
        let valid: Vec<String> = self
            .get_key_names("file id")?
            .into_iter()
            .map(|column| column.name)
            .collect();
        if !valid.iter().any(|name| name == key) {
            return Err(AccessError::InvalidFilterKey {
                given: key.to_string(),
                valid,
            });
        }
        self.create_url("file id")?;
        self.current_url.push_str(&items_by_key_query(key, value));
        let payload = self.fetch_json(&self.current_url, None)?;
        las_map_by_key(&payload, key)
    }

    /// Find the wells of a quadrant via the project list.
    ///
    /// `quad` is not an indexed column upstream, so the request carries the
    /// `Prefer: HonorNonIndexedQueriesWarningMayFailRandomly` opt-in header.
    /// The result maps `"quadrant well <index>"` to the `survid` field.
    pub fn get_las_by_quadrant(
        &mut self,
        quadrant: &str,
    ) -> Result<BTreeMap<String, String>, AccessError> {
        self.create_url("project id")?;
        self.current_url
            .push_str(&items_by_quadrant_query(quadrant));
        let mut headers = self.headers();
        headers.insert("Prefer", HeaderValue::from_static(PREFER_NON_INDEXED));
        let payload = self.fetch_json(&self.current_url, Some(headers))?;
        quadrant_map(&payload)
    }
}

/// Base URL of a register list resource.
fn list_url(graph_base: &str, site_id: &str, list_guid: &str) -> String {
    format!("{graph_base}/sites/{site_id}/lists/{list_guid}")
}

/// Items query filtering an arbitrary file-list column to LAS files.
fn items_by_key_query(key: &str, value: &str) -> String {
    format!(
        "/items?expand=fields(select={key},fnam)&$filter=fields/{key} eq '{value}' and fields/ffmt eq 'LAS'"
    )
}

/// Items query for the wells of one quadrant.
fn items_by_quadrant_query(quadrant: &str) -> String {
    format!(
        "/items?expand=fields(select=quad,survid,ptyp)&$filter=(fields/quad eq '{quadrant}' and fields/ptyp eq 'well')"
    )
}

/// Pull column rows out of a `/columns` response, dropping the first two
/// entries (server skip plus extracted-set skip).
fn extract_columns(payload: &Value) -> Result<Vec<ColumnInfo>, AccessError> {
    let rows = payload
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| AccessError::Payload("no 'value' array in columns response".into()))?;
    rows.iter()
        .skip(2)
        .map(|row| {
            serde_json::from_value(row.clone())
                .map_err(|e| AccessError::Payload(format!("column row: {e}")))
        })
        .collect()
}

/// Shape an items response into `"<key value> <index>" -> fnam`.
fn las_map_by_key(payload: &Value, key: &str) -> Result<BTreeMap<String, String>, AccessError> {
    let mut map = BTreeMap::new();
    for (index, fields) in item_fields(payload)? {
        let key_value = string_field(fields, key, index)?;
        let file_name = string_field(fields, "fnam", index)?;
        map.insert(format!("{key_value} {index}"), file_name);
    }
    Ok(map)
}

/// Shape an items response into `"quadrant well <index>" -> survid`.
fn quadrant_map(payload: &Value) -> Result<BTreeMap<String, String>, AccessError> {
    let mut map = BTreeMap::new();
    for (index, fields) in item_fields(payload)? {
        let survid = string_field(fields, "survid", index)?;
        map.insert(format!("quadrant well {index}"), survid);
    }
    Ok(map)
}

/// Iterate the `fields` member of every row in an items response.
fn item_fields(payload: &Value) -> Result<Vec<(usize, &Value)>, AccessError> {
    let rows = payload
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| AccessError::Payload("no 'value' array in items response".into()))?;
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            row.get("fields")
                .map(|fields| (index, fields))
                .ok_or_else(|| AccessError::Payload(format!("item {index} has no 'fields' member")))
        })
        .collect()
}

/// A required string field of an item's `fields` object.
fn string_field(fields: &Value, name: &str, index: usize) -> Result<String, AccessError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AccessError::Payload(format!("item {index} has no string field '{name}'")))
}
