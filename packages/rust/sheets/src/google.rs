//! Google Sheets API v4 implementation of [`SheetSource`].

use std::time::Duration;

use async_trait::async_trait;
use fieldcheck_shared::{FieldcheckError, Result, SpreadsheetConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::auth::{Credentials, TokenProvider};
use crate::{Grid, SheetSource, resolve_worksheet};

/// User-Agent string for Sheets API requests.
const USER_AGENT: &str = concat!("fieldcheck/", env!("CARGO_PKG_VERSION"));

/// Maximum length of a response body quoted in error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Only the fields we read from the spreadsheet resource.
const METADATA_FIELDS: &str = "properties.title,sheets.properties.title";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection settings for [`GoogleSheetsSource`].
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// API base, e.g. `https://sheets.googleapis.com/v4`.
    pub api_base: String,
    /// Spreadsheet key.
    pub spreadsheet_id: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&SpreadsheetConfig> for SourceOptions {
    fn from(config: &SpreadsheetConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: TitleProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: TitleProperties,
}

/// `values` is omitted entirely for an empty range.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Which resource a request targets, for status mapping.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Spreadsheet,
    Sheet(&'a str),
}

// ---------------------------------------------------------------------------
// GoogleSheetsSource
// ---------------------------------------------------------------------------

/// Reads worksheets of one spreadsheet through the Sheets REST API.
pub struct GoogleSheetsSource {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
}

impl GoogleSheetsSource {
    /// Create a source with explicit options and credentials.
    pub fn new(options: SourceOptions, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| {
                FieldcheckError::SourceUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        let api_base = Url::parse(options.api_base.trim_end_matches('/')).map_err(|e| {
            FieldcheckError::config(format!("invalid api_base '{}': {e}", options.api_base))
        })?;

        Ok(Self {
            client,
            api_base,
            spreadsheet_id: options.spreadsheet_id,
            tokens: TokenProvider::new(credentials),
        })
    }

    /// Create a source from the `[spreadsheet]` config section.
    pub fn from_config(config: &SpreadsheetConfig) -> Result<Self> {
        let credentials = Credentials::from_config(config)?;
        info!(
            spreadsheet_id = %config.spreadsheet_id,
            credential = %credentials.describe(),
            "using Google Sheets source"
        );
        Self::new(SourceOptions::from(config), credentials)
    }

    /// `<api_base>/spreadsheets/<id>[/values/<range>]`, with each segment escaped.
    fn endpoint(&self, range: Option<&str>) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FieldcheckError::config(format!("api_base cannot be a base URL: {}", self.api_base))
            })?;
            segments.pop_if_empty().push("spreadsheets").push(&self.spreadsheet_id);
            if let Some(range) = range {
                segments.push("values").push(range);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, target: Target<'_>) -> Result<T> {
        let token = self.tokens.token(&self.client).await?;
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FieldcheckError::SourceUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, target));
        }

        response
            .json()
            .await
            .map_err(|e| FieldcheckError::parse(format!("{url}: unexpected response body: {e}")))
    }

    async fn metadata(&self) -> Result<SpreadsheetMeta> {
        let mut url = self.endpoint(None)?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);
        self.get_json(url, Target::Spreadsheet).await
    }

    /// Actual worksheet title for a logical sheet name.
    async fn resolve_title(&self, sheet: &str) -> Result<String> {
        let titles = self.worksheet_titles().await?;
        resolve_worksheet(&titles, sheet)
            .map(String::from)
            .ok_or_else(|| FieldcheckError::sheet_not_found(sheet))
    }

    async fn values(&self, range: &str, sheet: &str) -> Result<Grid> {
        let url = self.endpoint(Some(range))?;
        let body: ValueRange = self.get_json(url, Target::Sheet(sheet)).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsSource {
    #[instrument(skip_all)]
    async fn spreadsheet_title(&self) -> Result<String> {
        Ok(self.metadata().await?.properties.title)
    }

    async fn worksheet_titles(&self) -> Result<Vec<String>> {
        Ok(self
            .metadata()
            .await?
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    #[instrument(skip_all, fields(sheet = %sheet))]
    async fn fetch_header(&self, sheet: &str) -> Result<Vec<String>> {
        let title = self.resolve_title(sheet).await?;
        let range = format!("{}!1:1", quote_sheet_title(&title));
        let mut rows = self.values(&range, sheet).await?;
        Ok(if rows.is_empty() { Vec::new() } else { rows.swap_remove(0) })
    }

    #[instrument(skip_all, fields(sheet = %sheet))]
    async fn fetch_grid(&self, sheet: &str) -> Result<Grid> {
        let title = self.resolve_title(sheet).await?;
        let grid = self.values(&quote_sheet_title(&title), sheet).await?;
        debug!(rows = grid.len(), "fetched grid");
        Ok(grid)
    }

    fn describe(&self) -> String {
        self.tokens.credentials().describe()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A1 notation quoting: wrap in single quotes, double embedded quotes.
fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Formatted values arrive as strings; anything else is rendered as JSON text.
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truncate a response body to avoid logging excessive data.
pub(crate) fn truncate_body(body: &str) -> String {
    let total = body.chars().count();
    if total <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{head}... (truncated, {total} chars total)")
    }
}

fn status_error(status: StatusCode, body: &str, target: Target<'_>) -> FieldcheckError {
    let body = truncate_body(body);
    match (status, target) {
        (StatusCode::NOT_FOUND, Target::Sheet(sheet)) => FieldcheckError::sheet_not_found(sheet),
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => FieldcheckError::SourceUnavailable(
            format!("access denied (HTTP {status}); share the spreadsheet with the service account: {body}"),
        ),
        _ => FieldcheckError::SourceUnavailable(format!("HTTP {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SHEET_ID: &str = "sheet-123";

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/sheets/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    /// Encoded request path for a values range, as the mock server sees it.
    fn values_path(source: &GoogleSheetsSource, range: &str) -> String {
        source.endpoint(Some(range)).unwrap().path().to_string()
    }

    fn source_for(server: &MockServer) -> GoogleSheetsSource {
        let options = SourceOptions {
            api_base: format!("{}/v4", server.uri()),
            spreadsheet_id: SHEET_ID.into(),
            timeout_secs: 5,
        };
        GoogleSheetsSource::new(options, Credentials::Bearer("test-token".into())).unwrap()
    }

    async fn mount_metadata(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}")))
            .and(query_param("fields", METADATA_FIELDS))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("metadata.json")),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn quotes_titles() {
        assert_eq!(quote_sheet_title("Выборка"), "'Выборка'");
        assert_eq!(quote_sheet_title("it's"), "'it''s'");
    }

    #[test]
    fn non_string_cells_render_as_text() {
        assert_eq!(cell_to_string(serde_json::json!(1)), "1");
        assert_eq!(cell_to_string(serde_json::json!(true)), "true");
        assert_eq!(cell_to_string(serde_json::Value::Null), "");
    }

    #[test]
    fn truncates_long_bodies_on_char_boundaries() {
        let body = "я".repeat(MAX_ERROR_BODY_CHARS + 5);
        let out = truncate_body(&body);
        assert!(out.contains("truncated"));
        assert!(out.starts_with("яя"));
    }

    #[test]
    fn endpoint_escapes_range() {
        let source = GoogleSheetsSource::new(
            SourceOptions {
                api_base: "https://sheets.example.com/v4/".into(),
                spreadsheet_id: SHEET_ID.into(),
                timeout_secs: 5,
            },
            Credentials::Bearer("t".into()),
        )
        .unwrap();
        let url = source.endpoint(Some("'Тексты'!1:1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet-123/values/\
             '%D0%A2%D0%B5%D0%BA%D1%81%D1%82%D1%8B'!1:1"
        );
    }

    #[tokio::test]
    async fn reads_titles() {
        let server = MockServer::start().await;
        mount_metadata(&server).await;
        let source = source_for(&server);

        assert_eq!(source.spreadsheet_title().await.unwrap(), "Проверки");
        assert_eq!(
            source.worksheet_titles().await.unwrap(),
            vec!["Выборка ".to_string(), "Тексты".to_string()]
        );
    }

    #[tokio::test]
    async fn fetches_grid_of_fuzzy_matched_sheet() {
        let server = MockServer::start().await;
        mount_metadata(&server).await;
        let source = source_for(&server);
        Mock::given(method("GET"))
            .and(path(values_path(&source, "'Выборка '")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("selection_values.json")),
            )
            .mount(&server)
            .await;

        let grid = source.fetch_grid("выборка").await.unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][0], "ФИО");
        // ragged rows come back as sent
        assert_eq!(grid[2].len(), 2);
    }

    #[tokio::test]
    async fn fetches_header_row() {
        let server = MockServer::start().await;
        mount_metadata(&server).await;
        let source = source_for(&server);
        Mock::given(method("GET"))
            .and(path(values_path(&source, "'Тексты'!1:1")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"range":"'Тексты'!A1:C1","majorDimension":"ROWS","values":[["","c1","c2"]]}"#,
            ))
            .mount(&server)
            .await;

        let header = source.fetch_header("Тексты").await.unwrap();
        assert_eq!(header, vec!["", "c1", "c2"]);
    }

    #[tokio::test]
    async fn empty_range_yields_empty_grid() {
        let server = MockServer::start().await;
        mount_metadata(&server).await;
        let source = source_for(&server);
        Mock::given(method("GET"))
            .and(path(values_path(&source, "'Тексты'")))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"range":"'Тексты'!A1:Z1000"}"#))
            .mount(&server)
            .await;

        assert!(source.fetch_grid("Тексты").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_sheet_is_not_found() {
        let server = MockServer::start().await;
        mount_metadata(&server).await;

        let err = source_for(&server).fetch_grid("Архив").await.unwrap_err();
        assert!(matches!(err, FieldcheckError::SheetNotFound { ref sheet } if sheet == "Архив"));
    }

    #[tokio::test]
    async fn forbidden_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}")))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = source_for(&server).worksheet_titles().await.unwrap_err();
        match err {
            FieldcheckError::SourceUnavailable(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("PERMISSION_DENIED"));
            }
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }
}
