//! Implements the `SheetStore` trait over the Google Sheets v4 and Drive v3
//! REST APIs using `reqwest`. Ledgers are resolved from spreadsheet names via
//! a Drive file search, with the name-to-id mapping cached per process.

use crate::api::oauth::TokenProvider;
use crate::api::{col_letter, parse_a1, CellStyle, SheetStore};
use crate::{Config, Result};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

pub(super) struct GoogleSheetStore {
    token: TokenProvider,
    client: reqwest::Client,
    /// Ledger name -> spreadsheet id.
    ids: Mutex<HashMap<String, String>>,
}

impl GoogleSheetStore {
    pub(super) async fn new(config: &Config) -> Result<Self> {
        let token = TokenProvider::load(config.client_secret_path(), config.token_path()).await?;
        Ok(Self {
            token,
            client: reqwest::Client::new(),
            ids: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a ledger name to its spreadsheet id, or `None` if no such
    /// spreadsheet exists.
    async fn spreadsheet_id(&self, ledger: &str) -> Result<Option<String>> {
        if let Some(id) = self.ids.lock().await.get(ledger) {
            return Ok(Some(id.clone()));
        }
        let access_token = self.token.access_token().await?;
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            ledger.replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        let response = self
            .client
            .get(DRIVE_FILES)
            .bearer_auth(&access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .context("Failed to send Drive file search request")?;
        let listing: DriveList = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse the Drive file search response")?;
        match listing.files.into_iter().next() {
            Some(file) => {
                self.ids
                    .lock()
                    .await
                    .insert(ledger.to_string(), file.id.clone());
                Ok(Some(file.id))
            }
            None => Ok(None),
        }
    }

    /// Like `spreadsheet_id` but treats a missing ledger as an error. Used by
    /// operations that only run on a ledger already bound to a conversation.
    async fn require_id(&self, ledger: &str) -> Result<String> {
        self.spreadsheet_id(ledger)
            .await?
            .with_context(|| format!("Ledger '{ledger}' disappeared mid-operation"))
    }

    /// Fetches the grid properties of one worksheet.
    async fn sheet_props(&self, ledger: &str, sheet: &str) -> Result<SheetProperties> {
        let id = self.require_id(ledger).await?;
        let meta = self.spreadsheet_meta(&id).await?;
        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .find(|p| p.title == sheet)
            .with_context(|| format!("Worksheet '{sheet}' not found in ledger '{ledger}'"))
    }

    async fn spreadsheet_meta(&self, id: &str) -> Result<SpreadsheetMeta> {
        let access_token = self.token.access_token().await?;
        let mut url = Url::parse(SHEETS_BASE).expect("constant URL");
        url.path_segments_mut().expect("base URL").push(id);
        let response = self
            .client
            .get(url)
            .bearer_auth(&access_token)
            .query(&[(
                "fields",
                "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))",
            )])
            .send()
            .await
            .context("Failed to request spreadsheet metadata")?;
        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse spreadsheet metadata")
    }

    async fn values_get(
        &self,
        id: &str,
        range: &str,
        major_dimension: &str,
    ) -> Result<Vec<Vec<String>>> {
        let access_token = self.token.access_token().await?;
        let mut url = Url::parse(SHEETS_BASE).expect("constant URL");
        url.path_segments_mut()
            .expect("base URL")
            .push(id)
            .push("values")
            .push(range);
        let response = self
            .client
            .get(url)
            .bearer_auth(&access_token)
            .query(&[
                ("majorDimension", major_dimension),
                ("valueRenderOption", "FORMATTED_VALUE"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch range '{range}'"))?;
        let body: ValuesResponse = check(response)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse values for range '{range}'"))?;
        Ok(body.values)
    }

    async fn batch_update(&self, id: &str, request: serde_json::Value) -> Result<()> {
        let access_token = self.token.access_token().await?;
        let url = format!("{SHEETS_BASE}/{id}:batchUpdate");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .context("Failed to send batchUpdate request")?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SheetStore for GoogleSheetStore {
    async fn list_ledgers(&self) -> Result<Vec<String>> {
        let access_token = self.token.access_token().await?;
        let query = format!("mimeType = '{SPREADSHEET_MIME}' and trashed = false");
        let response = self
            .client
            .get(DRIVE_FILES)
            .bearer_auth(&access_token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "1000"),
            ])
            .send()
            .await
            .context("Failed to list spreadsheet files")?;
        let listing: DriveList = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse the Drive file listing")?;
        let mut ids = self.ids.lock().await;
        let mut names: Vec<String> = listing
            .files
            .into_iter()
            .map(|f| {
                ids.insert(f.name.clone(), f.id);
                f.name
            })
            // Ledger spreadsheets are the YYYY.MM-named ones.
            .filter(|name| name.contains('.'))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn worksheet_titles(&self, ledger: &str) -> Result<Option<Vec<String>>> {
        let Some(id) = self.spreadsheet_id(ledger).await? else {
            return Ok(None);
        };
        let meta = self.spreadsheet_meta(&id).await?;
        Ok(Some(
            meta.sheets.into_iter().map(|s| s.properties.title).collect(),
        ))
    }

    async fn col_count(&self, ledger: &str, sheet: &str) -> Result<usize> {
        Ok(self.sheet_props(ledger, sheet).await?.grid_properties.column_count)
    }

    async fn col_values(&self, ledger: &str, sheet: &str, col: usize) -> Result<Vec<String>> {
        let id = self.require_id(ledger).await?;
        let letter = col_letter(col);
        let range = format!("'{sheet}'!{letter}:{letter}");
        let mut columns = self.values_get(&id, &range, "COLUMNS").await?;
        Ok(if columns.is_empty() {
            Vec::new()
        } else {
            columns.swap_remove(0)
        })
    }

    async fn row_values(&self, ledger: &str, sheet: &str, row: usize) -> Result<Vec<String>> {
        let props = self.sheet_props(ledger, sheet).await?;
        if row == 0 || row > props.grid_properties.row_count {
            bail!("Row {row} is outside the grid of worksheet '{sheet}'");
        }
        let id = self.require_id(ledger).await?;
        let range = format!("'{sheet}'!{row}:{row}");
        let mut rows = self.values_get(&id, &range, "ROWS").await?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }

    async fn records(&self, ledger: &str, sheet: &str) -> Result<Vec<Vec<String>>> {
        let id = self.require_id(ledger).await?;
        let range = format!("'{sheet}'!A2:ZZ");
        self.values_get(&id, &range, "ROWS").await
    }

    async fn resize(&self, ledger: &str, sheet: &str, rows: usize) -> Result<()> {
        let props = self.sheet_props(ledger, sheet).await?;
        let id = self.require_id(ledger).await?;
        self.batch_update(
            &id,
            serde_json::json!({
                "requests": [{
                    "updateSheetProperties": {
                        "properties": {
                            "sheetId": props.sheet_id,
                            "gridProperties": { "rowCount": rows },
                        },
                        "fields": "gridProperties.rowCount",
                    }
                }]
            }),
        )
        .await
        .with_context(|| format!("Failed to resize worksheet '{sheet}' to {rows} rows"))
    }

    async fn read_range(&self, ledger: &str, sheet: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let id = self.require_id(ledger).await?;
        let range = format!("'{sheet}'!{range}");
        self.values_get(&id, &range, "ROWS").await
    }

    async fn read_cell(&self, ledger: &str, sheet: &str, cell: &str) -> Result<String> {
        let rows = self.read_range(ledger, sheet, cell).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }

    async fn write_cell(&self, ledger: &str, sheet: &str, cell: &str, value: &str) -> Result<()> {
        let access_token = self.token.access_token().await?;
        let id = self.require_id(ledger).await?;
        let range = format!("'{sheet}'!{cell}");
        let mut url = Url::parse(SHEETS_BASE).expect("constant URL");
        url.path_segments_mut()
            .expect("base URL")
            .push(&id)
            .push("values")
            .push(&range);
        let response = self
            .client
            .put(url)
            .bearer_auth(&access_token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await
            .with_context(|| format!("Failed to write cell {cell} of '{sheet}'"))?;
        check(response).await?;
        Ok(())
    }

    async fn format_cell(
        &self,
        ledger: &str,
        sheet: &str,
        cell: &str,
        style: &CellStyle,
    ) -> Result<()> {
        let (row, col) = parse_a1(cell)?;
        let props = self.sheet_props(ledger, sheet).await?;
        let id = self.require_id(ledger).await?;
        self.batch_update(
            &id,
            serde_json::json!({
                "requests": [{
                    "repeatCell": {
                        "range": {
                            "sheetId": props.sheet_id,
                            "startRowIndex": row - 1,
                            "endRowIndex": row,
                            "startColumnIndex": col - 1,
                            "endColumnIndex": col,
                        },
                        "cell": { "userEnteredFormat": style.to_cell_format() },
                        "fields":
                            "userEnteredFormat(horizontalAlignment,numberFormat,textFormat.fontSize)",
                    }
                }]
            }),
        )
        .await
        .with_context(|| format!("Failed to format cell {cell} of '{sheet}'"))
    }
}

/// Turns a non-success HTTP response into an error carrying the body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("Google API call failed with status {status}: {body}");
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DriveList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    grid_properties: GridProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    row_count: usize,
    column_count: usize,
}
