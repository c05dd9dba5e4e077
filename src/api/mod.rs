//! Collaborator seams. The bot core talks to the spreadsheet backend and the
//! messaging transport only through the `SheetStore` and `Messenger` traits,
//! so the whole conversation machine runs in-memory under test.

mod google;
mod oauth;
mod telegram;
mod test_client;

use crate::{Config, Result};
use anyhow::{bail, Context};
use std::sync::Arc;

pub(crate) use telegram::Update;
#[cfg(test)]
pub(crate) use test_client::{SentMessage, TestMessenger, TestSheet, TestSheetStore};

/// The worksheet holding the month's running income/expense/balance totals.
pub(crate) const BALANCE_SHEET: &str = "Balance";

/// The fixed worksheet that income entries go into.
pub(crate) const INCOME_SHEET: &str = "Income";

/// The last worksheets of every Ledger are summary/balance sheets, never
/// categories. A fixed convention of the spreadsheet layout.
pub(crate) const RESERVED_TRAILING_SHEETS: usize = 2;

/// Determines whether we use the real Google/Telegram backends or the
/// in-memory test clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Live,
    Test,
}

impl Mode {
    /// This allows for running the program without hitting the Google or
    /// Telegram APIs. When LEDGERBOT_IN_TEST_MODE is set and non-zero in
    /// length, the mode will be `Mode::Test`, otherwise `Mode::Live`.
    pub fn from_env() -> Mode {
        match std::env::var("LEDGERBOT_IN_TEST_MODE") {
            Ok(s) if !s.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// The spreadsheet backend as the bot core needs it: one method per gspread-
/// style operation, addressed by ledger (spreadsheet) name and worksheet
/// title. Rows and columns are 1-based throughout, matching A1 notation.
#[async_trait::async_trait]
pub(crate) trait SheetStore: Send + Sync {
    /// Names of all ledger spreadsheets the account can see.
    async fn list_ledgers(&self) -> Result<Vec<String>>;

    /// The ordered worksheet titles of a ledger, or `None` if the ledger does
    /// not exist (a recoverable condition).
    async fn worksheet_titles(&self, ledger: &str) -> Result<Option<Vec<String>>>;

    /// Number of columns in the worksheet grid.
    async fn col_count(&self, ledger: &str, sheet: &str) -> Result<usize>;

    /// All cell values of one column, top to bottom, blanks included.
    async fn col_values(&self, ledger: &str, sheet: &str, col: usize) -> Result<Vec<String>>;

    /// Cell values of one row. Errors when the row lies outside the grid.
    async fn row_values(&self, ledger: &str, sheet: &str, row: usize) -> Result<Vec<String>>;

    /// The data rows below the header row.
    async fn records(&self, ledger: &str, sheet: &str) -> Result<Vec<Vec<String>>>;

    /// Sets the worksheet's row count.
    async fn resize(&self, ledger: &str, sheet: &str, rows: usize) -> Result<()>;

    /// Reads a rectangular A1 range as rows of cell values.
    async fn read_range(&self, ledger: &str, sheet: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Reads one cell by A1 reference, blank cells reading as "".
    async fn read_cell(&self, ledger: &str, sheet: &str, cell: &str) -> Result<String>;

    /// Writes one cell with user-entered semantics (the backend may parse the
    /// value, e.g. a `dd.mm.yyyy` string into a date).
    async fn write_cell(&self, ledger: &str, sheet: &str, cell: &str, value: &str) -> Result<()>;

    /// Applies a display style to one cell.
    async fn format_cell(
        &self,
        ledger: &str,
        sheet: &str,
        cell: &str,
        style: &CellStyle,
    ) -> Result<()>;
}

/// The messaging transport as the bot core needs it.
#[async_trait::async_trait]
pub(crate) trait Messenger: Send + Sync {
    /// Sends a plain message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Sends a message quoting the user's message it responds to.
    async fn reply_to(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;

    /// The bot's own identity, for the health endpoint.
    async fn get_me(&self) -> Result<serde_json::Value>;
}

/// Creates the spreadsheet backend for the given mode.
pub(crate) async fn sheet_store(mode: Mode, config: &Config) -> Result<Arc<dyn SheetStore>> {
    Ok(match mode {
        Mode::Live => Arc::new(
            google::GoogleSheetStore::new(config)
                .await
                .context("Unable to create the Google Sheets client")?,
        ),
        Mode::Test => Arc::new(test_client::TestSheetStore::seeded()),
    })
}

/// Creates the messaging transport for the given mode.
pub(crate) fn messenger(mode: Mode, config: &Config) -> Arc<dyn Messenger> {
    match mode {
        Mode::Live => Arc::new(telegram::TelegramMessenger::new(config.bot_token())),
        Mode::Test => Arc::new(test_client::TestMessenger::default()),
    }
}

/// Horizontal alignment of a formatted cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "LEFT",
            Align::Center => "CENTER",
            Align::Right => "RIGHT",
        }
    }
}

/// A cell display style, expressed in the vocabulary of the Sheets API
/// `CellFormat` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CellStyle {
    pub(crate) align: Align,
    pub(crate) font_size: u8,
    /// `(type, pattern)`, e.g. `("DATE", "dd.mm.yyyy")`.
    pub(crate) number_format: Option<(&'static str, &'static str)>,
}

impl CellStyle {
    /// The style as a Sheets API `userEnteredFormat` JSON object.
    pub(crate) fn to_cell_format(&self) -> serde_json::Value {
        let mut format = serde_json::json!({
            "horizontalAlignment": self.align.as_str(),
            "textFormat": { "fontSize": self.font_size },
        });
        if let Some((kind, pattern)) = self.number_format {
            format["numberFormat"] = serde_json::json!({
                "type": kind,
                "pattern": pattern,
            });
        }
        format
    }
}

/// Converts a 1-based column number to its A1 letter form.
pub(super) fn col_letter(mut col: usize) -> String {
    let mut s = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        s.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    s
}

/// Parses an A1 cell reference like `C15` into 1-based `(row, col)`.
pub(super) fn parse_a1(cell: &str) -> Result<(usize, usize)> {
    let letters: String = cell.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &cell[letters.len()..];
    if letters.is_empty() || digits.is_empty() {
        bail!("'{cell}' is not a valid A1 cell reference");
    }
    let mut col = 0usize;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits
        .parse()
        .with_context(|| format!("'{cell}' is not a valid A1 cell reference"))?;
    if row == 0 {
        bail!("'{cell}' addresses row zero");
    }
    Ok((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_letters() {
        assert_eq!(col_letter(1), "A");
        assert_eq!(col_letter(3), "C");
        assert_eq!(col_letter(26), "Z");
        assert_eq!(col_letter(27), "AA");
        assert_eq!(col_letter(52), "AZ");
    }

    #[test]
    fn a1_round_trip() {
        assert_eq!(parse_a1("A1").unwrap(), (1, 1));
        assert_eq!(parse_a1("C15").unwrap(), (15, 3));
        assert_eq!(parse_a1("AA2").unwrap(), (2, 27));
    }

    #[test]
    fn a1_rejects_garbage() {
        assert!(parse_a1("15").is_err());
        assert!(parse_a1("C").is_err());
        assert!(parse_a1("C0").is_err());
    }

    #[test]
    fn cell_format_json_includes_number_format_only_when_set() {
        let plain = CellStyle {
            align: Align::Left,
            font_size: 12,
            number_format: None,
        };
        let v = plain.to_cell_format();
        assert_eq!(v["horizontalAlignment"], "LEFT");
        assert!(v.get("numberFormat").is_none());

        let dated = CellStyle {
            align: Align::Center,
            font_size: 12,
            number_format: Some(("DATE", "dd.mm.yyyy")),
        };
        let v = dated.to_cell_format();
        assert_eq!(v["numberFormat"]["pattern"], "dd.mm.yyyy");
    }
}
