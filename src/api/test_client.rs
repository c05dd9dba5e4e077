//! In-memory implementations of the `SheetStore` and `Messenger` traits.
//!
//! Note: this is compiled even in the "production" version of this app so that
//! we can run the whole bot, top-to-bottom, without Google Sheets or Telegram.

use crate::api::{parse_a1, CellStyle, Messenger, SheetStore};
use crate::model::Month;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::sync::Mutex;

/// One in-memory worksheet. `rows.len()` is the grid row count; short rows
/// read as blanks on the right.
#[derive(Debug, Clone)]
pub(crate) struct TestSheet {
    pub(crate) col_count: usize,
    pub(crate) rows: Vec<Vec<String>>,
}

impl TestSheet {
    /// A category-shaped sheet: header row plus `blank_rows` empty rows, with
    /// the last column reserved for calculations.
    pub(crate) fn category(blank_rows: usize) -> Self {
        let mut rows = vec![vec![
            "Expense".to_string(),
            "Date".to_string(),
            "Amount".to_string(),
            "Total".to_string(),
        ]];
        rows.extend((0..blank_rows).map(|_| vec![String::new(); 4]));
        Self { col_count: 4, rows }
    }
}

/// An implementation of `SheetStore` that holds any data in memory and, by
/// default, is seeded with a current-month ledger.
#[derive(Default)]
pub(crate) struct TestSheetStore {
    /// Ledger name -> ordered worksheets (title, data). Order matters because
    /// the trailing worksheets of a ledger are reserved.
    ledgers: Mutex<HashMap<String, Vec<(String, TestSheet)>>>,
    formats: Mutex<Vec<(String, String, String, CellStyle)>>,
}

impl TestSheetStore {
    /// An empty store.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A store seeded with a current-month ledger holding four category
    /// sheets plus the reserved Income and Balance sheets.
    pub(crate) fn seeded() -> Self {
        let store = Self::new();
        store.insert_ledger(
            &Month::current().ledger_name(),
            vec![
                ("Groceries", TestSheet::category(20)),
                ("Restaurants", TestSheet::category(20)),
                ("Transport", TestSheet::category(20)),
                ("Utilities", TestSheet::category(20)),
                ("Income", TestSheet::category(20)),
                ("Balance", balance_sheet()),
            ],
        );
        store
    }

    pub(crate) fn insert_ledger(&self, name: &str, sheets: Vec<(&str, TestSheet)>) {
        self.ledgers.lock().unwrap().insert(
            name.to_string(),
            sheets
                .into_iter()
                .map(|(title, sheet)| (title.to_string(), sheet))
                .collect(),
        );
    }

    /// Snapshot of one worksheet's rows, for assertions.
    #[cfg(test)]
    pub(crate) fn sheet_rows(&self, ledger: &str, sheet: &str) -> Vec<Vec<String>> {
        let ledgers = self.ledgers.lock().unwrap();
        ledgers
            .get(ledger)
            .and_then(|sheets| sheets.iter().find(|(title, _)| title == sheet))
            .map(|(_, data)| data.rows.clone())
            .unwrap_or_default()
    }

    /// Styles applied so far, as `(ledger, sheet, cell, style)`.
    #[cfg(test)]
    pub(crate) fn formats(&self) -> Vec<(String, String, String, CellStyle)> {
        self.formats.lock().unwrap().clone()
    }

    fn with_sheet<T>(
        &self,
        ledger: &str,
        sheet: &str,
        f: impl FnOnce(&mut TestSheet) -> Result<T>,
    ) -> Result<T> {
        let mut ledgers = self.ledgers.lock().unwrap();
        let sheets = ledgers
            .get_mut(ledger)
            .with_context(|| format!("Ledger '{ledger}' not found"))?;
        let (_, data) = sheets
            .iter_mut()
            .find(|(title, _)| title == sheet)
            .with_context(|| format!("Worksheet '{sheet}' not found in ledger '{ledger}'"))?;
        f(data)
    }
}

/// A Balance sheet with the three fixed summary cells populated.
fn balance_sheet() -> TestSheet {
    let mut rows = vec![vec![String::new(); 6]; 15];
    rows[0][5] = "500".to_string(); // F1: net balance
    rows[14][1] = "2000".to_string(); // B15: income total
    rows[14][3] = "1500".to_string(); // D15: expense total
    TestSheet { col_count: 6, rows }
}

#[async_trait::async_trait]
impl SheetStore for TestSheetStore {
    async fn list_ledgers(&self) -> Result<Vec<String>> {
        let ledgers = self.ledgers.lock().unwrap();
        let mut names: Vec<String> = ledgers
            .keys()
            .filter(|name| name.contains('.'))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn worksheet_titles(&self, ledger: &str) -> Result<Option<Vec<String>>> {
        let ledgers = self.ledgers.lock().unwrap();
        Ok(ledgers
            .get(ledger)
            .map(|sheets| sheets.iter().map(|(title, _)| title.clone()).collect()))
    }

    async fn col_count(&self, ledger: &str, sheet: &str) -> Result<usize> {
        self.with_sheet(ledger, sheet, |data| Ok(data.col_count))
    }

    async fn col_values(&self, ledger: &str, sheet: &str, col: usize) -> Result<Vec<String>> {
        self.with_sheet(ledger, sheet, |data| {
            Ok(data
                .rows
                .iter()
                .map(|row| row.get(col - 1).cloned().unwrap_or_default())
                .collect())
        })
    }

    async fn row_values(&self, ledger: &str, sheet: &str, row: usize) -> Result<Vec<String>> {
        self.with_sheet(ledger, sheet, |data| {
            if row == 0 || row > data.rows.len() {
                bail!("Row {row} is outside the grid of worksheet '{sheet}'");
            }
            Ok(data.rows[row - 1].clone())
        })
    }

    async fn records(&self, ledger: &str, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.with_sheet(ledger, sheet, |data| {
            let mut rows: Vec<Vec<String>> = data.rows.iter().skip(1).cloned().collect();
            // The real API omits trailing empty rows from a values read.
            while rows
                .last()
                .is_some_and(|row| row.iter().all(|cell| cell.trim().is_empty()))
            {
                rows.pop();
            }
            Ok(rows)
        })
    }

    async fn resize(&self, ledger: &str, sheet: &str, rows: usize) -> Result<()> {
        self.with_sheet(ledger, sheet, |data| {
            let cols = data.col_count;
            data.rows.resize_with(rows, || vec![String::new(); cols]);
            Ok(())
        })
    }

    async fn read_range(&self, ledger: &str, sheet: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let (start, end) = range
            .split_once(':')
            .with_context(|| format!("'{range}' is not a rectangular range"))?;
        let (start_row, start_col) = parse_a1(start)?;
        let (end_row, end_col) = parse_a1(end)?;
        self.with_sheet(ledger, sheet, |data| {
            let mut out = Vec::new();
            for r in start_row..=end_row {
                let Some(row) = data.rows.get(r - 1) else { break };
                out.push(
                    (start_col..=end_col)
                        .map(|c| row.get(c - 1).cloned().unwrap_or_default())
                        .collect(),
                );
            }
            Ok(out)
        })
    }

    async fn read_cell(&self, ledger: &str, sheet: &str, cell: &str) -> Result<String> {
        let (row, col) = parse_a1(cell)?;
        self.with_sheet(ledger, sheet, |data| {
            Ok(data
                .rows
                .get(row - 1)
                .and_then(|r| r.get(col - 1))
                .cloned()
                .unwrap_or_default())
        })
    }

    async fn write_cell(&self, ledger: &str, sheet: &str, cell: &str, value: &str) -> Result<()> {
        let (row, col) = parse_a1(cell)?;
        self.with_sheet(ledger, sheet, |data| {
            if row > data.rows.len() {
                bail!("Cell {cell} is outside the grid of worksheet '{sheet}'");
            }
            let target = &mut data.rows[row - 1];
            if target.len() < col {
                target.resize(col, String::new());
            }
            target[col - 1] = value.to_string();
            Ok(())
        })
    }

    async fn format_cell(
        &self,
        ledger: &str,
        sheet: &str,
        cell: &str,
        style: &CellStyle,
    ) -> Result<()> {
        self.formats.lock().unwrap().push((
            ledger.to_string(),
            sheet.to_string(),
            cell.to_string(),
            style.clone(),
        ));
        Ok(())
    }
}

/// A sent message recorded by the `TestMessenger`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub(crate) chat_id: i64,
    pub(crate) text: String,
    pub(crate) reply: bool,
}

/// A `Messenger` that records everything instead of sending it.
#[derive(Default)]
pub(crate) struct TestMessenger {
    sent: Mutex<Vec<SentMessage>>,
}

impl TestMessenger {
    pub(crate) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages sent to one chat, in order.
    pub(crate) fn sent_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl Messenger for TestMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            reply: false,
        });
        Ok(())
    }

    async fn reply_to(&self, chat_id: i64, _message_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            reply: true,
        });
        Ok(())
    }

    async fn get_me(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "username": "ledgerbot_test", "is_bot": true }))
    }
}
