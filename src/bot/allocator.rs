//! The row allocator: computes the next writable row of a category sheet and
//! commits a formatted three-column entry (label, date, amount) to it.

use crate::api::{Align, CellStyle, SheetStore};
use crate::model::{month, Amount};
use crate::Result;

/// How many rows past the candidate to grow the grid by, amortizing repeated
/// resizes across entries.
const GROWTH_ROWS: usize = 5;

fn is_filled(cell: &str) -> bool {
    !cell.trim().is_empty()
}

/// Computes the 1-based row the next entry must go to.
///
/// Every data column (all but the reserved last calculation column) is
/// counted for non-empty cells and the maximum count becomes the candidate:
/// the longest-filled column decides, so a column that is ahead of the others
/// is never overwritten. If the sheet already holds data, the grid is grown
/// by a few rows beyond the candidate. Finally the candidate row is probed:
/// reading it back non-empty pushes the answer one row down.
pub(crate) async fn next_available_row(
    store: &dyn SheetStore,
    ledger: &str,
    sheet: &str,
) -> Result<usize> {
    let cols = store.col_count(ledger, sheet).await?;
    let mut candidate = 0;
    for col in 1..cols {
        let filled = store
            .col_values(ledger, sheet, col)
            .await?
            .iter()
            .filter(|cell| is_filled(cell))
            .count();
        candidate = candidate.max(filled);
    }

    // The cleaned view: records with the calculation column dropped. A
    // non-empty last record means the sheet has been used and should be grown.
    let records = store.records(ledger, sheet).await?;
    let has_data = records.last().is_some_and(|row| {
        let data = &row[..row.len().saturating_sub(1)];
        data.iter().any(|cell| is_filled(cell))
    });
    if has_data {
        store.resize(ledger, sheet, candidate + GROWTH_ROWS).await?;
    }

    match store.row_values(ledger, sheet, candidate).await {
        Ok(cells) if cells.iter().any(|cell| is_filled(cell)) => Ok(candidate + 1),
        _ => Ok(candidate.max(1)),
    }
}

/// Validates the amount, allocates a row, and writes the entry as three
/// formatted cells. Validation runs before any cell is touched so that a bad
/// amount can never leave a partially written row behind.
///
/// Returns the written row read back, comma-joined, for display to the user.
pub(crate) async fn commit_entry(
    store: &dyn SheetStore,
    ledger: &str,
    sheet: &str,
    label: &str,
    raw_amount: &str,
) -> Result<String> {
    let amount: Amount = raw_amount.parse()?;
    let row = next_available_row(store, ledger, sheet).await?;

    let label_cell = format!("A{row}");
    let date_cell = format!("B{row}");
    let amount_cell = format!("C{row}");

    store.format_cell(ledger, sheet, &label_cell, &label_style()).await?;
    store.format_cell(ledger, sheet, &date_cell, &date_style()).await?;
    store.format_cell(ledger, sheet, &amount_cell, &amount_style()).await?;

    store.write_cell(ledger, sheet, &label_cell, label).await?;
    store.write_cell(ledger, sheet, &date_cell, &month::today()).await?;
    store
        .write_cell(ledger, sheet, &amount_cell, &amount.to_string())
        .await?;

    let written = store
        .read_range(ledger, sheet, &format!("A{row}:C{row}"))
        .await?;
    Ok(written
        .into_iter()
        .next()
        .unwrap_or_default()
        .join(", "))
}

fn label_style() -> CellStyle {
    CellStyle {
        align: Align::Left,
        font_size: 12,
        number_format: None,
    }
}

fn date_style() -> CellStyle {
    CellStyle {
        align: Align::Center,
        font_size: 12,
        number_format: Some(("DATE", "dd.mm.yyyy")),
    }
}

fn amount_style() -> CellStyle {
    CellStyle {
        align: Align::Right,
        font_size: 12,
        number_format: Some(("CURRENCY", "\u{20ac} #,##0.00")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestSheet, TestSheetStore};

    fn store_with(sheet: TestSheet) -> TestSheetStore {
        let store = TestSheetStore::new();
        store.insert_ledger("2026.08", vec![("Groceries", sheet)]);
        store
    }

    fn with_entries(entries: &[(&str, &str, &str)], blank_rows: usize) -> TestSheet {
        let mut sheet = TestSheet::category(blank_rows);
        for (i, (label, date, amount)) in entries.iter().enumerate() {
            sheet.rows[i + 1] = vec![
                label.to_string(),
                date.to_string(),
                amount.to_string(),
                String::new(),
            ];
        }
        sheet
    }

    #[tokio::test]
    async fn empty_sheet_allocates_row_one_without_resizing() {
        let blank = TestSheet {
            col_count: 4,
            rows: vec![vec![String::new(); 4]; 5],
        };
        let store = store_with(blank);
        let row = next_available_row(&store, "2026.08", "Groceries").await.unwrap();
        assert_eq!(row, 1);
        assert_eq!(store.sheet_rows("2026.08", "Groceries").len(), 5);
    }

    #[tokio::test]
    async fn filled_sheet_resizes_and_returns_next_row() {
        // Header plus two entries: the longest column holds 3 non-empty cells.
        let store = store_with(with_entries(
            &[("Bread", "01.08.2026", "50"), ("Milk", "02.08.2026", "30")],
            4,
        ));
        let row = next_available_row(&store, "2026.08", "Groceries").await.unwrap();
        assert_eq!(row, 4);
        assert_eq!(store.sheet_rows("2026.08", "Groceries").len(), 8);
    }

    #[tokio::test]
    async fn longest_column_wins() {
        // Column C has been manually edited ahead of columns A and B.
        let mut sheet = TestSheet::category(10);
        sheet.rows[1] = vec!["Bread".into(), "".into(), "50".into(), "".into()];
        sheet.rows[2] = vec!["".into(), "".into(), "30".into(), "".into()];
        sheet.rows[3] = vec!["".into(), "".into(), "20".into(), "".into()];
        let store = store_with(sheet);
        let row = next_available_row(&store, "2026.08", "Groceries").await.unwrap();
        // Column C fills rows 1-4 counting the header, and row 4 is non-empty.
        assert_eq!(row, 5);
    }

    #[tokio::test]
    async fn commit_writes_and_summarizes_the_row() {
        let store = store_with(TestSheet::category(10));
        let summary = commit_entry(&store, "2026.08", "Groceries", "Bread", "50")
            .await
            .unwrap();
        assert_eq!(summary, format!("Bread, {}, 50", month::today()));

        let rows = store.sheet_rows("2026.08", "Groceries");
        assert_eq!(rows[1][0], "Bread");
        assert_eq!(rows[1][1], month::today());
        assert_eq!(rows[1][2], "50");

        let formats = store.formats();
        assert_eq!(formats.len(), 3);
        assert_eq!(formats[0].2, "A2");
        assert_eq!(formats[1].3, date_style());
        assert_eq!(formats[2].3, amount_style());
    }

    #[tokio::test]
    async fn fractional_amount_is_preserved() {
        let store = store_with(TestSheet::category(10));
        commit_entry(&store, "2026.08", "Groceries", "Cheese", "50.5")
            .await
            .unwrap();
        assert_eq!(store.sheet_rows("2026.08", "Groceries")[1][2], "50.5");
    }

    #[tokio::test]
    async fn bad_amount_writes_nothing() {
        let store = store_with(TestSheet::category(10));
        let before = store.sheet_rows("2026.08", "Groceries");
        let result = commit_entry(&store, "2026.08", "Groceries", "Bread", "abc").await;
        assert!(result.is_err());
        assert_eq!(store.sheet_rows("2026.08", "Groceries"), before);
        assert!(store.formats().is_empty());
    }
}
