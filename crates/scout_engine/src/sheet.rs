use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use scout_logging::{scout_debug, scout_info};

use crate::browser::{js_string, BrowserDriver};
use crate::cdp::Key;
use crate::clock::Clock;
use crate::error::ScoutError;
use crate::tabs::TabManager;

/// Header row written above the outputs.
pub const OUTPUT_HEADERS: [&str; 5] = [
    "Website",
    "Clinic Phone Number",
    "Owner First Name",
    "Owner Last Name",
    "Number of Doctors",
];

/// Where inputs are read and outputs written. Rows are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub input_column: String,
    /// First of the five output columns; also the website column.
    pub output_column: String,
    pub header_row: usize,
    pub first_data_row: usize,
    /// Scratch cell outside the data the access check writes and clears.
    pub probe_cell: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            input_column: "Z".to_string(),
            output_column: "A".to_string(),
            header_row: 1,
            first_data_row: 2,
            probe_cell: "AZ1".to_string(),
        }
    }
}

/// Cell-level access to the spreadsheet.
#[async_trait::async_trait]
pub trait Spreadsheet: Send + Sync {
    /// Fails with `AccessCheckFailure` when the sheet cannot be read or
    /// edited.
    async fn probe_access(&self) -> Result<(), ScoutError>;
    /// Value of a cell such as `A1`; empty when blank.
    async fn read_cell(&self, cell: &str) -> Result<String, ScoutError>;
    /// Every value of `column`; index `i` holds row `i + 1`.
    async fn column_values(&self, column: &str) -> Result<Vec<String>, ScoutError>;
    /// First row below the existing outputs.
    async fn find_next_empty_row(&self) -> Result<usize, ScoutError>;
    /// Write `values` left to right starting at the output column of `row`.
    async fn write_row(&self, row: usize, values: &[String]) -> Result<(), ScoutError>;
}

fn sheet_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://docs\.google\.com/spreadsheets/d/[A-Za-z0-9_-]+/edit")
            .expect("valid regex")
    })
}

fn sheet_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("valid regex"))
}

fn gid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?#&]gid=(\d+)").expect("valid regex"))
}

pub fn is_valid_sheet_url(url: &str) -> bool {
    sheet_url_pattern().is_match(url.trim())
}

/// Zero-based index of a column name: `A` is 0, `Z` 25, `AA` 26.
pub fn column_index(column: &str) -> Option<usize> {
    let column = column.trim();
    if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let n = column
        .chars()
        .map(|c| (c.to_ascii_uppercase() as u8 - b'A') as usize + 1)
        .fold(0usize, |acc, d| acc * 26 + d);
    Some(n - 1)
}

pub fn cell_ref(column: &str, row: usize) -> String {
    format!("{}{}", column.trim().to_ascii_uppercase(), row)
}

/// Split `B12` into column index and row.
fn parse_cell_ref(cell: &str) -> Option<(usize, usize)> {
    let cell = cell.trim();
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((column_index(letters)?, row))
}

/// CSV export address of the tab `sheet_url` points at.
pub fn csv_export_url(sheet_url: &str) -> Option<String> {
    let id = sheet_id_pattern().captures(sheet_url)?.get(1)?.as_str();
    let gid = gid_pattern()
        .captures(sheet_url)
        .and_then(|c| c.get(1))
        .map_or("0", |m| m.as_str());
    Some(format!(
        "https://docs.google.com/spreadsheets/d/{id}/export?format=csv&gid={gid}"
    ))
}

/// Rows of a CSV export. Records may differ in length. Blank lines are
/// skipped by the reader, but exports of the layout's columns never produce
/// them since every row carries its commas.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, ScoutError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| ScoutError::Sheet(format!("CSV export is malformed: {e}")))
        })
        .collect()
}

/// Sheets treats these leading characters as formulas.
fn as_literal(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{value}"),
        _ => value.to_string(),
    }
}

const PROBE_VALUE: &str = "clinic-scout access check";
const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

const VIEW_ONLY_SCRIPT: &str = r#"(() => {
    const text = document.body ? document.body.innerText : "";
    return /View only|Comment only|Request edit access/.test(text);
})()"#;

const NAME_BOX_SCRIPT: &str = r#"(() => {
    const box = document.querySelector("input.waffle-name-box, input[aria-label='Name box'], #t-name-box");
    if (!box) return false;
    box.focus();
    box.select();
    return true;
})()"#;

/// [`Spreadsheet`] driving the spreadsheet tab. Reads go through the CSV
/// export fetched with the tab's own session; writes jump to a cell through
/// the Name box and type the values.
pub struct BrowserSheet {
    browser: Arc<dyn BrowserDriver>,
    tabs: Arc<TabManager>,
    clock: Arc<dyn Clock>,
    layout: SheetLayout,
    export_url: String,
    /// Rows below this were written by us even if the export lags behind.
    next_row_floor: Mutex<usize>,
}

impl BrowserSheet {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        tabs: Arc<TabManager>,
        clock: Arc<dyn Clock>,
        layout: SheetLayout,
    ) -> Result<Self, ScoutError> {
        let sheet_url = tabs.urls().sheet_url.clone();
        let export_url = csv_export_url(&sheet_url)
            .ok_or_else(|| ScoutError::Sheet(format!("not a spreadsheet URL: {sheet_url}")))?;
        let floor = layout.first_data_row;
        Ok(Self {
            browser,
            tabs,
            clock,
            layout,
            export_url,
            next_row_floor: Mutex::new(floor),
        })
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, ScoutError> {
        let script = format!(
            r#"(async () => {{
                const r = await fetch({url}, {{credentials: 'include'}});
                if (!r.ok) return {{ok: false, status: r.status}};
                return {{ok: true, text: await r.text()}};
            }})()"#,
            url = js_string(&self.export_url)
        );
        let browser = self.browser.clone();
        let value = self
            .tabs
            .with_sheet(|tab| async move { Ok::<_, ScoutError>(browser.evaluate(&tab.id, &script).await?) })
            .await?;

        if value["ok"].as_bool() != Some(true) {
            let status = value["status"].as_u64().unwrap_or(0);
            return Err(ScoutError::Sheet(format!("CSV export returned HTTP {status}")));
        }
        let text = value["text"].as_str().unwrap_or_default();
        if text.trim_start().starts_with('<') {
            return Err(ScoutError::Sheet(
                "CSV export returned a web page; is the browser signed in?".to_string(),
            ));
        }
        parse_csv(text)
    }

    async fn focus_name_box(&self, tab: &str) -> Result<(), ScoutError> {
        let start = self.clock.now();
        loop {
            if self.browser.evaluate(tab, NAME_BOX_SCRIPT).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if self.clock.elapsed_since(start) >= Duration::from_secs(10) {
                return Err(ScoutError::Sheet("Name box not found".to_string()));
            }
            self.clock.sleep(Duration::from_millis(250)).await;
        }
    }

    /// Jump to `target` through the Name box and type `values` left to
    /// right. Empty values clear their cell.
    async fn type_cells(&self, target: &str, values: &[String]) -> Result<(), ScoutError> {
        let browser = self.browser.clone();
        self.tabs
            .with_sheet(|tab| async move {
                self.focus_name_box(&tab.id).await?;
                browser.insert_text(&tab.id, target).await?;
                browser.press_key(&tab.id, Key::Enter).await?;
                self.clock.sleep(Duration::from_millis(300)).await;

                let last = values.len().saturating_sub(1);
                for (i, value) in values.iter().enumerate() {
                    browser.press_key(&tab.id, Key::Delete).await?;
                    if !value.is_empty() {
                        browser.insert_text(&tab.id, &as_literal(value)).await?;
                    }
                    let key = if i == last { Key::Enter } else { Key::Tab };
                    browser.press_key(&tab.id, key).await?;
                }
                Ok::<_, ScoutError>(())
            })
            .await
    }

    /// Poll the export until `cell` reads `expected`; the export trails
    /// the editor by a few seconds.
    async fn wait_for_cell(&self, cell: &str, expected: &str) -> Result<bool, ScoutError> {
        let start = self.clock.now();
        loop {
            if self.read_cell(cell).await? == expected {
                return Ok(true);
            }
            if self.clock.elapsed_since(start) >= PROBE_TIMEOUT {
                return Ok(false);
            }
            self.clock.sleep(Duration::from_secs(1)).await;
        }
    }

    fn raise_floor(&self, row: usize) {
        let mut floor = self.next_row_floor.lock().unwrap_or_else(|e| e.into_inner());
        *floor = (*floor).max(row);
    }
}

#[async_trait::async_trait]
impl Spreadsheet for BrowserSheet {
    async fn probe_access(&self) -> Result<(), ScoutError> {
        let browser = self.browser.clone();
        let view_only = self
            .tabs
            .with_sheet(|tab| async move {
                let flag = browser.evaluate(&tab.id, VIEW_ONLY_SCRIPT).await?;
                Ok::<_, ScoutError>(flag.as_bool() == Some(true))
            })
            .await
            .map_err(|e| ScoutError::AccessCheckFailure(e.to_string()))?;
        if view_only {
            return Err(ScoutError::AccessCheckFailure(
                "the spreadsheet is view-only or comment-only for this account".to_string(),
            ));
        }

        let scratch = self.layout.probe_cell.clone();
        if parse_cell_ref(&scratch).is_none() {
            return Err(ScoutError::AccessCheckFailure(format!(
                "bad scratch cell: {scratch}"
            )));
        }
        self.type_cells(&scratch, &[PROBE_VALUE.to_string()])
            .await
            .map_err(|e| ScoutError::AccessCheckFailure(format!("could not edit the spreadsheet: {e}")))?;
        let stuck = self.wait_for_cell(&scratch, PROBE_VALUE).await;
        let cleared = self.type_cells(&scratch, &[String::new()]).await;

        match stuck {
            Ok(true) => {}
            Ok(false) => {
                return Err(ScoutError::AccessCheckFailure(
                    "edits to the spreadsheet were not saved; check edit access".to_string(),
                ))
            }
            Err(e) => return Err(ScoutError::AccessCheckFailure(e.to_string())),
        }
        cleared.map_err(|e| {
            ScoutError::AccessCheckFailure(format!("could not clear {scratch}: {e}"))
        })?;
        scout_info!("Spreadsheet access confirmed");
        Ok(())
    }

    async fn read_cell(&self, cell: &str) -> Result<String, ScoutError> {
        let (col, row) =
            parse_cell_ref(cell).ok_or_else(|| ScoutError::Sheet(format!("bad cell reference: {cell}")))?;
        let rows = self.fetch_rows().await?;
        Ok(rows
            .get(row - 1)
            .and_then(|r| r.get(col))
            .map(|v| v.trim().to_string())
            .unwrap_or_default())
    }

    async fn column_values(&self, column: &str) -> Result<Vec<String>, ScoutError> {
        let col =
            column_index(column).ok_or_else(|| ScoutError::Sheet(format!("bad column: {column}")))?;
        let rows = self.fetch_rows().await?;
        Ok(rows
            .iter()
            .map(|r| r.get(col).map(|v| v.trim().to_string()).unwrap_or_default())
            .collect())
    }

    async fn find_next_empty_row(&self) -> Result<usize, ScoutError> {
        let values = self.column_values(&self.layout.output_column).await?;
        let filled = values.iter().filter(|v| !v.is_empty()).count();
        let next = if filled == 0 {
            self.layout.first_data_row
        } else {
            filled + 1
        };
        let floor = *self.next_row_floor.lock().unwrap_or_else(|e| e.into_inner());
        Ok(next.max(floor))
    }

    async fn write_row(&self, row: usize, values: &[String]) -> Result<(), ScoutError> {
        if values.is_empty() {
            return Ok(());
        }
        let target = cell_ref(&self.layout.output_column, row);
        self.type_cells(&target, values).await?;
        scout_debug!("Wrote {} cells at {}", values.len(), target);
        self.raise_floor(row + 1);
        Ok(())
    }
}
